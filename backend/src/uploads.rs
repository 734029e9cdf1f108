use axum::extract::{Multipart, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::AppState;

/// Maximum accepted upload size (100MB).
pub const MAX_UPLOAD_SIZE: usize = 100 * 1024 * 1024;

#[derive(Debug, Deserialize)]
pub struct DeleteMediaRequest {
    pub public_id: String,
    pub resource_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CdnUploadResponse {
    secure_url: String,
    public_id: String,
}

/// The CDN distinguishes video from image uploads by endpoint; we
/// classify by MIME prefix and treat everything that is not video as an
/// image.
pub fn resource_type_for(content_type: &str) -> &'static str {
    if content_type.starts_with("video/") {
        "video"
    } else {
        "image"
    }
}

/// POST /api/upload — forwards the raw file to the media CDN and
/// returns its canonical URL and public identifier.
pub async fn upload_media(
    State(state): State<AppState>,
    _auth: AuthUser,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut file: Option<(Vec<u8>, String, String)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::Validation(format!("Failed to read upload: {}", e)))?;
        file = Some((data.to_vec(), file_name, content_type));
        break;
    }
    let (data, file_name, content_type) =
        file.ok_or_else(|| ApiError::Validation("Missing file field".to_string()))?;

    if data.len() > MAX_UPLOAD_SIZE {
        return Err(ApiError::Validation(
            "File too large. Maximum size is 100MB".to_string(),
        ));
    }

    let resource_type = resource_type_for(&content_type);
    let size = data.len();
    let part = reqwest::multipart::Part::bytes(data)
        .file_name(file_name.clone())
        .mime_str(&content_type)
        .map_err(|_| ApiError::Validation("Invalid content type".to_string()))?;
    let form = reqwest::multipart::Form::new().part("file", part);

    let response = state
        .http
        .post(format!("{}/{}/upload", state.config.cdn_url, resource_type))
        .bearer_auth(&state.config.cdn_api_key)
        .multipart(form)
        .send()
        .await?;
    if !response.status().is_success() {
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "upload failed".to_string());
        return Err(ApiError::Upstream(message));
    }
    let body: CdnUploadResponse = response.json().await?;

    info!(
        "Uploaded {} ({} bytes) as {} {}",
        file_name, size, resource_type, body.public_id
    );
    Ok(Json(json!({
        "success": true,
        "data": {
            "url": body.secure_url,
            "public_id": body.public_id,
            "resource_type": resource_type,
        }
    })))
}

/// DELETE /api/upload — forwards a stored identifier to the CDN's
/// destroy call.
pub async fn delete_media(
    State(state): State<AppState>,
    _auth: AuthUser,
    Json(req): Json<DeleteMediaRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let resource_type = req.resource_type.unwrap_or_else(|| "image".to_string());
    let response = state
        .http
        .post(format!(
            "{}/{}/destroy",
            state.config.cdn_url, resource_type
        ))
        .bearer_auth(&state.config.cdn_api_key)
        .json(&json!({ "public_id": req.public_id }))
        .send()
        .await?;
    if !response.status().is_success() {
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "delete failed".to_string());
        return Err(ApiError::Upstream(message));
    }

    info!("Deleted media {}", req.public_id);
    Ok(Json(json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn videos_classify_by_mime_prefix() {
        assert_eq!(resource_type_for("video/mp4"), "video");
        assert_eq!(resource_type_for("video/webm"), "video");
        assert_eq!(resource_type_for("image/png"), "image");
        assert_eq!(resource_type_for("image/jpeg"), "image");
        assert_eq!(resource_type_for("application/octet-stream"), "image");
    }
}
