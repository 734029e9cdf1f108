use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{User, UserRole};
use crate::schema::users;
use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

pub fn create_token(user_id: &str, jwt_secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    let expiration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as usize)
        .unwrap_or(0)
        + 24 * 60 * 60; // 24 hours
    let claims = Claims {
        sub: user_id.to_string(),
        exp: expiration,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
}

/// Validates a bearer token issued by the identity provider and resolves
/// it to the caller's user id.
pub fn validate_token(token: &str, jwt_secret: &str) -> Result<Uuid, ApiError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Unauthorized("Invalid or expired token".to_string()))?;
    Uuid::parse_str(&token_data.claims.sub)
        .map_err(|_| ApiError::Unauthorized("Invalid token subject".to_string()))
}

/// The authenticated caller. Using this extractor in a handler makes the
/// route require a valid bearer token.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: Uuid,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;
        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            ApiError::Unauthorized("Invalid Authorization header format".to_string())
        })?;
        let id = validate_token(token, &state.config.jwt_secret)?;
        Ok(AuthUser { id })
    }
}

pub async fn load_user(conn: &mut AsyncPgConnection, id: Uuid) -> Result<Option<User>, ApiError> {
    let user = users::table
        .find(id)
        .first::<User>(conn)
        .await
        .optional()?;
    Ok(user)
}

/// Admin access is gated by the stored profile role, not by token
/// claims. Call this before touching any state in an admin handler.
pub async fn require_admin(conn: &mut AsyncPgConnection, user: &AuthUser) -> Result<User, ApiError> {
    let row = load_user(conn, user.id)
        .await?
        .ok_or_else(|| ApiError::Forbidden("Admin access required".to_string()))?;
    if row.role != UserRole::Admin {
        return Err(ApiError::Forbidden("Admin access required".to_string()));
    }
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn token_round_trip() {
        let id = Uuid::new_v4();
        let token = create_token(&id.to_string(), SECRET).unwrap();
        assert_eq!(validate_token(&token, SECRET).unwrap(), id);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = create_token(&Uuid::new_v4().to_string(), SECRET).unwrap();
        let err = validate_token(&token, "other-secret").unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[test]
    fn non_uuid_subject_is_rejected() {
        let token = create_token("user123", SECRET).unwrap();
        let err = validate_token(&token, SECRET).unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[test]
    fn garbage_token_is_rejected() {
        let err = validate_token("not.a.token", SECRET).unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }
}
