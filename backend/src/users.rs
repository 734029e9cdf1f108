use axum::extract::State;
use axum::Json;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use serde_json::json;

use crate::auth::{load_user, AuthUser};
use crate::db;
use crate::error::ApiError;
use crate::models::{NewUser, User, UserRole};
use crate::schema::users;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct UpsertProfileRequest {
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
}

/// GET /api/profile
pub async fn get_profile(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut conn = db::get_conn(&state.pool).await?;
    let user = load_user(&mut conn, auth.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User profile not found".to_string()))?;
    Ok(Json(json!({ "success": true, "data": user })))
}

/// PUT /api/profile — mirrors the identity-provider account into the
/// users table. The stored role is never touched here, so an admin
/// cannot demote themselves by saving their profile.
pub async fn upsert_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<UpsertProfileRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let email = req.email.trim().to_string();
    if email.is_empty() {
        return Err(ApiError::Validation(
            "Missing required field: email".to_string(),
        ));
    }
    let full_name = req.full_name.trim().to_string();
    if full_name.is_empty() {
        return Err(ApiError::Validation(
            "Missing required field: full_name".to_string(),
        ));
    }

    let mut conn = db::get_conn(&state.pool).await?;
    let now = Utc::now().naive_utc();
    let new_user = NewUser {
        id: auth.id,
        email,
        full_name,
        phone: req.phone,
        role: UserRole::User,
        created_at: now,
        updated_at: now,
    };
    let user = diesel::insert_into(users::table)
        .values(&new_user)
        .on_conflict(users::id)
        .do_update()
        .set((
            users::email.eq(new_user.email.clone()),
            users::full_name.eq(new_user.full_name.clone()),
            users::phone.eq(new_user.phone.clone()),
            users::updated_at.eq(now),
        ))
        .get_result::<User>(&mut conn)
        .await?;

    Ok(Json(json!({ "success": true, "data": user })))
}
