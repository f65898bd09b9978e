use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use validator::Validate;

use super::ApiError;
use crate::{
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::account::{CreateFamilyAccountRequest, CreateStaffAccountRequest},
    services::AppState,
};

/// POST /admin/families - Create a parent account and its family record
pub async fn create_family_account(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<CreateFamilyAccountRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::bad_request(format!("Validation error: {}", e)))?;

    let created = state
        .accounts()
        .create_family_account(&claims.sub, req)
        .await?;

    Ok((StatusCode::CREATED, Json(created)))
}

/// POST /admin/staffs - Create a staff account and its staff record
pub async fn create_staff_account(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<CreateStaffAccountRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::bad_request(format!("Validation error: {}", e)))?;

    let created = state
        .accounts()
        .create_staff_account(&claims.sub, req)
        .await?;

    Ok((StatusCode::CREATED, Json(created)))
}

/// POST /admin/accounts/{uid}/reset-password - Issue a temporary password
pub async fn reset_account_password(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(uid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let reset = state.accounts().reset_password(&claims.sub, &uid).await?;
    Ok(Json(reset))
}

/// DELETE /admin/accounts/{uid} - Delete an account and its recipient record
pub async fn delete_account(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(uid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.accounts().delete_account(&claims.sub, &uid).await?;
    Ok(StatusCode::NO_CONTENT)
}
