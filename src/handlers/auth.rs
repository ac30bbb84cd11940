use axum::{Json, extract::State};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

use super::{ApiResult, ok};
use crate::{
    AppState,
    auth::{self as credentials, AuthUser},
    error::{AppError, ErrorBody},
    models::{ApiResponse, ChangePasswordRequest, LoginRequest, LoginResponse, UserProfile},
};

/// Health
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct Health {
    pub service: String,
    pub version: String,
}

/// health
///
/// [Public Route] Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    tag = "auth",
    responses((status = 200, description = "Service is up", body = ApiResponse<Health>))
)]
pub async fn health() -> ApiResult<Health> {
    ok(Health {
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// login
///
/// [Public Route] Exchanges staff credentials for a bearer token.
///
/// Unknown email, wrong password, deleted accounts and customer accounts are
/// all answered with the same 401.
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = ApiResponse<LoginResponse>),
        (status = 401, description = "Invalid credentials", body = ErrorBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let user = credentials::authenticate(&state.repo, &payload.email, &payload.password).await?;
    let (token, expires_in) = credentials::issue_token(&user, &state.config)?;

    tracing::info!(user_id = %user.id, role = %user.role, "staff login");
    ok(LoginResponse {
        token,
        expires_in,
        user: user.into(),
    })
}

/// get_me
///
/// [Authenticated Route] The signed-in user's profile.
#[utoipa::path(
    get,
    path = "/me",
    tag = "auth",
    responses((status = 200, description = "Current user", body = ApiResponse<UserProfile>))
)]
pub async fn get_me(auth: AuthUser, State(state): State<AppState>) -> ApiResult<UserProfile> {
    let user = state
        .repo
        .get_user(auth.id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    ok(user.into())
}

/// change_password
///
/// [Authenticated Route] Replaces the caller's password after checking the
/// current one. A wrong current password is a 400, not a 401, so the session
/// stays valid.
#[utoipa::path(
    put,
    path = "/me/password",
    tag = "auth",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = ApiResponse<UserProfile>),
        (status = 400, description = "Wrong current password or weak new password", body = ErrorBody)
    )
)]
pub async fn change_password(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<ChangePasswordRequest>,
) -> ApiResult<UserProfile> {
    let mut user = state
        .repo
        .get_user(auth.id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    credentials::verify_password(&payload.current_password, &user.password_hash)
        .map_err(|_| AppError::BadRequest("Current password is incorrect".to_string()))?;

    user.password_hash = credentials::hash_password(&payload.new_password)?;
    user.updated_at = Utc::now();
    let user = state.repo.update_user(&user).await?;

    tracing::info!(user_id = %user.id, "password changed");
    ok(user.into())
}
