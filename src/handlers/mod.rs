//! HTTP handlers, one module per resource.
//!
//! Every handler returns the success envelope (`ApiResponse`) or an `AppError`.
//! Staff access is enforced by the router layer; admin-only operations call
//! `AuthUser::require_admin` first.

use axum::{Json, http::StatusCode};
use serde::Deserialize;

use crate::{error::AppError, models::ApiResponse};

pub mod auth;
pub mod categories;
pub mod currencies;
pub mod dashboard;
pub mod gallery;
pub mod orders;
pub mod products;
pub mod settings;
pub mod users;

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;
pub type CreatedResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), AppError>;

pub(crate) fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data)))
}

pub(crate) fn created<T>(data: T) -> CreatedResult<T> {
    Ok((StatusCode::CREATED, Json(ApiResponse::success(data))))
}

/// Maps a model validation message to 400.
pub(crate) fn invalid(message: String) -> AppError {
    AppError::BadRequest(message)
}

/// DeletedQuery
///
/// `?include_deleted=true` for the unpaginated listings.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct DeletedQuery {
    pub include_deleted: Option<bool>,
}
