use axum::{
    Json,
    extract::{Path, State},
};
use chrono::Utc;

use super::{ApiResult, CreatedResult, created, invalid, ok};
use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, ErrorBody},
    models::{
        ApiResponse, CreateCurrencyRequest, Currency, UpdateCurrencyRequest,
        currency::normalize_code,
    },
};

/// list_currencies
///
/// [Staff Route] The default currency first, then by code.
#[utoipa::path(
    get,
    path = "/currencies",
    tag = "currencies",
    responses((status = 200, description = "Currencies", body = ApiResponse<Vec<Currency>>))
)]
pub async fn list_currencies(State(state): State<AppState>) -> ApiResult<Vec<Currency>> {
    ok(state.repo.list_currencies().await?)
}

#[utoipa::path(
    get,
    path = "/currencies/{code}",
    tag = "currencies",
    params(("code" = String, Path, description = "ISO 4217 code")),
    responses(
        (status = 200, description = "Found", body = ApiResponse<Currency>),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn get_currency(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Currency> {
    ok(find_currency(&state, &code).await?)
}

/// create_currency
///
/// [Admin Route] The first currency created becomes the default.
#[utoipa::path(
    post,
    path = "/currencies",
    tag = "currencies",
    request_body = CreateCurrencyRequest,
    responses(
        (status = 201, description = "Created", body = ApiResponse<Currency>),
        (status = 400, description = "Invalid payload", body = ErrorBody),
        (status = 409, description = "Already exists", body = ErrorBody)
    )
)]
pub async fn create_currency(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateCurrencyRequest>,
) -> CreatedResult<Currency> {
    auth.require_admin()?;
    let currency = Currency::new(payload, Utc::now());
    currency.validate().map_err(invalid)?;

    let first = state.repo.list_currencies().await?.is_empty();
    let mut currency = state.repo.insert_currency(&currency).await?;
    if first {
        if let Some(default) = state.repo.set_default_currency(&currency.code).await? {
            currency = default;
        }
    }

    tracing::info!(code = %currency.code, is_default = currency.is_default, "currency created");
    created(currency)
}

#[utoipa::path(
    put,
    path = "/currencies/{code}",
    tag = "currencies",
    params(("code" = String, Path, description = "ISO 4217 code")),
    request_body = UpdateCurrencyRequest,
    responses(
        (status = 200, description = "Updated", body = ApiResponse<Currency>),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn update_currency(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(payload): Json<UpdateCurrencyRequest>,
) -> ApiResult<Currency> {
    auth.require_admin()?;
    let mut currency = find_currency(&state, &code).await?;
    payload.apply_to(&mut currency);
    currency.validate().map_err(invalid)?;
    ok(state.repo.update_currency(&currency).await?)
}

/// delete_currency
///
/// [Admin Route] Hard delete. The default currency and the store's settings
/// currency cannot be removed.
#[utoipa::path(
    delete,
    path = "/currencies/{code}",
    tag = "currencies",
    params(("code" = String, Path, description = "ISO 4217 code")),
    responses(
        (status = 200, description = "Deleted", body = ApiResponse<Currency>),
        (status = 404, description = "Not Found", body = ErrorBody),
        (status = 409, description = "Currency in use", body = ErrorBody)
    )
)]
pub async fn delete_currency(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Currency> {
    auth.require_admin()?;
    let currency = find_currency(&state, &code).await?;

    if currency.is_default {
        return Err(AppError::Conflict(format!(
            "{} is the default currency",
            currency.code
        )));
    }
    if state.repo.get_settings().await?.default_currency == currency.code {
        return Err(AppError::Conflict(format!(
            "{} is the store's settings currency",
            currency.code
        )));
    }

    if !state.repo.delete_currency(&currency.code).await? {
        return Err(AppError::not_found("Currency"));
    }
    tracing::info!(code = %currency.code, "currency deleted");
    ok(currency)
}

/// set_default_currency
///
/// [Admin Route] Makes this currency the only default.
#[utoipa::path(
    patch,
    path = "/currencies/{code}/default",
    tag = "currencies",
    params(("code" = String, Path, description = "ISO 4217 code")),
    responses(
        (status = 200, description = "Now the default", body = ApiResponse<Currency>),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn set_default_currency(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Currency> {
    auth.require_admin()?;
    let currency = state
        .repo
        .set_default_currency(&normalize_code(&code))
        .await?
        .ok_or_else(|| AppError::not_found("Currency"))?;
    ok(currency)
}

async fn find_currency(state: &AppState, code: &str) -> Result<Currency, AppError> {
    state
        .repo
        .get_currency(&normalize_code(code))
        .await?
        .ok_or_else(|| AppError::not_found("Currency"))
}
