use axum::{Json, extract::State};

use super::{ApiResult, invalid, ok};
use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, ErrorBody},
    models::{ApiResponse, StoreSettings, UpdateSettingsRequest},
};

#[utoipa::path(
    get,
    path = "/settings",
    tag = "settings",
    responses((status = 200, description = "Store settings", body = ApiResponse<StoreSettings>))
)]
pub async fn get_settings(State(state): State<AppState>) -> ApiResult<StoreSettings> {
    ok(state.repo.get_settings().await?)
}

/// update_settings
///
/// [Admin Route] Partial update. A new `default_currency` must already exist.
#[utoipa::path(
    put,
    path = "/settings",
    tag = "settings",
    request_body = UpdateSettingsRequest,
    responses(
        (status = 200, description = "Updated", body = ApiResponse<StoreSettings>),
        (status = 400, description = "Invalid value or unknown currency", body = ErrorBody),
        (status = 403, description = "Not an administrator", body = ErrorBody)
    )
)]
pub async fn update_settings(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateSettingsRequest>,
) -> ApiResult<StoreSettings> {
    auth.require_admin()?;

    let mut settings = state.repo.get_settings().await?;
    let currency_changed = payload.default_currency.is_some();
    payload.apply_to(&mut settings);
    settings.validate().map_err(invalid)?;

    if currency_changed
        && state
            .repo
            .get_currency(&settings.default_currency)
            .await?
            .is_none()
    {
        return Err(AppError::BadRequest(format!(
            "Unknown currency {}",
            settings.default_currency
        )));
    }

    let settings = state.repo.save_settings(&settings).await?;
    tracing::info!(updated_by = %auth.id, "store settings updated");
    ok(settings)
}
