use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::Utc;
use uuid::Uuid;

use super::{ApiResult, CreatedResult, DeletedQuery, created, invalid, ok};
use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, ErrorBody},
    models::{ApiResponse, Category, CreateCategoryRequest, UpdateCategoryRequest},
};

/// list_categories
///
/// [Staff Route] All categories sorted by name. Soft-deleted ones only with
/// `include_deleted=true`.
#[utoipa::path(
    get,
    path = "/categories",
    tag = "categories",
    params(DeletedQuery),
    responses((status = 200, description = "Categories", body = ApiResponse<Vec<Category>>))
)]
pub async fn list_categories(
    State(state): State<AppState>,
    Query(query): Query<DeletedQuery>,
) -> ApiResult<Vec<Category>> {
    let categories = state
        .repo
        .list_categories(query.include_deleted.unwrap_or(false))
        .await?;
    ok(categories)
}

#[utoipa::path(
    get,
    path = "/categories/{id}",
    tag = "categories",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Found", body = ApiResponse<Category>),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Category> {
    ok(find_category(&state, id).await?)
}

#[utoipa::path(
    post,
    path = "/categories",
    tag = "categories",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Created", body = ApiResponse<Category>),
        (status = 409, description = "Duplicate name", body = ErrorBody)
    )
)]
pub async fn create_category(
    State(state): State<AppState>,
    Json(payload): Json<CreateCategoryRequest>,
) -> CreatedResult<Category> {
    payload.validate().map_err(invalid)?;
    let category = state
        .repo
        .insert_category(&Category::new(payload, Utc::now()))
        .await?;
    created(category)
}

/// update_category
///
/// Renaming re-derives the slug.
#[utoipa::path(
    put,
    path = "/categories/{id}",
    tag = "categories",
    params(("id" = Uuid, Path, description = "Category ID")),
    request_body = UpdateCategoryRequest,
    responses(
        (status = 200, description = "Updated", body = ApiResponse<Category>),
        (status = 404, description = "Not Found", body = ErrorBody),
        (status = 409, description = "Duplicate name", body = ErrorBody)
    )
)]
pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCategoryRequest>,
) -> ApiResult<Category> {
    payload.validate().map_err(invalid)?;
    let mut category = find_category(&state, id).await?;
    payload.apply_to(&mut category);
    ok(state.repo.update_category(&category).await?)
}

#[utoipa::path(
    delete,
    path = "/categories/{id}",
    tag = "categories",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Soft-deleted", body = ApiResponse<Category>),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Category> {
    if !state.repo.set_category_deleted(id, true).await? {
        return Err(AppError::not_found("Category"));
    }
    ok(find_category(&state, id).await?)
}

/// restore_category
///
/// [Admin Route]
#[utoipa::path(
    patch,
    path = "/categories/{id}/restore",
    tag = "categories",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Restored", body = ApiResponse<Category>),
        (status = 403, description = "Not an administrator", body = ErrorBody),
        (status = 404, description = "Not Found or not deleted", body = ErrorBody)
    )
)]
pub async fn restore_category(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Category> {
    auth.require_admin()?;
    if !state.repo.set_category_deleted(id, false).await? {
        return Err(AppError::not_found("Deleted category"));
    }
    ok(find_category(&state, id).await?)
}

async fn find_category(state: &AppState, id: Uuid) -> Result<Category, AppError> {
    state
        .repo
        .get_category(id)
        .await?
        .ok_or_else(|| AppError::not_found("Category"))
}
