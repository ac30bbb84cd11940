use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use super::{ApiResult, CreatedResult, created, invalid, ok};
use crate::{
    AppState,
    auth::{AuthUser, hash_password},
    error::{AppError, ErrorBody},
    models::{
        ApiResponse, CreateUserRequest, Page, PageParams, SortOrder, UpdateUserRequest, User,
        UserFilter, UserProfile, UserRole, UserSort, user::normalize_email,
    },
};

/// UserListQuery
///
/// Query parameters accepted by GET /users.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct UserListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    /// Case-insensitive match on first name, last name or email.
    pub search: Option<String>,
    pub role: Option<UserRole>,
    pub sort_by: Option<UserSort>,
    pub order: Option<SortOrder>,
    /// `true` lists only soft-deleted users.
    pub deleted: Option<bool>,
}

impl From<UserListQuery> for UserFilter {
    fn from(query: UserListQuery) -> Self {
        Self {
            search: query.search,
            role: query.role,
            deleted: query.deleted.unwrap_or(false),
            sort: query.sort_by.unwrap_or_default(),
            order: query.order.unwrap_or_default(),
            page: PageParams::new(query.page, query.limit),
        }
    }
}

/// list_users
///
/// [Staff Route] Paginated, filterable user listing.
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    params(UserListQuery),
    responses((status = 200, description = "Users", body = ApiResponse<Page<UserProfile>>))
)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> ApiResult<Page<UserProfile>> {
    let page = state.repo.list_users(&query.into()).await?;
    ok(page.map(UserProfile::from))
}

/// get_user
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Found", body = ApiResponse<UserProfile>),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn get_user(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<UserProfile> {
    let user = find_user(&state, id).await?;
    ok(user.into())
}

/// create_user
///
/// [Admin Route] Creates a customer or staff account. Emails are unique
/// regardless of case.
#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Created", body = ApiResponse<UserProfile>),
        (status = 400, description = "Invalid payload", body = ErrorBody),
        (status = 409, description = "Email already in use", body = ErrorBody)
    )
)]
pub async fn create_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> CreatedResult<UserProfile> {
    auth.require_admin()?;
    payload.validate().map_err(invalid)?;

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        first_name: payload.first_name.trim().to_string(),
        last_name: payload.last_name.trim().to_string(),
        email: normalize_email(&payload.email),
        phone: payload.phone.filter(|p| !p.trim().is_empty()),
        address: payload.address.filter(|a| !a.trim().is_empty()),
        role: payload.role.unwrap_or_default(),
        password_hash: hash_password(&payload.password)?,
        is_deleted: false,
        created_at: now,
        updated_at: now,
    };

    let user = state.repo.insert_user(&user).await?;
    tracing::info!(user_id = %user.id, role = %user.role, created_by = %auth.id, "user created");
    created(user.into())
}

/// update_user
///
/// [Admin Route] Partial update. A present `password` is re-hashed.
#[utoipa::path(
    put,
    path = "/users/{id}",
    tag = "users",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated", body = ApiResponse<UserProfile>),
        (status = 404, description = "Not Found", body = ErrorBody),
        (status = 409, description = "Email already in use", body = ErrorBody)
    )
)]
pub async fn update_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> ApiResult<UserProfile> {
    auth.require_admin()?;
    payload.validate().map_err(invalid)?;

    let mut user = find_user(&state, id).await?;
    payload.apply_to(&mut user);
    if let Some(password) = &payload.password {
        user.password_hash = hash_password(password)?;
    }

    let user = state.repo.update_user(&user).await?;
    ok(user.into())
}

/// delete_user
///
/// [Admin Route] Soft delete. Administrators cannot delete themselves.
#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "users",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Soft-deleted", body = ApiResponse<UserProfile>),
        (status = 400, description = "Self-deletion", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn delete_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<UserProfile> {
    auth.require_admin()?;
    if id == auth.id {
        return Err(AppError::BadRequest("You cannot delete your own account".to_string()));
    }

    if !state.repo.set_user_deleted(id, true).await? {
        return Err(AppError::not_found("User"));
    }
    tracing::info!(user_id = %id, deleted_by = %auth.id, "user soft-deleted");
    ok(find_user(&state, id).await?.into())
}

/// restore_user
///
/// [Admin Route] Clears the soft-delete flag.
#[utoipa::path(
    patch,
    path = "/users/{id}/restore",
    tag = "users",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Restored", body = ApiResponse<UserProfile>),
        (status = 404, description = "Not Found or not deleted", body = ErrorBody)
    )
)]
pub async fn restore_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<UserProfile> {
    auth.require_admin()?;
    if !state.repo.set_user_deleted(id, false).await? {
        return Err(AppError::not_found("Deleted user"));
    }
    ok(find_user(&state, id).await?.into())
}

async fn find_user(state: &AppState, id: Uuid) -> Result<User, AppError> {
    state
        .repo
        .get_user(id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))
}
