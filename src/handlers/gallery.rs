use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::Utc;
use uuid::Uuid;

use super::{ApiResult, CreatedResult, created, invalid, ok};
use crate::{
    AppState,
    error::{AppError, ErrorBody},
    models::{
        ApiResponse, GALLERY_PREFIX, Image, Page, PageParams, PageQuery, RegisterImageRequest,
        UploadUrlRequest, UploadUrlResponse, image::is_image_type,
    },
    storage::UPLOAD_URL_TTL,
};

/// list_images
///
/// [Staff Route] Gallery, newest first.
#[utoipa::path(
    get,
    path = "/gallery",
    tag = "gallery",
    params(PageQuery),
    responses((status = 200, description = "Images", body = ApiResponse<Page<Image>>))
)]
pub async fn list_images(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Page<Image>> {
    ok(state.repo.list_images(PageParams::from(&query)).await?)
}

/// create_upload_url
///
/// [Staff Route] Generates a presigned PUT URL for a direct client-to-bucket
/// upload. The URL is valid for ten minutes and bound to the declared
/// content type. The object key is `gallery/<uuid>.<ext>`.
#[utoipa::path(
    post,
    path = "/gallery/upload-url",
    tag = "gallery",
    request_body = UploadUrlRequest,
    responses(
        (status = 200, description = "Presigned URL", body = ApiResponse<UploadUrlResponse>),
        (status = 400, description = "Not an image type", body = ErrorBody),
        (status = 502, description = "Storage unavailable", body = ErrorBody)
    )
)]
pub async fn create_upload_url(
    State(state): State<AppState>,
    Json(payload): Json<UploadUrlRequest>,
) -> ApiResult<UploadUrlResponse> {
    if !is_image_type(&payload.content_type) {
        return Err(AppError::BadRequest(format!(
            "'{}' is not an image type",
            payload.content_type
        )));
    }

    let key = format!(
        "{GALLERY_PREFIX}{}.{}",
        Uuid::new_v4(),
        file_extension(&payload.file_name, &payload.content_type)
    );
    let upload_url = state
        .storage
        .presigned_upload_url(&key, &payload.content_type)
        .await?;

    ok(UploadUrlResponse {
        upload_url,
        key,
        expires_in: UPLOAD_URL_TTL.as_secs(),
    })
}

/// register_image
///
/// [Staff Route] Records an uploaded object as a gallery image.
#[utoipa::path(
    post,
    path = "/gallery",
    tag = "gallery",
    request_body = RegisterImageRequest,
    responses(
        (status = 201, description = "Registered", body = ApiResponse<Image>),
        (status = 400, description = "Invalid key or type", body = ErrorBody),
        (status = 409, description = "Key already registered", body = ErrorBody)
    )
)]
pub async fn register_image(
    State(state): State<AppState>,
    Json(payload): Json<RegisterImageRequest>,
) -> CreatedResult<Image> {
    payload.validate().map_err(invalid)?;

    let image = Image {
        id: Uuid::new_v4(),
        url: state.config.media_url(&payload.key),
        key: payload.key,
        file_name: payload.file_name,
        content_type: payload.content_type,
        size_bytes: payload.size_bytes,
        created_at: Utc::now(),
    };

    let image = state.repo.insert_image(&image).await?;
    tracing::info!(image_id = %image.id, key = %image.key, "image registered");
    created(image)
}

/// delete_image
///
/// [Staff Route] Removes the object from storage and its gallery entry.
/// Images still used by a live product are refused.
#[utoipa::path(
    delete,
    path = "/gallery/{id}",
    tag = "gallery",
    params(("id" = Uuid, Path, description = "Image ID")),
    responses(
        (status = 200, description = "Deleted", body = ApiResponse<Image>),
        (status = 404, description = "Not Found", body = ErrorBody),
        (status = 409, description = "Image in use", body = ErrorBody)
    )
)]
pub async fn delete_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Image> {
    let image = state
        .repo
        .get_image(id)
        .await?
        .ok_or_else(|| AppError::not_found("Image"))?;

    let in_use = state.repo.count_products_with_image(id).await?;
    if in_use > 0 {
        return Err(AppError::Conflict(format!(
            "Image is used by {in_use} product(s)"
        )));
    }

    // The document goes first so no record ever points at a missing object.
    // A failed object delete only leaves an unreferenced object behind.
    if !state.repo.delete_image(id).await? {
        return Err(AppError::not_found("Image"));
    }
    if let Err(err) = state.storage.delete_object(&image.key).await {
        tracing::warn!(image_id = %id, key = %image.key, error = %err, "orphaned media object");
    }

    tracing::info!(image_id = %id, key = %image.key, "image deleted");
    ok(image)
}

/// Lower-case alphanumeric extension of `file_name`, else the MIME subtype.
fn file_extension(file_name: &str, content_type: &str) -> String {
    let from_name = std::path::Path::new(file_name)
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()));

    match from_name {
        Some(ext) => ext.to_ascii_lowercase(),
        None => content_type
            .trim_start_matches("image/")
            .split(['+', ';'])
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("bin")
            .to_ascii_lowercase(),
    }
}
