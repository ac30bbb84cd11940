use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use super::{ApiResult, CreatedResult, created, invalid, ok};
use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, ErrorBody},
    models::{
        ApiResponse, CreateProductRequest, Page, PageParams, Product, ProductDetails,
        ProductFilter, ProductSort, ProductStatus, SortOrder, UpdateProductRequest,
    },
};

/// ProductListQuery
///
/// Query parameters accepted by GET /products. Price bounds apply to the
/// effective price (discount price when set).
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct ProductListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    /// Case-insensitive match on name, SKU or description.
    pub search: Option<String>,
    pub category_id: Option<Uuid>,
    pub status: Option<ProductStatus>,
    #[param(value_type = Option<String>)]
    pub min_price: Option<Decimal>,
    #[param(value_type = Option<String>)]
    pub max_price: Option<Decimal>,
    /// `true`: stock > 0, `false`: out of stock.
    pub in_stock: Option<bool>,
    pub sort_by: Option<ProductSort>,
    pub order: Option<SortOrder>,
    /// `true` lists only soft-deleted products.
    pub deleted: Option<bool>,
}

impl From<ProductListQuery> for ProductFilter {
    fn from(query: ProductListQuery) -> Self {
        Self {
            search: query.search,
            category_id: query.category_id,
            status: query.status,
            min_price: query.min_price,
            max_price: query.max_price,
            in_stock: query.in_stock,
            deleted: query.deleted.unwrap_or(false),
            sort: query.sort_by.unwrap_or_default(),
            order: query.order.unwrap_or_default(),
            page: PageParams::new(query.page, query.limit),
        }
    }
}

/// list_products
///
/// [Staff Route] Filter-sort-paginate listing of the catalogue.
#[utoipa::path(
    get,
    path = "/products",
    tag = "products",
    params(ProductListQuery),
    responses((status = 200, description = "Products", body = ApiResponse<Page<Product>>))
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> ApiResult<Page<Product>> {
    ok(state.repo.list_products(&query.into()).await?)
}

/// get_product
///
/// [Staff Route] The product with its category name and resolved images.
#[utoipa::path(
    get,
    path = "/products/{id}",
    tag = "products",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Found", body = ApiResponse<ProductDetails>),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ProductDetails> {
    let product = find_product(&state, id).await?;
    ok(details(&state, product).await?)
}

/// create_product
#[utoipa::path(
    post,
    path = "/products",
    tag = "products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Created", body = ApiResponse<ProductDetails>),
        (status = 400, description = "Invalid payload or unknown category/image", body = ErrorBody),
        (status = 409, description = "Duplicate SKU", body = ErrorBody)
    )
)]
pub async fn create_product(
    State(state): State<AppState>,
    Json(payload): Json<CreateProductRequest>,
) -> CreatedResult<ProductDetails> {
    let product = Product::new(payload, Utc::now());
    check_product(&state, &product).await?;

    let product = state.repo.insert_product(&product).await?;
    tracing::info!(product_id = %product.id, sku = %product.sku, "product created");
    created(details(&state, product).await?)
}

/// update_product
///
/// [Staff Route] Partial update; the merged document is re-validated as a whole.
#[utoipa::path(
    put,
    path = "/products/{id}",
    tag = "products",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Updated", body = ApiResponse<ProductDetails>),
        (status = 400, description = "Invalid payload", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody),
        (status = 409, description = "Duplicate SKU", body = ErrorBody)
    )
)]
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> ApiResult<ProductDetails> {
    let mut product = find_product(&state, id).await?;
    payload.apply_to(&mut product);
    check_product(&state, &product).await?;

    let product = state.repo.update_product(&product).await?;
    ok(details(&state, product).await?)
}

#[utoipa::path(
    delete,
    path = "/products/{id}",
    tag = "products",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Soft-deleted", body = ApiResponse<Product>),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Product> {
    if !state.repo.set_product_deleted(id, true).await? {
        return Err(AppError::not_found("Product"));
    }
    ok(find_product(&state, id).await?)
}

/// restore_product
///
/// [Admin Route]
#[utoipa::path(
    patch,
    path = "/products/{id}/restore",
    tag = "products",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Restored", body = ApiResponse<Product>),
        (status = 403, description = "Not an administrator", body = ErrorBody),
        (status = 404, description = "Not Found or not deleted", body = ErrorBody)
    )
)]
pub async fn restore_product(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Product> {
    auth.require_admin()?;
    if !state.repo.set_product_deleted(id, false).await? {
        return Err(AppError::not_found("Deleted product"));
    }
    ok(find_product(&state, id).await?)
}

async fn find_product(state: &AppState, id: Uuid) -> Result<Product, AppError> {
    state
        .repo
        .get_product(id)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))
}

/// Document invariants plus references: the category must be live and every
/// image id must be registered in the gallery.
async fn check_product(state: &AppState, product: &Product) -> Result<(), AppError> {
    product.validate().map_err(invalid)?;

    if let Some(category_id) = product.category_id {
        let live = state
            .repo
            .get_category(category_id)
            .await?
            .is_some_and(|c| !c.is_deleted);
        if !live {
            return Err(AppError::BadRequest(format!("Unknown category {category_id}")));
        }
    }

    if !product.image_ids.is_empty() {
        let found = state.repo.get_images_by_ids(&product.image_ids).await?;
        if let Some(missing) = product
            .image_ids
            .iter()
            .find(|id| !found.iter().any(|image| image.id == **id))
        {
            return Err(AppError::BadRequest(format!("Unknown image {missing}")));
        }
    }
    Ok(())
}

/// Joins a product with its category name and images (in `image_ids` order).
async fn details(state: &AppState, product: Product) -> Result<ProductDetails, AppError> {
    let category_name = match product.category_id {
        Some(id) => state.repo.get_category(id).await?.map(|c| c.name),
        None => None,
    };

    let mut found = state.repo.get_images_by_ids(&product.image_ids).await?;
    let images = product
        .image_ids
        .iter()
        .filter_map(|id| {
            found
                .iter()
                .position(|image| image.id == *id)
                .map(|index| found.swap_remove(index))
        })
        .collect();

    Ok(ProductDetails {
        product,
        category_name,
        images,
    })
}
