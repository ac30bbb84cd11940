use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use super::{ApiResult, CreatedResult, created, ok};
use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, ErrorBody},
    formatting::{format_order, format_orders},
    models::{
        ApiResponse, CreateOrderRequest, FormattedOrder, Order, OrderFilter, OrderItem, OrderSort,
        OrderStatus, Page, PageParams, Product, ProductStatus, SortOrder,
        UpdateOrderStatusRequest,
        common::check_numeric,
        currency::normalize_code,
        order::{compute_totals, generate_order_number},
    },
    repository::quantities_by_product,
};

/// OrderListQuery
///
/// Query parameters accepted by GET /orders. `from` is inclusive, `to` exclusive.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct OrderListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<OrderStatus>,
    pub customer_id: Option<Uuid>,
    /// Matches the order number or the customer's name or email.
    pub search: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub sort_by: Option<OrderSort>,
    pub order: Option<SortOrder>,
    /// `true` lists only soft-deleted orders.
    pub deleted: Option<bool>,
}

impl From<OrderListQuery> for OrderFilter {
    fn from(query: OrderListQuery) -> Self {
        Self {
            status: query.status,
            customer_id: query.customer_id,
            search: query.search,
            from: query.from,
            to: query.to,
            deleted: query.deleted.unwrap_or(false),
            sort: query.sort_by.unwrap_or_default(),
            order: query.order.unwrap_or_default(),
            page: PageParams::new(query.page, query.limit),
        }
    }
}

/// list_orders
///
/// [Staff Route] Paginated listing; every row goes through the formatting
/// pipeline.
#[utoipa::path(
    get,
    path = "/orders",
    tag = "orders",
    params(OrderListQuery),
    responses((status = 200, description = "Orders", body = ApiResponse<Page<FormattedOrder>>))
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> ApiResult<Page<FormattedOrder>> {
    let page = state.repo.list_orders(&query.into()).await?;
    let formatted = format_orders(state.repo.as_ref(), page.items).await?;
    ok(Page {
        items: formatted,
        total: page.total,
        page: page.page,
        limit: page.limit,
        total_pages: page.total_pages,
    })
}

#[utoipa::path(
    get,
    path = "/orders/{id}",
    tag = "orders",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Found", body = ApiResponse<FormattedOrder>),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<FormattedOrder> {
    let order = find_order(&state, id).await?;
    ok(format_order(state.repo.as_ref(), order).await?)
}

/// create_order
///
/// [Staff Route] Places an order on behalf of a customer.
///
/// Prices are snapshotted from the products' effective prices, tax comes from
/// the store settings and stock is reserved atomically by the repository.
#[utoipa::path(
    post,
    path = "/orders",
    tag = "orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Created", body = ApiResponse<FormattedOrder>),
        (status = 400, description = "Invalid customer, product, colour or currency", body = ErrorBody),
        (status = 409, description = "Insufficient stock", body = ErrorBody)
    )
)]
pub async fn create_order(
    State(state): State<AppState>,
    Json(payload): Json<CreateOrderRequest>,
) -> CreatedResult<FormattedOrder> {
    if payload.items.is_empty() {
        return Err(AppError::BadRequest("An order needs at least one item".to_string()));
    }

    state
        .repo
        .get_user(payload.customer_id)
        .await?
        .filter(|u| !u.is_deleted)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown customer {}", payload.customer_id)))?;

    let product_ids: Vec<Uuid> = payload.items.iter().map(|i| i.product_id).collect();
    let products = state.repo.get_products_by_ids(&product_ids).await?;

    let mut items = Vec::with_capacity(payload.items.len());
    for line in &payload.items {
        if line.quantity < 1 {
            return Err(AppError::BadRequest("quantity must be at least 1".to_string()));
        }
        let product = products
            .iter()
            .find(|p| p.id == line.product_id)
            .filter(|p| !p.is_deleted && p.status == ProductStatus::Active)
            .ok_or_else(|| {
                AppError::BadRequest(format!("Product {} is not available", line.product_id))
            })?;

        if line.quantity > product.stock {
            return Err(insufficient_stock(product));
        }

        let color = match line.color.as_deref() {
            Some(name) => Some(
                product
                    .color(name)
                    .map(|c| c.name.clone())
                    .ok_or_else(|| {
                        AppError::BadRequest(format!(
                            "'{name}' is not a colour of {}",
                            product.name
                        ))
                    })?,
            ),
            None => None,
        };

        items.push(OrderItem {
            product_id: product.id,
            color,
            quantity: line.quantity,
            unit_price: product.effective_price(),
        });
    }

    // Early, friendly stock check; the repository re-checks atomically.
    for (product_id, quantity) in quantities_by_product(&items) {
        if let Some(product) = products.iter().find(|p| p.id == product_id) {
            if i64::from(product.stock) < quantity {
                return Err(insufficient_stock(product));
            }
        }
    }

    let settings = state.repo.get_settings().await?;
    let currency = payload
        .currency
        .as_deref()
        .map(normalize_code)
        .unwrap_or_else(|| settings.default_currency.clone());
    if state.repo.get_currency(&currency).await?.is_none() {
        return Err(AppError::BadRequest(format!("Unknown currency {currency}")));
    }

    let now = Utc::now();
    let totals = compute_totals(&items, settings.tax_rate);
    check_numeric("order total", totals.total, 14, 2).map_err(AppError::BadRequest)?;
    let order = Order {
        id: Uuid::new_v4(),
        order_number: generate_order_number(now),
        customer_id: payload.customer_id,
        items,
        status: OrderStatus::Pending,
        currency,
        subtotal: totals.subtotal,
        tax: totals.tax,
        total: totals.total,
        shipping_address: payload.shipping_address.filter(|s| !s.trim().is_empty()),
        note: payload.note.filter(|n| !n.trim().is_empty()),
        is_deleted: false,
        created_at: now,
        updated_at: now,
    };

    let order = state.repo.place_order(&order).await?;
    tracing::info!(
        order_id = %order.id,
        order_number = %order.order_number,
        total = %order.total,
        "order created"
    );
    created(format_order(state.repo.as_ref(), order).await?)
}

/// update_order_status
///
/// [Staff Route] Moves an order along its lifecycle. Illegal transitions are
/// a 409; cancelling returns the items to stock.
#[utoipa::path(
    patch,
    path = "/orders/{id}/status",
    tag = "orders",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = ApiResponse<FormattedOrder>),
        (status = 404, description = "Not Found", body = ErrorBody),
        (status = 409, description = "Illegal transition", body = ErrorBody)
    )
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> ApiResult<FormattedOrder> {
    let order = find_order(&state, id).await?;
    if order.is_deleted {
        return Err(AppError::not_found("Order"));
    }

    let from = order.status;
    let to = payload.status;
    if !from.can_transition_to(to) {
        return Err(AppError::Conflict(format!(
            "Cannot change order status from {from} to {to}"
        )));
    }

    let order = state
        .repo
        .transition_order(id, from, to)
        .await?
        .ok_or_else(|| AppError::Conflict("Order status changed concurrently".to_string()))?;

    tracing::info!(order_id = %id, %from, %to, "order status changed");
    ok(format_order(state.repo.as_ref(), order).await?)
}

#[utoipa::path(
    delete,
    path = "/orders/{id}",
    tag = "orders",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Soft-deleted", body = ApiResponse<FormattedOrder>),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<FormattedOrder> {
    if !state.repo.set_order_deleted(id, true).await? {
        return Err(AppError::not_found("Order"));
    }
    let order = find_order(&state, id).await?;
    ok(format_order(state.repo.as_ref(), order).await?)
}

/// restore_order
///
/// [Admin Route]
#[utoipa::path(
    patch,
    path = "/orders/{id}/restore",
    tag = "orders",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Restored", body = ApiResponse<FormattedOrder>),
        (status = 403, description = "Not an administrator", body = ErrorBody),
        (status = 404, description = "Not Found or not deleted", body = ErrorBody)
    )
)]
pub async fn restore_order(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<FormattedOrder> {
    auth.require_admin()?;
    if !state.repo.set_order_deleted(id, false).await? {
        return Err(AppError::not_found("Deleted order"));
    }
    let order = find_order(&state, id).await?;
    ok(format_order(state.repo.as_ref(), order).await?)
}

async fn find_order(state: &AppState, id: Uuid) -> Result<Order, AppError> {
    state
        .repo
        .get_order(id)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))
}

fn insufficient_stock(product: &Product) -> AppError {
    AppError::Conflict(format!(
        "Insufficient stock for {} ({} available)",
        product.name, product.stock
    ))
}
