use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{
    common::{PageParams, SortOrder},
    product::ProductColor,
};

/// OrderStatus
///
/// Fulfilment lifecycle. `delivered` and `cancelled` are terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema, TS,
)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        Self::Pending,
        Self::Processing,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Cancelled)
                | (Processing, Shipped)
                | (Processing, Cancelled)
                | (Shipped, Delivered)
        )
    }

    /// Whether the order contributes to revenue figures.
    pub fn counts_as_sale(self) -> bool {
        self != Self::Cancelled
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown order status '{s}'"))
    }
}

impl TryFrom<String> for OrderStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// OrderItem
///
/// A line embedded in the order document (`items` JSONB column). `unit_price`
/// is the product's effective price at the time the order was placed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub color: Option<String>,
    pub quantity: i32,
    #[schema(value_type = String)]
    #[ts(type = "string")]
    pub unit_price: Decimal,
}

impl OrderItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Order
///
/// Raw order document from the `orders` table. Responses use `FormattedOrder`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, FromRow, Default)]
#[ts(export)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    #[sqlx(json)]
    pub items: Vec<OrderItem>,
    #[sqlx(try_from = "String")]
    pub status: OrderStatus,
    pub currency: String,
    #[schema(value_type = String)]
    #[ts(type = "string")]
    pub subtotal: Decimal,
    #[schema(value_type = String)]
    #[ts(type = "string")]
    pub tax: Decimal,
    #[schema(value_type = String)]
    #[ts(type = "string")]
    pub total: Decimal,
    pub shipping_address: Option<String>,
    pub note: Option<String>,
    pub is_deleted: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// OrderTotals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

/// compute_totals
///
/// subtotal = Σ unit_price × quantity; tax = subtotal × rate / 100 rounded to
/// two decimal places (half away from zero); total = subtotal + tax.
pub fn compute_totals(items: &[OrderItem], tax_rate: Decimal) -> OrderTotals {
    let subtotal: Decimal = items.iter().map(OrderItem::line_total).sum();
    let tax = (subtotal * tax_rate / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    OrderTotals {
        subtotal,
        tax,
        total: subtotal + tax,
    }
}

/// Human-facing order reference: `ORD-YYYYMMDD-XXXXXX`.
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(6)
        .collect();
    format!("ORD-{}-{}", now.format("%Y%m%d"), suffix.to_uppercase())
}

/// CreateOrderItem
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct CreateOrderItem {
    pub product_id: Uuid,
    pub color: Option<String>,
    pub quantity: i32,
}

/// CreateOrderRequest
///
/// Input payload for POST /orders. Prices are never taken from the client.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct CreateOrderRequest {
    pub customer_id: Uuid,
    pub items: Vec<CreateOrderItem>,
    /// Defaults to the store's default currency.
    pub currency: Option<String>,
    pub shipping_address: Option<String>,
    pub note: Option<String>,
}

/// UpdateOrderStatusRequest
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

/// OrderSort
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderSort {
    #[default]
    CreatedAt,
    Total,
    Status,
}

/// OrderFilter
///
/// Repository-level listing criteria. `search` matches the order number or the
/// customer's name/email; `from` is inclusive, `to` exclusive.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub customer_id: Option<Uuid>,
    pub search: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub deleted: bool,
    pub sort: OrderSort,
    pub order: SortOrder,
    pub page: PageParams,
}

// --- Display shape produced by the formatting pipeline ---

/// OrderCustomer
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct OrderCustomer {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

/// FormattedOrderItem
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct FormattedOrderItem {
    pub product_id: Uuid,
    pub product_name: String,
    pub sku: Option<String>,
    pub color: Option<ProductColor>,
    pub image_url: Option<String>,
    pub quantity: i32,
    #[schema(value_type = String)]
    #[ts(type = "string")]
    pub unit_price: Decimal,
    #[schema(value_type = String)]
    #[ts(type = "string")]
    pub line_total: Decimal,
}

/// FormattedOrder
///
/// Display-ready order: the order document joined with its customer, products,
/// colours and product thumbnails.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct FormattedOrder {
    pub id: Uuid,
    pub order_number: String,
    pub status: OrderStatus,
    pub customer: Option<OrderCustomer>,
    pub items: Vec<FormattedOrderItem>,
    pub item_count: i64,
    pub currency: String,
    #[schema(value_type = String)]
    #[ts(type = "string")]
    pub subtotal: Decimal,
    #[schema(value_type = String)]
    #[ts(type = "string")]
    pub tax: Decimal,
    #[schema(value_type = String)]
    #[ts(type = "string")]
    pub total: Decimal,
    pub shipping_address: Option<String>,
    pub note: Option<String>,
    pub is_deleted: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}
