use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use super::order::{FormattedOrder, OrderStatus};

/// StatusCount
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct StatusCount {
    pub status: OrderStatus,
    #[ts(type = "number")]
    pub count: i64,
}

/// MonthlyRevenue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct MonthlyRevenue {
    /// `YYYY-MM`
    pub month: String,
    #[schema(value_type = String)]
    #[ts(type = "string")]
    pub revenue: Decimal,
}

/// TopProduct
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct TopProduct {
    pub product_id: Uuid,
    pub name: String,
    #[ts(type = "number")]
    pub quantity_sold: i64,
    #[schema(value_type = String)]
    #[ts(type = "string")]
    pub revenue: Decimal,
}

/// StatsSnapshot
///
/// The aggregate figures a repository computes in one pass. Months without
/// sales are absent from `revenue_by_month`; the dashboard fills them in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsSnapshot {
    pub total_customers: i64,
    pub total_products: i64,
    pub total_orders: i64,
    pub total_revenue: Decimal,
    pub low_stock_products: i64,
    pub orders_by_status: Vec<StatusCount>,
    pub revenue_by_month: Vec<MonthlyRevenue>,
    pub top_products: Vec<TopProduct>,
}

/// DashboardStats
///
/// Output schema for GET /dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct DashboardStats {
    #[ts(type = "number")]
    pub total_customers: i64,
    #[ts(type = "number")]
    pub total_products: i64,
    #[ts(type = "number")]
    pub total_orders: i64,
    #[schema(value_type = String)]
    #[ts(type = "string")]
    pub total_revenue: Decimal,
    #[ts(type = "number")]
    pub pending_orders: i64,
    #[ts(type = "number")]
    pub low_stock_products: i64,
    pub orders_by_status: Vec<StatusCount>,
    pub revenue_by_month: Vec<MonthlyRevenue>,
    pub top_products: Vec<TopProduct>,
    pub recent_orders: Vec<FormattedOrder>,
}

/// Number of calendar months in `revenue_by_month`, current month included.
pub const REVENUE_MONTHS: u32 = 6;

/// revenue_window
///
/// The `YYYY-MM` labels of the last `REVENUE_MONTHS` months ending with the
/// month of `now`, oldest first, plus the UTC instant the oldest one starts.
pub fn revenue_window(now: DateTime<Utc>) -> (DateTime<Utc>, Vec<String>) {
    let current = now.year() * 12 + now.month0() as i32;
    let months: Vec<(i32, u32)> = (0..REVENUE_MONTHS as i32)
        .rev()
        .map(|back| {
            let index = current - back;
            (index.div_euclid(12), index.rem_euclid(12) as u32 + 1)
        })
        .collect();

    let (year, month) = months[0];
    let since = NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .unwrap_or(now);

    let labels = months
        .into_iter()
        .map(|(year, month)| format!("{year:04}-{month:02}"))
        .collect();
    (since, labels)
}

/// Spreads `reported` over `labels`; months without sales report zero.
pub fn fill_revenue_months(labels: &[String], reported: &[MonthlyRevenue]) -> Vec<MonthlyRevenue> {
    labels
        .iter()
        .map(|month| MonthlyRevenue {
            month: month.clone(),
            revenue: reported
                .iter()
                .find(|r| &r.month == month)
                .map_or(Decimal::ZERO, |r| r.revenue),
        })
        .collect()
}
