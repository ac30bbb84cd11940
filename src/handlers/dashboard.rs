use axum::extract::State;
use chrono::Utc;

use super::{ApiResult, ok};
use crate::{
    AppState,
    formatting::format_orders,
    models::{
        ApiResponse, DashboardStats, OrderFilter, OrderSort, OrderStatus, PageParams, SortOrder,
        stats::{fill_revenue_months, revenue_window},
    },
};

const RECENT_ORDERS: u32 = 5;

/// get_dashboard_stats
///
/// [Staff Route] Aggregate store figures for the dashboard.
///
/// Cancelled and soft-deleted orders are excluded from every revenue figure.
/// `revenue_by_month` always lists the last six months, oldest first.
#[utoipa::path(
    get,
    path = "/dashboard",
    tag = "dashboard",
    responses((status = 200, description = "Dashboard figures", body = ApiResponse<DashboardStats>))
)]
pub async fn get_dashboard_stats(State(state): State<AppState>) -> ApiResult<DashboardStats> {
    let settings = state.repo.get_settings().await?;
    let (since, months) = revenue_window(Utc::now());

    let snapshot = state
        .repo
        .stats_snapshot(settings.low_stock_threshold, since)
        .await?;

    let recent = state
        .repo
        .list_orders(&OrderFilter {
            sort: OrderSort::CreatedAt,
            order: SortOrder::Desc,
            page: PageParams::new(Some(1), Some(RECENT_ORDERS)),
            ..OrderFilter::default()
        })
        .await?;
    let recent_orders = format_orders(state.repo.as_ref(), recent.items).await?;

    let pending_orders = snapshot
        .orders_by_status
        .iter()
        .find(|entry| entry.status == OrderStatus::Pending)
        .map_or(0, |entry| entry.count);

    ok(DashboardStats {
        total_customers: snapshot.total_customers,
        total_products: snapshot.total_products,
        total_orders: snapshot.total_orders,
        total_revenue: snapshot.total_revenue,
        pending_orders,
        low_stock_products: snapshot.low_stock_products,
        revenue_by_month: fill_revenue_months(&months, &snapshot.revenue_by_month),
        orders_by_status: snapshot.orders_by_status,
        top_products: snapshot.top_products,
        recent_orders,
    })
}
