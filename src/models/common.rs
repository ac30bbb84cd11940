use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// ApiResponse
///
/// The success envelope wrapping every payload: `{ "status": "success", "data": ... }`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct ApiResponse<T> {
    pub status: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: "success".to_string(),
            data,
        }
    }
}

/// PageParams
///
/// Normalised pagination input. `page` is 1-based and `limit` is clamped to
/// `1..=MAX_PAGE_SIZE`, so repositories never see an unbounded request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    pub page: u32,
    pub limit: u32,
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageParams {
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }
}

/// PageQuery
///
/// The raw `?page=&limit=` pair accepted by every list endpoint.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct PageQuery {
    /// 1-based page number (default 1).
    pub page: Option<u32>,
    /// Page size (default 10, max 100).
    pub limit: Option<u32>,
}

impl From<&PageQuery> for PageParams {
    fn from(query: &PageQuery) -> Self {
        PageParams::new(query.page, query.limit)
    }
}

/// Page
///
/// One page of a filtered listing. `total` counts every row matching the
/// filters, before pagination.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[ts(type = "number")]
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, params: PageParams) -> Self {
        let total = total.max(0);
        let total_pages = u32::try_from((total + i64::from(params.limit) - 1) / i64::from(params.limit))
            .unwrap_or(u32::MAX);
        Self {
            items,
            total,
            page: params.page,
            limit: params.limit,
            total_pages,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
            total_pages: self.total_pages,
        }
    }
}

/// SortOrder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    /// Applies the direction to an ascending comparison.
    pub fn apply(self, ordering: std::cmp::Ordering) -> std::cmp::Ordering {
        match self {
            Self::Asc => ordering,
            Self::Desc => ordering.reverse(),
        }
    }
}

/// Checks that `value` fits a `NUMERIC(precision, scale)` column exactly:
/// no more than `scale` decimal places and a magnitude below
/// `10^(precision - scale)`.
pub fn check_numeric(
    field: &str,
    value: Decimal,
    precision: u32,
    scale: u32,
) -> Result<(), String> {
    if value.normalize().scale() > scale {
        return Err(format!("{field} must have at most {scale} decimal places"));
    }
    let limit = Decimal::from(10_i64.pow(precision - scale));
    if value.abs() >= limit {
        return Err(format!("{field} must be less than {limit}"));
    }
    Ok(())
}
