use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Category, Currency, Image, Order, OrderFilter, OrderItem, OrderStatus, Page, PageParams,
    Product, ProductFilter, StatsSnapshot, StoreSettings, User, UserFilter,
};

mod memory;
mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration failure at start-up.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored value could not be decoded into its domain type.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// The record to update does not exist.
    #[error("not found")]
    NotFound,

    /// Uniqueness or stock constraint violated.
    #[error("{0}")]
    Conflict(String),
}

pub type RepoResult<T> = Result<T, RepositoryError>;

/// Repository Trait
///
/// The persistence contract. Handlers only see this trait, so the Postgres store
/// and the in-memory store are interchangeable.
///
/// Write methods take complete documents: handlers load, modify and validate a
/// record, then hand the whole document back. Soft deletes only flip
/// `is_deleted`; the `set_*_deleted` methods return `false` when the record does
/// not exist or is already in the requested state.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn list_users(&self, filter: &UserFilter) -> RepoResult<Page<User>>;
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>>;
    // Case-insensitive lookup; deleted users included.
    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    async fn get_users_by_ids(&self, ids: &[Uuid]) -> RepoResult<Vec<User>>;
    async fn insert_user(&self, user: &User) -> RepoResult<User>;
    async fn update_user(&self, user: &User) -> RepoResult<User>;
    async fn set_user_deleted(&self, id: Uuid, deleted: bool) -> RepoResult<bool>;

    // --- Categories ---
    async fn list_categories(&self, include_deleted: bool) -> RepoResult<Vec<Category>>;
    async fn get_category(&self, id: Uuid) -> RepoResult<Option<Category>>;
    async fn insert_category(&self, category: &Category) -> RepoResult<Category>;
    async fn update_category(&self, category: &Category) -> RepoResult<Category>;
    async fn set_category_deleted(&self, id: Uuid, deleted: bool) -> RepoResult<bool>;

    // --- Products ---
    async fn list_products(&self, filter: &ProductFilter) -> RepoResult<Page<Product>>;
    async fn get_product(&self, id: Uuid) -> RepoResult<Option<Product>>;
    async fn get_products_by_ids(&self, ids: &[Uuid]) -> RepoResult<Vec<Product>>;
    async fn insert_product(&self, product: &Product) -> RepoResult<Product>;
    async fn update_product(&self, product: &Product) -> RepoResult<Product>;
    async fn set_product_deleted(&self, id: Uuid, deleted: bool) -> RepoResult<bool>;
    // Live products whose gallery references the image.
    async fn count_products_with_image(&self, image_id: Uuid) -> RepoResult<i64>;

    // --- Orders ---
    async fn list_orders(&self, filter: &OrderFilter) -> RepoResult<Page<Order>>;
    async fn get_order(&self, id: Uuid) -> RepoResult<Option<Order>>;
    // Atomically reserves stock for every item and stores the order.
    // Conflict when any product lacks stock; nothing is written in that case.
    async fn place_order(&self, order: &Order) -> RepoResult<Order>;
    // Compare-and-set on the status. Returns None when the order is missing or no
    // longer in `from`. Moving to `cancelled` returns the items to stock.
    async fn transition_order(
        &self,
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    ) -> RepoResult<Option<Order>>;
    async fn set_order_deleted(&self, id: Uuid, deleted: bool) -> RepoResult<bool>;

    // --- Currencies ---
    async fn list_currencies(&self) -> RepoResult<Vec<Currency>>;
    async fn get_currency(&self, code: &str) -> RepoResult<Option<Currency>>;
    async fn insert_currency(&self, currency: &Currency) -> RepoResult<Currency>;
    async fn update_currency(&self, currency: &Currency) -> RepoResult<Currency>;
    async fn delete_currency(&self, code: &str) -> RepoResult<bool>;
    // Makes `code` the only default currency.
    async fn set_default_currency(&self, code: &str) -> RepoResult<Option<Currency>>;

    // --- Settings ---
    // Falls back to `StoreSettings::default()` until the first save.
    async fn get_settings(&self) -> RepoResult<StoreSettings>;
    async fn save_settings(&self, settings: &StoreSettings) -> RepoResult<StoreSettings>;

    // --- Gallery ---
    async fn list_images(&self, page: PageParams) -> RepoResult<Page<Image>>;
    async fn get_image(&self, id: Uuid) -> RepoResult<Option<Image>>;
    async fn get_images_by_ids(&self, ids: &[Uuid]) -> RepoResult<Vec<Image>>;
    async fn insert_image(&self, image: &Image) -> RepoResult<Image>;
    async fn delete_image(&self, id: Uuid) -> RepoResult<bool>;

    // --- Dashboard ---
    // Aggregates over live records. Revenue excludes cancelled orders;
    // `revenue_by_month` covers orders created at or after `since`.
    async fn stats_snapshot(
        &self,
        low_stock_threshold: i32,
        since: DateTime<Utc>,
    ) -> RepoResult<StatsSnapshot>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// Sums item quantities per product in `i64`, wide enough for any number of
/// `i32` lines. The ordered map gives a stable row-lock order when stock is
/// reserved.
pub(crate) fn quantities_by_product(items: &[OrderItem]) -> BTreeMap<Uuid, i64> {
    let mut quantities = BTreeMap::new();
    for item in items {
        *quantities.entry(item.product_id).or_insert(0) += i64::from(item.quantity);
    }
    quantities
}

/// The quantity to take from `stock`, or `None` when `stock` cannot cover it.
pub(crate) fn reservable(stock: i32, quantity: i64) -> Option<i32> {
    i32::try_from(quantity).ok().filter(|q| *q <= stock)
}

/// Lower-cased needle for case-insensitive substring search, `None` when blank.
pub(crate) fn search_needle(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
}
