use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, query_builder::QueryBuilder, types::Json};
use uuid::Uuid;

use super::{RepoResult, Repository, RepositoryError, quantities_by_product, search_needle};
use crate::models::{
    Category, Currency, Image, MonthlyRevenue, Order, OrderFilter, OrderSort, OrderStatus, Page,
    PageParams, Product, ProductFilter, ProductSort, StatsSnapshot, StatusCount, StoreSettings,
    TopProduct, User, UserFilter, UserRole, UserSort,
};

const USER_COLUMNS: &str = "id, first_name, last_name, email, phone, address, role, \
     password_hash, is_deleted, created_at, updated_at";
const CATEGORY_COLUMNS: &str = "id, name, slug, description, is_deleted, created_at, updated_at";
const PRODUCT_COLUMNS: &str = "id, name, sku, description, price, discount_price, stock, \
     category_id, colors, image_ids, status, is_deleted, created_at, updated_at";
const ORDER_COLUMNS: &str = "o.id, o.order_number, o.customer_id, o.items, o.status, o.currency, \
     o.subtotal, o.tax, o.total, o.shipping_address, o.note, o.is_deleted, o.created_at, o.updated_at";
const CURRENCY_COLUMNS: &str =
    "code, name, symbol, exchange_rate, is_default, created_at, updated_at";
const IMAGE_COLUMNS: &str = "id, key, url, file_name, content_type, size_bytes, created_at";
const SETTINGS_COLUMNS: &str = "store_name, contact_email, default_currency, tax_rate, \
     low_stock_threshold, default_language, timezone, maintenance_mode, updated_at";

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
/// Embedded document parts (product colours, order items) live in JSONB columns.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded migrations in `migrations/`.
    pub async fn migrate(&self) -> RepoResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Maps a unique-index violation to `Conflict`, everything else to `Database`.
fn unique_conflict(err: sqlx::Error, message: &str) -> RepositoryError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return RepositoryError::Conflict(message.to_string());
        }
    }
    RepositoryError::Database(err)
}

/// `%needle%` with LIKE metacharacters escaped.
fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn push_page(builder: &mut QueryBuilder<'_, Postgres>, page: PageParams) {
    builder.push(" LIMIT ");
    builder.push_bind(i64::from(page.limit));
    builder.push(" OFFSET ");
    builder.push_bind(page.offset());
}

fn push_user_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter) {
    builder.push(" WHERE is_deleted = ");
    builder.push_bind(filter.deleted);
    if let Some(role) = filter.role {
        builder.push(" AND role = ");
        builder.push_bind(role.as_str());
    }
    if let Some(needle) = search_needle(filter.search.as_deref()) {
        let pattern = like_pattern(&needle);
        builder.push(" AND (first_name ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR last_name ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR email ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
}

fn push_product_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &ProductFilter) {
    builder.push(" WHERE is_deleted = ");
    builder.push_bind(filter.deleted);
    if let Some(needle) = search_needle(filter.search.as_deref()) {
        let pattern = like_pattern(&needle);
        builder.push(" AND (name ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR sku ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR description ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
    if let Some(category_id) = filter.category_id {
        builder.push(" AND category_id = ");
        builder.push_bind(category_id);
    }
    if let Some(status) = filter.status {
        builder.push(" AND status = ");
        builder.push_bind(status.as_str());
    }
    if let Some(min) = filter.min_price {
        builder.push(" AND COALESCE(discount_price, price) >= ");
        builder.push_bind(min);
    }
    if let Some(max) = filter.max_price {
        builder.push(" AND COALESCE(discount_price, price) <= ");
        builder.push_bind(max);
    }
    match filter.in_stock {
        Some(true) => {
            builder.push(" AND stock > 0");
        }
        Some(false) => {
            builder.push(" AND stock <= 0");
        }
        None => {}
    }
}

fn push_order_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &OrderFilter) {
    builder.push(" FROM orders o LEFT JOIN users u ON u.id = o.customer_id WHERE o.is_deleted = ");
    builder.push_bind(filter.deleted);
    if let Some(status) = filter.status {
        builder.push(" AND o.status = ");
        builder.push_bind(status.as_str());
    }
    if let Some(customer_id) = filter.customer_id {
        builder.push(" AND o.customer_id = ");
        builder.push_bind(customer_id);
    }
    if let Some(from) = filter.from {
        builder.push(" AND o.created_at >= ");
        builder.push_bind(from);
    }
    if let Some(to) = filter.to {
        builder.push(" AND o.created_at < ");
        builder.push_bind(to);
    }
    if let Some(needle) = search_needle(filter.search.as_deref()) {
        let pattern = like_pattern(&needle);
        builder.push(" AND (o.order_number ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR u.email ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR (u.first_name || ' ' || u.last_name) ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- USERS ---

    async fn list_users(&self, filter: &UserFilter) -> RepoResult<Page<User>> {
        let mut count: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM users");
        push_user_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let sort = match filter.sort {
            UserSort::Name => "lower(last_name || ' ' || first_name)",
            UserSort::Email => "email",
            UserSort::CreatedAt => "created_at",
        };
        let dir = filter.order.as_sql();

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users"));
        push_user_filters(&mut builder, filter);
        builder.push(format!(" ORDER BY {sort} {dir}, id {dir}"));
        push_page(&mut builder, filter.page);

        let users = builder.build_query_as::<User>().fetch_all(&self.pool).await?;
        Ok(Page::new(users, total, filter.page))
    }

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)"
        ))
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn get_users_by_ids(&self, ids: &[Uuid]) -> RepoResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn insert_user(&self, user: &User) -> RepoResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users ({USER_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING {USER_COLUMNS}"
        ))
        .bind(user.id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.address)
        .bind(user.role.as_str())
        .bind(&user.password_hash)
        .bind(user.is_deleted)
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_conflict(e, "a user with this email already exists"))
    }

    async fn update_user(&self, user: &User) -> RepoResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET first_name = $2, last_name = $3, email = $4, phone = $5, \
             address = $6, role = $7, password_hash = $8, updated_at = NOW() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(user.id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.address)
        .bind(user.role.as_str())
        .bind(&user.password_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| unique_conflict(e, "a user with this email already exists"))?
        .ok_or(RepositoryError::NotFound)
    }

    async fn set_user_deleted(&self, id: Uuid, deleted: bool) -> RepoResult<bool> {
        let result = sqlx::query(
            "UPDATE users SET is_deleted = $2, updated_at = NOW() WHERE id = $1 AND is_deleted <> $2",
        )
        .bind(id)
        .bind(deleted)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- CATEGORIES ---

    async fn list_categories(&self, include_deleted: bool) -> RepoResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories \
             WHERE $1 OR is_deleted = false ORDER BY lower(name), id"
        ))
        .bind(include_deleted)
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }

    async fn get_category(&self, id: Uuid) -> RepoResult<Option<Category>> {
        let category = sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(category)
    }

    async fn insert_category(&self, category: &Category) -> RepoResult<Category> {
        sqlx::query_as::<_, Category>(&format!(
            "INSERT INTO categories ({CATEGORY_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(category.id)
        .bind(&category.name)
        .bind(&category.slug)
        .bind(&category.description)
        .bind(category.is_deleted)
        .bind(category.created_at)
        .bind(category.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_conflict(e, "a category with this name already exists"))
    }

    async fn update_category(&self, category: &Category) -> RepoResult<Category> {
        sqlx::query_as::<_, Category>(&format!(
            "UPDATE categories SET name = $2, slug = $3, description = $4, updated_at = NOW() \
             WHERE id = $1 RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(category.id)
        .bind(&category.name)
        .bind(&category.slug)
        .bind(&category.description)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| unique_conflict(e, "a category with this name already exists"))?
        .ok_or(RepositoryError::NotFound)
    }

    async fn set_category_deleted(&self, id: Uuid, deleted: bool) -> RepoResult<bool> {
        let result = sqlx::query(
            "UPDATE categories SET is_deleted = $2, updated_at = NOW() \
             WHERE id = $1 AND is_deleted <> $2",
        )
        .bind(id)
        .bind(deleted)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- PRODUCTS ---

    /// list_products
    ///
    /// Filter-sort-paginate composition with `QueryBuilder`: the same WHERE clause
    /// feeds the COUNT and the page query so `total` matches the filters.
    async fn list_products(&self, filter: &ProductFilter) -> RepoResult<Page<Product>> {
        let mut count: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM products");
        push_product_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let sort = match filter.sort {
            ProductSort::Name => "lower(name)",
            ProductSort::Price => "COALESCE(discount_price, price)",
            ProductSort::Stock => "stock",
            ProductSort::CreatedAt => "created_at",
        };
        let dir = filter.order.as_sql();

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM products"));
        push_product_filters(&mut builder, filter);
        builder.push(format!(" ORDER BY {sort} {dir}, id {dir}"));
        push_page(&mut builder, filter.page);

        let products = builder
            .build_query_as::<Product>()
            .fetch_all(&self.pool)
            .await?;
        Ok(Page::new(products, total, filter.page))
    }

    async fn get_product(&self, id: Uuid) -> RepoResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(product)
    }

    async fn get_products_by_ids(&self, ids: &[Uuid]) -> RepoResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    async fn insert_product(&self, product: &Product) -> RepoResult<Product> {
        sqlx::query_as::<_, Product>(&format!(
            "INSERT INTO products ({PRODUCT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.sku)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.discount_price)
        .bind(product.stock)
        .bind(product.category_id)
        .bind(Json(&product.colors))
        .bind(&product.image_ids)
        .bind(product.status.as_str())
        .bind(product.is_deleted)
        .bind(product.created_at)
        .bind(product.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_conflict(e, "a product with this SKU already exists"))
    }

    async fn update_product(&self, product: &Product) -> RepoResult<Product> {
        sqlx::query_as::<_, Product>(&format!(
            "UPDATE products SET name = $2, sku = $3, description = $4, price = $5, \
             discount_price = $6, stock = $7, category_id = $8, colors = $9, image_ids = $10, \
             status = $11, updated_at = NOW() \
             WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.sku)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.discount_price)
        .bind(product.stock)
        .bind(product.category_id)
        .bind(Json(&product.colors))
        .bind(&product.image_ids)
        .bind(product.status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| unique_conflict(e, "a product with this SKU already exists"))?
        .ok_or(RepositoryError::NotFound)
    }

    async fn set_product_deleted(&self, id: Uuid, deleted: bool) -> RepoResult<bool> {
        let result = sqlx::query(
            "UPDATE products SET is_deleted = $2, updated_at = NOW() \
             WHERE id = $1 AND is_deleted <> $2",
        )
        .bind(id)
        .bind(deleted)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_products_with_image(&self, image_id: Uuid) -> RepoResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM products WHERE is_deleted = false AND $1 = ANY(image_ids)",
        )
        .bind(image_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    // --- ORDERS ---

    async fn list_orders(&self, filter: &OrderFilter) -> RepoResult<Page<Order>> {
        let mut count: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*)");
        push_order_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let sort = match filter.sort {
            OrderSort::CreatedAt => "o.created_at",
            OrderSort::Total => "o.total",
            OrderSort::Status => {
                "array_position(ARRAY['pending','processing','shipped','delivered','cancelled'], o.status)"
            }
        };
        let dir = filter.order.as_sql();

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {ORDER_COLUMNS}"));
        push_order_filters(&mut builder, filter);
        builder.push(format!(" ORDER BY {sort} {dir}, o.id {dir}"));
        push_page(&mut builder, filter.page);

        let orders = builder.build_query_as::<Order>().fetch_all(&self.pool).await?;
        Ok(Page::new(orders, total, filter.page))
    }

    async fn get_order(&self, id: Uuid) -> RepoResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders o WHERE o.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(order)
    }

    /// place_order
    ///
    /// Single transaction: each product row is decremented with a guarded
    /// `stock >= qty` update; a zero-row update aborts the whole order.
    async fn place_order(&self, order: &Order) -> RepoResult<Order> {
        let mut tx = self.pool.begin().await?;

        for (product_id, quantity) in quantities_by_product(&order.items) {
            let insufficient =
                || RepositoryError::Conflict(format!("insufficient stock for product {product_id}"));
            let quantity = i32::try_from(quantity).map_err(|_| insufficient())?;
            let reserved = sqlx::query(
                "UPDATE products SET stock = stock - $2, updated_at = NOW() \
                 WHERE id = $1 AND stock >= $2 AND is_deleted = false",
            )
            .bind(product_id)
            .bind(quantity)
            .execute(&mut *tx)
            .await?;

            if reserved.rows_affected() == 0 {
                // Dropping `tx` rolls back the reservations made so far.
                return Err(insufficient());
            }
        }

        let stored = sqlx::query_as::<_, Order>(&format!(
            "INSERT INTO orders AS o (id, order_number, customer_id, items, status, currency, \
             subtotal, tax, total, shipping_address, note, is_deleted, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order.id)
        .bind(&order.order_number)
        .bind(order.customer_id)
        .bind(Json(&order.items))
        .bind(order.status.as_str())
        .bind(&order.currency)
        .bind(order.subtotal)
        .bind(order.tax)
        .bind(order.total)
        .bind(&order.shipping_address)
        .bind(&order.note)
        .bind(order.is_deleted)
        .bind(order.created_at)
        .bind(order.updated_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| unique_conflict(e, "order number already in use"))?;

        tx.commit().await?;
        tracing::info!(order_id = %stored.id, order_number = %stored.order_number, "order placed");
        Ok(stored)
    }

    async fn transition_order(
        &self,
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    ) -> RepoResult<Option<Order>> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, Order>(&format!(
            "UPDATE orders AS o SET status = $3, updated_at = NOW() \
             WHERE o.id = $1 AND o.status = $2 AND o.is_deleted = false \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(order) = updated else {
            return Ok(None);
        };

        if to == OrderStatus::Cancelled {
            for (product_id, quantity) in quantities_by_product(&order.items) {
                sqlx::query(
                    "UPDATE products SET stock = LEAST(stock + $2, 2147483647)::int, \
                     updated_at = NOW() WHERE id = $1",
                )
                .bind(product_id)
                .bind(quantity)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(Some(order))
    }

    async fn set_order_deleted(&self, id: Uuid, deleted: bool) -> RepoResult<bool> {
        let result = sqlx::query(
            "UPDATE orders SET is_deleted = $2, updated_at = NOW() \
             WHERE id = $1 AND is_deleted <> $2",
        )
        .bind(id)
        .bind(deleted)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- CURRENCIES ---

    async fn list_currencies(&self) -> RepoResult<Vec<Currency>> {
        let currencies = sqlx::query_as::<_, Currency>(&format!(
            "SELECT {CURRENCY_COLUMNS} FROM currencies ORDER BY is_default DESC, code"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(currencies)
    }

    async fn get_currency(&self, code: &str) -> RepoResult<Option<Currency>> {
        let currency = sqlx::query_as::<_, Currency>(&format!(
            "SELECT {CURRENCY_COLUMNS} FROM currencies WHERE code = $1"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(currency)
    }

    async fn insert_currency(&self, currency: &Currency) -> RepoResult<Currency> {
        sqlx::query_as::<_, Currency>(&format!(
            "INSERT INTO currencies ({CURRENCY_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {CURRENCY_COLUMNS}"
        ))
        .bind(&currency.code)
        .bind(&currency.name)
        .bind(&currency.symbol)
        .bind(currency.exchange_rate)
        .bind(currency.is_default)
        .bind(currency.created_at)
        .bind(currency.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_conflict(e, "currency already exists"))
    }

    async fn update_currency(&self, currency: &Currency) -> RepoResult<Currency> {
        sqlx::query_as::<_, Currency>(&format!(
            "UPDATE currencies SET name = $2, symbol = $3, exchange_rate = $4, updated_at = NOW() \
             WHERE code = $1 RETURNING {CURRENCY_COLUMNS}"
        ))
        .bind(&currency.code)
        .bind(&currency.name)
        .bind(&currency.symbol)
        .bind(currency.exchange_rate)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    async fn delete_currency(&self, code: &str) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM currencies WHERE code = $1")
            .bind(code)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_default_currency(&self, code: &str) -> RepoResult<Option<Currency>> {
        let mut tx = self.pool.begin().await?;

        // Clear first so the partial unique index on is_default never sees two rows.
        sqlx::query(
            "UPDATE currencies SET is_default = false, updated_at = NOW() \
             WHERE is_default AND code <> $1",
        )
        .bind(code)
        .execute(&mut *tx)
        .await?;

        let currency = sqlx::query_as::<_, Currency>(&format!(
            "UPDATE currencies SET is_default = true, updated_at = NOW() \
             WHERE code = $1 RETURNING {CURRENCY_COLUMNS}"
        ))
        .bind(code)
        .fetch_optional(&mut *tx)
        .await?;

        if currency.is_some() {
            tx.commit().await?;
        }
        Ok(currency)
    }

    // --- SETTINGS ---

    async fn get_settings(&self) -> RepoResult<StoreSettings> {
        let settings = sqlx::query_as::<_, StoreSettings>(&format!(
            "SELECT {SETTINGS_COLUMNS} FROM store_settings WHERE id = 1"
        ))
        .fetch_optional(&self.pool)
        .await?;
        Ok(settings.unwrap_or_default())
    }

    async fn save_settings(&self, settings: &StoreSettings) -> RepoResult<StoreSettings> {
        let saved = sqlx::query_as::<_, StoreSettings>(&format!(
            "INSERT INTO store_settings (id, {SETTINGS_COLUMNS}) \
             VALUES (1, $1, $2, $3, $4, $5, $6, $7, $8, NOW()) \
             ON CONFLICT (id) DO UPDATE SET \
                 store_name = EXCLUDED.store_name, \
                 contact_email = EXCLUDED.contact_email, \
                 default_currency = EXCLUDED.default_currency, \
                 tax_rate = EXCLUDED.tax_rate, \
                 low_stock_threshold = EXCLUDED.low_stock_threshold, \
                 default_language = EXCLUDED.default_language, \
                 timezone = EXCLUDED.timezone, \
                 maintenance_mode = EXCLUDED.maintenance_mode, \
                 updated_at = NOW() \
             RETURNING {SETTINGS_COLUMNS}"
        ))
        .bind(&settings.store_name)
        .bind(&settings.contact_email)
        .bind(&settings.default_currency)
        .bind(settings.tax_rate)
        .bind(settings.low_stock_threshold)
        .bind(&settings.default_language)
        .bind(&settings.timezone)
        .bind(settings.maintenance_mode)
        .fetch_one(&self.pool)
        .await?;
        Ok(saved)
    }

    // --- GALLERY ---

    async fn list_images(&self, page: PageParams) -> RepoResult<Page<Image>> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM images")
            .fetch_one(&self.pool)
            .await?;
        let images = sqlx::query_as::<_, Image>(&format!(
            "SELECT {IMAGE_COLUMNS} FROM images ORDER BY created_at DESC, id DESC \
             LIMIT $1 OFFSET $2"
        ))
        .bind(i64::from(page.limit))
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        Ok(Page::new(images, total, page))
    }

    async fn get_image(&self, id: Uuid) -> RepoResult<Option<Image>> {
        let image = sqlx::query_as::<_, Image>(&format!(
            "SELECT {IMAGE_COLUMNS} FROM images WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(image)
    }

    async fn get_images_by_ids(&self, ids: &[Uuid]) -> RepoResult<Vec<Image>> {
        let images = sqlx::query_as::<_, Image>(&format!(
            "SELECT {IMAGE_COLUMNS} FROM images WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(images)
    }

    async fn insert_image(&self, image: &Image) -> RepoResult<Image> {
        sqlx::query_as::<_, Image>(&format!(
            "INSERT INTO images ({IMAGE_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {IMAGE_COLUMNS}"
        ))
        .bind(image.id)
        .bind(&image.key)
        .bind(&image.url)
        .bind(&image.file_name)
        .bind(&image.content_type)
        .bind(image.size_bytes)
        .bind(image.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_conflict(e, "image already registered"))
    }

    async fn delete_image(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM images WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- DASHBOARD ---

    /// stats_snapshot
    ///
    /// Compiles the dashboard counters. Order line items are unnested from JSONB
    /// with `jsonb_array_elements` for the top-product ranking.
    async fn stats_snapshot(
        &self,
        low_stock_threshold: i32,
        since: DateTime<Utc>,
    ) -> RepoResult<StatsSnapshot> {
        let total_customers = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users WHERE is_deleted = false AND role = $1",
        )
        .bind(UserRole::Customer.as_str())
        .fetch_one(&self.pool)
        .await?;

        let total_products =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM products WHERE is_deleted = false")
                .fetch_one(&self.pool)
                .await?;

        let total_orders =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM orders WHERE is_deleted = false")
                .fetch_one(&self.pool)
                .await?;

        let total_revenue = sqlx::query_scalar::<_, Decimal>(
            "SELECT COALESCE(SUM(total), 0) FROM orders \
             WHERE is_deleted = false AND status <> 'cancelled'",
        )
        .fetch_one(&self.pool)
        .await?;

        let low_stock_products = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM products WHERE is_deleted = false AND stock <= $1",
        )
        .bind(low_stock_threshold)
        .fetch_one(&self.pool)
        .await?;

        let status_rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM orders WHERE is_deleted = false GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await?;
        let mut orders_by_status: Vec<StatusCount> = OrderStatus::ALL
            .into_iter()
            .map(|status| StatusCount { status, count: 0 })
            .collect();
        for (status, count) in status_rows {
            let status: OrderStatus = status.parse().map_err(RepositoryError::DataCorruption)?;
            if let Some(entry) = orders_by_status.iter_mut().find(|e| e.status == status) {
                entry.count = count;
            }
        }

        let revenue_by_month = sqlx::query_as::<_, (String, Decimal)>(
            "SELECT to_char(date_trunc('month', created_at AT TIME ZONE 'UTC'), 'YYYY-MM') AS month, \
                    SUM(total) \
             FROM orders \
             WHERE is_deleted = false AND status <> 'cancelled' AND created_at >= $1 \
             GROUP BY 1 ORDER BY 1",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|(month, revenue)| MonthlyRevenue { month, revenue })
        .collect();

        let top_products = sqlx::query_as::<_, (Uuid, String, i64, Decimal)>(
            "SELECT (item->>'product_id')::uuid AS product_id, \
                    COALESCE(p.name, 'Unknown product') AS name, \
                    SUM((item->>'quantity')::bigint)::bigint AS quantity_sold, \
                    SUM((item->>'unit_price')::numeric * (item->>'quantity')::bigint) AS revenue \
             FROM orders o \
             CROSS JOIN LATERAL jsonb_array_elements(o.items) AS item \
             LEFT JOIN products p ON p.id = (item->>'product_id')::uuid \
             WHERE o.is_deleted = false AND o.status <> 'cancelled' \
             GROUP BY 1, 2 \
             ORDER BY quantity_sold DESC, revenue DESC, product_id \
             LIMIT 5",
        )
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|(product_id, name, quantity_sold, revenue)| TopProduct {
            product_id,
            name,
            quantity_sold,
            revenue,
        })
        .collect();

        Ok(StatsSnapshot {
            total_customers,
            total_products,
            total_orders,
            total_revenue,
            low_stock_products,
            orders_by_status,
            revenue_by_month,
            top_products,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("shoe"), "%shoe%");
    }
}
