use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    RepoResult, Repository, RepositoryError, quantities_by_product, reservable, search_needle,
};
use crate::models::{
    Category, Currency, Image, MonthlyRevenue, Order, OrderFilter, OrderSort, OrderStatus, Page,
    PageParams, Product, ProductFilter, ProductSort, StatsSnapshot, StatusCount, StoreSettings,
    TopProduct, User, UserFilter, UserRole, UserSort,
};

#[derive(Default)]
struct Store {
    users: HashMap<Uuid, User>,
    categories: HashMap<Uuid, Category>,
    products: HashMap<Uuid, Product>,
    orders: HashMap<Uuid, Order>,
    currencies: BTreeMap<String, Currency>,
    images: HashMap<Uuid, Image>,
    settings: Option<StoreSettings>,
}

/// InMemoryRepository
///
/// A `Repository` held entirely in process memory. Used when no `DATABASE_URL`
/// is configured locally and as the backing store in tests. A single lock
/// guards the whole store, so multi-record writes such as `place_order` are atomic.
#[derive(Default)]
pub struct InMemoryRepository {
    store: RwLock<Store>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn paginate<T>(mut rows: Vec<T>, page: PageParams) -> Page<T> {
    let total = rows.len() as i64;
    let start = usize::try_from(page.offset()).unwrap_or(usize::MAX).min(rows.len());
    let end = start.saturating_add(page.limit as usize).min(rows.len());
    let items = rows.drain(start..end).collect();
    Page::new(items, total, page)
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

fn lifecycle_rank(status: OrderStatus) -> usize {
    OrderStatus::ALL
        .iter()
        .position(|s| *s == status)
        .unwrap_or(OrderStatus::ALL.len())
}

#[async_trait]
impl Repository for InMemoryRepository {
    // --- USERS ---

    async fn list_users(&self, filter: &UserFilter) -> RepoResult<Page<User>> {
        let store = self.store.read().await;
        let needle = search_needle(filter.search.as_deref());

        let mut users: Vec<User> = store
            .users
            .values()
            .filter(|u| u.is_deleted == filter.deleted)
            .filter(|u| filter.role.is_none_or(|role| u.role == role))
            .filter(|u| {
                needle.as_deref().is_none_or(|n| {
                    contains(&u.first_name, n) || contains(&u.last_name, n) || contains(&u.email, n)
                })
            })
            .cloned()
            .collect();

        users.sort_by(|a, b| {
            let primary = match filter.sort {
                UserSort::Name => format!("{} {}", a.last_name, a.first_name)
                    .to_lowercase()
                    .cmp(&format!("{} {}", b.last_name, b.first_name).to_lowercase()),
                UserSort::Email => a.email.cmp(&b.email),
                UserSort::CreatedAt => a.created_at.cmp(&b.created_at),
            };
            filter.order.apply(primary.then(a.id.cmp(&b.id)))
        });

        Ok(paginate(users, filter.page))
    }

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        Ok(self.store.read().await.users.get(&id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let email = email.trim().to_lowercase();
        let store = self.store.read().await;
        Ok(store.users.values().find(|u| u.email.to_lowercase() == email).cloned())
    }

    async fn get_users_by_ids(&self, ids: &[Uuid]) -> RepoResult<Vec<User>> {
        let store = self.store.read().await;
        Ok(ids.iter().filter_map(|id| store.users.get(id).cloned()).collect())
    }

    async fn insert_user(&self, user: &User) -> RepoResult<User> {
        let mut store = self.store.write().await;
        if store.users.values().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(RepositoryError::Conflict(
                "a user with this email already exists".to_string(),
            ));
        }
        store.users.insert(user.id, user.clone());
        Ok(user.clone())
    }

    async fn update_user(&self, user: &User) -> RepoResult<User> {
        let mut store = self.store.write().await;
        if store
            .users
            .values()
            .any(|u| u.id != user.id && u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(RepositoryError::Conflict(
                "a user with this email already exists".to_string(),
            ));
        }
        let existing = store.users.get_mut(&user.id).ok_or(RepositoryError::NotFound)?;
        *existing = User {
            is_deleted: existing.is_deleted,
            created_at: existing.created_at,
            updated_at: Utc::now(),
            ..user.clone()
        };
        Ok(existing.clone())
    }

    async fn set_user_deleted(&self, id: Uuid, deleted: bool) -> RepoResult<bool> {
        let mut store = self.store.write().await;
        Ok(match store.users.get_mut(&id) {
            Some(user) if user.is_deleted != deleted => {
                user.is_deleted = deleted;
                user.updated_at = Utc::now();
                true
            }
            _ => false,
        })
    }

    // --- CATEGORIES ---

    async fn list_categories(&self, include_deleted: bool) -> RepoResult<Vec<Category>> {
        let store = self.store.read().await;
        let mut categories: Vec<Category> = store
            .categories
            .values()
            .filter(|c| include_deleted || !c.is_deleted)
            .cloned()
            .collect();
        categories.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then(a.id.cmp(&b.id))
        });
        Ok(categories)
    }

    async fn get_category(&self, id: Uuid) -> RepoResult<Option<Category>> {
        Ok(self.store.read().await.categories.get(&id).cloned())
    }

    async fn insert_category(&self, category: &Category) -> RepoResult<Category> {
        let mut store = self.store.write().await;
        if store
            .categories
            .values()
            .any(|c| c.name.eq_ignore_ascii_case(&category.name))
        {
            return Err(RepositoryError::Conflict(
                "a category with this name already exists".to_string(),
            ));
        }
        store.categories.insert(category.id, category.clone());
        Ok(category.clone())
    }

    async fn update_category(&self, category: &Category) -> RepoResult<Category> {
        let mut store = self.store.write().await;
        if store
            .categories
            .values()
            .any(|c| c.id != category.id && c.name.eq_ignore_ascii_case(&category.name))
        {
            return Err(RepositoryError::Conflict(
                "a category with this name already exists".to_string(),
            ));
        }
        let existing = store
            .categories
            .get_mut(&category.id)
            .ok_or(RepositoryError::NotFound)?;
        existing.name = category.name.clone();
        existing.slug = category.slug.clone();
        existing.description = category.description.clone();
        existing.updated_at = Utc::now();
        Ok(existing.clone())
    }

    async fn set_category_deleted(&self, id: Uuid, deleted: bool) -> RepoResult<bool> {
        let mut store = self.store.write().await;
        Ok(match store.categories.get_mut(&id) {
            Some(category) if category.is_deleted != deleted => {
                category.is_deleted = deleted;
                category.updated_at = Utc::now();
                true
            }
            _ => false,
        })
    }

    // --- PRODUCTS ---

    async fn list_products(&self, filter: &ProductFilter) -> RepoResult<Page<Product>> {
        let store = self.store.read().await;
        let needle = search_needle(filter.search.as_deref());

        let mut products: Vec<Product> = store
            .products
            .values()
            .filter(|p| p.is_deleted == filter.deleted)
            .filter(|p| {
                needle.as_deref().is_none_or(|n| {
                    contains(&p.name, n)
                        || contains(&p.sku, n)
                        || p.description.as_deref().is_some_and(|d| contains(d, n))
                })
            })
            .filter(|p| filter.category_id.is_none_or(|c| p.category_id == Some(c)))
            .filter(|p| filter.status.is_none_or(|s| p.status == s))
            .filter(|p| filter.min_price.is_none_or(|min| p.effective_price() >= min))
            .filter(|p| filter.max_price.is_none_or(|max| p.effective_price() <= max))
            .filter(|p| filter.in_stock.is_none_or(|wanted| (p.stock > 0) == wanted))
            .cloned()
            .collect();

        products.sort_by(|a, b| {
            let primary = match filter.sort {
                ProductSort::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
                ProductSort::Price => a.effective_price().cmp(&b.effective_price()),
                ProductSort::Stock => a.stock.cmp(&b.stock),
                ProductSort::CreatedAt => a.created_at.cmp(&b.created_at),
            };
            filter.order.apply(primary.then(a.id.cmp(&b.id)))
        });

        Ok(paginate(products, filter.page))
    }

    async fn get_product(&self, id: Uuid) -> RepoResult<Option<Product>> {
        Ok(self.store.read().await.products.get(&id).cloned())
    }

    async fn get_products_by_ids(&self, ids: &[Uuid]) -> RepoResult<Vec<Product>> {
        let store = self.store.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| store.products.get(id).cloned())
            .collect())
    }

    async fn insert_product(&self, product: &Product) -> RepoResult<Product> {
        let mut store = self.store.write().await;
        if store.products.values().any(|p| p.sku == product.sku) {
            return Err(RepositoryError::Conflict(
                "a product with this SKU already exists".to_string(),
            ));
        }
        store.products.insert(product.id, product.clone());
        Ok(product.clone())
    }

    async fn update_product(&self, product: &Product) -> RepoResult<Product> {
        let mut store = self.store.write().await;
        if store
            .products
            .values()
            .any(|p| p.id != product.id && p.sku == product.sku)
        {
            return Err(RepositoryError::Conflict(
                "a product with this SKU already exists".to_string(),
            ));
        }
        let existing = store
            .products
            .get_mut(&product.id)
            .ok_or(RepositoryError::NotFound)?;
        *existing = Product {
            is_deleted: existing.is_deleted,
            created_at: existing.created_at,
            updated_at: Utc::now(),
            ..product.clone()
        };
        Ok(existing.clone())
    }

    async fn set_product_deleted(&self, id: Uuid, deleted: bool) -> RepoResult<bool> {
        let mut store = self.store.write().await;
        Ok(match store.products.get_mut(&id) {
            Some(product) if product.is_deleted != deleted => {
                product.is_deleted = deleted;
                product.updated_at = Utc::now();
                true
            }
            _ => false,
        })
    }

    async fn count_products_with_image(&self, image_id: Uuid) -> RepoResult<i64> {
        let store = self.store.read().await;
        Ok(store
            .products
            .values()
            .filter(|p| !p.is_deleted && p.image_ids.contains(&image_id))
            .count() as i64)
    }

    // --- ORDERS ---

    async fn list_orders(&self, filter: &OrderFilter) -> RepoResult<Page<Order>> {
        let store = self.store.read().await;
        let needle = search_needle(filter.search.as_deref());

        let mut orders: Vec<Order> = store
            .orders
            .values()
            .filter(|o| o.is_deleted == filter.deleted)
            .filter(|o| filter.status.is_none_or(|s| o.status == s))
            .filter(|o| filter.customer_id.is_none_or(|c| o.customer_id == c))
            .filter(|o| filter.from.is_none_or(|from| o.created_at >= from))
            .filter(|o| filter.to.is_none_or(|to| o.created_at < to))
            .filter(|o| {
                needle.as_deref().is_none_or(|n| {
                    contains(&o.order_number, n)
                        || store.users.get(&o.customer_id).is_some_and(|u| {
                            contains(&u.email, n)
                                || contains(&format!("{} {}", u.first_name, u.last_name), n)
                        })
                })
            })
            .cloned()
            .collect();

        orders.sort_by(|a, b| {
            let primary = match filter.sort {
                OrderSort::CreatedAt => a.created_at.cmp(&b.created_at),
                OrderSort::Total => a.total.cmp(&b.total),
                OrderSort::Status => lifecycle_rank(a.status).cmp(&lifecycle_rank(b.status)),
            };
            filter.order.apply(primary.then(a.id.cmp(&b.id)))
        });

        Ok(paginate(orders, filter.page))
    }

    async fn get_order(&self, id: Uuid) -> RepoResult<Option<Order>> {
        Ok(self.store.read().await.orders.get(&id).cloned())
    }

    async fn place_order(&self, order: &Order) -> RepoResult<Order> {
        let mut store = self.store.write().await;
        if store
            .orders
            .values()
            .any(|o| o.order_number == order.order_number)
        {
            return Err(RepositoryError::Conflict(
                "order number already in use".to_string(),
            ));
        }

        // Check everything before touching any stock.
        let mut reservations = Vec::new();
        for (product_id, quantity) in quantities_by_product(&order.items) {
            let available = store
                .products
                .get(&product_id)
                .filter(|p| !p.is_deleted)
                .map_or(0, |p| p.stock);
            let quantity = reservable(available, quantity).ok_or_else(|| {
                RepositoryError::Conflict(format!("insufficient stock for product {product_id}"))
            })?;
            reservations.push((product_id, quantity));
        }

        let now = Utc::now();
        for (product_id, quantity) in reservations {
            if let Some(product) = store.products.get_mut(&product_id) {
                product.stock -= quantity;
                product.updated_at = now;
            }
        }

        store.orders.insert(order.id, order.clone());
        Ok(order.clone())
    }

    async fn transition_order(
        &self,
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    ) -> RepoResult<Option<Order>> {
        let mut store = self.store.write().await;
        let now = Utc::now();

        let order = match store.orders.get_mut(&id) {
            Some(order) if !order.is_deleted && order.status == from => {
                order.status = to;
                order.updated_at = now;
                order.clone()
            }
            _ => return Ok(None),
        };

        if to == OrderStatus::Cancelled {
            for (product_id, quantity) in quantities_by_product(&order.items) {
                if let Some(product) = store.products.get_mut(&product_id) {
                    let restocked = i64::from(product.stock) + quantity;
                    product.stock = i32::try_from(restocked).unwrap_or(i32::MAX);
                    product.updated_at = now;
                }
            }
        }

        Ok(Some(order))
    }

    async fn set_order_deleted(&self, id: Uuid, deleted: bool) -> RepoResult<bool> {
        let mut store = self.store.write().await;
        Ok(match store.orders.get_mut(&id) {
            Some(order) if order.is_deleted != deleted => {
                order.is_deleted = deleted;
                order.updated_at = Utc::now();
                true
            }
            _ => false,
        })
    }

    // --- CURRENCIES ---

    async fn list_currencies(&self) -> RepoResult<Vec<Currency>> {
        let store = self.store.read().await;
        let mut currencies: Vec<Currency> = store.currencies.values().cloned().collect();
        // Default first, then by code (the map is already ordered by code).
        currencies.sort_by_key(|c| !c.is_default);
        Ok(currencies)
    }

    async fn get_currency(&self, code: &str) -> RepoResult<Option<Currency>> {
        Ok(self.store.read().await.currencies.get(code).cloned())
    }

    async fn insert_currency(&self, currency: &Currency) -> RepoResult<Currency> {
        let mut store = self.store.write().await;
        if store.currencies.contains_key(&currency.code) {
            return Err(RepositoryError::Conflict("currency already exists".to_string()));
        }
        store
            .currencies
            .insert(currency.code.clone(), currency.clone());
        Ok(currency.clone())
    }

    async fn update_currency(&self, currency: &Currency) -> RepoResult<Currency> {
        let mut store = self.store.write().await;
        let existing = store
            .currencies
            .get_mut(&currency.code)
            .ok_or(RepositoryError::NotFound)?;
        existing.name = currency.name.clone();
        existing.symbol = currency.symbol.clone();
        existing.exchange_rate = currency.exchange_rate;
        existing.updated_at = Utc::now();
        Ok(existing.clone())
    }

    async fn delete_currency(&self, code: &str) -> RepoResult<bool> {
        Ok(self.store.write().await.currencies.remove(code).is_some())
    }

    async fn set_default_currency(&self, code: &str) -> RepoResult<Option<Currency>> {
        let mut store = self.store.write().await;
        if !store.currencies.contains_key(code) {
            return Ok(None);
        }
        let now = Utc::now();
        for currency in store.currencies.values_mut() {
            let is_target = currency.code == code;
            if currency.is_default != is_target {
                currency.is_default = is_target;
                currency.updated_at = now;
            }
        }
        Ok(store.currencies.get(code).cloned())
    }

    // --- SETTINGS ---

    async fn get_settings(&self) -> RepoResult<StoreSettings> {
        Ok(self.store.read().await.settings.clone().unwrap_or_default())
    }

    async fn save_settings(&self, settings: &StoreSettings) -> RepoResult<StoreSettings> {
        let saved = StoreSettings {
            updated_at: Utc::now(),
            ..settings.clone()
        };
        self.store.write().await.settings = Some(saved.clone());
        Ok(saved)
    }

    // --- GALLERY ---

    async fn list_images(&self, page: PageParams) -> RepoResult<Page<Image>> {
        let store = self.store.read().await;
        let mut images: Vec<Image> = store.images.values().cloned().collect();
        images.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(paginate(images, page))
    }

    async fn get_image(&self, id: Uuid) -> RepoResult<Option<Image>> {
        Ok(self.store.read().await.images.get(&id).cloned())
    }

    async fn get_images_by_ids(&self, ids: &[Uuid]) -> RepoResult<Vec<Image>> {
        let store = self.store.read().await;
        Ok(ids.iter().filter_map(|id| store.images.get(id).cloned()).collect())
    }

    async fn insert_image(&self, image: &Image) -> RepoResult<Image> {
        let mut store = self.store.write().await;
        if store.images.values().any(|i| i.key == image.key) {
            return Err(RepositoryError::Conflict(
                "image already registered".to_string(),
            ));
        }
        store.images.insert(image.id, image.clone());
        Ok(image.clone())
    }

    async fn delete_image(&self, id: Uuid) -> RepoResult<bool> {
        Ok(self.store.write().await.images.remove(&id).is_some())
    }

    // --- DASHBOARD ---

    async fn stats_snapshot(
        &self,
        low_stock_threshold: i32,
        since: DateTime<Utc>,
    ) -> RepoResult<StatsSnapshot> {
        let store = self.store.read().await;

        let live_products = || store.products.values().filter(|p| !p.is_deleted);
        let live_orders = || store.orders.values().filter(|o| !o.is_deleted);
        let sales = || live_orders().filter(|o| o.status.counts_as_sale());

        let mut revenue_by_month: BTreeMap<String, Decimal> = BTreeMap::new();
        for order in sales().filter(|o| o.created_at >= since) {
            *revenue_by_month
                .entry(order.created_at.format("%Y-%m").to_string())
                .or_default() += order.total;
        }

        let mut sold: HashMap<Uuid, (i64, Decimal)> = HashMap::new();
        for item in sales().flat_map(|o| o.items.iter()) {
            let entry = sold.entry(item.product_id).or_default();
            entry.0 += i64::from(item.quantity);
            entry.1 += item.line_total();
        }
        let mut top_products: Vec<TopProduct> = sold
            .into_iter()
            .map(|(product_id, (quantity_sold, revenue))| TopProduct {
                product_id,
                name: store
                    .products
                    .get(&product_id)
                    .map_or_else(|| "Unknown product".to_string(), |p| p.name.clone()),
                quantity_sold,
                revenue,
            })
            .collect();
        top_products.sort_by(|a, b| {
            b.quantity_sold
                .cmp(&a.quantity_sold)
                .then_with(|| b.revenue.cmp(&a.revenue))
                .then_with(|| a.product_id.cmp(&b.product_id))
        });
        top_products.truncate(5);

        Ok(StatsSnapshot {
            total_customers: store
                .users
                .values()
                .filter(|u| !u.is_deleted && u.role == UserRole::Customer)
                .count() as i64,
            total_products: live_products().count() as i64,
            total_orders: live_orders().count() as i64,
            total_revenue: sales().map(|o| o.total).sum(),
            low_stock_products: live_products()
                .filter(|p| p.stock <= low_stock_threshold)
                .count() as i64,
            orders_by_status: OrderStatus::ALL
                .into_iter()
                .map(|status| StatusCount {
                    status,
                    count: live_orders().filter(|o| o.status == status).count() as i64,
                })
                .collect(),
            revenue_by_month: revenue_by_month
                .into_iter()
                .map(|(month, revenue)| MonthlyRevenue { month, revenue })
                .collect(),
            top_products,
        })
    }
}
