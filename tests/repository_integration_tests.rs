use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use shop_admin::{
    models::{
        Category, CreateCategoryRequest, CreateProductRequest, Currency, Order, OrderFilter,
        OrderItem, OrderStatus, Product, ProductFilter, StoreSettings, User, UserRole,
        order::generate_order_number,
    },
    repository::{InMemoryRepository, PostgresRepository, Repository, RepositoryError},
};
use sqlx::PgPool;
use uuid::Uuid;

// --- Test Data Helpers ---

fn customer() -> User {
    let now = Utc::now();
    User {
        id: Uuid::new_v4(),
        first_name: "Cora".into(),
        last_name: "Customer".into(),
        email: format!("cora-{}@shop.test", Uuid::new_v4().simple()),
        role: UserRole::Customer,
        password_hash: "unused".into(),
        created_at: now,
        updated_at: now,
        ..User::default()
    }
}

fn product(stock: i32) -> Product {
    Product::new(
        CreateProductRequest {
            name: "Sock".into(),
            sku: format!("SOCK-{}", Uuid::new_v4().simple()),
            price: Decimal::new(500, 2),
            stock,
            ..CreateProductRequest::default()
        },
        Utc::now(),
    )
}

fn order_for(customer: &User, items: Vec<(&Product, i32)>) -> Order {
    let now = Utc::now();
    let items: Vec<OrderItem> = items
        .into_iter()
        .map(|(p, quantity)| OrderItem {
            product_id: p.id,
            color: None,
            quantity,
            unit_price: p.price,
        })
        .collect();
    let total: Decimal = items.iter().map(OrderItem::line_total).sum();
    Order {
        id: Uuid::new_v4(),
        order_number: generate_order_number(now),
        customer_id: customer.id,
        items,
        status: OrderStatus::Pending,
        currency: "USD".into(),
        subtotal: total,
        tax: Decimal::ZERO,
        total,
        created_at: now,
        updated_at: now,
        ..Order::default()
    }
}

/// Behaviour every `Repository` implementation must share.
async fn exercise_order_flow(repo: &dyn Repository) {
    let buyer = repo.insert_user(&customer()).await.unwrap();
    let plenty = repo.insert_product(&product(10)).await.unwrap();
    let scarce = repo.insert_product(&product(1)).await.unwrap();

    // One short line fails the whole order and reserves nothing.
    let too_many = order_for(&buyer, vec![(&plenty, 2), (&scarce, 2)]);
    assert!(matches!(
        repo.place_order(&too_many).await,
        Err(RepositoryError::Conflict(_))
    ));
    assert_eq!(repo.get_product(plenty.id).await.unwrap().unwrap().stock, 10);
    assert!(repo.get_order(too_many.id).await.unwrap().is_none());

    // Repeated lines of one product are summed.
    let split = order_for(&buyer, vec![(&plenty, 3), (&plenty, 4)]);
    let placed = repo.place_order(&split).await.unwrap();
    assert_eq!(repo.get_product(plenty.id).await.unwrap().unwrap().stock, 3);

    // Compare-and-set: a stale `from` changes nothing.
    let moved = repo
        .transition_order(placed.id, OrderStatus::Pending, OrderStatus::Processing)
        .await
        .unwrap();
    assert_eq!(moved.unwrap().status, OrderStatus::Processing);
    let stale = repo
        .transition_order(placed.id, OrderStatus::Pending, OrderStatus::Cancelled)
        .await
        .unwrap();
    assert!(stale.is_none());

    let cancelled = repo
        .transition_order(placed.id, OrderStatus::Processing, OrderStatus::Cancelled)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(repo.get_product(plenty.id).await.unwrap().unwrap().stock, 10);

    let mine = repo
        .list_orders(&OrderFilter {
            customer_id: Some(buyer.id),
            ..OrderFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(mine.total, 1);

    let stats = repo
        .stats_snapshot(5, Utc::now() - Duration::days(200))
        .await
        .unwrap();
    let cancelled_count = stats
        .orders_by_status
        .iter()
        .find(|s| s.status == OrderStatus::Cancelled)
        .unwrap()
        .count;
    assert!(cancelled_count >= 1);
}

async fn exercise_soft_delete(repo: &dyn Repository) {
    let category = repo
        .insert_category(&Category::new(
            CreateCategoryRequest {
                name: format!("Cat {}", Uuid::new_v4().simple()),
                description: None,
            },
            Utc::now(),
        ))
        .await
        .unwrap();

    assert!(repo.set_category_deleted(category.id, true).await.unwrap());
    assert!(!repo.set_category_deleted(category.id, true).await.unwrap());
    assert!(!repo.set_category_deleted(Uuid::new_v4(), true).await.unwrap());
    assert!(repo.get_category(category.id).await.unwrap().unwrap().is_deleted);
    assert!(repo.set_category_deleted(category.id, false).await.unwrap());
    assert!(!repo.set_category_deleted(category.id, false).await.unwrap());

    let sock = repo.insert_product(&product(0)).await.unwrap();
    repo.set_product_deleted(sock.id, true).await.unwrap();
    let trash = repo
        .list_products(&ProductFilter {
            deleted: true,
            search: Some(sock.sku.to_lowercase()),
            ..ProductFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(trash.total, 1);
}

async fn exercise_currencies_and_settings(repo: &dyn Repository) {
    let now = Utc::now();
    for code in ["USD", "EUR"] {
        let currency = Currency {
            code: code.into(),
            name: code.into(),
            symbol: "$".into(),
            exchange_rate: Decimal::ONE,
            is_default: false,
            created_at: now,
            updated_at: now,
        };
        repo.insert_currency(&currency).await.unwrap();
    }
    repo.set_default_currency("USD").await.unwrap().unwrap();
    repo.set_default_currency("EUR").await.unwrap().unwrap();
    assert!(repo.set_default_currency("XXX").await.unwrap().is_none());

    let listed = repo.list_currencies().await.unwrap();
    assert_eq!(listed[0].code, "EUR");
    assert_eq!(listed.iter().filter(|c| c.is_default).count(), 1);

    let settings = StoreSettings {
        store_name: "Sock Shop".into(),
        default_currency: "EUR".into(),
        ..StoreSettings::default()
    };
    repo.save_settings(&settings).await.unwrap();
    let stored = repo.get_settings().await.unwrap();
    assert_eq!(stored.store_name, "Sock Shop");
    assert_eq!(stored.default_currency, "EUR");
}

// --- In-memory store ---

#[tokio::test]
async fn test_memory_order_flow() {
    exercise_order_flow(&InMemoryRepository::new()).await;
}

#[tokio::test]
async fn test_memory_soft_delete() {
    exercise_soft_delete(&InMemoryRepository::new()).await;
}

#[tokio::test]
async fn test_memory_currencies_and_settings() {
    exercise_currencies_and_settings(&InMemoryRepository::new()).await;
}

#[tokio::test]
async fn test_memory_settings_fall_back_to_defaults() {
    let repo = InMemoryRepository::new();
    let settings = repo.get_settings().await.unwrap();
    assert_eq!(settings.default_currency, "USD");
    assert_eq!(settings.low_stock_threshold, 5);
}

#[tokio::test]
async fn test_memory_unique_email_is_case_insensitive() {
    let repo = InMemoryRepository::new();
    let first = customer();
    repo.insert_user(&first).await.unwrap();

    let twin = User {
        id: Uuid::new_v4(),
        email: first.email.to_uppercase(),
        ..customer()
    };
    assert!(matches!(
        repo.insert_user(&twin).await,
        Err(RepositoryError::Conflict(_))
    ));
}

// --- Postgres ---

/// Connects to `DATABASE_URL` and applies the migrations.
async fn postgres() -> PostgresRepository {
    dotenv::dotenv().ok();
    let db_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set to run integration tests");
    let pool = PgPool::connect(&db_url)
        .await
        .expect("Failed to connect to database for integration tests.");
    let repo = PostgresRepository::new(pool);
    repo.migrate().await.expect("Failed to run database migrations.");
    repo
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at a disposable Postgres"]
async fn test_postgres_order_flow() {
    exercise_order_flow(&postgres().await).await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at a disposable Postgres"]
async fn test_postgres_soft_delete() {
    exercise_soft_delete(&postgres().await).await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at a disposable Postgres"]
async fn test_postgres_currencies_and_settings() {
    let repo = postgres().await;
    // Currencies are global; start from a clean slate.
    for currency in repo.list_currencies().await.unwrap() {
        repo.delete_currency(&currency.code).await.unwrap();
    }
    exercise_currencies_and_settings(&repo).await;
}
