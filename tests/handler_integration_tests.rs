mod common;

use common::{TestApp, data, error_message, id_of, spawn_app};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use uuid::Uuid;

fn dec(value: &Value) -> Decimal {
    value.as_str().unwrap().parse().unwrap()
}

/// A store with USD as default currency, 10% tax, one customer and one product.
async fn store_with_stock(stock: i32) -> (TestApp, Uuid, Value) {
    let app = spawn_app().await;
    app.create_currency("USD").await;
    let settings = app
        .put(&app.admin, "/settings", json!({ "tax_rate": "10" }))
        .await;
    assert_eq!(settings.status(), 200);

    let customer = app.customer("buyer@shop.test").await;
    let product = app.create_product("SNK-001", "19.99", stock).await;
    (app, customer.id, product)
}

async fn place(app: &TestApp, customer_id: Uuid, product: &Value, quantity: i32) -> reqwest::Response {
    app.post(
        &app.manager,
        "/orders",
        json!({
            "customer_id": customer_id,
            "items": [{ "product_id": product["id"], "color": "red", "quantity": quantity }],
            "shipping_address": "1 Main St"
        }),
    )
    .await
}

async fn stock_of(app: &TestApp, product: &Value) -> i64 {
    let details = data(app.get(&app.manager, &format!("/products/{}", product["id"].as_str().unwrap())).await).await;
    details["stock"].as_i64().unwrap()
}

// --- Categories ---

#[tokio::test]
async fn test_category_crud_and_restore() {
    let app = spawn_app().await;

    let created = app
        .post(&app.manager, "/categories", json!({ "name": "Running Shoes", "description": "Fast" }))
        .await;
    assert_eq!(created.status(), 201);
    let category = data(created).await;
    assert_eq!(category["slug"], "running-shoes");
    let id = id_of(&category);

    let duplicate = app
        .post(&app.manager, "/categories", json!({ "name": "running shoes" }))
        .await;
    assert_eq!(duplicate.status(), 409);

    let renamed = data(
        app.put(&app.manager, &format!("/categories/{id}"), json!({ "name": "Trail Shoes" }))
            .await,
    )
    .await;
    assert_eq!(renamed["slug"], "trail-shoes");

    assert_eq!(app.delete(&app.manager, &format!("/categories/{id}")).await.status(), 200);
    let listed = data(app.get(&app.manager, "/categories").await).await;
    assert!(listed.as_array().unwrap().is_empty());
    let with_deleted = data(app.get(&app.manager, "/categories?include_deleted=true").await).await;
    assert_eq!(with_deleted.as_array().unwrap().len(), 1);

    // Restoring is reserved for administrators.
    let path = format!("/categories/{id}/restore");
    assert_eq!(app.patch(&app.manager, &path, json!({})).await.status(), 403);
    assert_eq!(app.patch(&app.admin, &path, json!({})).await.status(), 200);
    assert_eq!(app.patch(&app.admin, &path, json!({})).await.status(), 404);
}

// --- Products ---

#[tokio::test]
async fn test_product_create_validates_references() {
    let app = spawn_app().await;

    let unknown_category = app
        .post(
            &app.manager,
            "/products",
            json!({ "name": "Cap", "sku": "cap-1", "price": "10.00", "category_id": Uuid::new_v4() }),
        )
        .await;
    assert_eq!(unknown_category.status(), 400);

    let unknown_image = app
        .post(
            &app.manager,
            "/products",
            json!({ "name": "Cap", "sku": "cap-1", "price": "10.00", "image_ids": [Uuid::new_v4()] }),
        )
        .await;
    assert_eq!(unknown_image.status(), 400);

    let bad_discount = app
        .post(
            &app.manager,
            "/products",
            json!({ "name": "Cap", "sku": "cap-1", "price": "10.00", "discount_price": "12.00" }),
        )
        .await;
    assert_eq!(bad_discount.status(), 400);

    let bad_color = app
        .post(
            &app.manager,
            "/products",
            json!({ "name": "Cap", "sku": "cap-1", "price": "10.00", "colors": [{ "name": "Red", "hex": "red" }] }),
        )
        .await;
    assert_eq!(bad_color.status(), 400);

    for price in ["10000000000.00", "1.239"] {
        let response = app
            .post(&app.manager, "/products", json!({ "name": "Cap", "sku": "cap-1", "price": price }))
            .await;
        assert_eq!(response.status(), 400, "price {price}");
    }

    let bad_rate = app
        .post(&app.admin, "/currencies", json!({ "code": "GBP", "name": "Pound", "symbol": "£", "exchange_rate": "0.1234567" }))
        .await;
    assert_eq!(bad_rate.status(), 400);
}

#[tokio::test]
async fn test_product_lifecycle() {
    let app = spawn_app().await;
    let category = data(app.post(&app.manager, "/categories", json!({ "name": "Hats" })).await).await;

    let created = app
        .post(
            &app.manager,
            "/products",
            json!({
                "name": " Wool Beanie ", "sku": "hat-01", "price": "25.00", "stock": 4,
                "category_id": category["id"]
            }),
        )
        .await;
    assert_eq!(created.status(), 201);
    let product = data(created).await;
    assert_eq!(product["name"], "Wool Beanie");
    assert_eq!(product["sku"], "HAT-01");
    assert_eq!(product["category_name"], "Hats");
    assert_eq!(product["status"], "active");
    let id = id_of(&product);

    let duplicate_sku = app
        .post(&app.manager, "/products", json!({ "name": "Other", "sku": "HAT-01", "price": "1.00" }))
        .await;
    assert_eq!(duplicate_sku.status(), 409);

    // Discount set, then cleared with an explicit null.
    let discounted = data(
        app.put(&app.manager, &format!("/products/{id}"), json!({ "discount_price": "20.00" }))
            .await,
    )
    .await;
    assert_eq!(dec(&discounted["discount_price"]), Decimal::new(20, 0));
    let cleared = data(
        app.put(&app.manager, &format!("/products/{id}"), json!({ "discount_price": null }))
            .await,
    )
    .await;
    assert!(cleared["discount_price"].is_null());
    assert_eq!(cleared["category_name"], "Hats");

    let deleted = app.delete(&app.manager, &format!("/products/{id}")).await;
    assert_eq!(deleted.status(), 200);
    assert_eq!(data(deleted).await["is_deleted"], true);
    assert_eq!(app.delete(&app.manager, &format!("/products/{id}")).await.status(), 404);

    let restored = app.patch(&app.admin, &format!("/products/{id}/restore"), json!({})).await;
    assert_eq!(restored.status(), 200);
}

#[tokio::test]
async fn test_product_listing_filters() {
    let app = spawn_app().await;
    app.create_product("A-1", "5.00", 0).await;
    app.create_product("B-2", "15.00", 3).await;
    app.create_product("C-3", "50.00", 9).await;

    let in_stock = data(app.get(&app.manager, "/products?in_stock=true&sort_by=price&order=asc").await).await;
    let skus: Vec<&str> = in_stock["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["sku"].as_str().unwrap())
        .collect();
    assert_eq!(skus, vec!["B-2", "C-3"]);

    let priced = data(app.get(&app.manager, "/products?min_price=10&max_price=20").await).await;
    assert_eq!(priced["total"], 1);

    let searched = data(app.get(&app.manager, "/products?search=c-3").await).await;
    assert_eq!(searched["items"][0]["sku"], "C-3");

    let paged = data(app.get(&app.manager, "/products?limit=2&page=2").await).await;
    assert_eq!(paged["total"], 3);
    assert_eq!(paged["items"].as_array().unwrap().len(), 1);
}

// --- Orders ---

#[tokio::test]
async fn test_order_creation_snapshots_prices_and_reserves_stock() {
    let (app, customer_id, product) = store_with_stock(5).await;

    let response = place(&app, customer_id, &product, 2).await;
    assert_eq!(response.status(), 201);
    let order = data(response).await;

    assert_eq!(order["status"], "pending");
    assert_eq!(order["currency"], "USD");
    assert!(order["order_number"].as_str().unwrap().starts_with("ORD-"));
    assert_eq!(order["customer"]["email"], "buyer@shop.test");
    assert_eq!(order["item_count"], 2);

    let line = &order["items"][0];
    assert_eq!(line["product_name"], "Product SNK-001");
    assert_eq!(line["color"]["name"], "Red");
    assert_eq!(line["color"]["hex"], "#FF0000");
    assert_eq!(dec(&line["line_total"]), Decimal::new(3998, 2));

    assert_eq!(dec(&order["subtotal"]), Decimal::new(3998, 2));
    assert_eq!(dec(&order["tax"]), Decimal::new(400, 2));
    assert_eq!(dec(&order["total"]), Decimal::new(4398, 2));

    assert_eq!(stock_of(&app, &product).await, 3);

    // A later price change does not touch the placed order.
    app.put(&app.manager, &format!("/products/{}", product["id"].as_str().unwrap()), json!({ "price": "99.00" }))
        .await;
    let fetched = data(app.get(&app.manager, &format!("/orders/{}", order["id"].as_str().unwrap())).await).await;
    assert_eq!(dec(&fetched["total"]), Decimal::new(4398, 2));
}

#[tokio::test]
async fn test_order_rejects_insufficient_stock() {
    let (app, customer_id, product) = store_with_stock(1).await;

    let response = place(&app, customer_id, &product, 2).await;
    assert_eq!(response.status(), 409);
    assert!(error_message(response).await.contains("Insufficient stock"));
    assert_eq!(stock_of(&app, &product).await, 1);
}

#[tokio::test]
async fn test_order_rejects_repeated_lines_beyond_stock() {
    let (app, customer_id, product) = store_with_stock(5).await;
    let lines = |quantities: &[i32]| {
        let items: Vec<Value> = quantities
            .iter()
            .map(|q| json!({ "product_id": product["id"], "quantity": q }))
            .collect();
        json!({ "customer_id": customer_id, "items": items })
    };

    // Each line fits, the sum does not.
    let summed = app.post(&app.manager, "/orders", lines(&[3, 3])).await;
    assert_eq!(summed.status(), 409);

    // Two maximal lines must not wrap around to a negative quantity.
    let huge = app
        .post(&app.manager, "/orders", lines(&[i32::MAX, i32::MAX]))
        .await;
    assert_eq!(huge.status(), 409);
    assert!(error_message(huge).await.contains("Insufficient stock"));

    let single = app.post(&app.manager, "/orders", lines(&[i32::MAX])).await;
    assert_eq!(single.status(), 409);

    assert_eq!(stock_of(&app, &product).await, 5);
    let orders = data(app.get(&app.manager, "/orders").await).await;
    assert_eq!(orders["total"], 0);
}

#[tokio::test]
async fn test_order_rejects_total_beyond_storable_amount() {
    let (app, customer_id, _) = store_with_stock(5).await;
    let pricey = app.create_product("GOLD-01", "9999999999.99", 1000).await;

    let response = app
        .post(
            &app.manager,
            "/orders",
            json!({
                "customer_id": customer_id,
                "items": [{ "product_id": pricey["id"], "quantity": 200 }]
            }),
        )
        .await;
    assert_eq!(response.status(), 400);
    assert!(error_message(response).await.starts_with("order total"));
    assert_eq!(stock_of(&app, &pricey).await, 1000);
}

#[tokio::test]
async fn test_order_rejects_invalid_input() {
    let (app, customer_id, product) = store_with_stock(5).await;

    let empty = app
        .post(&app.manager, "/orders", json!({ "customer_id": customer_id, "items": [] }))
        .await;
    assert_eq!(empty.status(), 400);

    let unknown_customer = place(&app, Uuid::new_v4(), &product, 1).await;
    assert_eq!(unknown_customer.status(), 400);

    let wrong_color = app
        .post(
            &app.manager,
            "/orders",
            json!({
                "customer_id": customer_id,
                "items": [{ "product_id": product["id"], "color": "Purple", "quantity": 1 }]
            }),
        )
        .await;
    assert_eq!(wrong_color.status(), 400);

    let zero = place(&app, customer_id, &product, 0).await;
    assert_eq!(zero.status(), 400);

    let unknown_currency = app
        .post(
            &app.manager,
            "/orders",
            json!({
                "customer_id": customer_id,
                "currency": "JPY",
                "items": [{ "product_id": product["id"], "quantity": 1 }]
            }),
        )
        .await;
    assert_eq!(unknown_currency.status(), 400);

    // Draft products cannot be ordered.
    let id = product["id"].as_str().unwrap();
    app.put(&app.manager, &format!("/products/{id}"), json!({ "status": "draft" }))
        .await;
    assert_eq!(place(&app, customer_id, &product, 1).await.status(), 400);
}

#[tokio::test]
async fn test_order_status_lifecycle_and_cancel_restock() {
    let (app, customer_id, product) = store_with_stock(5).await;
    let order = data(place(&app, customer_id, &product, 3).await).await;
    let status_path = format!("/orders/{}/status", order["id"].as_str().unwrap());
    assert_eq!(stock_of(&app, &product).await, 2);

    // pending -> shipped skips a step.
    let skip = app.patch(&app.manager, &status_path, json!({ "status": "shipped" })).await;
    assert_eq!(skip.status(), 409);

    let processing = app.patch(&app.manager, &status_path, json!({ "status": "processing" })).await;
    assert_eq!(processing.status(), 200);
    assert_eq!(data(processing).await["status"], "processing");

    let cancelled = app.patch(&app.manager, &status_path, json!({ "status": "cancelled" })).await;
    assert_eq!(cancelled.status(), 200);
    assert_eq!(stock_of(&app, &product).await, 5);

    // Terminal.
    let reopen = app.patch(&app.manager, &status_path, json!({ "status": "pending" })).await;
    assert_eq!(reopen.status(), 409);
}

#[tokio::test]
async fn test_order_delete_and_restore() {
    let (app, customer_id, product) = store_with_stock(5).await;
    let order = data(place(&app, customer_id, &product, 1).await).await;
    let id = order["id"].as_str().unwrap();

    let deleted = app.delete(&app.manager, &format!("/orders/{id}")).await;
    assert_eq!(deleted.status(), 200);
    assert_eq!(data(deleted).await["is_deleted"], true);

    let live = data(app.get(&app.manager, "/orders").await).await;
    assert_eq!(live["total"], 0);
    let trash = data(app.get(&app.manager, "/orders?deleted=true").await).await;
    assert_eq!(trash["total"], 1);

    let status = app
        .patch(&app.manager, &format!("/orders/{id}/status"), json!({ "status": "processing" }))
        .await;
    assert_eq!(status.status(), 404);

    let path = format!("/orders/{id}/restore");
    assert_eq!(app.patch(&app.manager, &path, json!({})).await.status(), 403);
    assert_eq!(app.patch(&app.admin, &path, json!({})).await.status(), 200);
}

#[tokio::test]
async fn test_order_listing_filters() {
    let (app, customer_id, product) = store_with_stock(20).await;
    let other = app.customer("someone@else.test").await;

    let first = data(place(&app, customer_id, &product, 1).await).await;
    place(&app, other.id, &product, 1).await;
    place(&app, other.id, &product, 1).await;

    let by_customer = data(app.get(&app.manager, &format!("/orders?customer_id={}", other.id)).await).await;
    assert_eq!(by_customer["total"], 2);

    let by_search = data(app.get(&app.manager, "/orders?search=buyer@shop").await).await;
    assert_eq!(by_search["total"], 1);
    assert_eq!(by_search["items"][0]["id"], first["id"]);

    let number = first["order_number"].as_str().unwrap();
    let by_number = data(app.get(&app.manager, &format!("/orders?search={number}")).await).await;
    assert_eq!(by_number["total"], 1);

    let pending = data(app.get(&app.manager, "/orders?status=pending&limit=2").await).await;
    assert_eq!(pending["total"], 3);
    assert_eq!(pending["total_pages"], 2);
}

// --- Currencies ---

#[tokio::test]
async fn test_currency_rules() {
    let app = spawn_app().await;

    let usd = app.create_currency("usd").await;
    assert_eq!(usd["code"], "USD");
    assert_eq!(usd["is_default"], true);
    let eur = app.create_currency("EUR").await;
    assert_eq!(eur["is_default"], false);

    let duplicate = app
        .post(&app.admin, "/currencies", json!({ "code": "EUR", "name": "Euro", "symbol": "€", "exchange_rate": "0.9" }))
        .await;
    assert_eq!(duplicate.status(), 409);

    let manager_create = app
        .post(&app.manager, "/currencies", json!({ "code": "GBP", "name": "Pound", "symbol": "£", "exchange_rate": "0.8" }))
        .await;
    assert_eq!(manager_create.status(), 403);

    let invalid = app
        .post(&app.admin, "/currencies", json!({ "code": "POUND", "name": "Pound", "symbol": "£", "exchange_rate": "0.8" }))
        .await;
    assert_eq!(invalid.status(), 400);

    // Switching the default leaves exactly one.
    let switched = app.patch(&app.admin, "/currencies/eur/default", json!({})).await;
    assert_eq!(switched.status(), 200);
    let listed = data(app.get(&app.manager, "/currencies").await).await;
    let listed = listed.as_array().unwrap();
    assert_eq!(listed[0]["code"], "EUR");
    assert_eq!(listed.iter().filter(|c| c["is_default"] == true).count(), 1);

    // EUR is the default; USD is still the settings currency.
    assert_eq!(app.delete(&app.admin, "/currencies/EUR").await.status(), 409);
    assert_eq!(app.delete(&app.admin, "/currencies/USD").await.status(), 409);

    app.create_currency("GBP").await;
    assert_eq!(app.delete(&app.admin, "/currencies/gbp").await.status(), 200);
    assert_eq!(app.get(&app.manager, "/currencies/GBP").await.status(), 404);

    let updated = data(
        app.put(&app.admin, "/currencies/EUR", json!({ "exchange_rate": "0.95" }))
            .await,
    )
    .await;
    assert_eq!(dec(&updated["exchange_rate"]), Decimal::new(95, 2));
}

// --- Settings ---

#[tokio::test]
async fn test_settings_defaults_and_update() {
    let app = spawn_app().await;

    let defaults = data(app.get(&app.manager, "/settings").await).await;
    assert_eq!(defaults["default_currency"], "USD");
    assert_eq!(defaults["low_stock_threshold"], 5);

    let forbidden = app.put(&app.manager, "/settings", json!({ "store_name": "Mine" })).await;
    assert_eq!(forbidden.status(), 403);

    let unknown_currency = app
        .put(&app.admin, "/settings", json!({ "default_currency": "EUR" }))
        .await;
    assert_eq!(unknown_currency.status(), 400);

    let bad_tax = app.put(&app.admin, "/settings", json!({ "tax_rate": "150" })).await;
    assert_eq!(bad_tax.status(), 400);

    app.create_currency("EUR").await;
    let updated = data(
        app.put(
            &app.admin,
            "/settings",
            json!({ "default_currency": "eur", "store_name": "Shoe Shack", "maintenance_mode": true }),
        )
        .await,
    )
    .await;
    assert_eq!(updated["default_currency"], "EUR");
    assert_eq!(updated["store_name"], "Shoe Shack");
    assert_eq!(updated["maintenance_mode"], true);

    let reread = data(app.get(&app.manager, "/settings").await).await;
    assert_eq!(reread["store_name"], "Shoe Shack");
}

// --- Dashboard ---

#[tokio::test]
async fn test_dashboard_stats() {
    let (app, customer_id, product) = store_with_stock(10).await;
    app.create_product("LOW-1", "3.00", 2).await;

    let kept = data(place(&app, customer_id, &product, 2).await).await;
    let cancelled = data(place(&app, customer_id, &product, 1).await).await;
    app.patch(
        &app.manager,
        &format!("/orders/{}/status", cancelled["id"].as_str().unwrap()),
        json!({ "status": "cancelled" }),
    )
    .await;

    let stats = data(app.get(&app.manager, "/dashboard").await).await;
    assert_eq!(stats["total_customers"], 1);
    assert_eq!(stats["total_products"], 2);
    assert_eq!(stats["total_orders"], 2);
    assert_eq!(stats["pending_orders"], 1);
    assert_eq!(stats["low_stock_products"], 1);
    assert_eq!(dec(&stats["total_revenue"]), dec(&kept["total"]));

    let months = stats["revenue_by_month"].as_array().unwrap();
    assert_eq!(months.len(), 6);
    assert_eq!(dec(&months[5]["revenue"]), dec(&kept["total"]));
    assert_eq!(dec(&months[0]["revenue"]), Decimal::ZERO);

    assert_eq!(stats["top_products"][0]["quantity_sold"], 2);
    assert_eq!(stats["recent_orders"].as_array().unwrap().len(), 2);
    assert_eq!(stats["orders_by_status"].as_array().unwrap().len(), 5);
}
