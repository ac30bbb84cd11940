#![allow(dead_code)]

use chrono::Utc;
use reqwest::{Method, RequestBuilder, Response};
use serde_json::Value;
use shop_admin::{
    AppConfig, AppState, InMemoryRepository, MockStorageService, create_router,
    auth::hash_password,
    models::{User, UserRole},
    repository::RepositoryState,
    storage::StorageState,
};
use std::sync::{Arc, OnceLock};
use tokio::net::TcpListener;
use uuid::Uuid;

/// Password of every seeded account.
pub const PASSWORD: &str = "correct-horse-battery";

/// Argon2 is slow in debug builds; hash the shared password once per binary.
fn password_hash() -> String {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| hash_password(PASSWORD).unwrap()).clone()
}

pub struct TestApp {
    pub address: String,
    pub repo: RepositoryState,
    pub storage: MockStorageService,
    pub client: reqwest::Client,
    pub admin: User,
    pub manager: User,
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(AppConfig::default(), MockStorageService::new()).await
}

/// Boots the full router on an ephemeral port over an in-memory store, with
/// one administrator and one manager already registered.
pub async fn spawn_app_with(config: AppConfig, storage: MockStorageService) -> TestApp {
    let repo = Arc::new(InMemoryRepository::new()) as RepositoryState;

    let admin = seed_user(&repo, UserRole::Admin, "admin@shop.test").await;
    let manager = seed_user(&repo, UserRole::Manager, "manager@shop.test").await;

    let state = AppState {
        repo: repo.clone(),
        storage: Arc::new(storage.clone()) as StorageState,
        config,
    };
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp {
        address,
        repo,
        storage,
        client: reqwest::Client::new(),
        admin,
        manager,
    }
}

pub async fn seed_user(repo: &RepositoryState, role: UserRole, email: &str) -> User {
    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        first_name: role.as_str().to_string(),
        last_name: "Tester".to_string(),
        email: email.to_string(),
        role,
        password_hash: password_hash(),
        created_at: now,
        updated_at: now,
        ..User::default()
    };
    repo.insert_user(&user).await.unwrap()
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// A request authenticated through the local `x-user-id` header.
    pub fn request_as(&self, user: &User, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header("x-user-id", user.id.to_string())
    }

    pub async fn get(&self, user: &User, path: &str) -> Response {
        self.request_as(user, Method::GET, path).send().await.unwrap()
    }

    pub async fn post(&self, user: &User, path: &str, body: Value) -> Response {
        self.request_as(user, Method::POST, path)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    pub async fn put(&self, user: &User, path: &str, body: Value) -> Response {
        self.request_as(user, Method::PUT, path)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    pub async fn patch(&self, user: &User, path: &str, body: Value) -> Response {
        self.request_as(user, Method::PATCH, path)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    pub async fn delete(&self, user: &User, path: &str) -> Response {
        self.request_as(user, Method::DELETE, path)
            .send()
            .await
            .unwrap()
    }

    pub async fn login(&self, email: &str, password: &str) -> Response {
        self.client
            .post(self.url("/auth/login"))
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .unwrap()
    }

    // --- Fixtures ---

    pub async fn create_currency(&self, code: &str) -> Value {
        let resp = self
            .post(
                &self.admin,
                "/currencies",
                serde_json::json!({
                    "code": code, "name": format!("{code} currency"), "symbol": "$", "exchange_rate": "1.00"
                }),
            )
            .await;
        assert_eq!(resp.status(), 201, "currency fixture");
        data(resp).await
    }

    pub async fn create_product(&self, sku: &str, price: &str, stock: i32) -> Value {
        let resp = self
            .post(
                &self.manager,
                "/products",
                serde_json::json!({
                    "name": format!("Product {sku}"),
                    "sku": sku,
                    "price": price,
                    "stock": stock,
                    "colors": [{ "name": "Red", "hex": "#FF0000" }]
                }),
            )
            .await;
        assert_eq!(resp.status(), 201, "product fixture");
        data(resp).await
    }

    pub async fn customer(&self, email: &str) -> User {
        seed_user(&self.repo, UserRole::Customer, email).await
    }
}

/// The `data` member of a success envelope.
pub async fn data(resp: Response) -> Value {
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "success", "unexpected body: {body}");
    body["data"].clone()
}

/// The `message` member of an error envelope.
pub async fn error_message(resp: Response) -> String {
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "error", "unexpected body: {body}");
    body["message"].as_str().unwrap_or_default().to_string()
}

pub fn id_of(value: &Value) -> Uuid {
    value["id"].as_str().unwrap().parse().unwrap()
}
