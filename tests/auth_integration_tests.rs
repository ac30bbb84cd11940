mod common;

use chrono::Utc;
use common::{PASSWORD, data, error_message, spawn_app, spawn_app_with};
use jsonwebtoken::{EncodingKey, Header, encode};
use shop_admin::{
    AppConfig, MockStorageService,
    auth::{Claims, bootstrap_admin, issue_token},
    config::Env,
    models::UserRole,
};
use uuid::Uuid;

fn production_config() -> AppConfig {
    AppConfig {
        env: Env::Production,
        jwt_secret: "production-secret-for-tests".to_string(),
        ..AppConfig::default()
    }
}

fn sign(claims: &Claims, secret: &str) -> String {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

#[tokio::test]
async fn test_bypass_header_ignored_in_production() {
    let app = spawn_app_with(production_config(), MockStorageService::new()).await;

    let response = app.get(&app.admin, "/me").await;
    assert_eq!(response.status(), 401);

    // A real token still works.
    let (token, _) = issue_token(&app.admin, &production_config()).unwrap();
    let me = app
        .client
        .get(app.url("/me"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(me.status(), 200);
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let app = spawn_app().await;
    let past = Utc::now().timestamp() as usize - 3600;
    let claims = Claims {
        sub: app.admin.id,
        role: UserRole::Admin,
        exp: past,
        iat: past - 60,
    };
    let token = sign(&claims, &app_secret());

    let response = app
        .client
        .get(app.url("/me"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
    assert_eq!(error_message(response).await, "Invalid or expired token");
}

#[tokio::test]
async fn test_token_for_unknown_user_is_rejected() {
    let app = spawn_app().await;
    let claims = Claims {
        sub: Uuid::new_v4(),
        role: UserRole::Admin,
        exp: Utc::now().timestamp() as usize + 3600,
        iat: Utc::now().timestamp() as usize,
    };

    let response = app
        .client
        .get(app.url("/dashboard"))
        .bearer_auth(sign(&claims, &app_secret()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn test_role_is_read_from_the_store_not_the_token() {
    let app = spawn_app().await;
    // Token claims admin, the stored account is a manager.
    let claims = Claims {
        sub: app.manager.id,
        role: UserRole::Admin,
        exp: Utc::now().timestamp() as usize + 3600,
        iat: Utc::now().timestamp() as usize,
    };

    let response = app
        .client
        .put(app.url("/settings"))
        .bearer_auth(sign(&claims, &app_secret()))
        .json(&serde_json::json!({ "store_name": "Hijacked" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);
}

#[tokio::test]
async fn test_bootstrap_admin_is_idempotent() {
    let app = spawn_app().await;
    let config = AppConfig {
        admin_email: Some("Owner@Shop.test".to_string()),
        admin_password: Some(PASSWORD.to_string()),
        ..AppConfig::default()
    };

    bootstrap_admin(&app.repo, &config).await.unwrap();
    bootstrap_admin(&app.repo, &config).await.unwrap();

    let owner = app
        .repo
        .get_user_by_email("owner@shop.test")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(owner.role, UserRole::Admin);

    let session = data(app.login("owner@shop.test", PASSWORD).await).await;
    assert_eq!(session["user"]["role"], "admin");
}

#[tokio::test]
async fn test_bootstrap_admin_skipped_without_credentials() {
    let app = spawn_app().await;
    bootstrap_admin(&app.repo, &AppConfig::default()).await.unwrap();

    let users = data(app.get(&app.admin, "/users?role=admin").await).await;
    assert_eq!(users["total"], 1);
}

fn app_secret() -> String {
    AppConfig::default().jwt_secret
}
