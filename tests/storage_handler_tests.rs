mod common;

use common::{data, error_message, id_of, spawn_app, spawn_app_with};
use serde_json::json;
use shop_admin::{AppConfig, MockStorageService};

fn image_payload(key: &str) -> serde_json::Value {
    json!({ "key": key, "file_name": "shoe.png", "content_type": "image/png", "size_bytes": 2048 })
}

#[tokio::test]
async fn test_upload_url_for_images() {
    let app = spawn_app().await;

    let response = app
        .post(
            &app.manager,
            "/gallery/upload-url",
            json!({ "file_name": "Red Shoe.PNG", "content_type": "image/png" }),
        )
        .await;
    assert_eq!(response.status(), 200);
    let upload = data(response).await;

    let key = upload["key"].as_str().unwrap();
    assert!(key.starts_with("gallery/"));
    assert!(key.ends_with(".png"));
    assert_eq!(upload["expires_in"], 600);

    let url = upload["upload_url"].as_str().unwrap();
    assert!(url.contains("signature=fake"));
    assert!(url.contains(key));
}

#[tokio::test]
async fn test_upload_url_rejects_non_images() {
    let app = spawn_app().await;

    let response = app
        .post(
            &app.manager,
            "/gallery/upload-url",
            json!({ "file_name": "report.pdf", "content_type": "application/pdf" }),
        )
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_upload_url_storage_failure_is_hidden() {
    let app = spawn_app_with(AppConfig::default(), MockStorageService::new_failing()).await;

    let response = app
        .post(
            &app.manager,
            "/gallery/upload-url",
            json!({ "file_name": "shoe.png", "content_type": "image/png" }),
        )
        .await;
    assert_eq!(response.status(), 502);
    assert_eq!(error_message(response).await, "Media storage error");
}

#[tokio::test]
async fn test_register_and_list_images() {
    let app = spawn_app().await;

    let registered = app.post(&app.manager, "/gallery", image_payload("gallery/a.png")).await;
    assert_eq!(registered.status(), 201);
    let image = data(registered).await;
    assert_eq!(image["url"], "http://localhost:9000/shop-media/gallery/a.png");

    let duplicate = app.post(&app.manager, "/gallery", image_payload("gallery/a.png")).await;
    assert_eq!(duplicate.status(), 409);

    let outside = app.post(&app.manager, "/gallery", image_payload("private/a.png")).await;
    assert_eq!(outside.status(), 400);

    app.post(&app.manager, "/gallery", image_payload("gallery/b.png")).await;
    let page = data(app.get(&app.manager, "/gallery?limit=1").await).await;
    assert_eq!(page["total"], 2);
    assert_eq!(page["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_image_in_use_conflicts() {
    let app = spawn_app().await;
    let image = data(app.post(&app.manager, "/gallery", image_payload("gallery/c.png")).await).await;
    let image_id = id_of(&image);

    let product = data(
        app.post(
            &app.manager,
            "/products",
            json!({ "name": "Boot", "sku": "BOOT-1", "price": "80.00", "image_ids": [image_id] }),
        )
        .await,
    )
    .await;
    assert_eq!(product["images"][0]["key"], "gallery/c.png");

    let in_use = app.delete(&app.manager, &format!("/gallery/{image_id}")).await;
    assert_eq!(in_use.status(), 409);
    assert!(app.storage.deleted_keys().is_empty());

    // Soft-deleted products no longer hold the image.
    app.delete(&app.manager, &format!("/products/{}", product["id"].as_str().unwrap()))
        .await;
    let deleted = app.delete(&app.manager, &format!("/gallery/{image_id}")).await;
    assert_eq!(deleted.status(), 200);
    assert_eq!(app.storage.deleted_keys(), vec!["gallery/c.png".to_string()]);

    let again = app.delete(&app.manager, &format!("/gallery/{image_id}")).await;
    assert_eq!(again.status(), 404);
}

#[tokio::test]
async fn test_delete_image_survives_storage_failure() {
    let app = spawn_app_with(AppConfig::default(), MockStorageService::new_failing()).await;
    let image = data(app.post(&app.manager, "/gallery", image_payload("gallery/d.png")).await).await;
    let image_id = id_of(&image);

    // The record is removed even though the object delete fails.
    let deleted = app.delete(&app.manager, &format!("/gallery/{image_id}")).await;
    assert_eq!(deleted.status(), 200);

    let page = data(app.get(&app.manager, "/gallery").await).await;
    assert_eq!(page["total"], 0);

    let again = app.delete(&app.manager, &format!("/gallery/{image_id}")).await;
    assert_eq!(again.status(), 404);
}
