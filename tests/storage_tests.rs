use shop_admin::storage::{MockStorageService, S3StorageClient, StorageService, sanitize_key};

#[cfg(test)]
mod mock_tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_success() {
        let mock = MockStorageService::new();
        let result = mock
            .presigned_upload_url("gallery/shoe.png", "image/png")
            .await;
        assert!(result.is_ok());

        let url = result.unwrap();
        assert!(url.contains("signature=fake"));
        assert!(url.contains("gallery/shoe.png"));
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let mock = MockStorageService::new_failing();
        assert!(mock.presigned_upload_url("gallery/a.png", "image/png").await.is_err());
        assert!(mock.delete_object("gallery/a.png").await.is_err());
        assert!(mock.deleted_keys().is_empty());
    }

    #[tokio::test]
    async fn test_mock_sanitization() {
        let mock = MockStorageService::new();
        let url = mock
            .presigned_upload_url("gallery/../../etc/passwd", "image/png")
            .await
            .unwrap();
        assert!(!url.contains(".."));
    }

    #[tokio::test]
    async fn test_mock_records_deletes_across_clones() {
        let mock = MockStorageService::new();
        let handle = mock.clone();
        mock.delete_object("gallery/a.png").await.unwrap();
        assert_eq!(handle.deleted_keys(), vec!["gallery/a.png".to_string()]);
    }

    #[test]
    fn test_sanitize_key() {
        assert_eq!(sanitize_key("/gallery//./a.png"), "gallery/a.png");
        assert_eq!(sanitize_key("../x"), "x");
    }
}

#[cfg(test)]
mod s3_tests {
    use super::*;

    async fn client() -> S3StorageClient {
        S3StorageClient::new(
            "http://localhost:9000",
            "us-east-1",
            "testkey",
            "testsecret",
            "testbucket",
        )
        .await
    }

    // Presigning is computed locally, no server needed.
    #[tokio::test]
    async fn test_s3_presigned_url_format() {
        let client = client().await;

        let url = client
            .presigned_upload_url("gallery/report.png", "image/png")
            .await
            .unwrap();

        assert!(url.starts_with("http://localhost:9000/testbucket/gallery/report.png"));
        assert!(url.contains("X-Amz-Signature="));
        assert!(url.contains("X-Amz-Expires=600"));
    }

    #[tokio::test]
    #[ignore = "requires a running MinIO on localhost:9000"]
    async fn test_s3_delete_missing_object_is_ok() {
        let client = client().await;
        client.ensure_bucket_exists().await;
        assert!(client.delete_object("gallery/does-not-exist.png").await.is_ok());
    }
}
