use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

/// Image
///
/// A gallery entry from the `images` table. `key` is the object key in the
/// media bucket; `url` is its public address.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, FromRow, Default)]
#[ts(export)]
pub struct Image {
    pub id: Uuid,
    pub key: String,
    pub url: String,
    pub file_name: String,
    pub content_type: String,
    #[ts(type = "number")]
    pub size_bytes: i64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// UploadUrlRequest
///
/// Input for POST /gallery/upload-url.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct UploadUrlRequest {
    /// The original filename, used to derive the file extension.
    #[schema(example = "sneaker-red.png")]
    pub file_name: String,
    /// The MIME type the presigned URL is constrained to. Must be `image/*`.
    #[schema(example = "image/png")]
    pub content_type: String,
}

/// UploadUrlResponse
///
/// Temporary URL for the direct client-to-bucket upload plus the object key to
/// register once the upload completes.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct UploadUrlResponse {
    pub upload_url: String,
    pub key: String,
    #[ts(type = "number")]
    pub expires_in: u64,
}

/// RegisterImageRequest
///
/// Input for POST /gallery once the client finished the upload.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct RegisterImageRequest {
    pub key: String,
    pub file_name: String,
    pub content_type: String,
    #[ts(type = "number")]
    pub size_bytes: i64,
}

impl RegisterImageRequest {
    pub fn validate(&self) -> Result<(), String> {
        if !self.key.starts_with(super::GALLERY_PREFIX) || self.key.contains("..") {
            return Err(format!("'{}' is not a gallery object key", self.key));
        }
        if !is_image_type(&self.content_type) {
            return Err(format!("'{}' is not an image type", self.content_type));
        }
        if self.size_bytes < 0 {
            return Err("size_bytes must not be negative".to_string());
        }
        Ok(())
    }
}

pub fn is_image_type(content_type: &str) -> bool {
    content_type
        .strip_prefix("image/")
        .is_some_and(|subtype| !subtype.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_gallery_image_keys_register() {
        let mut req = RegisterImageRequest {
            key: "gallery/abc.png".into(),
            file_name: "abc.png".into(),
            content_type: "image/png".into(),
            size_bytes: 10,
        };
        assert!(req.validate().is_ok());

        req.key = "gallery/../secrets".into();
        assert!(req.validate().is_err());

        req.key = "gallery/abc.pdf".into();
        req.content_type = "application/pdf".into();
        assert!(req.validate().is_err());
    }
}
