use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

/// Category
///
/// Product grouping from the `categories` table. `slug` is derived from `name`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, FromRow, Default)]
#[ts(export)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub is_deleted: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl Category {
    pub fn new(req: CreateCategoryRequest, now: DateTime<Utc>) -> Self {
        let name = req.name.trim().to_string();
        Self {
            id: Uuid::new_v4(),
            slug: slugify(&name),
            name,
            description: req.description.filter(|d| !d.trim().is_empty()),
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// CreateCategoryRequest
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub description: Option<String>,
}

impl CreateCategoryRequest {
    pub fn validate(&self) -> Result<(), String> {
        validate_name(&self.name)
    }
}

/// UpdateCategoryRequest
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct UpdateCategoryRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl UpdateCategoryRequest {
    pub fn validate(&self) -> Result<(), String> {
        self.name.as_deref().map_or(Ok(()), validate_name)
    }

    pub fn apply_to(&self, category: &mut Category) {
        if let Some(name) = &self.name {
            category.name = name.trim().to_string();
            category.slug = slugify(&category.name);
        }
        if let Some(description) = &self.description {
            category.description = Some(description.clone()).filter(|d| !d.trim().is_empty());
        }
    }
}

fn validate_name(name: &str) -> Result<(), String> {
    if slugify(name).is_empty() {
        return Err("category name must contain at least one letter or digit".to_string());
    }
    Ok(())
}

/// slugify
///
/// Lower-cases the input and collapses every run of non-alphanumeric
/// characters into a single `-`, trimming leading and trailing dashes.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;
    for c in input.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}
