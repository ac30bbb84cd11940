use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{
    common::{PageParams, SortOrder, check_numeric},
    image::Image,
};

/// ProductStatus
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema, TS,
)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ProductStatus {
    #[default]
    Active,
    Draft,
    Archived,
}

impl ProductStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Draft => "draft",
            Self::Archived => "archived",
        }
    }
}

impl fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "draft" => Ok(Self::Draft),
            "archived" => Ok(Self::Archived),
            other => Err(format!("unknown product status '{other}'")),
        }
    }
}

impl TryFrom<String> for ProductStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// ProductColor
///
/// A colour variant embedded in the product document (`colors` JSONB column).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct ProductColor {
    pub name: String,
    /// `#RRGGBB`
    pub hex: String,
}

impl ProductColor {
    fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("color name must not be empty".to_string());
        }
        let digits = self.hex.strip_prefix('#').unwrap_or_default();
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("color '{}' has an invalid hex value", self.name));
        }
        Ok(())
    }
}

/// Product
///
/// Catalogue entry from the `products` table.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, FromRow, Default)]
#[ts(export)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub sku: String,
    pub description: Option<String>,
    #[schema(value_type = String)]
    #[ts(type = "string")]
    pub price: Decimal,
    #[schema(value_type = Option<String>)]
    #[ts(type = "string | null")]
    pub discount_price: Option<Decimal>,
    pub stock: i32,
    pub category_id: Option<Uuid>,
    #[sqlx(json)]
    pub colors: Vec<ProductColor>,
    pub image_ids: Vec<Uuid>,
    #[sqlx(try_from = "String")]
    pub status: ProductStatus,
    pub is_deleted: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn new(req: CreateProductRequest, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: req.name.trim().to_string(),
            sku: normalize_sku(&req.sku),
            description: req.description.filter(|d| !d.trim().is_empty()),
            price: req.price,
            discount_price: req.discount_price,
            stock: req.stock,
            category_id: req.category_id,
            colors: req.colors,
            image_ids: req.image_ids,
            status: req.status.unwrap_or_default(),
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// The price a customer pays: the discount price when one is set.
    pub fn effective_price(&self) -> Decimal {
        self.discount_price.unwrap_or(self.price)
    }

    pub fn color(&self, name: &str) -> Option<&ProductColor> {
        self.colors.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Field-level invariants of a complete product document.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("name must not be empty".to_string());
        }
        if self.sku.is_empty() {
            return Err("sku must not be empty".to_string());
        }
        if self.price.is_sign_negative() {
            return Err("price must not be negative".to_string());
        }
        check_numeric("price", self.price, 12, 2)?;
        if let Some(discount) = self.discount_price {
            if discount.is_sign_negative() || discount > self.price {
                return Err("discount_price must be between 0 and price".to_string());
            }
            check_numeric("discount_price", discount, 12, 2)?;
        }
        if self.stock < 0 {
            return Err("stock must not be negative".to_string());
        }
        for (i, color) in self.colors.iter().enumerate() {
            color.validate()?;
            if self.colors[..i]
                .iter()
                .any(|c| c.name.eq_ignore_ascii_case(&color.name))
            {
                return Err(format!("color '{}' is listed twice", color.name));
            }
        }
        Ok(())
    }
}

/// CreateProductRequest
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct CreateProductRequest {
    pub name: String,
    pub sku: String,
    pub description: Option<String>,
    #[schema(value_type = String)]
    #[ts(type = "string")]
    pub price: Decimal,
    #[schema(value_type = Option<String>)]
    #[ts(type = "string | null")]
    pub discount_price: Option<Decimal>,
    #[serde(default)]
    pub stock: i32,
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub colors: Vec<ProductColor>,
    #[serde(default)]
    pub image_ids: Vec<Uuid>,
    pub status: Option<ProductStatus>,
}

/// UpdateProductRequest
///
/// Partial update. `discount_price` and `category_id` distinguish "absent"
/// (keep) from `null` (clear) through the nested `Option`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct UpdateProductRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    #[ts(type = "string")]
    pub price: Option<Decimal>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "double_option"
    )]
    #[schema(value_type = Option<String>)]
    #[ts(type = "string | null")]
    pub discount_price: Option<Option<Decimal>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<i32>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "double_option"
    )]
    #[schema(value_type = Option<Uuid>)]
    #[ts(type = "string | null")]
    pub category_id: Option<Option<Uuid>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colors: Option<Vec<ProductColor>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_ids: Option<Vec<Uuid>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ProductStatus>,
}

impl UpdateProductRequest {
    pub fn apply_to(self, product: &mut Product) {
        if let Some(name) = self.name {
            product.name = name.trim().to_string();
        }
        if let Some(sku) = self.sku {
            product.sku = normalize_sku(&sku);
        }
        if let Some(description) = self.description {
            product.description = Some(description).filter(|d| !d.trim().is_empty());
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(discount_price) = self.discount_price {
            product.discount_price = discount_price;
        }
        if let Some(stock) = self.stock {
            product.stock = stock;
        }
        if let Some(category_id) = self.category_id {
            product.category_id = category_id;
        }
        if let Some(colors) = self.colors {
            product.colors = colors;
        }
        if let Some(image_ids) = self.image_ids {
            product.image_ids = image_ids;
        }
        if let Some(status) = self.status {
            product.status = status;
        }
    }
}

/// ProductDetails
///
/// Detail view: the product document joined with its category name and images.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct ProductDetails {
    #[serde(flatten)]
    pub product: Product,
    pub category_name: Option<String>,
    pub images: Vec<Image>,
}

/// ProductSort
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    Name,
    Price,
    Stock,
    #[default]
    CreatedAt,
}

/// ProductFilter
///
/// Repository-level listing criteria. All present filters must match.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub category_id: Option<Uuid>,
    pub status: Option<ProductStatus>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub in_stock: Option<bool>,
    pub deleted: bool,
    pub sort: ProductSort,
    pub order: SortOrder,
    pub page: PageParams,
}

pub fn normalize_sku(sku: &str) -> String {
    sku.trim().to_uppercase()
}

/// Serde helper keeping `null` distinct from a missing field.
mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<T: Serialize, S: Serializer>(
        value: &Option<Option<T>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, T: Deserialize<'de>, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Option<T>>, D::Error> {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}
