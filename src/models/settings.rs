use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;

use super::{common::check_numeric, user::validate_email};

/// StoreSettings
///
/// The single store-wide settings document (`store_settings` table, one row).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, FromRow)]
#[ts(export)]
pub struct StoreSettings {
    pub store_name: String,
    pub contact_email: String,
    /// ISO code of the currency new orders default to.
    pub default_currency: String,
    /// Percentage applied to order subtotals.
    #[schema(value_type = String)]
    #[ts(type = "string")]
    pub tax_rate: Decimal,
    /// Products at or below this stock level count as low stock.
    pub low_stock_threshold: i32,
    pub default_language: String,
    pub timezone: String,
    pub maintenance_mode: bool,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            store_name: "My Store".to_string(),
            contact_email: "admin@example.com".to_string(),
            default_currency: "USD".to_string(),
            tax_rate: Decimal::ZERO,
            low_stock_threshold: 5,
            default_language: "en".to_string(),
            timezone: "UTC".to_string(),
            maintenance_mode: false,
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

impl StoreSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.store_name.trim().is_empty() {
            return Err("store_name must not be empty".to_string());
        }
        validate_email(&self.contact_email)?;
        if self.tax_rate < Decimal::ZERO || self.tax_rate > Decimal::ONE_HUNDRED {
            return Err("tax_rate must be between 0 and 100".to_string());
        }
        check_numeric("tax_rate", self.tax_rate, 5, 2)?;
        if self.low_stock_threshold < 0 {
            return Err("low_stock_threshold must not be negative".to_string());
        }
        Ok(())
    }
}

/// UpdateSettingsRequest
///
/// Partial update for PUT /settings.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct UpdateSettingsRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    #[ts(type = "string")]
    pub tax_rate: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low_stock_threshold: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintenance_mode: Option<bool>,
}

impl UpdateSettingsRequest {
    pub fn apply_to(self, settings: &mut StoreSettings) {
        if let Some(store_name) = self.store_name {
            settings.store_name = store_name.trim().to_string();
        }
        if let Some(contact_email) = self.contact_email {
            settings.contact_email = contact_email.trim().to_lowercase();
        }
        if let Some(code) = self.default_currency {
            settings.default_currency = super::currency::normalize_code(&code);
        }
        if let Some(tax_rate) = self.tax_rate {
            settings.tax_rate = tax_rate;
        }
        if let Some(threshold) = self.low_stock_threshold {
            settings.low_stock_threshold = threshold;
        }
        if let Some(language) = self.default_language {
            settings.default_language = language;
        }
        if let Some(timezone) = self.timezone {
            settings.timezone = timezone;
        }
        if let Some(maintenance_mode) = self.maintenance_mode {
            settings.maintenance_mode = maintenance_mode;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(StoreSettings::default().validate().is_ok());
    }

    #[test]
    fn tax_rate_is_bounded() {
        let mut settings = StoreSettings::default();
        UpdateSettingsRequest {
            tax_rate: Some(Decimal::new(1005, 1)),
            ..UpdateSettingsRequest::default()
        }
        .apply_to(&mut settings);
        assert!(settings.validate().is_err());
    }
}
