use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;

use super::common::check_numeric;

/// Currency
///
/// A currency the store can price orders in. `code` is the ISO 4217 code and
/// the primary key. At most one row has `is_default` set.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, FromRow, Default)]
#[ts(export)]
pub struct Currency {
    pub code: String,
    pub name: String,
    pub symbol: String,
    #[schema(value_type = String)]
    #[ts(type = "string")]
    pub exchange_rate: Decimal,
    pub is_default: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl Currency {
    pub fn new(req: CreateCurrencyRequest, now: DateTime<Utc>) -> Self {
        Self {
            code: normalize_code(&req.code),
            name: req.name.trim().to_string(),
            symbol: req.symbol.trim().to_string(),
            exchange_rate: req.exchange_rate,
            is_default: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_code(&self.code)?;
        if self.name.is_empty() {
            return Err("name must not be empty".to_string());
        }
        if self.symbol.is_empty() {
            return Err("symbol must not be empty".to_string());
        }
        if self.exchange_rate <= Decimal::ZERO {
            return Err("exchange_rate must be positive".to_string());
        }
        check_numeric("exchange_rate", self.exchange_rate, 18, 6)?;
        Ok(())
    }
}

/// CreateCurrencyRequest
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct CreateCurrencyRequest {
    #[schema(example = "EUR")]
    pub code: String,
    pub name: String,
    pub symbol: String,
    #[schema(value_type = String)]
    #[ts(type = "string")]
    pub exchange_rate: Decimal,
}

/// UpdateCurrencyRequest
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct UpdateCurrencyRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    #[ts(type = "string")]
    pub exchange_rate: Option<Decimal>,
}

impl UpdateCurrencyRequest {
    pub fn apply_to(&self, currency: &mut Currency) {
        if let Some(name) = &self.name {
            currency.name = name.trim().to_string();
        }
        if let Some(symbol) = &self.symbol {
            currency.symbol = symbol.trim().to_string();
        }
        if let Some(rate) = self.exchange_rate {
            currency.exchange_rate = rate;
        }
    }
}

pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

pub fn validate_code(code: &str) -> Result<(), String> {
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase()) {
        Ok(())
    } else {
        Err(format!("'{code}' is not a three-letter currency code"))
    }
}
