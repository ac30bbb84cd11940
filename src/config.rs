use std::env;

use thiserror::Error;

/// Local fallback for the token signing secret. Never accepted in production.
pub const LOCAL_JWT_SECRET: &str = "super-secure-test-secret-value-local";
/// Upper bound for `JWT_TTL_HOURS`: one year.
pub const MAX_JWT_TTL_HOURS: i64 = 24 * 365;

/// ConfigError
///
/// Raised by `AppConfig::load` when a variable required for the current
/// environment is missing or unparsable.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set in production")]
    MissingInProduction(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// AppConfig
///
/// Holds the application's entire configuration state. Immutable once loaded and
/// shared with every handler through `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls the dev header bypass and log format.
    pub env: Env,
    // Port the HTTP server binds to.
    pub port: u16,
    // Postgres connection string. `None` selects the in-memory store (local only).
    pub db_url: Option<String>,
    // Secret used to sign and validate dashboard JWTs.
    pub jwt_secret: String,
    // Lifetime of an issued token.
    pub jwt_ttl_hours: i64,
    // S3-compatible storage for product images.
    pub s3_endpoint: String,
    pub s3_region: String,
    pub s3_key: String,
    pub s3_secret: String,
    pub s3_bucket: String,
    // Public URL prefix under which uploaded objects are served.
    pub media_base_url: String,
    // Optional administrator created at start-up when absent.
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

/// Env
///
/// Runtime context. `Local` enables development conveniences (MinIO bucket
/// creation, `x-user-id` bypass, in-memory store); `Production` requires every secret.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// Safe local values for tests; nothing here reads the environment.
    fn default() -> Self {
        Self {
            env: Env::Local,
            port: 3000,
            db_url: None,
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            jwt_ttl_hours: 24,
            s3_endpoint: "http://localhost:9000".to_string(),
            s3_region: "us-east-1".to_string(),
            s3_key: "admin".to_string(),
            s3_secret: "password".to_string(),
            s3_bucket: "shop-media".to_string(),
            media_base_url: "http://localhost:9000/shop-media".to_string(),
            admin_email: None,
            admin_password: None,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables (after `.env` has been
    /// applied by the caller).
    ///
    /// # Errors
    /// Returns `ConfigError` when a production secret is missing or a numeric
    /// variable cannot be parsed. The binary refuses to start in that case.
    pub fn load() -> Result<Self, ConfigError> {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };
        let defaults = Self::default();

        let required = |name: &'static str, fallback: &str| -> Result<String, ConfigError> {
            match (env::var(name), env) {
                (Ok(value), _) => Ok(value),
                (Err(_), Env::Production) => Err(ConfigError::MissingInProduction(name)),
                (Err(_), Env::Local) => Ok(fallback.to_string()),
            }
        };

        let db_url = match (env::var("DATABASE_URL").ok(), env) {
            (None, Env::Production) => return Err(ConfigError::MissingInProduction("DATABASE_URL")),
            (url, _) => url,
        };

        let port = parse_var("APP_PORT", defaults.port)?;
        let jwt_ttl_hours = parse_var("JWT_TTL_HOURS", defaults.jwt_ttl_hours)?;
        if !(1..=MAX_JWT_TTL_HOURS).contains(&jwt_ttl_hours) {
            return Err(ConfigError::Invalid {
                name: "JWT_TTL_HOURS",
                value: jwt_ttl_hours.to_string(),
            });
        }

        let s3_endpoint = env::var("S3_ENDPOINT").unwrap_or(defaults.s3_endpoint);
        let s3_bucket = env::var("S3_BUCKET").unwrap_or(defaults.s3_bucket);
        let media_base_url = env::var("MEDIA_BASE_URL")
            .unwrap_or_else(|_| format!("{}/{}", s3_endpoint.trim_end_matches('/'), s3_bucket));

        Ok(Self {
            env,
            port,
            db_url,
            jwt_secret: required("JWT_SECRET", LOCAL_JWT_SECRET)?,
            jwt_ttl_hours,
            s3_region: env::var("S3_REGION").unwrap_or(defaults.s3_region),
            s3_key: required("S3_ACCESS_KEY", &defaults.s3_key)?,
            s3_secret: required("S3_SECRET_KEY", &defaults.s3_secret)?,
            s3_endpoint,
            s3_bucket,
            media_base_url: media_base_url.trim_end_matches('/').to_string(),
            admin_email: env::var("ADMIN_EMAIL").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
        })
    }

    /// Public URL of a stored object.
    pub fn media_url(&self, key: &str) -> String {
        format!("{}/{}", self.media_base_url, key.trim_start_matches('/'))
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}
