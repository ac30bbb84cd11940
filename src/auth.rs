use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::AppError,
    models::{
        User, UserRole,
        user::{normalize_email, validate_password},
    },
    repository::{RepositoryError, RepositoryState},
};

/// AuthError
///
/// Failures of the credential and token primitives. Converted into `AppError`
/// at the handler boundary.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("{0}")]
    WeakPassword(String),

    #[error("password hashing failed")]
    Hashing,

    #[error("token signing failed")]
    Signing,
}

/// Claims
///
/// Payload of the dashboard JWT (HS256). The role is informational; every
/// request re-reads the user so role changes apply immediately.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user's UUID.
    pub sub: Uuid,
    pub role: UserRole,
    /// Expiration time, seconds since the epoch.
    pub exp: usize,
    /// Issued at, seconds since the epoch.
    pub iat: usize,
}

/// Hash a password using Argon2id.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    validate_password(password).map_err(AuthError::WeakPassword)?;

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::Hashing)
}

/// Verify a password against a stored hash.
pub fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

/// issue_token
///
/// Signs a token for `user` valid for `config.jwt_ttl_hours`. Returns the token
/// and its lifetime in seconds.
pub fn issue_token(user: &User, config: &AppConfig) -> Result<(String, i64), AuthError> {
    let now = Utc::now();
    let ttl = Duration::try_hours(config.jwt_ttl_hours).ok_or(AuthError::Signing)?;
    let claims = Claims {
        sub: user.id,
        role: user.role,
        exp: (now + ttl).timestamp() as usize,
        iat: now.timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|_| AuthError::Signing)?;

    Ok((token, ttl.num_seconds()))
}

/// Validates signature and expiry and returns the claims.
pub fn decode_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let mut validation = Validation::default();
    validation.validate_exp = true;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::debug!(error = %e, "rejected bearer token");
        AuthError::InvalidToken
    })
}

/// authenticate
///
/// Resolves a dashboard login. Unknown email, wrong password, a soft-deleted
/// account and a customer account all fail with the same `InvalidCredentials`.
pub async fn authenticate(
    repo: &RepositoryState,
    email: &str,
    password: &str,
) -> Result<User, AppError> {
    let user = repo
        .get_user_by_email(&normalize_email(email))
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    verify_password(password, &user.password_hash)?;

    if user.is_deleted || !user.role.is_staff() {
        tracing::warn!(user_id = %user.id, "login refused for inactive or non-staff account");
        return Err(AuthError::InvalidCredentials.into());
    }
    Ok(user)
}

/// bootstrap_admin
///
/// Creates the administrator named by `ADMIN_EMAIL`/`ADMIN_PASSWORD` when no
/// user with that email exists. Does nothing when either variable is unset.
pub async fn bootstrap_admin(repo: &RepositoryState, config: &AppConfig) -> Result<(), AppError> {
    let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) else {
        return Ok(());
    };
    let email = normalize_email(email);

    if repo.get_user_by_email(&email).await?.is_some() {
        tracing::debug!(%email, "bootstrap administrator already present");
        return Ok(());
    }

    let now = Utc::now();
    let admin = User {
        id: Uuid::new_v4(),
        first_name: "Store".to_string(),
        last_name: "Admin".to_string(),
        email,
        role: UserRole::Admin,
        password_hash: hash_password(password)?,
        created_at: now,
        updated_at: now,
        ..User::default()
    };

    match repo.insert_user(&admin).await {
        Ok(user) => {
            tracing::info!(user_id = %user.id, email = %user.email, "bootstrap administrator created");
            Ok(())
        }
        // Another instance won the race.
        Err(RepositoryError::Conflict(_)) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// AuthUser
///
/// The resolved identity of an authenticated request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: UserRole,
}

impl AuthUser {
    pub fn require_staff(&self) -> Result<(), AppError> {
        if self.role.is_staff() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Staff access required".to_string()))
        }
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role == UserRole::Admin {
            Ok(())
        } else {
            Err(AppError::Forbidden("Administrator access required".to_string()))
        }
    }
}

/// AuthUser Extractor Implementation
///
/// Usable as an argument of any handler behind the authentication layer.
///
/// 1. Local bypass: in `Env::Local` an `x-user-id` header naming an existing
///    user is accepted without a token.
/// 2. Bearer token extraction and JWT validation.
/// 3. Repository lookup, so deleted accounts lose access at once.
///
/// Rejection: `AppError::Unauthorized` (401).
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        if config.env == Env::Local {
            let bypass_id = parts
                .headers
                .get("x-user-id")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| Uuid::parse_str(value).ok());

            if let Some(user_id) = bypass_id {
                if let Some(user) = repo.get_user(user_id).await?.filter(|u| !u.is_deleted) {
                    return Ok(AuthUser {
                        id: user.id,
                        role: user.role,
                    });
                }
            }
        }

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;

        let claims = decode_token(token, &config.jwt_secret)?;

        let user = repo
            .get_user(claims.sub)
            .await?
            .filter(|u| !u.is_deleted)
            .ok_or(AuthError::InvalidToken)?;

        Ok(AuthUser {
            id: user.id,
            role: user.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn short_passwords_are_rejected_before_hashing() {
        assert!(matches!(hash_password("short"), Err(AuthError::WeakPassword(_))));
    }

    #[test]
    fn issued_token_decodes_with_same_secret_only() {
        let config = AppConfig::default();
        let user = User {
            id: Uuid::new_v4(),
            role: UserRole::Manager,
            ..User::default()
        };

        let (token, expires_in) = issue_token(&user, &config).unwrap();
        assert_eq!(expires_in, config.jwt_ttl_hours * 3600);

        let claims = decode_token(&token, &config.jwt_secret).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.role, UserRole::Manager);

        assert!(decode_token(&token, "another-secret").is_err());
    }

    #[test]
    fn out_of_range_ttl_is_an_error() {
        let config = AppConfig {
            jwt_ttl_hours: i64::MAX,
            ..AppConfig::default()
        };
        let user = User::default();
        assert!(matches!(issue_token(&user, &config), Err(AuthError::Signing)));
    }

    #[test]
    fn role_gates() {
        let manager = AuthUser {
            id: Uuid::nil(),
            role: UserRole::Manager,
        };
        assert!(manager.require_staff().is_ok());
        assert!(manager.require_admin().is_err());

        let customer = AuthUser {
            id: Uuid::nil(),
            role: UserRole::Customer,
        };
        assert!(customer.require_staff().is_err());
    }
}
