use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a token.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers and the dashboard's status badge.
        .route("/health", get(handlers::auth::health))
        // POST /auth/login
        // Exchanges staff credentials for a bearer token. Customers are refused.
        .route("/auth/login", post(handlers::auth::login))
}
