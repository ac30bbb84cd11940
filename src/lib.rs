use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod formatting;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod storage;

// Public and staff-guarded routers.
pub mod routes;
use auth::AuthUser;
use error::AppError;
use routes::{authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use storage::{MockStorageService, S3StorageClient, StorageState};

/// ApiDoc
///
/// OpenAPI document for every documented handler and schema, served at
/// `/api-docs/openapi.json` and browsable under `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::health, handlers::auth::login, handlers::auth::get_me,
        handlers::auth::change_password,
        handlers::dashboard::get_dashboard_stats,
        handlers::users::list_users, handlers::users::get_user, handlers::users::create_user,
        handlers::users::update_user, handlers::users::delete_user, handlers::users::restore_user,
        handlers::categories::list_categories, handlers::categories::get_category,
        handlers::categories::create_category, handlers::categories::update_category,
        handlers::categories::delete_category, handlers::categories::restore_category,
        handlers::products::list_products, handlers::products::get_product,
        handlers::products::create_product, handlers::products::update_product,
        handlers::products::delete_product, handlers::products::restore_product,
        handlers::orders::list_orders, handlers::orders::get_order, handlers::orders::create_order,
        handlers::orders::update_order_status, handlers::orders::delete_order,
        handlers::orders::restore_order,
        handlers::currencies::list_currencies, handlers::currencies::get_currency,
        handlers::currencies::create_currency, handlers::currencies::update_currency,
        handlers::currencies::delete_currency, handlers::currencies::set_default_currency,
        handlers::settings::get_settings, handlers::settings::update_settings,
        handlers::gallery::list_images, handlers::gallery::create_upload_url,
        handlers::gallery::register_image, handlers::gallery::delete_image,
    ),
    components(
        schemas(
            error::ErrorBody, handlers::auth::Health,
            models::UserProfile, models::UserRole, models::UserSort,
            models::CreateUserRequest, models::UpdateUserRequest, models::LoginRequest,
            models::LoginResponse, models::ChangePasswordRequest,
            models::Category, models::CreateCategoryRequest, models::UpdateCategoryRequest,
            models::Product, models::ProductColor, models::ProductStatus, models::ProductSort,
            models::ProductDetails, models::CreateProductRequest, models::UpdateProductRequest,
            models::Order, models::OrderItem, models::OrderStatus, models::OrderSort,
            models::CreateOrderRequest, models::CreateOrderItem, models::UpdateOrderStatusRequest,
            models::FormattedOrder, models::FormattedOrderItem, models::OrderCustomer,
            models::Currency, models::CreateCurrencyRequest, models::UpdateCurrencyRequest,
            models::StoreSettings, models::UpdateSettingsRequest,
            models::Image, models::UploadUrlRequest, models::UploadUrlResponse,
            models::RegisterImageRequest,
            models::DashboardStats, models::MonthlyRevenue, models::StatusCount,
            models::TopProduct, models::SortOrder,
        )
    ),
    tags(
        (name = "auth", description = "Health, login and the current session"),
        (name = "dashboard", description = "Store figures"),
        (name = "users", description = "Staff and customer accounts"),
        (name = "categories", description = "Product categories"),
        (name = "products", description = "Catalogue"),
        (name = "orders", description = "Order placement and lifecycle"),
        (name = "currencies", description = "Currencies and the default currency"),
        (name = "settings", description = "Store-wide settings"),
        (name = "gallery", description = "Product images and direct uploads"),
    )
)]
pub struct ApiDoc;

/// AppState
///
/// The single state container shared by every request: persistence, object
/// storage and the immutable configuration.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    pub storage: StorageState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// staff_middleware
///
/// Guards the authenticated router. Extracting `AuthUser` rejects missing or
/// invalid tokens with 401; callers who are not admin or manager get 403.
async fn staff_middleware(
    auth_user: AuthUser,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    auth_user.require_staff()?;
    Ok(next.run(request).await)
}

/// create_router
///
/// Assembles the routers, the staff guard, the documentation UI and the
/// request-id/tracing stack.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                staff_middleware,
            )),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Opens the per-request span. Every log line emitted while handling the
/// request carries the method, the URI and the `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
