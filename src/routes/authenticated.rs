use crate::{
    AppState,
    handlers::{auth, categories, currencies, dashboard, gallery, orders, products, settings, users},
};
use axum::{
    Router,
    routing::{get, patch, post, put},
};

/// Authenticated Router Module
///
/// Every route here sits behind the staff guard, so handlers can assume an
/// admin or manager caller. Mutations reserved for administrators (user
/// management, restores, currencies, settings) check `require_admin` inside
/// the handler.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Session ---
        .route("/me", get(auth::get_me))
        .route("/me/password", put(auth::change_password))
        // GET /dashboard
        // Totals, revenue by month, top sellers and the five latest orders.
        .route("/dashboard", get(dashboard::get_dashboard_stats))
        // --- Users ---
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/{id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route("/users/{id}/restore", patch(users::restore_user))
        // --- Catalogue ---
        .route(
            "/categories",
            get(categories::list_categories).post(categories::create_category),
        )
        .route(
            "/categories/{id}",
            get(categories::get_category)
                .put(categories::update_category)
                .delete(categories::delete_category),
        )
        .route("/categories/{id}/restore", patch(categories::restore_category))
        .route(
            "/products",
            get(products::list_products).post(products::create_product),
        )
        .route(
            "/products/{id}",
            get(products::get_product)
                .put(products::update_product)
                .delete(products::delete_product),
        )
        .route("/products/{id}/restore", patch(products::restore_product))
        // --- Orders ---
        // POST /orders reserves stock atomically; PATCH .../status walks the
        // lifecycle and restocks on cancellation.
        .route("/orders", get(orders::list_orders).post(orders::create_order))
        .route(
            "/orders/{id}",
            get(orders::get_order).delete(orders::delete_order),
        )
        .route("/orders/{id}/status", patch(orders::update_order_status))
        .route("/orders/{id}/restore", patch(orders::restore_order))
        // --- Currencies ---
        .route(
            "/currencies",
            get(currencies::list_currencies).post(currencies::create_currency),
        )
        .route(
            "/currencies/{code}",
            get(currencies::get_currency)
                .put(currencies::update_currency)
                .delete(currencies::delete_currency),
        )
        .route(
            "/currencies/{code}/default",
            patch(currencies::set_default_currency),
        )
        // --- Settings ---
        .route(
            "/settings",
            get(settings::get_settings).put(settings::update_settings),
        )
        // --- Gallery ---
        // POST /gallery/upload-url
        // Presigned PUT URL (10 minutes) for a direct upload to the media bucket.
        // The client then registers the object with POST /gallery.
        .route("/gallery", get(gallery::list_images).post(gallery::register_image))
        .route("/gallery/upload-url", post(gallery::create_upload_url))
        .route("/gallery/{id}", axum::routing::delete(gallery::delete_image))
}
