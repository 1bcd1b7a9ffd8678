use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{post, put},
};

/// Admin Router Module
///
/// Category and location management. Nested under `/admin`; each handler checks the
/// 'admin' role of the resolved `AuthUser` itself.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // POST /admin/categories
        .route("/categories", post(handlers::create_category))
        // PUT /admin/categories/{slug}/status
        // Publishing or hiding a category changes the visibility of all its posts.
        .route(
            "/categories/{slug}/status",
            put(handlers::update_category_status),
        )
        // POST /admin/locations
        .route("/locations", post(handlers::create_location))
}
