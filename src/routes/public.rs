use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Unauthenticated endpoints. Read handlers still resolve a `Viewer`, so an author calling
/// them with credentials sees their own hidden posts.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        .route("/health", get(|| async { "ok" }))
        // POST /register
        // Signs up with the identity provider and creates the local profile.
        .route("/register", post(handlers::register_user))
        // GET /posts?page=N
        // The index: published, already due posts in published (or no) categories.
        .route("/posts", get(handlers::list_posts))
        // GET /posts/{id}
        // Detail with comments; 404 for hidden posts unless the viewer is the author.
        .route("/posts/{id}", get(handlers::get_post_detail))
        // GET /category/{slug}?page=N
        .route("/category/{slug}", get(handlers::category_posts))
        // GET /profile/{username}?page=N
        // The owner sees drafts and scheduled posts as well.
        .route("/profile/{username}", get(handlers::user_profile))
}
