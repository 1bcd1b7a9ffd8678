use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Authenticated Router Module
///
/// Every handler here receives a validated `AuthUser`. Edits and deletes additionally
/// require the caller to be the author; other users are redirected to the post detail.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET/PUT /me
        .route("/me", get(handlers::get_me).put(handlers::update_me))
        // POST /upload/presigned
        // Presigned S3 URL for a post image.
        .route("/upload/presigned", post(handlers::get_presigned_url))
        // POST /posts
        .route("/posts", post(handlers::create_post))
        // PUT/DELETE /posts/{id}
        .route(
            "/posts/{id}",
            put(handlers::update_post).delete(handlers::delete_post),
        )
        // POST /posts/{id}/comments
        .route("/posts/{id}/comments", post(handlers::add_comment))
        // PUT/DELETE /posts/{id}/comments/{comment_id}
        .route(
            "/posts/{id}/comments/{comment_id}",
            put(handlers::update_comment).delete(handlers::delete_comment),
        )
}
