use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde_json::json;
use thiserror::Error;

/// BlogError
///
/// The single error type flowing out of the repository, the visibility policy and the handlers.
/// Each variant maps onto exactly one HTTP outcome in `IntoResponse` below.
#[derive(Debug, Error)]
pub enum BlogError {
    /// The entity does not exist, or the visibility rules hide it from this viewer.
    #[error("not found")]
    NotFound,

    /// A non-author tried to change content. Surfaced as a redirect, not a hard error.
    #[error("only the author may modify this content")]
    Forbidden { redirect_to: String },

    #[error("authentication required")]
    Unauthorized,

    /// Authenticated, but the role does not grant access (admin routes).
    #[error("insufficient role")]
    InsufficientRole,

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("storage error: {0}")]
    Storage(String),

    /// The external identity provider rejected or failed the call.
    #[error("identity provider error: {0}")]
    Upstream(String),
}

impl BlogError {
    /// Redirect target used when a non-author attempts to mutate a post or one of its comments.
    pub fn forbidden_for_post(post_id: i64) -> Self {
        BlogError::Forbidden {
            redirect_to: format!("/posts/{}", post_id),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            BlogError::NotFound => StatusCode::NOT_FOUND,
            BlogError::Forbidden { .. } => StatusCode::SEE_OTHER,
            BlogError::Unauthorized => StatusCode::UNAUTHORIZED,
            BlogError::InsufficientRole => StatusCode::FORBIDDEN,
            BlogError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            BlogError::Upstream(_) => StatusCode::BAD_GATEWAY,
            BlogError::Database(_) | BlogError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for BlogError {
    fn into_response(self) -> Response {
        match self {
            BlogError::Forbidden { redirect_to } => {
                tracing::debug!(target = %redirect_to, "non-author mutation redirected");
                Redirect::to(&redirect_to).into_response()
            }
            BlogError::Database(ref e) => {
                // Internal details stay in the logs.
                tracing::error!("database error: {:?}", e);
                (self.status(), Json(json!({ "error": "internal error" }))).into_response()
            }
            BlogError::Storage(ref e) => {
                tracing::error!("storage error: {}", e);
                (self.status(), Json(json!({ "error": "internal error" }))).into_response()
            }
            other => {
                let status = other.status();
                (status, Json(json!({ "error": other.to_string() }))).into_response()
            }
        }
    }
}

pub type BlogResult<T> = Result<T, BlogError>;
