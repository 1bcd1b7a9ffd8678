use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::BlogResult,
    models::{
        Category, Comment, CreateCategoryRequest, CreateLocationRequest, CreatePostRequest,
        Location, Post, UpdatePostRequest, UpdateProfileRequest, User,
    },
    pagination::PageWindow,
    visibility::PostFilter,
};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

/// Repository Trait
///
/// The persistence contract. Methods here do no visibility or ownership checks of their
/// own: callers go through `visibility` first and pass the resulting `PostFilter` down.
///
/// **Send + Sync + async_trait** make `Arc<dyn Repository>` shareable across axum tasks.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: Uuid) -> BlogResult<Option<User>>;
    async fn get_user_by_username(&self, username: &str) -> BlogResult<Option<User>>;
    /// Fails with `Validation` when the username is taken.
    async fn create_user(&self, user: User) -> BlogResult<User>;
    async fn update_user(&self, id: Uuid, req: UpdateProfileRequest) -> BlogResult<Option<User>>;

    // --- Categories & Locations ---
    async fn get_category_by_slug(&self, slug: &str) -> BlogResult<Option<Category>>;
    /// Fails with `Validation` when the slug is taken.
    async fn create_category(&self, req: CreateCategoryRequest) -> BlogResult<Category>;
    async fn set_category_status(&self, slug: &str, is_published: bool)
    -> BlogResult<Option<Category>>;
    async fn create_location(&self, req: CreateLocationRequest) -> BlogResult<Location>;

    // --- Posts ---
    async fn count_posts(&self, filter: &PostFilter) -> BlogResult<u64>;
    /// Posts matching `filter`, newest `pub_date` first, optionally restricted to one page.
    async fn list_posts(
        &self,
        filter: &PostFilter,
        window: Option<PageWindow>,
    ) -> BlogResult<Vec<Post>>;
    /// Unfiltered lookup by id.
    async fn get_post(&self, id: i64) -> BlogResult<Option<Post>>;
    /// Fails with `Validation` when the category or location does not exist.
    async fn create_post(&self, req: CreatePostRequest, author_id: Uuid) -> BlogResult<Post>;
    async fn update_post(&self, id: i64, req: UpdatePostRequest) -> BlogResult<Option<Post>>;
    /// Removes the post and all of its comments. Returns false if nothing was deleted.
    async fn delete_post(&self, id: i64) -> BlogResult<bool>;

    // --- Comments ---
    /// Comments of a post, oldest first.
    async fn get_comments(&self, post_id: i64) -> BlogResult<Vec<Comment>>;
    async fn get_comment(&self, id: i64) -> BlogResult<Option<Comment>>;
    async fn add_comment(&self, post_id: i64, author_id: Uuid, text: String)
    -> BlogResult<Comment>;
    async fn update_comment(&self, id: i64, text: String) -> BlogResult<Option<Comment>>;
    async fn delete_comment(&self, id: i64) -> BlogResult<bool>;
}

/// RepositoryState
///
/// The shared handle to the persistence layer held by `AppState`.
pub type RepositoryState = Arc<dyn Repository>;
