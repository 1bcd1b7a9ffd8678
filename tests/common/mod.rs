#![allow(dead_code)]

use std::sync::Arc;

use blogicum::{
    AppState,
    auth::{AuthUser, USER_ROLE, Viewer},
    config::AppConfig,
    models::{Category, CreateCategoryRequest, CreatePostRequest, Post, User},
    repository::{InMemoryRepository, Repository},
    storage::MockStorageService,
};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

pub fn test_state(repo: Arc<InMemoryRepository>) -> AppState {
    AppState {
        repo,
        storage: Arc::new(MockStorageService::new()),
        config: AppConfig::default(),
    }
}

pub async fn seed_user(repo: &dyn Repository, username: &str) -> User {
    repo.create_user(User {
        id: Uuid::new_v4(),
        username: username.to_string(),
        email: format!("{}@example.com", username),
        first_name: String::new(),
        last_name: String::new(),
        role: USER_ROLE.to_string(),
    })
    .await
    .expect("seed user")
}

pub async fn seed_category(repo: &dyn Repository, slug: &str, is_published: bool) -> Category {
    repo.create_category(CreateCategoryRequest {
        title: format!("Category {}", slug),
        description: "desc".to_string(),
        slug: slug.to_string(),
        is_published,
    })
    .await
    .expect("seed category")
}

pub fn post_request(title: &str, pub_date: DateTime<Utc>) -> CreatePostRequest {
    CreatePostRequest {
        title: title.to_string(),
        text: format!("{} body", title),
        pub_date,
        location_id: None,
        category_id: None,
        image_key: None,
        is_published: true,
    }
}

pub async fn seed_post(
    repo: &dyn Repository,
    author: &User,
    title: &str,
    pub_date: DateTime<Utc>,
) -> Post {
    repo.create_post(post_request(title, pub_date), author.id)
        .await
        .expect("seed post")
}

pub fn past(hours: i64) -> DateTime<Utc> {
    Utc::now() - Duration::hours(hours)
}

pub fn future(hours: i64) -> DateTime<Utc> {
    Utc::now() + Duration::hours(hours)
}

pub fn auth(user: &User) -> AuthUser {
    AuthUser {
        id: user.id,
        username: user.username.clone(),
        role: user.role.clone(),
    }
}

pub fn viewer(user: &User) -> Viewer {
    Viewer::Authenticated(auth(user))
}
