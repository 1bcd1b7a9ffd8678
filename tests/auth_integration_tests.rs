mod common;

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{Method, Request, StatusCode, Uri, header, request::Parts},
};
use blogicum::{
    AppState,
    auth::{AuthUser, Claims, Viewer},
    config::{AppConfig, Env},
    error::{BlogError, BlogResult},
    models::{
        Category, Comment, CreateCategoryRequest, CreateLocationRequest, CreatePostRequest,
        Location, Post, UpdatePostRequest, UpdateProfileRequest, User,
    },
    pagination::PageWindow,
    repository::{InMemoryRepository, Repository},
    storage::MockStorageService,
    visibility::PostFilter,
};
use common::seed_user;
use jsonwebtoken::{EncodingKey, Header, encode};
use std::{sync::Arc, time::SystemTime};
use uuid::Uuid;

const TEST_JWT_SECRET: &str = "auth-test-secret";

fn create_token(user_id: Uuid, secret: &str, exp_offset: i64) -> String {
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;

    let claims = Claims {
        sub: user_id,
        iat: now as usize,
        exp: (now + exp_offset) as usize,
    };

    let key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), &claims, &key).unwrap()
}

// --- Repository whose every call fails ---

struct UnavailableRepo;

fn unavailable<T>() -> BlogResult<T> {
    Err(BlogError::Storage("repository unavailable".to_string()))
}

#[async_trait]
impl Repository for UnavailableRepo {
    async fn get_user(&self, _id: Uuid) -> BlogResult<Option<User>> {
        unavailable()
    }
    async fn get_user_by_username(&self, _username: &str) -> BlogResult<Option<User>> {
        unavailable()
    }
    async fn create_user(&self, _user: User) -> BlogResult<User> {
        unavailable()
    }
    async fn update_user(&self, _id: Uuid, _req: UpdateProfileRequest) -> BlogResult<Option<User>> {
        unavailable()
    }
    async fn get_category_by_slug(&self, _slug: &str) -> BlogResult<Option<Category>> {
        unavailable()
    }
    async fn create_category(&self, _req: CreateCategoryRequest) -> BlogResult<Category> {
        unavailable()
    }
    async fn set_category_status(
        &self,
        _slug: &str,
        _is_published: bool,
    ) -> BlogResult<Option<Category>> {
        unavailable()
    }
    async fn create_location(&self, _req: CreateLocationRequest) -> BlogResult<Location> {
        unavailable()
    }
    async fn count_posts(&self, _filter: &PostFilter) -> BlogResult<u64> {
        unavailable()
    }
    async fn list_posts(
        &self,
        _filter: &PostFilter,
        _window: Option<PageWindow>,
    ) -> BlogResult<Vec<Post>> {
        unavailable()
    }
    async fn get_post(&self, _id: i64) -> BlogResult<Option<Post>> {
        unavailable()
    }
    async fn create_post(&self, _req: CreatePostRequest, _author_id: Uuid) -> BlogResult<Post> {
        unavailable()
    }
    async fn update_post(&self, _id: i64, _req: UpdatePostRequest) -> BlogResult<Option<Post>> {
        unavailable()
    }
    async fn delete_post(&self, _id: i64) -> BlogResult<bool> {
        unavailable()
    }
    async fn get_comments(&self, _post_id: i64) -> BlogResult<Vec<Comment>> {
        unavailable()
    }
    async fn get_comment(&self, _id: i64) -> BlogResult<Option<Comment>> {
        unavailable()
    }
    async fn add_comment(
        &self,
        _post_id: i64,
        _author_id: Uuid,
        _text: String,
    ) -> BlogResult<Comment> {
        unavailable()
    }
    async fn update_comment(&self, _id: i64, _text: String) -> BlogResult<Option<Comment>> {
        unavailable()
    }
    async fn delete_comment(&self, _id: i64) -> BlogResult<bool> {
        unavailable()
    }
}

fn create_app_state(env: Env, repo: Arc<dyn Repository>) -> AppState {
    let config = AppConfig {
        env,
        jwt_secret: TEST_JWT_SECRET.to_string(),
        ..AppConfig::default()
    };

    AppState {
        repo,
        storage: Arc::new(MockStorageService::new()),
        config,
    }
}

fn get_request_parts(method: Method, uri: Uri) -> Parts {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let (parts, _) = request.into_parts();
    parts
}

fn with_bearer(parts: &mut Parts, token: &str) {
    parts.headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );
}

fn with_bypass(parts: &mut Parts, user_id: Uuid) {
    parts.headers.insert(
        header::HeaderName::from_static("x-user-id"),
        header::HeaderValue::from_str(&user_id.to_string()).unwrap(),
    );
}

// --- Tests ---

#[tokio::test]
async fn test_auth_success_with_valid_jwt() {
    let repo = Arc::new(InMemoryRepository::new());
    let alice = seed_user(repo.as_ref(), "alice").await;
    let app_state = create_app_state(Env::Production, repo);

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_bearer(&mut parts, &create_token(alice.id, TEST_JWT_SECRET, 3600));

    let user = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap();
    assert_eq!(user.id, alice.id);
    assert_eq!(user.username, "alice");
    assert_eq!(user.role, "user");
}

#[tokio::test]
async fn test_auth_failure_with_missing_header() {
    let app_state = create_app_state(Env::Production, Arc::new(InMemoryRepository::new()));
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;
    assert!(matches!(auth_user, Err(BlogError::Unauthorized)));
}

#[tokio::test]
async fn test_auth_failure_with_wrong_secret() {
    let repo = Arc::new(InMemoryRepository::new());
    let alice = seed_user(repo.as_ref(), "alice").await;
    let app_state = create_app_state(Env::Production, repo);

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_bearer(&mut parts, &create_token(alice.id, "someone-else", 3600));

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;
    assert!(matches!(auth_user, Err(BlogError::Unauthorized)));
}

#[tokio::test]
async fn test_auth_failure_with_expired_jwt() {
    let repo = Arc::new(InMemoryRepository::new());
    let alice = seed_user(repo.as_ref(), "alice").await;
    let app_state = create_app_state(Env::Production, repo);

    // Well past the default 60s leeway.
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_bearer(&mut parts, &create_token(alice.id, TEST_JWT_SECRET, -3600));

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;
    assert!(matches!(auth_user, Err(BlogError::Unauthorized)));
}

#[tokio::test]
async fn test_auth_failure_for_unknown_profile() {
    let app_state = create_app_state(Env::Production, Arc::new(InMemoryRepository::new()));

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_bearer(&mut parts, &create_token(Uuid::new_v4(), TEST_JWT_SECRET, 3600));

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;
    assert!(matches!(auth_user, Err(BlogError::Unauthorized)));
}

#[tokio::test]
async fn test_local_bypass_success() {
    let repo = Arc::new(InMemoryRepository::new());
    let alice = seed_user(repo.as_ref(), "alice").await;
    let app_state = create_app_state(Env::Local, repo);

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_bypass(&mut parts, alice.id);

    let user = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap();
    assert_eq!(user.id, alice.id);
}

#[tokio::test]
async fn test_local_bypass_requires_existing_profile() {
    let app_state = create_app_state(Env::Local, Arc::new(InMemoryRepository::new()));

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_bypass(&mut parts, Uuid::new_v4());

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;
    assert!(matches!(auth_user, Err(BlogError::Unauthorized)));
}

#[tokio::test]
async fn test_local_bypass_disabled_in_prod() {
    let repo = Arc::new(InMemoryRepository::new());
    let alice = seed_user(repo.as_ref(), "alice").await;
    let app_state = create_app_state(Env::Production, repo);

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    // Only the bypass header, no token.
    with_bypass(&mut parts, alice.id);

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;
    assert!(matches!(auth_user, Err(BlogError::Unauthorized)));
}

#[tokio::test]
async fn test_viewer_falls_back_to_anonymous() {
    let app_state = create_app_state(Env::Production, Arc::new(InMemoryRepository::new()));

    let mut parts = get_request_parts(Method::GET, "/posts".parse().unwrap());
    with_bearer(&mut parts, "not-a-jwt");

    let viewer = Viewer::from_request_parts(&mut parts, &app_state).await.unwrap();
    assert_eq!(viewer, Viewer::Anonymous);
    assert_eq!(viewer.id(), None);
}

#[tokio::test]
async fn test_viewer_resolves_authenticated_user() {
    let repo = Arc::new(InMemoryRepository::new());
    let alice = seed_user(repo.as_ref(), "alice").await;
    let app_state = create_app_state(Env::Production, repo);

    let mut parts = get_request_parts(Method::GET, "/posts".parse().unwrap());
    with_bearer(&mut parts, &create_token(alice.id, TEST_JWT_SECRET, 3600));

    let viewer = Viewer::from_request_parts(&mut parts, &app_state).await.unwrap();
    assert!(viewer.is(alice.id));
}

#[test]
fn test_require_admin() {
    let mut user = AuthUser {
        id: Uuid::new_v4(),
        username: "root".to_string(),
        role: "user".to_string(),
    };
    assert!(matches!(user.require_admin(), Err(BlogError::InsufficientRole)));

    user.role = "admin".to_string();
    assert!(user.require_admin().is_ok());
}

#[tokio::test]
async fn test_repository_failure_is_not_reported_as_unauthorized() {
    let app_state = create_app_state(Env::Production, Arc::new(UnavailableRepo));

    let mut parts = get_request_parts(Method::GET, "/me".parse().unwrap());
    with_bearer(&mut parts, &create_token(Uuid::new_v4(), TEST_JWT_SECRET, 3600));

    let err = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap_err();
    assert!(matches!(err, BlogError::Storage(_)));
    assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_local_bypass_repository_failure_falls_through_to_jwt() {
    let app_state = create_app_state(Env::Local, Arc::new(UnavailableRepo));

    let mut parts = get_request_parts(Method::GET, "/me".parse().unwrap());
    with_bypass(&mut parts, Uuid::new_v4());

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;
    assert!(matches!(auth_user, Err(BlogError::Unauthorized)));
}

#[tokio::test]
async fn test_viewer_is_anonymous_when_repository_fails() {
    let app_state = create_app_state(Env::Production, Arc::new(UnavailableRepo));

    let mut parts = get_request_parts(Method::GET, "/posts/1".parse().unwrap());
    with_bearer(&mut parts, &create_token(Uuid::new_v4(), TEST_JWT_SECRET, 3600));

    let viewer = Viewer::from_request_parts(&mut parts, &app_state).await.unwrap();
    assert_eq!(viewer, Viewer::Anonymous);
}
