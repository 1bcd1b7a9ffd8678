//! Runs against a real PostgreSQL database:
//! `DATABASE_URL=postgres://... cargo test -- --ignored`

use blogicum::{
    error::BlogError,
    models::{
        CreateCategoryRequest, CreateLocationRequest, CreatePostRequest, UpdatePostRequest,
        UpdateProfileRequest, User,
    },
    pagination::PageWindow,
    repository::{PostgresRepository, Repository},
    visibility::PostFilter,
};
use chrono::{Duration, Utc};
use sqlx::PgPool;
use tokio::test;
use uuid::Uuid;

// --- Test Context and Setup ---

struct DbTestContext {
    repo: PostgresRepository,
}

impl DbTestContext {
    async fn setup() -> Self {
        dotenv::dotenv().ok();

        let db_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set to run integration tests");

        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        let repo = PostgresRepository::new(pool);
        repo.migrate()
            .await
            .expect("Failed to run database migrations.");

        DbTestContext { repo }
    }
}

// --- Test Data Helpers ---

/// Usernames and slugs are unique per run so tests can share one database.
fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, &Uuid::new_v4().simple().to_string()[..12])
}

async fn create_test_user(repo: &PostgresRepository) -> User {
    let username = unique("user");
    repo.create_user(User {
        id: Uuid::new_v4(),
        email: format!("{}@test.com", username),
        username,
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        role: "user".to_string(),
    })
    .await
    .expect("create user")
}

fn post_request(title: &str, hours_from_now: i64) -> CreatePostRequest {
    CreatePostRequest {
        title: title.to_string(),
        text: "body".to_string(),
        pub_date: Utc::now() + Duration::hours(hours_from_now),
        location_id: None,
        category_id: None,
        image_key: None,
        is_published: true,
    }
}

// --- Tests ---

#[test]
#[ignore = "requires DATABASE_URL"]
async fn test_user_roundtrip_and_unique_username() {
    let ctx = DbTestContext::setup().await;
    let user = create_test_user(&ctx.repo).await;

    let by_name = ctx.repo.get_user_by_username(&user.username).await.unwrap();
    assert_eq!(by_name, Some(user.clone()));

    let duplicate = ctx
        .repo
        .create_user(User {
            id: Uuid::new_v4(),
            ..user.clone()
        })
        .await;
    assert!(matches!(duplicate, Err(BlogError::Validation(_))));

    let updated = ctx
        .repo
        .update_user(
            user.id,
            UpdateProfileRequest {
                first_name: Some("Renamed".to_string()),
                ..UpdateProfileRequest::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.first_name, "Renamed");
    assert_eq!(updated.last_name, "User");
}

#[test]
#[ignore = "requires DATABASE_URL"]
async fn test_visibility_filter_in_sql() {
    let ctx = DbTestContext::setup().await;
    let author = create_test_user(&ctx.repo).await;

    let hidden = ctx
        .repo
        .create_category(CreateCategoryRequest {
            title: "Hidden".to_string(),
            description: String::new(),
            slug: unique("hidden"),
            is_published: false,
        })
        .await
        .unwrap();
    let location = ctx
        .repo
        .create_location(CreateLocationRequest {
            name: "Moscow".to_string(),
            is_published: true,
        })
        .await
        .unwrap();

    let mut visible = post_request("visible", -2);
    visible.location_id = Some(location.id);
    let visible = ctx.repo.create_post(visible, author.id).await.unwrap();
    ctx.repo.create_post(post_request("scheduled", 2), author.id).await.unwrap();
    let mut in_hidden = post_request("in-hidden", -1);
    in_hidden.category_id = Some(hidden.id);
    ctx.repo.create_post(in_hidden, author.id).await.unwrap();

    let public = PostFilter::visible_at(Utc::now()).by_author(author.id);
    assert_eq!(ctx.repo.count_posts(&public).await.unwrap(), 1);
    let posts = ctx.repo.list_posts(&public, None).await.unwrap();
    assert_eq!(posts[0].id, visible.id);
    assert_eq!(posts[0].location_name.as_deref(), Some("Moscow"));
    assert_eq!(posts[0].author_username, author.username);

    let own = PostFilter::everything().by_author(author.id);
    let all = ctx.repo.list_posts(&own, None).await.unwrap();
    let titles: Vec<&str> = all.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["scheduled", "in-hidden", "visible"]);
}

#[test]
#[ignore = "requires DATABASE_URL"]
async fn test_list_posts_window() {
    let ctx = DbTestContext::setup().await;
    let author = create_test_user(&ctx.repo).await;
    for i in 0..5 {
        ctx.repo
            .create_post(post_request(&format!("p{}", i), -(i + 1)), author.id)
            .await
            .unwrap();
    }

    let filter = PostFilter::everything().by_author(author.id);
    let window = PageWindow::resolve(5, Some("2"), 2);
    let page = ctx.repo.list_posts(&filter, Some(window)).await.unwrap();
    let titles: Vec<&str> = page.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["p2", "p3"]);
}

#[test]
#[ignore = "requires DATABASE_URL"]
async fn test_partial_update_and_cascade_delete() {
    let ctx = DbTestContext::setup().await;
    let author = create_test_user(&ctx.repo).await;
    let commenter = create_test_user(&ctx.repo).await;
    let post = ctx
        .repo
        .create_post(post_request("original", -1), author.id)
        .await
        .unwrap();

    let updated = ctx
        .repo
        .update_post(
            post.id,
            UpdatePostRequest {
                text: Some("new body".to_string()),
                ..UpdatePostRequest::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.title, "original");
    assert_eq!(updated.text, "new body");

    let comment = ctx
        .repo
        .add_comment(post.id, commenter.id, "hi".to_string())
        .await
        .unwrap();
    assert_eq!(comment.author_username, commenter.username);
    let edited = ctx
        .repo
        .update_comment(comment.id, "hello".to_string())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(edited.text, "hello");
    assert_eq!(ctx.repo.get_post(post.id).await.unwrap().unwrap().comment_count, 1);

    assert!(ctx.repo.delete_post(post.id).await.unwrap());
    assert!(ctx.repo.get_comment(comment.id).await.unwrap().is_none());
    assert!(!ctx.repo.delete_post(post.id).await.unwrap());
}

#[test]
#[ignore = "requires DATABASE_URL"]
async fn test_post_with_missing_category_is_rejected() {
    let ctx = DbTestContext::setup().await;
    let author = create_test_user(&ctx.repo).await;
    let mut req = post_request("orphan", -1);
    req.category_id = Some(i64::MAX);

    let result = ctx.repo.create_post(req, author.id).await;
    assert!(matches!(result, Err(BlogError::Validation(_))));
}

#[test]
#[ignore = "requires DATABASE_URL"]
async fn test_update_post_null_clears_nullable_columns() {
    let ctx = DbTestContext::setup().await;
    let author = create_test_user(&ctx.repo).await;
    let location = ctx
        .repo
        .create_location(CreateLocationRequest {
            name: "Porto".to_string(),
            is_published: true,
        })
        .await
        .unwrap();

    let mut req = post_request("with location", -1);
    req.location_id = Some(location.id);
    req.image_key = Some("posts_images/p.png".to_string());
    let post = ctx.repo.create_post(req, author.id).await.unwrap();

    let cleared = ctx
        .repo
        .update_post(
            post.id,
            UpdatePostRequest {
                location_id: Some(None),
                ..UpdatePostRequest::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cleared.location_id, None);
    // Absent fields are untouched.
    assert_eq!(cleared.image.as_deref(), Some("posts_images/p.png"));
}
