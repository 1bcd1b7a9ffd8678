use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::BlogError,
    pagination::Page,
    storage::{IMAGE_KEY_PREFIX, sanitize_key},
};

/// Column limit shared by post, category and location titles.
pub const MAX_TITLE_LEN: usize = 256;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// A row of the `profiles` table. The `id` is issued by the external identity provider;
/// everything else is owned by this service.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    // 'user' or 'admin'.
    pub role: String,
}

/// Category
///
/// A published/hidden grouping of posts, addressed in URLs by its unique `slug`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Category {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub slug: String,
    pub is_published: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Location {
    pub id: i64,
    pub name: String,
    pub is_published: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Post
///
/// A row of `posts`, enriched with the joined author, category and location columns and a
/// comment count. The joined category flag is what the visibility rules inspect.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub text: String,
    /// Publication moment. A future value schedules the post.
    #[ts(type = "string")]
    pub pub_date: DateTime<Utc>,
    pub author_id: Uuid,
    pub location_id: Option<i64>,
    pub category_id: Option<i64>,
    /// Object key of the uploaded image, if any.
    pub image: Option<String>,
    pub is_published: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,

    // Loaded via JOINs in the repository query.
    #[sqlx(default)]
    pub author_username: String,
    #[sqlx(default)]
    pub category_slug: Option<String>,
    #[sqlx(default)]
    pub category_title: Option<String>,
    #[sqlx(default)]
    pub category_is_published: Option<bool>,
    #[sqlx(default)]
    pub location_name: Option<String>,
    #[sqlx(default)]
    pub comment_count: i64,
}

/// Comment
///
/// A row of `comments` joined with the author's username. Immutable apart from `text`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author_id: Uuid,
    pub text: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[sqlx(default)]
    pub author_username: String,
}

// --- Request Payloads (Input Schemas) ---

fn default_true() -> bool {
    true
}

fn check_title(field: &str, value: &str) -> Result<(), BlogError> {
    if value.trim().is_empty() {
        return Err(BlogError::Validation(format!("{} must not be empty", field)));
    }
    if value.chars().count() > MAX_TITLE_LEN {
        return Err(BlogError::Validation(format!(
            "{} must be at most {} characters",
            field, MAX_TITLE_LEN
        )));
    }
    Ok(())
}

fn check_text(field: &str, value: &str) -> Result<(), BlogError> {
    if value.trim().is_empty() {
        return Err(BlogError::Validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

/// Posts may only point at keys issued by the presigned upload flow.
fn check_image_key(key: &str) -> Result<(), BlogError> {
    let issued = key
        .strip_prefix(IMAGE_KEY_PREFIX)
        .is_some_and(|name| !name.is_empty() && sanitize_key(key) == key && !name.contains('/'));
    if !issued {
        return Err(BlogError::Validation(format!(
            "image_key must be an uploaded {}* key",
            IMAGE_KEY_PREFIX
        )));
    }
    Ok(())
}

/// Slugs allow latin letters, digits, hyphen and underscore.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// CreatePostRequest
///
/// Input payload for `POST /posts`. The author is always the authenticated user.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreatePostRequest {
    pub title: String,
    pub text: String,
    #[ts(type = "string")]
    pub pub_date: DateTime<Utc>,
    #[serde(default)]
    pub location_id: Option<i64>,
    #[serde(default)]
    pub category_id: Option<i64>,
    /// Key returned by the presigned upload flow.
    #[serde(default)]
    pub image_key: Option<String>,
    #[serde(default = "default_true")]
    pub is_published: bool,
}

impl CreatePostRequest {
    pub fn validate(&self) -> Result<(), BlogError> {
        check_title("title", &self.title)?;
        check_text("text", &self.text)?;
        match &self.image_key {
            Some(key) => check_image_key(key),
            None => Ok(()),
        }
    }
}

/// UpdatePostRequest
///
/// Partial update for `PUT /posts/{id}`; absent fields are left untouched.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdatePostRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(type = "string | null")]
    pub pub_date: Option<DateTime<Utc>>,
    /// Absent: unchanged. `null`: cleared.
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    #[schema(value_type = Option<i64>)]
    #[ts(type = "number | null")]
    pub location_id: Option<Option<i64>>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    #[schema(value_type = Option<i64>)]
    #[ts(type = "number | null")]
    pub category_id: Option<Option<i64>>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    #[schema(value_type = Option<String>)]
    #[ts(type = "string | null")]
    pub image_key: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_published: Option<bool>,
}

/// Keeps an explicit JSON `null` apart from a missing field: a present field always
/// deserializes to `Some`, so `null` becomes `Some(None)`.
fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl UpdatePostRequest {
    pub fn validate(&self) -> Result<(), BlogError> {
        if let Some(title) = &self.title {
            check_title("title", title)?;
        }
        if let Some(text) = &self.text {
            check_text("text", text)?;
        }
        if let Some(Some(key)) = &self.image_key {
            check_image_key(key)?;
        }
        Ok(())
    }
}

/// CommentRequest
///
/// Body of both comment creation and comment edits; only the text is user-controlled.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CommentRequest {
    pub text: String,
}

impl CommentRequest {
    pub fn validate(&self) -> Result<(), BlogError> {
        check_text("text", &self.text)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateProfileRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl UpdateProfileRequest {
    pub fn validate(&self) -> Result<(), BlogError> {
        if let Some(email) = &self.email {
            if !email.contains('@') {
                return Err(BlogError::Validation("email is not valid".to_string()));
            }
        }
        Ok(())
    }
}

/// RegisterUserRequest
///
/// Input payload for `POST /register`. The password is forwarded to the identity provider
/// and never stored or logged here.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl RegisterUserRequest {
    pub fn validate(&self) -> Result<(), BlogError> {
        if !is_valid_slug(&self.username) {
            return Err(BlogError::Validation(
                "username may contain only latin letters, digits, '-' and '_'".to_string(),
            ));
        }
        if !self.email.contains('@') {
            return Err(BlogError::Validation("email is not valid".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateCategoryRequest {
    pub title: String,
    pub description: String,
    pub slug: String,
    #[serde(default = "default_true")]
    pub is_published: bool,
}

impl CreateCategoryRequest {
    pub fn validate(&self) -> Result<(), BlogError> {
        check_title("title", &self.title)?;
        if !is_valid_slug(&self.slug) {
            return Err(BlogError::Validation(
                "slug may contain only latin letters, digits, '-' and '_'".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateLocationRequest {
    pub name: String,
    #[serde(default = "default_true")]
    pub is_published: bool,
}

impl CreateLocationRequest {
    pub fn validate(&self) -> Result<(), BlogError> {
        check_title("name", &self.name)
    }
}

/// PresignedUrlRequest
///
/// Input payload for requesting a short-lived upload URL for a post image.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlRequest {
    #[schema(example = "sunset.jpg")]
    pub filename: String,
    /// Only `image/*` types are accepted.
    #[schema(example = "image/jpeg")]
    pub file_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlResponse {
    pub upload_url: String,
    /// Pass this back as `image_key` when creating or editing a post.
    pub resource_key: String,
}

// --- Output Schemas ---

/// UserProfile
///
/// Public view of a user. The email is withheld unless the viewer is looking at their own profile.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl UserProfile {
    pub fn public(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: None,
        }
    }

    pub fn private(user: &User) -> Self {
        Self {
            email: Some(user.email.clone()),
            ..Self::public(user)
        }
    }
}

/// PostDetail
///
/// Body of `GET /posts/{id}`: the post plus its comments, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PostDetail {
    pub post: Post,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CategoryPosts {
    pub category: Category,
    pub page: Page<Post>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProfilePosts {
    pub profile: UserProfile,
    pub page: Page<Post>,
}
