use crate::{
    AppState,
    auth::{AuthUser, USER_ROLE, Viewer},
    error::{BlogError, BlogResult},
    models::{
        Category, CategoryPosts, Comment, CommentRequest, CreateCategoryRequest,
        CreateLocationRequest, CreatePostRequest, Location, Post, PostDetail, PresignedUrlRequest,
        PresignedUrlResponse, ProfilePosts, RegisterUserRequest, UpdatePostRequest,
        UpdateProfileRequest, User, UserProfile,
    },
    pagination::{Page, PageQuery},
    storage::{image_object_key, is_allowed_image_type},
    visibility::{self, PostScope, ScopeSubject},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

/// Response of the identity provider's signup endpoint; only the issued id is used.
#[derive(Deserialize)]
struct SignupResponse {
    id: Uuid,
}

// --- Listings ---

/// list_posts
///
/// [Public Route] The index: every publicly visible post, newest first, one page at a time.
#[utoipa::path(
    get,
    path = "/posts",
    params(PageQuery),
    responses((status = 200, description = "A page of posts", body = Page<Post>))
)]
pub async fn list_posts(
    viewer: Viewer,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> BlogResult<Json<Page<Post>>> {
    let (_, page) = visibility::visible_page(
        state.repo.as_ref(),
        &viewer,
        &PostScope::All,
        query.page.as_deref(),
        state.config.posts_per_page,
        Utc::now(),
    )
    .await?;
    Ok(Json(page))
}

/// category_posts
///
/// [Public Route] Posts of one published category. Hidden or unknown categories are 404.
#[utoipa::path(
    get,
    path = "/category/{slug}",
    params(("slug" = String, Path, description = "Category slug"), PageQuery),
    responses(
        (status = 200, description = "Category and a page of its posts", body = CategoryPosts),
        (status = 404, description = "Category missing or unpublished")
    )
)]
pub async fn category_posts(
    viewer: Viewer,
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> BlogResult<Json<CategoryPosts>> {
    let (subject, page) = visibility::visible_page(
        state.repo.as_ref(),
        &viewer,
        &PostScope::Category(slug),
        query.page.as_deref(),
        state.config.posts_per_page,
        Utc::now(),
    )
    .await?;

    match subject {
        ScopeSubject::Category(category) => Ok(Json(CategoryPosts { category, page })),
        _ => Err(BlogError::NotFound),
    }
}

/// user_profile
///
/// [Public Route] A user's profile with their posts. The owner also sees their drafts and
/// scheduled posts, and their own email address.
#[utoipa::path(
    get,
    path = "/profile/{username}",
    params(("username" = String, Path, description = "Username"), PageQuery),
    responses(
        (status = 200, description = "Profile and a page of posts", body = ProfilePosts),
        (status = 404, description = "Unknown user")
    )
)]
pub async fn user_profile(
    viewer: Viewer,
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> BlogResult<Json<ProfilePosts>> {
    let (subject, page) = visibility::visible_page(
        state.repo.as_ref(),
        &viewer,
        &PostScope::Author(username),
        query.page.as_deref(),
        state.config.posts_per_page,
        Utc::now(),
    )
    .await?;

    let ScopeSubject::Author(user) = subject else {
        return Err(BlogError::NotFound);
    };
    let profile = if viewer.is(user.id) {
        UserProfile::private(&user)
    } else {
        UserProfile::public(&user)
    };
    Ok(Json(ProfilePosts { profile, page }))
}

// --- Post detail & authoring ---

/// get_post_detail
///
/// [Public Route] One post and its comments. Hidden posts are 404 for everyone but the author.
#[utoipa::path(
    get,
    path = "/posts/{id}",
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Found", body = PostDetail),
        (status = 404, description = "Missing or not visible")
    )
)]
pub async fn get_post_detail(
    viewer: Viewer,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> BlogResult<Json<PostDetail>> {
    let post = visibility::visible_post(state.repo.as_ref(), &viewer, id, Utc::now()).await?;
    let comments = state.repo.get_comments(post.id).await?;
    Ok(Json(PostDetail { post, comments }))
}

/// create_post
///
/// [Authenticated Route] The author is always the requesting user.
#[utoipa::path(
    post,
    path = "/posts",
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Created", body = Post),
        (status = 422, description = "Invalid post")
    )
)]
pub async fn create_post(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreatePostRequest>,
) -> BlogResult<(StatusCode, Json<Post>)> {
    payload.validate()?;
    let post = state.repo.create_post(payload, id).await?;
    tracing::info!(post_id = post.id, author = %id, "post created");
    Ok((StatusCode::CREATED, Json(post)))
}

/// update_post
///
/// [Authenticated Route] Author-only. Anyone else is redirected to the post detail and
/// the post is left untouched.
#[utoipa::path(
    put,
    path = "/posts/{id}",
    params(("id" = i64, Path, description = "Post ID")),
    request_body = UpdatePostRequest,
    responses(
        (status = 200, description = "Updated", body = Post),
        (status = 303, description = "Not the author; redirected to the post"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_post(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdatePostRequest>,
) -> BlogResult<Json<Post>> {
    let post = state.repo.get_post(id).await?.ok_or(BlogError::NotFound)?;
    visibility::ensure_author(user_id, post.author_id, post.id)?;
    payload.validate()?;

    let updated = state
        .repo
        .update_post(id, payload)
        .await?
        .ok_or(BlogError::NotFound)?;
    Ok(Json(updated))
}

/// delete_post
///
/// [Authenticated Route] Author-only; removes the post together with its comments.
#[utoipa::path(
    delete,
    path = "/posts/{id}",
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 303, description = "Not the author; redirected to the post"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_post(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> BlogResult<StatusCode> {
    let post = state.repo.get_post(id).await?.ok_or(BlogError::NotFound)?;
    visibility::ensure_author(user_id, post.author_id, post.id)?;

    if state.repo.delete_post(id).await? {
        tracing::info!(post_id = id, "post deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(BlogError::NotFound)
    }
}

// --- Comments ---

/// add_comment
///
/// [Authenticated Route] Comments can only be left on posts the commenter can see.
#[utoipa::path(
    post,
    path = "/posts/{id}/comments",
    params(("id" = i64, Path, description = "Post ID")),
    request_body = CommentRequest,
    responses(
        (status = 201, description = "Comment Added", body = Comment),
        (status = 404, description = "Post missing or not visible")
    )
)]
pub async fn add_comment(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<CommentRequest>,
) -> BlogResult<(StatusCode, Json<Comment>)> {
    let author_id = auth_user.id;
    let viewer = Viewer::from(auth_user);
    let post = visibility::visible_post(state.repo.as_ref(), &viewer, id, Utc::now()).await?;
    payload.validate()?;

    let comment = state
        .repo
        .add_comment(post.id, author_id, payload.text)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// Loads a comment addressed through its post, refusing comments of other posts.
async fn comment_of_post(state: &AppState, post_id: i64, comment_id: i64) -> BlogResult<Comment> {
    state
        .repo
        .get_comment(comment_id)
        .await?
        .filter(|c| c.post_id == post_id)
        .ok_or(BlogError::NotFound)
}

/// update_comment
///
/// [Authenticated Route] Author-only; other users are redirected to the post.
#[utoipa::path(
    put,
    path = "/posts/{id}/comments/{comment_id}",
    params(
        ("id" = i64, Path, description = "Post ID"),
        ("comment_id" = i64, Path, description = "Comment ID")
    ),
    request_body = CommentRequest,
    responses(
        (status = 200, description = "Updated", body = Comment),
        (status = 303, description = "Not the author; redirected to the post"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_comment(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path((id, comment_id)): Path<(i64, i64)>,
    Json(payload): Json<CommentRequest>,
) -> BlogResult<Json<Comment>> {
    let comment = comment_of_post(&state, id, comment_id).await?;
    visibility::ensure_author(user_id, comment.author_id, id)?;
    payload.validate()?;

    let updated = state
        .repo
        .update_comment(comment_id, payload.text)
        .await?
        .ok_or(BlogError::NotFound)?;
    Ok(Json(updated))
}

/// delete_comment
///
/// [Authenticated Route] Author-only; other users are redirected to the post.
#[utoipa::path(
    delete,
    path = "/posts/{id}/comments/{comment_id}",
    params(
        ("id" = i64, Path, description = "Post ID"),
        ("comment_id" = i64, Path, description = "Comment ID")
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 303, description = "Not the author; redirected to the post"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_comment(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path((id, comment_id)): Path<(i64, i64)>,
) -> BlogResult<StatusCode> {
    let comment = comment_of_post(&state, id, comment_id).await?;
    visibility::ensure_author(user_id, comment.author_id, id)?;

    if state.repo.delete_comment(comment_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(BlogError::NotFound)
    }
}

// --- Profiles & registration ---

/// get_me
///
/// [Authenticated Route] The requesting user's own profile, email included.
#[utoipa::path(
    get,
    path = "/me",
    responses((status = 200, description = "Profile", body = UserProfile))
)]
pub async fn get_me(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> BlogResult<Json<UserProfile>> {
    let user = state.repo.get_user(id).await?.ok_or(BlogError::NotFound)?;
    Ok(Json(UserProfile::private(&user)))
}

/// update_me
///
/// [Authenticated Route] Edits the requesting user's names and email. There is no way to
/// edit somebody else's profile.
#[utoipa::path(
    put,
    path = "/me",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated", body = UserProfile),
        (status = 422, description = "Invalid profile")
    )
)]
pub async fn update_me(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateProfileRequest>,
) -> BlogResult<Json<UserProfile>> {
    payload.validate()?;
    let user = state
        .repo
        .update_user(id, payload)
        .await?
        .ok_or(BlogError::NotFound)?;
    Ok(Json(UserProfile::private(&user)))
}

/// register_user
///
/// [Public Route] Creates the identity with the external provider, then mirrors it into
/// `profiles` under the provider-issued id. Passwords never touch this service's storage.
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "Registered", body = UserProfile),
        (status = 422, description = "Invalid or taken username"),
        (status = 502, description = "Identity provider refused or unavailable")
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterUserRequest>,
) -> BlogResult<(StatusCode, Json<UserProfile>)> {
    payload.validate()?;

    let (Some(provider_url), Some(provider_key)) = (
        state.config.auth_provider_url.as_deref(),
        state.config.auth_provider_key.as_deref(),
    ) else {
        return Err(BlogError::Upstream("registration is not configured".to_string()));
    };

    if state
        .repo
        .get_user_by_username(&payload.username)
        .await?
        .is_some()
    {
        return Err(BlogError::Validation("username already exists".to_string()));
    }

    let response = reqwest::Client::new()
        .post(format!("{}/auth/v1/signup", provider_url.trim_end_matches('/')))
        .header("apikey", provider_key)
        .json(&serde_json::json!({ "email": payload.email, "password": payload.password }))
        .send()
        .await
        .map_err(|e| BlogError::Upstream(e.to_string()))?;

    if !response.status().is_success() {
        tracing::warn!(status = %response.status(), "identity provider rejected signup");
        return Err(BlogError::Upstream(format!(
            "signup rejected with status {}",
            response.status()
        )));
    }

    let signup = response
        .json::<SignupResponse>()
        .await
        .map_err(|e| BlogError::Upstream(e.to_string()))?;

    let user = state
        .repo
        .create_user(User {
            id: signup.id,
            username: payload.username,
            email: payload.email,
            first_name: payload.first_name,
            last_name: payload.last_name,
            role: USER_ROLE.to_string(),
        })
        .await
        .inspect_err(|e| {
            // The provider identity exists but has no profile; it needs manual cleanup.
            tracing::error!(
                provider_id = %signup.id,
                "profile creation after signup failed: {}",
                e
            );
        })?;

    tracing::info!(user_id = %user.id, username = %user.username, "user registered");
    Ok((StatusCode::CREATED, Json(UserProfile::private(&user))))
}

// --- Media ---

/// get_presigned_url
///
/// [Authenticated Route] A short-lived upload URL for a post image. The returned
/// `resource_key` goes into `image_key` when creating or editing the post.
#[utoipa::path(
    post,
    path = "/upload/presigned",
    request_body = PresignedUrlRequest,
    responses(
        (status = 200, description = "URL", body = PresignedUrlResponse),
        (status = 422, description = "Not an image type")
    )
)]
pub async fn get_presigned_url(
    AuthUser { id: _user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<PresignedUrlRequest>,
) -> BlogResult<Json<PresignedUrlResponse>> {
    if !is_allowed_image_type(&payload.file_type) {
        return Err(BlogError::Validation(format!(
            "unsupported image type {:?}",
            payload.file_type
        )));
    }

    let object_key = image_object_key(&payload.filename, Uuid::new_v4());
    let upload_url = state
        .storage
        .get_presigned_upload_url(&object_key, &payload.file_type)
        .await?;

    Ok(Json(PresignedUrlResponse {
        upload_url,
        resource_key: object_key,
    }))
}

// --- Admin ---

/// create_category
///
/// [Admin Route] Adds a category.
#[utoipa::path(
    post,
    path = "/admin/categories",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Created", body = Category),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn create_category(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateCategoryRequest>,
) -> BlogResult<(StatusCode, Json<Category>)> {
    auth_user.require_admin()?;
    payload.validate()?;
    let category = state.repo.create_category(payload).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// update_category_status
///
/// [Admin Route] Publishes or hides a category. Hiding it hides all of its posts from
/// non-authors.
#[utoipa::path(
    put,
    path = "/admin/categories/{slug}/status",
    params(("slug" = String, Path, description = "Category slug")),
    request_body = bool,
    responses(
        (status = 200, description = "Updated", body = Category),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_category_status(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(is_published): Json<bool>,
) -> BlogResult<Json<Category>> {
    auth_user.require_admin()?;
    let category = state
        .repo
        .set_category_status(&slug, is_published)
        .await?
        .ok_or(BlogError::NotFound)?;
    Ok(Json(category))
}

/// create_location
///
/// [Admin Route] Adds a location posts can refer to.
#[utoipa::path(
    post,
    path = "/admin/locations",
    request_body = CreateLocationRequest,
    responses(
        (status = 201, description = "Created", body = Location),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn create_location(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateLocationRequest>,
) -> BlogResult<(StatusCode, Json<Location>)> {
    auth_user.require_admin()?;
    payload.validate()?;
    let location = state.repo.create_location(payload).await?;
    Ok((StatusCode::CREATED, Json(location)))
}
