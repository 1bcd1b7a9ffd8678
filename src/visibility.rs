//! Visibility policy: which posts a viewer may see, and who may change them.
//!
//! Non-authors see a post only when it is published, its `pub_date` has passed and its
//! category (if any) is published. Authors always see their own posts in the profile
//! and single-post scopes.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    auth::Viewer,
    error::{BlogError, BlogResult},
    models::{Category, Post, User},
    pagination::{Page, PageWindow},
    repository::Repository,
};

/// PostScope
///
/// The subset of posts a listing asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostScope {
    /// The public index.
    All,
    /// Posts of one category, addressed by slug.
    Category(String),
    /// Posts written by one user, addressed by username (the profile page).
    Author(String),
}

/// What a resolved scope points at, so handlers can render it next to the page.
#[derive(Debug, Clone, PartialEq)]
pub enum ScopeSubject {
    Index,
    Category(Category),
    Author(User),
}

/// PostFilter
///
/// A composable predicate over posts. The PostgreSQL repository translates it into WHERE
/// clauses; the in-memory repository evaluates `matches`. Both must agree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostFilter {
    pub author_id: Option<Uuid>,
    pub category_id: Option<i64>,
    /// When set, only posts publicly visible at this instant pass.
    pub visible_at: Option<DateTime<Utc>>,
}

impl PostFilter {
    /// Matches every post.
    pub fn everything() -> Self {
        Self::default()
    }

    /// Matches posts a non-author may see at `now`.
    pub fn visible_at(now: DateTime<Utc>) -> Self {
        Self {
            visible_at: Some(now),
            ..Self::default()
        }
    }

    pub fn by_author(mut self, author_id: Uuid) -> Self {
        self.author_id = Some(author_id);
        self
    }

    pub fn in_category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn matches(&self, post: &Post) -> bool {
        if let Some(author_id) = self.author_id {
            if post.author_id != author_id {
                return false;
            }
        }
        if let Some(category_id) = self.category_id {
            if post.category_id != Some(category_id) {
                return false;
            }
        }
        match self.visible_at {
            Some(now) => is_publicly_visible(post, now),
            None => true,
        }
    }
}

/// The non-author visibility rule.
pub fn is_publicly_visible(post: &Post, now: DateTime<Utc>) -> bool {
    post.is_published && post.pub_date <= now && post.category_is_published.unwrap_or(true)
}

/// Whether `viewer` may read `post` through a single-post lookup.
pub fn can_view(viewer: &Viewer, post: &Post, now: DateTime<Utc>) -> bool {
    viewer.is(post.author_id) || is_publicly_visible(post, now)
}

/// ensure_author
///
/// The mutation guard. Must be evaluated before any edit or delete of a post or comment;
/// a mismatch redirects back to the post detail instead of failing hard.
pub fn ensure_author(viewer_id: Uuid, author_id: Uuid, post_id: i64) -> BlogResult<()> {
    if viewer_id == author_id {
        Ok(())
    } else {
        tracing::info!(%viewer_id, post_id, "mutation refused: viewer is not the author");
        Err(BlogError::forbidden_for_post(post_id))
    }
}

/// resolve_scope
///
/// Turns a viewer and a scope into the filter to run, failing with `NotFound` when the
/// scope itself does not exist (unknown user, missing or hidden category).
pub async fn resolve_scope(
    repo: &dyn Repository,
    viewer: &Viewer,
    scope: &PostScope,
    now: DateTime<Utc>,
) -> BlogResult<(PostFilter, ScopeSubject)> {
    match scope {
        PostScope::All => Ok((PostFilter::visible_at(now), ScopeSubject::Index)),
        PostScope::Category(slug) => {
            let category = repo
                .get_category_by_slug(slug)
                .await?
                .filter(|c| c.is_published)
                .ok_or(BlogError::NotFound)?;
            let filter = PostFilter::visible_at(now).in_category(category.id);
            Ok((filter, ScopeSubject::Category(category)))
        }
        PostScope::Author(username) => {
            let user = repo
                .get_user_by_username(username)
                .await?
                .ok_or(BlogError::NotFound)?;
            // The owner sees drafts and scheduled posts on their own profile.
            let filter = if viewer.is(user.id) {
                PostFilter::everything().by_author(user.id)
            } else {
                PostFilter::visible_at(now).by_author(user.id)
            };
            Ok((filter, ScopeSubject::Author(user)))
        }
    }
}

/// visible_posts
///
/// All posts in `scope` that `viewer` may see, newest `pub_date` first.
pub async fn visible_posts(
    repo: &dyn Repository,
    viewer: &Viewer,
    scope: &PostScope,
    now: DateTime<Utc>,
) -> BlogResult<Vec<Post>> {
    let (filter, _) = resolve_scope(repo, viewer, scope, now).await?;
    repo.list_posts(&filter, None).await
}

/// visible_page
///
/// Same as `visible_posts`, but only fetches the requested page.
pub async fn visible_page(
    repo: &dyn Repository,
    viewer: &Viewer,
    scope: &PostScope,
    page_param: Option<&str>,
    page_size: u64,
    now: DateTime<Utc>,
) -> BlogResult<(ScopeSubject, Page<Post>)> {
    let (filter, subject) = resolve_scope(repo, viewer, scope, now).await?;
    let total = repo.count_posts(&filter).await?;
    let window = PageWindow::resolve(total, page_param, page_size);
    let items = repo.list_posts(&filter, Some(window)).await?;
    Ok((subject, Page::from_window(items, window)))
}

/// visible_post
///
/// Single-post lookup. Hidden posts are indistinguishable from missing ones for
/// everybody except their author.
pub async fn visible_post(
    repo: &dyn Repository,
    viewer: &Viewer,
    id: i64,
    now: DateTime<Utc>,
) -> BlogResult<Post> {
    repo.get_post(id)
        .await?
        .filter(|post| can_view(viewer, post, now))
        .ok_or(BlogError::NotFound)
}
