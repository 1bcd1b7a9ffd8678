use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::Repository;
use crate::{
    error::{BlogError, BlogResult},
    models::{
        Category, Comment, CreateCategoryRequest, CreateLocationRequest, CreatePostRequest,
        Location, Post, UpdatePostRequest, UpdateProfileRequest, User,
    },
    pagination::PageWindow,
    visibility::PostFilter,
};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    categories: Vec<Category>,
    locations: Vec<Location>,
    // Stored without the joined columns; `enrich` fills them on read.
    posts: Vec<Post>,
    comments: Vec<Comment>,
    category_seq: i64,
    location_seq: i64,
    post_seq: i64,
    comment_seq: i64,
}

fn next_id(seq: &mut i64) -> i64 {
    *seq += 1;
    *seq
}

impl Tables {
    fn username_of(&self, id: Uuid) -> String {
        self.users
            .iter()
            .find(|u| u.id == id)
            .map(|u| u.username.clone())
            .unwrap_or_default()
    }

    /// Equivalent of the JOINs in the PostgreSQL post query.
    fn enrich(&self, post: &Post) -> Post {
        let category = post
            .category_id
            .and_then(|id| self.categories.iter().find(|c| c.id == id));
        let location = post
            .location_id
            .and_then(|id| self.locations.iter().find(|l| l.id == id));

        Post {
            author_username: self.username_of(post.author_id),
            category_slug: category.map(|c| c.slug.clone()),
            category_title: category.map(|c| c.title.clone()),
            category_is_published: category.map(|c| c.is_published),
            location_name: location.map(|l| l.name.clone()),
            comment_count: self.comments.iter().filter(|c| c.post_id == post.id).count() as i64,
            ..post.clone()
        }
    }

    fn enrich_comment(&self, comment: &Comment) -> Comment {
        Comment {
            author_username: self.username_of(comment.author_id),
            ..comment.clone()
        }
    }

    fn check_references(
        &self,
        category_id: Option<i64>,
        location_id: Option<i64>,
    ) -> BlogResult<()> {
        let category_missing =
            category_id.is_some_and(|id| !self.categories.iter().any(|c| c.id == id));
        let location_missing =
            location_id.is_some_and(|id| !self.locations.iter().any(|l| l.id == id));
        if category_missing || location_missing {
            return Err(BlogError::Validation(
                "post refers to a missing record".to_string(),
            ));
        }
        Ok(())
    }

    fn matching_posts(&self, filter: &PostFilter) -> Vec<Post> {
        let mut posts: Vec<Post> = self
            .posts
            .iter()
            .map(|p| self.enrich(p))
            .filter(|p| filter.matches(p))
            .collect();
        posts.sort_by(|a, b| b.pub_date.cmp(&a.pub_date).then(b.id.cmp(&a.id)));
        posts
    }
}

/// InMemoryRepository
///
/// A `Repository` kept entirely in process memory. Used by the test suite and when the
/// service runs locally without `DATABASE_URL`. Mirrors the PostgreSQL schema's
/// unique usernames and slugs, foreign references and cascading comment deletion.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: RwLock<Tables>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> BlogResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| BlogError::Storage("in-memory repository lock poisoned".to_string()))
    }

    fn write(&self) -> BlogResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| BlogError::Storage("in-memory repository lock poisoned".to_string()))
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_user(&self, id: Uuid) -> BlogResult<Option<User>> {
        Ok(self.read()?.users.iter().find(|u| u.id == id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> BlogResult<Option<User>> {
        Ok(self
            .read()?
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn create_user(&self, user: User) -> BlogResult<User> {
        let mut tables = self.write()?;
        if tables
            .users
            .iter()
            .any(|u| u.id == user.id || u.username == user.username)
        {
            return Err(BlogError::Validation("username already exists".to_string()));
        }
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn update_user(&self, id: Uuid, req: UpdateProfileRequest) -> BlogResult<Option<User>> {
        let mut tables = self.write()?;
        let Some(user) = tables.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(first_name) = req.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = req.last_name {
            user.last_name = last_name;
        }
        if let Some(email) = req.email {
            user.email = email;
        }
        Ok(Some(user.clone()))
    }

    async fn get_category_by_slug(&self, slug: &str) -> BlogResult<Option<Category>> {
        Ok(self
            .read()?
            .categories
            .iter()
            .find(|c| c.slug == slug)
            .cloned())
    }

    async fn create_category(&self, req: CreateCategoryRequest) -> BlogResult<Category> {
        let mut tables = self.write()?;
        if tables.categories.iter().any(|c| c.slug == req.slug) {
            return Err(BlogError::Validation("slug already exists".to_string()));
        }
        let category = Category {
            id: next_id(&mut tables.category_seq),
            title: req.title,
            description: req.description,
            slug: req.slug,
            is_published: req.is_published,
            created_at: Utc::now(),
        };
        tables.categories.push(category.clone());
        Ok(category)
    }

    async fn set_category_status(
        &self,
        slug: &str,
        is_published: bool,
    ) -> BlogResult<Option<Category>> {
        let mut tables = self.write()?;
        Ok(tables
            .categories
            .iter_mut()
            .find(|c| c.slug == slug)
            .map(|c| {
                c.is_published = is_published;
                c.clone()
            }))
    }

    async fn create_location(&self, req: CreateLocationRequest) -> BlogResult<Location> {
        let mut tables = self.write()?;
        let location = Location {
            id: next_id(&mut tables.location_seq),
            name: req.name,
            is_published: req.is_published,
            created_at: Utc::now(),
        };
        tables.locations.push(location.clone());
        Ok(location)
    }

    async fn count_posts(&self, filter: &PostFilter) -> BlogResult<u64> {
        Ok(self.read()?.matching_posts(filter).len() as u64)
    }

    async fn list_posts(
        &self,
        filter: &PostFilter,
        window: Option<PageWindow>,
    ) -> BlogResult<Vec<Post>> {
        let posts = self.read()?.matching_posts(filter);
        Ok(match window {
            Some(window) => posts
                .into_iter()
                .skip(window.offset() as usize)
                .take(window.limit() as usize)
                .collect(),
            None => posts,
        })
    }

    async fn get_post(&self, id: i64) -> BlogResult<Option<Post>> {
        let tables = self.read()?;
        Ok(tables
            .posts
            .iter()
            .find(|p| p.id == id)
            .map(|p| tables.enrich(p)))
    }

    async fn create_post(&self, req: CreatePostRequest, author_id: Uuid) -> BlogResult<Post> {
        let mut tables = self.write()?;
        tables.check_references(req.category_id, req.location_id)?;
        if !tables.users.iter().any(|u| u.id == author_id) {
            return Err(BlogError::Validation(
                "post refers to a missing record".to_string(),
            ));
        }

        let post = Post {
            id: next_id(&mut tables.post_seq),
            title: req.title,
            text: req.text,
            pub_date: req.pub_date,
            author_id,
            location_id: req.location_id,
            category_id: req.category_id,
            image: req.image_key,
            is_published: req.is_published,
            created_at: Utc::now(),
            ..Post::default()
        };
        tables.posts.push(post.clone());
        Ok(tables.enrich(&post))
    }

    async fn update_post(&self, id: i64, req: UpdatePostRequest) -> BlogResult<Option<Post>> {
        let mut tables = self.write()?;
        tables.check_references(req.category_id.flatten(), req.location_id.flatten())?;

        let Some(post) = tables.posts.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        if let Some(title) = req.title {
            post.title = title;
        }
        if let Some(text) = req.text {
            post.text = text;
        }
        if let Some(pub_date) = req.pub_date {
            post.pub_date = pub_date;
        }
        // An explicit null clears the column.
        if let Some(location_id) = req.location_id {
            post.location_id = location_id;
        }
        if let Some(category_id) = req.category_id {
            post.category_id = category_id;
        }
        if let Some(image) = req.image_key {
            post.image = image;
        }
        if let Some(is_published) = req.is_published {
            post.is_published = is_published;
        }
        let updated = post.clone();
        Ok(Some(tables.enrich(&updated)))
    }

    async fn delete_post(&self, id: i64) -> BlogResult<bool> {
        let mut tables = self.write()?;
        let before = tables.posts.len();
        tables.posts.retain(|p| p.id != id);
        if tables.posts.len() == before {
            return Ok(false);
        }
        // ON DELETE CASCADE
        tables.comments.retain(|c| c.post_id != id);
        Ok(true)
    }

    async fn get_comments(&self, post_id: i64) -> BlogResult<Vec<Comment>> {
        let tables = self.read()?;
        let mut comments: Vec<Comment> = tables
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .map(|c| tables.enrich_comment(c))
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(comments)
    }

    async fn get_comment(&self, id: i64) -> BlogResult<Option<Comment>> {
        let tables = self.read()?;
        Ok(tables
            .comments
            .iter()
            .find(|c| c.id == id)
            .map(|c| tables.enrich_comment(c)))
    }

    async fn add_comment(
        &self,
        post_id: i64,
        author_id: Uuid,
        text: String,
    ) -> BlogResult<Comment> {
        let mut tables = self.write()?;
        if !tables.posts.iter().any(|p| p.id == post_id) {
            return Err(BlogError::Validation(
                "comment refers to a missing record".to_string(),
            ));
        }
        let comment = Comment {
            id: next_id(&mut tables.comment_seq),
            post_id,
            author_id,
            text,
            created_at: Utc::now(),
            author_username: String::new(),
        };
        tables.comments.push(comment.clone());
        Ok(tables.enrich_comment(&comment))
    }

    async fn update_comment(&self, id: i64, text: String) -> BlogResult<Option<Comment>> {
        let mut tables = self.write()?;
        let Some(comment) = tables.comments.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        comment.text = text;
        let updated = comment.clone();
        Ok(Some(tables.enrich_comment(&updated)))
    }

    async fn delete_comment(&self, id: i64) -> BlogResult<bool> {
        let mut tables = self.write()?;
        let before = tables.comments.len();
        tables.comments.retain(|c| c.id != id);
        Ok(tables.comments.len() < before)
    }
}
