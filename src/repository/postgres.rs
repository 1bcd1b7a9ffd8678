use async_trait::async_trait;
use sqlx::{PgPool, Postgres, query_builder::QueryBuilder};
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

/// Columns of an enriched `Post` row. Every post query selects from `POST_FROM`.
const POST_COLUMNS: &str = r#"
    SELECT
        p.id, p.title, p.text, p.pub_date, p.author_id, p.location_id, p.category_id,
        p.image, p.is_published, p.created_at,
        u.username AS author_username,
        c.slug AS category_slug,
        c.title AS category_title,
        c.is_published AS category_is_published,
        l.name AS location_name,
        (SELECT COUNT(*) FROM comments cm WHERE cm.post_id = p.id) AS comment_count
"#;

const POST_FROM: &str = r#"
    FROM posts p
    JOIN profiles u ON u.id = p.author_id
    LEFT JOIN categories c ON c.id = p.category_id
    LEFT JOIN locations l ON l.id = p.location_id
"#;

const COMMENT_SELECT: &str = r#"
    SELECT cm.id, cm.post_id, cm.author_id, cm.text, cm.created_at, u.username AS author_username
    FROM comments cm
    JOIN profiles u ON u.id = cm.author_id
"#;

const USER_COLUMNS: &str = "id, username, email, first_name, last_name, role";
const CATEGORY_COLUMNS: &str = "id, title, description, slug, is_published, created_at";

/// push_filter
///
/// Appends the WHERE clause equivalent of `PostFilter::matches`.
/// Expects `p` (posts) and `c` (categories, LEFT JOINed) to be in scope.
fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &PostFilter) {
    builder.push(" WHERE TRUE");

    if let Some(author_id) = filter.author_id {
        builder.push(" AND p.author_id = ");
        builder.push_bind(author_id);
    }

    if let Some(category_id) = filter.category_id {
        builder.push(" AND p.category_id = ");
        builder.push_bind(category_id);
    }

    if let Some(now) = filter.visible_at {
        builder.push(" AND p.is_published = TRUE AND p.pub_date <= ");
        builder.push_bind(now);
        builder.push(" AND (p.category_id IS NULL OR c.is_published = TRUE)");
    }
}

/// Maps constraint violations onto validation errors; everything else stays a database error.
fn constraint_error(e: sqlx::Error, what: &str) -> BlogError {
    let violation = e
        .as_database_error()
        .map(|db| (db.is_unique_violation(), db.is_foreign_key_violation()));

    match violation {
        Some((true, _)) => BlogError::Validation(format!("{} already exists", what)),
        Some((_, true)) => BlogError::Validation(format!("{} refers to a missing record", what)),
        _ => BlogError::Database(e),
    }
}

/// PostgresRepository
///
/// The `Repository` implementation backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs the embedded migrations in `./migrations`.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: Uuid) -> BlogResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM profiles WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn get_user_by_username(&self, username: &str) -> BlogResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM profiles WHERE username = $1",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create_user(&self, user: User) -> BlogResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO profiles ({cols}) VALUES ($1, $2, $3, $4, $5, $6) RETURNING {cols}",
            cols = USER_COLUMNS
        ))
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| constraint_error(e, "username"))
    }

    /// update_user
    ///
    /// Partial profile update; COALESCE keeps columns whose field is `None`.
    async fn update_user(&self, id: Uuid, req: UpdateProfileRequest) -> BlogResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE profiles
            SET first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                email = COALESCE($4, email)
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .bind(req.first_name)
        .bind(req.last_name)
        .bind(req.email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn get_category_by_slug(&self, slug: &str) -> BlogResult<Option<Category>> {
        let category = sqlx::query_as::<_, Category>(&format!(
            "SELECT {} FROM categories WHERE slug = $1",
            CATEGORY_COLUMNS
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(category)
    }

    async fn create_category(&self, req: CreateCategoryRequest) -> BlogResult<Category> {
        sqlx::query_as::<_, Category>(&format!(
            r#"
            INSERT INTO categories (title, description, slug, is_published)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            CATEGORY_COLUMNS
        ))
        .bind(req.title)
        .bind(req.description)
        .bind(req.slug)
        .bind(req.is_published)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| constraint_error(e, "slug"))
    }

    async fn set_category_status(
        &self,
        slug: &str,
        is_published: bool,
    ) -> BlogResult<Option<Category>> {
        let category = sqlx::query_as::<_, Category>(&format!(
            "UPDATE categories SET is_published = $1 WHERE slug = $2 RETURNING {}",
            CATEGORY_COLUMNS
        ))
        .bind(is_published)
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(category)
    }

    async fn create_location(&self, req: CreateLocationRequest) -> BlogResult<Location> {
        let location = sqlx::query_as::<_, Location>(
            r#"
            INSERT INTO locations (name, is_published) VALUES ($1, $2)
            RETURNING id, name, is_published, created_at
            "#,
        )
        .bind(req.name)
        .bind(req.is_published)
        .fetch_one(&self.pool)
        .await?;
        Ok(location)
    }

    async fn count_posts(&self, filter: &PostFilter) -> BlogResult<u64> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT COUNT(*) FROM posts p LEFT JOIN categories c ON c.id = p.category_id",
        );
        push_filter(&mut builder, filter);

        let count = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    /// list_posts
    ///
    /// Filter composition happens in `push_filter`; values are always bound, never interpolated.
    async fn list_posts(
        &self,
        filter: &PostFilter,
        window: Option<PageWindow>,
    ) -> BlogResult<Vec<Post>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(POST_COLUMNS);
        builder.push(POST_FROM);
        push_filter(&mut builder, filter);
        builder.push(" ORDER BY p.pub_date DESC, p.id DESC");

        if let Some(window) = window {
            builder.push(" LIMIT ");
            builder.push_bind(window.limit() as i64);
            builder.push(" OFFSET ");
            builder.push_bind(window.offset() as i64);
        }

        let posts = builder
            .build_query_as::<Post>()
            .fetch_all(&self.pool)
            .await?;
        Ok(posts)
    }

    async fn get_post(&self, id: i64) -> BlogResult<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(&format!(
            "{} {} WHERE p.id = $1",
            POST_COLUMNS, POST_FROM
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(post)
    }

    async fn create_post(&self, req: CreatePostRequest, author_id: Uuid) -> BlogResult<Post> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO posts
                (title, text, pub_date, author_id, location_id, category_id, image, is_published)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(req.title)
        .bind(req.text)
        .bind(req.pub_date)
        .bind(author_id)
        .bind(req.location_id)
        .bind(req.category_id)
        .bind(req.image_key)
        .bind(req.is_published)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| constraint_error(e, "post"))?;

        self.get_post(id).await?.ok_or(BlogError::NotFound)
    }

    /// update_post
    ///
    /// COALESCE keeps required columns whose field is `None`. Nullable columns carry a
    /// separate "present" flag ($9..$11) so an explicit null clears them.
    async fn update_post(&self, id: i64, req: UpdatePostRequest) -> BlogResult<Option<Post>> {
        let updated: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE posts
            SET title = COALESCE($2, title),
                text = COALESCE($3, text),
                pub_date = COALESCE($4, pub_date),
                location_id = CASE WHEN $9 THEN $5 ELSE location_id END,
                category_id = CASE WHEN $10 THEN $6 ELSE category_id END,
                image = CASE WHEN $11 THEN $7 ELSE image END,
                is_published = COALESCE($8, is_published)
            WHERE id = $1
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(req.title)
        .bind(req.text)
        .bind(req.pub_date)
        .bind(req.location_id.flatten())
        .bind(req.category_id.flatten())
        .bind(req.image_key.clone().flatten())
        .bind(req.is_published)
        .bind(req.location_id.is_some())
        .bind(req.category_id.is_some())
        .bind(req.image_key.is_some())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| constraint_error(e, "post"))?;

        match updated {
            Some(id) => self.get_post(id).await,
            None => Ok(None),
        }
    }

    /// delete_post
    ///
    /// Comments go with the post through `ON DELETE CASCADE`.
    async fn delete_post(&self, id: i64) -> BlogResult<bool> {
        let res = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn get_comments(&self, post_id: i64) -> BlogResult<Vec<Comment>> {
        let comments = sqlx::query_as::<_, Comment>(&format!(
            "{} WHERE cm.post_id = $1 ORDER BY cm.created_at ASC, cm.id ASC",
            COMMENT_SELECT
        ))
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(comments)
    }

    async fn get_comment(&self, id: i64) -> BlogResult<Option<Comment>> {
        let comment = sqlx::query_as::<_, Comment>(&format!("{} WHERE cm.id = $1", COMMENT_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(comment)
    }

    /// add_comment
    ///
    /// Insert and author join in one statement via a CTE.
    async fn add_comment(
        &self,
        post_id: i64,
        author_id: Uuid,
        text: String,
    ) -> BlogResult<Comment> {
        sqlx::query_as::<_, Comment>(
            r#"
            WITH inserted AS (
                INSERT INTO comments (post_id, author_id, text) VALUES ($1, $2, $3)
                RETURNING id, post_id, author_id, text, created_at
            )
            SELECT i.id, i.post_id, i.author_id, i.text, i.created_at, u.username AS author_username
            FROM inserted i JOIN profiles u ON u.id = i.author_id
            "#,
        )
        .bind(post_id)
        .bind(author_id)
        .bind(text)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| constraint_error(e, "comment"))
    }

    async fn update_comment(&self, id: i64, text: String) -> BlogResult<Option<Comment>> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            WITH updated AS (
                UPDATE comments SET text = $2 WHERE id = $1
                RETURNING id, post_id, author_id, text, created_at
            )
            SELECT d.id, d.post_id, d.author_id, d.text, d.created_at, u.username AS author_username
            FROM updated d JOIN profiles u ON u.id = d.author_id
            "#,
        )
        .bind(id)
        .bind(text)
        .fetch_optional(&self.pool)
        .await?;
        Ok(comment)
    }

    async fn delete_comment(&self, id: i64) -> BlogResult<bool> {
        let res = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
