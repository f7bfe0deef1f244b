use crate::models::{
    Category, Comment, CreatePostRequest, Location, Post, PostPage, UpdatePostRequest,
    UpdateProfileRequest, User,
};
use async_trait::async_trait;
use sqlx::{PgPool, query_builder::QueryBuilder};
use std::sync::Arc;
use uuid::Uuid;

/// Fixed page size for every post listing (index, profile, category).
pub const POSTS_PER_PAGE: i64 = 10;

/// Repository Trait
///
/// Defines the abstract contract for all persistence operations. This is the core
/// of the Repository Abstraction pattern, allowing the handlers to interact with
/// the data layer without knowing the specific implementation (Postgres, Mock, etc.).
///
/// Visibility rules live here, in the queries themselves: any method taking a
/// `viewer` applies the live-post predicate unless the viewer is the author.
/// Ownership checks for mutations stay in the handlers, which need to tell
/// "missing" apart from "not yours" (404 vs redirect).
///
/// **Send + Sync + async_trait** are required to make the trait object (`Arc<dyn Repository>`)
/// safely shareable and usable across Axum's asynchronous task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Post Retrieval ---
    // Public listing. Must enforce the live predicate: published, pub_date
    // reached, category (if any) published.
    async fn list_live_posts(&self, page: i64) -> PostPage;
    // Posts inside one category. The caller has already resolved the category
    // and verified it is published.
    async fn list_category_posts(&self, category_id: Uuid, page: i64) -> PostPage;
    // Posts by one author. `include_hidden` is true only when the viewer *is*
    // the author, who sees unpublished and future-dated posts too.
    async fn list_posts_by_author(&self, author_id: Uuid, include_hidden: bool, page: i64)
    -> PostPage;

    // Retrieval by id with no visibility check. For handler-level ownership
    // checks, where the post must be found even when it is not live.
    async fn get_post(&self, id: Uuid) -> Option<Post>;
    // Retrieval by id as seen by `viewer`: live posts for everyone, plus the
    // viewer's own posts in any state. `None` models an anonymous request.
    async fn get_post_for_viewer(&self, id: Uuid, viewer: Option<Uuid>) -> Option<Post>;

    // --- Post Mutation ---
    async fn create_post(&self, req: CreatePostRequest, author_id: Uuid)
    -> Result<Post, sqlx::Error>;
    async fn update_post(&self, id: Uuid, req: UpdatePostRequest) -> Option<Post>;
    // Comments go with the post (ON DELETE CASCADE).
    async fn delete_post(&self, id: Uuid) -> bool;

    // --- Categories & Locations ---
    async fn list_categories(&self) -> Vec<Category>;
    // Unpublished categories are invisible: a missing and a hidden slug both
    // resolve to None (and a 404 upstream).
    async fn get_published_category(&self, slug: &str) -> Option<Category>;
    async fn list_locations(&self) -> Vec<Location>;

    // --- Comments ---
    async fn add_comment(
        &self,
        post_id: Uuid,
        author_id: Uuid,
        text: String,
    ) -> Result<Comment, sqlx::Error>;
    // Ascending by creation time.
    async fn list_comments(&self, post_id: Uuid) -> Vec<Comment>;
    async fn get_comment(&self, id: i64) -> Option<Comment>;
    async fn update_comment(&self, id: i64, text: String) -> Option<Comment>;
    async fn delete_comment(&self, id: i64) -> bool;

    // --- Users ---
    async fn get_user(&self, id: Uuid) -> Option<User>;
    async fn get_user_by_username(&self, username: &str) -> Option<User>;
    // Mirrors the profile row after the external auth provider accepts the signup.
    async fn create_user(&self, user: User) -> Result<User, sqlx::Error>;
    async fn update_profile(
        &self,
        id: Uuid,
        req: UpdateProfileRequest,
    ) -> Result<Option<User>, sqlx::Error>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer access across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by the PostgreSQL database.
pub struct PostgresRepository {
    pool: PgPool,
}

// Shared SELECT head for post read queries: the post row plus the joined
// author/category/location names and the comment count annotation.
const POST_SELECT: &str = r#"
    SELECT p.id, p.author_id, p.title, p.text, p.pub_date,
           p.location_id, p.category_id, p.image, p.is_published, p.created_at,
           u.username AS author_username,
           c.title AS category_title,
           l.name AS location_name,
           (SELECT COUNT(*) FROM comments cm WHERE cm.post_id = p.id) AS comment_count
    FROM posts p
    JOIN users u ON u.id = p.author_id
    LEFT JOIN categories c ON c.id = p.category_id
    LEFT JOIN locations l ON l.id = p.location_id
"#;

// The visibility predicate for the general public. A post without a category
// has no category clause to fail; an unpublished category hides its posts.
const LIVE_PREDICATE: &str = r#"p.is_published = true
    AND p.pub_date <= NOW()
    AND (p.category_id IS NULL OR c.is_published = true)"#;

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Normalizes the 1-based page number and derives the row offset.
    fn page_window(page: i64) -> (i64, i64) {
        let page = page.max(1);
        (page, (page - 1) * POSTS_PER_PAGE)
    }

    fn assemble_page(posts: Vec<Post>, page: i64, total_count: i64) -> PostPage {
        let total_pages = ((total_count + POSTS_PER_PAGE - 1) / POSTS_PER_PAGE).max(1);
        PostPage {
            posts,
            page,
            total_pages,
            total_count,
        }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    /// list_live_posts
    ///
    /// The public index. Strictly enforces the live predicate in the base query
    /// so an anonymous client can never page into hidden or scheduled posts.
    async fn list_live_posts(&self, page: i64) -> PostPage {
        let (page, offset) = Self::page_window(page);

        let total_count: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM posts p
               LEFT JOIN categories c ON c.id = p.category_id
               WHERE p.is_published = true
                 AND p.pub_date <= NOW()
                 AND (p.category_id IS NULL OR c.is_published = true)"#,
        )
        .fetch_one(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("list_live_posts count error: {:?}", e);
            0
        });

        let sql = format!("{POST_SELECT} WHERE {LIVE_PREDICATE} ORDER BY p.pub_date DESC LIMIT $1 OFFSET $2");
        let posts = sqlx::query_as::<_, Post>(&sql)
            .bind(POSTS_PER_PAGE)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("list_live_posts error: {:?}", e);
                vec![]
            });

        Self::assemble_page(posts, page, total_count)
    }

    /// list_category_posts
    ///
    /// Live posts filed under one category. The category itself was resolved via
    /// `get_published_category`, so the category clause of the predicate is
    /// already satisfied; the published/pub_date clauses still apply per post.
    async fn list_category_posts(&self, category_id: Uuid, page: i64) -> PostPage {
        let (page, offset) = Self::page_window(page);

        let total_count: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM posts p
               WHERE p.category_id = $1 AND p.is_published = true AND p.pub_date <= NOW()"#,
        )
        .bind(category_id)
        .fetch_one(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("list_category_posts count error: {:?}", e);
            0
        });

        let sql = format!(
            "{POST_SELECT} WHERE p.category_id = $1 AND p.is_published = true AND p.pub_date <= NOW() ORDER BY p.pub_date DESC LIMIT $2 OFFSET $3"
        );
        let posts = sqlx::query_as::<_, Post>(&sql)
            .bind(category_id)
            .bind(POSTS_PER_PAGE)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("list_category_posts error: {:?}", e);
                vec![]
            });

        Self::assemble_page(posts, page, total_count)
    }

    /// list_posts_by_author
    ///
    /// Implements the profile listing with QueryBuilder for the conditional
    /// visibility clause: the author browsing their own profile sees everything,
    /// anyone else sees only live posts.
    async fn list_posts_by_author(
        &self,
        author_id: Uuid,
        include_hidden: bool,
        page: i64,
    ) -> PostPage {
        let (page, offset) = Self::page_window(page);

        let mut count_builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            r#"SELECT COUNT(*) FROM posts p
               LEFT JOIN categories c ON c.id = p.category_id
               WHERE p.author_id = "#,
        );
        count_builder.push_bind(author_id);
        if !include_hidden {
            count_builder.push(" AND ").push(LIVE_PREDICATE);
        }
        let total_count: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("list_posts_by_author count error: {:?}", e);
                0
            });

        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(POST_SELECT);
        builder.push(" WHERE p.author_id = ");
        builder.push_bind(author_id);
        if !include_hidden {
            builder.push(" AND ").push(LIVE_PREDICATE);
        }
        builder.push(" ORDER BY p.pub_date DESC LIMIT ");
        builder.push_bind(POSTS_PER_PAGE);
        builder.push(" OFFSET ");
        builder.push_bind(offset);

        let posts = builder
            .build_query_as::<Post>()
            .fetch_all(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("list_posts_by_author error: {:?}", e);
                vec![]
            });

        Self::assemble_page(posts, page, total_count)
    }

    /// get_post
    ///
    /// Simple retrieval of any post by ID (no visibility check). For handlers
    /// that must find the post before deciding whether the requester may touch it.
    async fn get_post(&self, id: Uuid) -> Option<Post> {
        let sql = format!("{POST_SELECT} WHERE p.id = $1");
        sqlx::query_as::<_, Post>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_post error: {:?}", e);
                None
            })
    }

    /// get_post_for_viewer
    ///
    /// Retrieves a post if it is live OR if the querying user is the author.
    /// A NULL viewer (anonymous) never matches the author clause.
    async fn get_post_for_viewer(&self, id: Uuid, viewer: Option<Uuid>) -> Option<Post> {
        let sql = format!("{POST_SELECT} WHERE p.id = $1 AND (p.author_id = $2 OR ({LIVE_PREDICATE}))");
        sqlx::query_as::<_, Post>(&sql)
            .bind(id)
            .bind(viewer)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_post_for_viewer error: {:?}", e);
                None
            })
    }

    /// create_post
    ///
    /// Inserts a new post. The author is the authenticated session user, never
    /// the payload. Errors bubble up so the handler can answer 500.
    async fn create_post(
        &self,
        req: CreatePostRequest,
        author_id: Uuid,
    ) -> Result<Post, sqlx::Error> {
        let new_id = Uuid::new_v4();
        sqlx::query_as::<_, Post>(
            r#"INSERT INTO posts (id, author_id, title, text, pub_date, location_id, category_id, image, is_published, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, true, NOW())
               RETURNING id, author_id, title, text, pub_date, location_id, category_id, image, is_published, created_at"#,
        )
        .bind(new_id)
        .bind(author_id)
        .bind(req.title)
        .bind(req.text)
        .bind(req.pub_date)
        .bind(req.location_id)
        .bind(req.category_id)
        .bind(req.image_key)
        .fetch_one(&self.pool)
        .await
    }

    /// update_post
    ///
    /// Uses the PostgreSQL `COALESCE` function to efficiently handle `Option<T>`
    /// fields, only updating a column if the corresponding field in `req` is `Some`.
    /// Ownership was already checked by the handler.
    async fn update_post(&self, id: Uuid, req: UpdatePostRequest) -> Option<Post> {
        sqlx::query_as::<_, Post>(
            r#"UPDATE posts
               SET title = COALESCE($2, title),
                   text = COALESCE($3, text),
                   pub_date = COALESCE($4, pub_date),
                   location_id = COALESCE($5, location_id),
                   category_id = COALESCE($6, category_id),
                   image = COALESCE($7, image),
                   is_published = COALESCE($8, is_published)
               WHERE id = $1
               RETURNING id, author_id, title, text, pub_date, location_id, category_id, image, is_published, created_at"#,
        )
        .bind(id)
        .bind(req.title)
        .bind(req.text)
        .bind(req.pub_date)
        .bind(req.location_id)
        .bind(req.category_id)
        .bind(req.image_key)
        .bind(req.is_published)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("update_post error: {:?}", e);
            None
        })
    }

    /// delete_post
    ///
    /// Deletes a post; the `comments.post_id` foreign key cascades, removing
    /// its comments in the same statement.
    async fn delete_post(&self, id: Uuid) -> bool {
        match sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
        {
            Ok(res) => res.rows_affected() > 0,
            Err(e) => {
                tracing::error!("delete_post error: {:?}", e);
                false
            }
        }
    }

    /// list_categories
    ///
    /// Published categories only, for navigation and the post form dropdown.
    async fn list_categories(&self) -> Vec<Category> {
        sqlx::query_as::<_, Category>(
            "SELECT id, title, description, slug, is_published, created_at FROM categories WHERE is_published = true ORDER BY title",
        )
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("list_categories error: {:?}", e);
            vec![]
        })
    }

    /// get_published_category
    ///
    /// Resolves a slug to its category only when the category is published.
    /// Hidden categories 404 exactly like missing ones.
    async fn get_published_category(&self, slug: &str) -> Option<Category> {
        sqlx::query_as::<_, Category>(
            "SELECT id, title, description, slug, is_published, created_at FROM categories WHERE slug = $1 AND is_published = true",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_published_category error: {:?}", e);
            None
        })
    }

    /// list_locations
    ///
    /// Published locations, for the post form dropdown.
    async fn list_locations(&self) -> Vec<Location> {
        sqlx::query_as::<_, Location>(
            "SELECT id, name, is_published, created_at FROM locations WHERE is_published = true ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("list_locations error: {:?}", e);
            vec![]
        })
    }

    /// add_comment
    ///
    /// Inserts a new comment and immediately joins with `users` to return the
    /// enriched `Comment` model, including the author's username. Uses a CTE to
    /// perform the insert and subsequent join in one query.
    async fn add_comment(
        &self,
        post_id: Uuid,
        author_id: Uuid,
        text: String,
    ) -> Result<Comment, sqlx::Error> {
        sqlx::query_as::<_, Comment>(
            r#"WITH inserted AS (
                   INSERT INTO comments (post_id, author_id, text) VALUES ($1, $2, $3)
                   RETURNING id, post_id, author_id, text, created_at
               )
               SELECT i.id, i.post_id, i.author_id, i.text, i.created_at, u.username AS author_username
               FROM inserted i JOIN users u ON i.author_id = u.id"#,
        )
        .bind(post_id)
        .bind(author_id)
        .bind(text)
        .fetch_one(&self.pool)
        .await
    }

    /// list_comments
    ///
    /// All comments on a post, oldest first. Post visibility is the caller's
    /// concern; by the time this runs the post has been resolved for the viewer.
    async fn list_comments(&self, post_id: Uuid) -> Vec<Comment> {
        sqlx::query_as::<_, Comment>(
            r#"SELECT c.id, c.post_id, c.author_id, c.text, c.created_at, u.username AS author_username
               FROM comments c
               JOIN users u ON c.author_id = u.id
               WHERE c.post_id = $1
               ORDER BY c.created_at ASC"#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_default()
    }

    /// get_comment
    ///
    /// Retrieval by ID for the handler-level ownership check.
    async fn get_comment(&self, id: i64) -> Option<Comment> {
        sqlx::query_as::<_, Comment>(
            r#"SELECT c.id, c.post_id, c.author_id, c.text, c.created_at, u.username AS author_username
               FROM comments c JOIN users u ON c.author_id = u.id
               WHERE c.id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_comment error: {:?}", e);
            None
        })
    }

    /// update_comment
    ///
    /// Rewrites the comment text. Ownership was already checked by the handler.
    async fn update_comment(&self, id: i64, text: String) -> Option<Comment> {
        sqlx::query_as::<_, Comment>(
            r#"UPDATE comments SET text = $2 WHERE id = $1
               RETURNING id, post_id, author_id, text, created_at"#,
        )
        .bind(id)
        .bind(text)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("update_comment error: {:?}", e);
            None
        })
    }

    /// delete_comment
    ///
    /// Deletes a comment by ID. Ownership was already checked by the handler.
    async fn delete_comment(&self, id: i64) -> bool {
        match sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
        {
            Ok(res) => res.rows_affected() > 0,
            Err(e) => {
                tracing::error!("delete_comment error: {:?}", e);
                false
            }
        }
    }

    /// get_user
    ///
    /// Retrieves the profile row needed for authentication and rendering.
    async fn get_user(&self, id: Uuid) -> Option<User> {
        sqlx::query_as::<_, User>(
            "SELECT id, username, email, first_name, last_name, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or(None)
    }

    /// get_user_by_username
    ///
    /// Profile pages address users by handle, not UUID.
    async fn get_user_by_username(&self, username: &str) -> Option<User> {
        sqlx::query_as::<_, User>(
            "SELECT id, username, email, first_name, last_name, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or(None)
    }

    /// create_user
    ///
    /// Creates the mirroring profile record in `public.users` after external auth
    /// success. A unique violation (username/email taken) surfaces to the handler.
    async fn create_user(&self, user: User) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"INSERT INTO users (id, username, email, first_name, last_name, created_at)
               VALUES ($1, $2, $3, $4, $5, NOW())
               RETURNING id, username, email, first_name, last_name, created_at"#,
        )
        .bind(user.id)
        .bind(user.username)
        .bind(user.email)
        .bind(user.first_name)
        .bind(user.last_name)
        .fetch_one(&self.pool)
        .await
    }

    /// update_profile
    ///
    /// COALESCE partial update of the user's own profile. Unique violations on
    /// username/email are the caller's 409; other errors its 500.
    async fn update_profile(
        &self,
        id: Uuid,
        req: UpdateProfileRequest,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"UPDATE users
               SET username = COALESCE($2, username),
                   email = COALESCE($3, email),
                   first_name = COALESCE($4, first_name),
                   last_name = COALESCE($5, last_name)
               WHERE id = $1
               RETURNING id, username, email, first_name, last_name, created_at"#,
        )
        .bind(id)
        .bind(req.username)
        .bind(req.email)
        .bind(req.first_name)
        .bind(req.last_name)
        .fetch_optional(&self.pool)
        .await
    }
}
