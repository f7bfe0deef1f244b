use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// Represents the user's canonical profile record stored in the `public.users` table.
/// Identity issuance (passwords, sessions) lives with the external auth provider;
/// this row mirrors the provider's subject UUID plus the profile fields the blog renders.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    // Primary Key, also the subject (`sub`) of the provider-issued JWT.
    pub id: Uuid,
    // Unique handle used in profile URLs.
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Post
///
/// Represents a blog post record from the `public.posts` table.
/// This is the primary data structure for the core business logic.
///
/// A post is *live* (visible to the general public) when `is_published` is set,
/// `pub_date` is not in the future, and its category, if it has one, is itself
/// published. The author always sees their own posts regardless of that rule.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Post {
    pub id: Uuid,
    // FK to public.users.id (Author).
    pub author_id: Uuid,
    pub title: String,
    pub text: String,

    // Scheduled publishing: a future pub_date keeps the post out of public
    // listings until the moment passes.
    #[ts(type = "string")]
    pub pub_date: DateTime<Utc>,

    // Optional references. Deleting the referenced row clears these (SET NULL).
    pub location_id: Option<Uuid>,
    pub category_id: Option<Uuid>,

    // S3 key of the post image, if one was uploaded.
    pub image: Option<String>,

    // Unchecking hides the post from everyone but its author.
    pub is_published: bool,

    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,

    // Joined columns, present on read queries only. INSERT/UPDATE ... RETURNING
    // rows fall back to the defaults.
    #[sqlx(default)]
    pub author_username: Option<String>,
    #[sqlx(default)]
    pub category_title: Option<String>,
    #[sqlx(default)]
    pub location_name: Option<String>,
    #[sqlx(default)]
    pub comment_count: i64,
}

/// Category
///
/// Represents a category record from the `public.categories` table.
/// The slug is the public identifier used in listing URLs; an unpublished
/// category hides itself and every post filed under it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Category {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub slug: String,
    pub is_published: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Location
///
/// Represents a location record from the `public.locations` table.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Location {
    pub id: Uuid,
    pub name: String,
    pub is_published: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Comment
///
/// Represents a comment record from the `public.comments` table, augmented with
/// the author's username (a join operation). Comments are ordered ascending by
/// creation time and are deleted together with their post.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Comment {
    // Using BigInt (i64) for comment ID due to the high volume potential.
    pub id: i64,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub text: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    // This field is loaded via a JOIN in the repository query.
    #[sqlx(default)]
    pub author_username: Option<String>,
}

// --- Request Payloads (Input Schemas) ---

/// CreatePostRequest
///
/// Input payload for submitting a new post (POST /posts).
/// The image key is provided here after the client completes the direct-to-cloud upload.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreatePostRequest {
    pub title: String,
    pub text: String,
    // May be set in the future for scheduled publishing.
    #[ts(type = "string")]
    pub pub_date: DateTime<Utc>,
    pub location_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    // S3 key resulting from the presigned upload flow.
    pub image_key: Option<String>,
}

/// UpdatePostRequest
///
/// Partial update payload for modifying an existing post (PUT /posts/{id}).
///
/// Uses `Option<T>` for all fields and `#[serde(skip_serializing_if = "Option::is_none")]`
/// so only provided fields are included in the JSON payload; omitted fields keep
/// their stored values (COALESCE semantics at the repository layer).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdatePostRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pub_date: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<Uuid>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Uuid>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_published: Option<bool>,
}

/// RegisterRequest
///
/// Input payload for the public registration endpoint (POST /register).
/// Note: The password is only passed through to the external auth provider and never
/// persisted or logged internally by this application.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// UpdateProfileRequest
///
/// Partial update payload for the authenticated user's own profile (PUT /me).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateProfileRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

/// CreateCommentRequest
///
/// Input payload for posting a new comment.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateCommentRequest {
    pub text: String,
}

/// UpdateCommentRequest
///
/// Input payload for editing an existing comment (author only).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateCommentRequest {
    pub text: String,
}

/// PresignedUrlRequest
///
/// Input payload for requesting a short-lived S3 upload URL (POST /upload/presigned).
/// The server uses these fields to set security constraints on the generated URL.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlRequest {
    /// The original filename, used to derive the file extension.
    #[schema(example = "sunset.jpg")]
    pub filename: String,
    /// The MIME type, used to constrain the S3 upload to the allowed type (security).
    #[schema(example = "image/jpeg")]
    pub file_type: String,
}

/// PresignedUrlResponse
///
/// Output schema containing the secure, temporary URL for client-to-cloud file transfer.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlResponse {
    /// The time-limited URL for the PUT request.
    pub upload_url: String,
    /// The S3 object key where the file will be stored (referenced by `Post.image`).
    pub resource_key: String,
}

// --- Listing & Error Schemas (Output) ---

/// PostPage
///
/// One page of a post listing. Every list endpoint (index, profile, category)
/// returns this shape; the page size is the fixed `POSTS_PER_PAGE` constant.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PostPage {
    pub posts: Vec<Post>,
    /// 1-based page number actually served (requests below 1 clamp to 1).
    pub page: i64,
    pub total_pages: i64,
    pub total_count: i64,
}

/// CategoryPage
///
/// Output schema for a category listing: the (published) category itself plus
/// one page of its live posts.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CategoryPage {
    pub category: Category,
    pub page: PostPage,
}

/// FieldError
///
/// A single failed validation rule, tied to the offending input field.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// FieldErrors
///
/// Body of every 422 response: the full set of validation failures so the
/// client can re-render its form with per-field messages.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct FieldErrors {
    pub errors: Vec<FieldError>,
}

impl FieldErrors {
    pub fn single(field: &str, message: &str) -> Self {
        Self {
            errors: vec![FieldError {
                field: field.to_string(),
                message: message.to_string(),
            }],
        }
    }

    pub fn push(&mut self, field: &str, message: &str) {
        self.errors.push(FieldError {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}
