use crate::{
    AppState,
    auth::{AuthUser, MaybeUser},
    models::{
        self, Category, CategoryPage, Comment, CreateCommentRequest, CreatePostRequest,
        FieldErrors, Location, Post, PostPage, PresignedUrlRequest, PresignedUrlResponse,
        RegisterRequest, UpdateCommentRequest, UpdatePostRequest, UpdateProfileRequest, User,
    },
    storage,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use uuid::Uuid;

// --- Filter Structs ---

/// PageQuery
///
/// The single accepted query parameter for every paginated listing endpoint.
/// Used by Axum's Query extractor to safely bind the HTTP query parameter.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct PageQuery {
    /// 1-based page number; omitted or below 1 serves the first page.
    pub page: Option<i64>,
}

/// AuthProviderResponse
///
/// Minimal struct to deserialize the response from the external auth provider's
/// signup endpoint, specifically capturing the newly created user's UUID.
#[derive(Deserialize)]
struct AuthProviderResponse {
    id: Uuid,
}

// --- Shared helpers ---

// The canonical detail path for a post; non-author mutation attempts are
// redirected here instead of mutating.
fn post_detail_path(post_id: Uuid) -> String {
    format!("/posts/{}", post_id)
}

// Collects validation failures for post fields. `None` means "field not part of
// this request" (partial updates), so only provided values are checked.
fn validate_post_fields(title: Option<&str>, text: Option<&str>) -> FieldErrors {
    let mut errors = FieldErrors::default();
    if let Some(title) = title {
        if title.trim().is_empty() {
            errors.push("title", "Title must not be empty");
        }
    }
    if let Some(text) = text {
        if text.trim().is_empty() {
            errors.push("text", "Text must not be empty");
        }
    }
    errors
}

fn unprocessable(errors: FieldErrors) -> Response {
    (StatusCode::UNPROCESSABLE_ENTITY, Json(errors)).into_response()
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

// --- Public Read Handlers ---

/// list_posts
///
/// [Public Route] The paginated index of live posts, newest publication first.
///
/// *Security*: The repository applies the live predicate **unconditionally**
/// (published, pub_date reached, category visible), so scheduled or hidden
/// posts can never leak into the public listing.
#[utoipa::path(
    get,
    path = "/posts",
    params(PageQuery),
    responses((status = 200, description = "One page of live posts", body = PostPage))
)]
pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Json<PostPage> {
    let page = state.repo.list_live_posts(query.page.unwrap_or(1)).await;
    Json(page)
}

/// get_post_detail
///
/// [Public Route] Retrieves a single post by ID, as seen by the current viewer:
/// the author gets their own post in any state, everyone else only a live one.
/// Anything invisible is indistinguishable from missing (404).
#[utoipa::path(
    get,
    path = "/posts/{id}",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Found", body = Post),
        (status = 404, description = "Missing or not visible to this viewer")
    )
)]
pub async fn get_post_detail(
    viewer: MaybeUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<models::Post>, StatusCode> {
    match state.repo.get_post_for_viewer(id, viewer.viewer_id()).await {
        Some(post) => Ok(Json(post)),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// get_post_comments
///
/// [Public Route] Retrieves all comments for a post, oldest first. The post must
/// be visible to the viewer under the same rule as the detail page.
#[utoipa::path(
    get,
    path = "/posts/{id}/comments",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Comments in ascending creation order", body = [Comment]),
        (status = 404, description = "Post missing or not visible")
    )
)]
pub async fn get_post_comments(
    viewer: MaybeUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<models::Comment>>, StatusCode> {
    if state
        .repo
        .get_post_for_viewer(id, viewer.viewer_id())
        .await
        .is_none()
    {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(state.repo.list_comments(id).await))
}

/// list_categories
///
/// [Public Route] Published categories, for navigation and the post form.
#[utoipa::path(
    get,
    path = "/categories",
    responses((status = 200, description = "Published categories", body = [Category]))
)]
pub async fn list_categories(State(state): State<AppState>) -> Json<Vec<models::Category>> {
    Json(state.repo.list_categories().await)
}

/// get_category_posts
///
/// [Public Route] The listing page for one category: the category must itself be
/// published (unpublished categories 404 exactly like unknown slugs), and the
/// posts inside it must be live.
#[utoipa::path(
    get,
    path = "/categories/{slug}/posts",
    params(("slug" = String, Path, description = "Category slug"), PageQuery),
    responses(
        (status = 200, description = "Category and one page of its live posts", body = CategoryPage),
        (status = 404, description = "Unknown or unpublished category")
    )
)]
pub async fn get_category_posts(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<models::CategoryPage>, StatusCode> {
    let category = state
        .repo
        .get_published_category(&slug)
        .await
        .ok_or(StatusCode::NOT_FOUND)?;

    let page = state
        .repo
        .list_category_posts(category.id, query.page.unwrap_or(1))
        .await;

    Ok(Json(CategoryPage { category, page }))
}

/// list_locations
///
/// [Public Route] Published locations, for the post form.
#[utoipa::path(
    get,
    path = "/locations",
    responses((status = 200, description = "Published locations", body = [Location]))
)]
pub async fn list_locations(State(state): State<AppState>) -> Json<Vec<models::Location>> {
    Json(state.repo.list_locations().await)
}

/// get_profile
///
/// [Public Route] A user's public profile, addressed by handle.
#[utoipa::path(
    get,
    path = "/profiles/{username}",
    params(("username" = String, Path, description = "User handle")),
    responses(
        (status = 200, description = "Profile", body = User),
        (status = 404, description = "Unknown user")
    )
)]
pub async fn get_profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<models::User>, StatusCode> {
    match state.repo.get_user_by_username(&username).await {
        Some(user) => Ok(Json(user)),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// get_profile_posts
///
/// [Public Route] Paginated posts for one profile. When the viewer *is* the
/// profile owner they see every post — unpublished and scheduled included —
/// while any other viewer gets only the live set.
#[utoipa::path(
    get,
    path = "/profiles/{username}/posts",
    params(("username" = String, Path, description = "User handle"), PageQuery),
    responses(
        (status = 200, description = "One page of the user's posts", body = PostPage),
        (status = 404, description = "Unknown user")
    )
)]
pub async fn get_profile_posts(
    viewer: MaybeUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<models::PostPage>, StatusCode> {
    let profile = state
        .repo
        .get_user_by_username(&username)
        .await
        .ok_or(StatusCode::NOT_FOUND)?;

    let include_hidden = viewer.viewer_id() == Some(profile.id);
    let page = state
        .repo
        .list_posts_by_author(profile.id, include_hidden, query.page.unwrap_or(1))
        .await;

    Ok(Json(page))
}

/// register_user
///
/// [Public Route] Handles initial user registration via the external auth provider.
///
/// *Flow*: Calls the provider's signup endpoint, retrieves the canonical user UUID,
/// and then uses that ID to create the corresponding record in the application's
/// local `public.users` table. This keeps primary keys synchronized between the
/// external auth system and our local schema. The password passes straight through
/// and is never persisted or logged here.
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = User),
        (status = 409, description = "Username or email already taken"),
        (status = 422, description = "Invalid fields", body = FieldErrors)
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Response {
    let mut errors = FieldErrors::default();
    if payload.username.trim().is_empty() {
        errors.push("username", "Username must not be empty");
    }
    if payload.email.trim().is_empty() {
        errors.push("email", "Email must not be empty");
    }
    if !errors.is_empty() {
        return unprocessable(errors);
    }

    let Ok(auth_url) = std::env::var("AUTH_URL") else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };
    let Ok(auth_key) = std::env::var("AUTH_SERVICE_KEY") else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    // Step 1: Call the external auth provider.
    let client = reqwest::Client::new();
    let signup_url = format!("{}/auth/v1/signup", auth_url);

    let response = match client
        .post(signup_url)
        .header("apikey", auth_key)
        .header("Content-Type", "application/json")
        .json(&serde_json::json!({ "email": payload.email, "password": payload.password }))
        .send()
        .await
    {
        Ok(resp) => resp,
        Err(e) => {
            tracing::error!("auth provider signup call failed: {:?}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if !response.status().is_success() {
        // The provider rejected the signup (e.g., email already exists, weak password).
        return StatusCode::BAD_REQUEST.into_response();
    }

    // Step 2: Extract the canonical user ID from the external response.
    let Ok(created) = response.json::<AuthProviderResponse>().await else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    // Step 3: Create the mirrored profile in our local database (`public.users`).
    let new_user = User {
        id: created.id,
        username: payload.username,
        email: payload.email,
        first_name: payload.first_name,
        last_name: payload.last_name,
        created_at: chrono::Utc::now(),
    };

    match state.repo.create_user(new_user).await {
        Ok(user) => (StatusCode::CREATED, Json(user)).into_response(),
        Err(e) if is_unique_violation(&e) => StatusCode::CONFLICT.into_response(),
        Err(e) => {
            tracing::error!("create_user error: {:?}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

// --- Authenticated Handlers ---

/// get_me
///
/// [Authenticated Route] Provides the authenticated user's own profile.
#[utoipa::path(
    get,
    path = "/me",
    responses((status = 200, description = "Profile", body = User))
)]
pub async fn get_me(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<models::User>, StatusCode> {
    state
        .repo
        .get_user(id)
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// update_me
///
/// [Authenticated Route] Partial update of the authenticated user's own profile
/// (handle, email, first/last name). Uniqueness clashes on handle or email
/// answer 409 so the form can surface them.
#[utoipa::path(
    put,
    path = "/me",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated", body = User),
        (status = 409, description = "Username or email already taken"),
        (status = 422, description = "Invalid fields", body = FieldErrors)
    )
)]
pub async fn update_me(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Response {
    let mut errors = FieldErrors::default();
    if matches!(payload.username.as_deref(), Some(u) if u.trim().is_empty()) {
        errors.push("username", "Username must not be empty");
    }
    if matches!(payload.email.as_deref(), Some(e) if e.trim().is_empty()) {
        errors.push("email", "Email must not be empty");
    }
    if !errors.is_empty() {
        return unprocessable(errors);
    }

    match state.repo.update_profile(id, payload).await {
        Ok(Some(user)) => Json(user).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) if is_unique_violation(&e) => StatusCode::CONFLICT.into_response(),
        Err(e) => {
            tracing::error!("update_profile error: {:?}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// create_post
///
/// [Authenticated Route] Handles the submission of a new post. The author is
/// taken from the authenticated session, never the payload. A future `pub_date`
/// schedules the post: it stays out of public listings until the moment passes.
#[utoipa::path(
    post,
    path = "/posts",
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Created", body = Post),
        (status = 422, description = "Invalid fields", body = FieldErrors)
    )
)]
pub async fn create_post(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreatePostRequest>,
) -> Response {
    let errors = validate_post_fields(Some(&payload.title), Some(&payload.text));
    if !errors.is_empty() {
        return unprocessable(errors);
    }

    match state.repo.create_post(payload, id).await {
        Ok(post) => (StatusCode::CREATED, Json(post)).into_response(),
        Err(e) => {
            tracing::error!("create_post error: {:?}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// update_post
///
/// [Authenticated Route] Allows a user to modify their own post.
///
/// *Authorization*: the post is fetched first so that "missing" (404) and
/// "not yours" can be told apart — a non-author is **redirected to the post's
/// detail page without any mutation**, mirroring how the rest of the app treats
/// foreign resources as read-only.
#[utoipa::path(
    put,
    path = "/posts/{id}",
    params(("id" = Uuid, Path, description = "Post ID")),
    request_body = UpdatePostRequest,
    responses(
        (status = 200, description = "Updated", body = Post),
        (status = 303, description = "Requester is not the author; redirected to the post detail"),
        (status = 404, description = "Not Found"),
        (status = 422, description = "Invalid fields", body = FieldErrors)
    )
)]
pub async fn update_post(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePostRequest>,
) -> Response {
    let Some(post) = state.repo.get_post(id).await else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if post.author_id != user_id {
        return Redirect::to(&post_detail_path(id)).into_response();
    }

    let errors = validate_post_fields(payload.title.as_deref(), payload.text.as_deref());
    if !errors.is_empty() {
        return unprocessable(errors);
    }

    match state.repo.update_post(id, payload).await {
        Some(post) => Json(post).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// delete_post
///
/// [Authenticated Route] Allows a user to delete their own post. The comments
/// go with it (cascade at the schema layer). A non-author is redirected to the
/// detail page without any mutation.
#[utoipa::path(
    delete,
    path = "/posts/{id}",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 303, description = "Requester is not the author; redirected to the post detail"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_post(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Response {
    let Some(post) = state.repo.get_post(id).await else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if post.author_id != user_id {
        return Redirect::to(&post_detail_path(id)).into_response();
    }

    if state.repo.delete_post(id).await {
        StatusCode::NO_CONTENT.into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

/// add_comment
///
/// [Authenticated Route] Posts a new comment. The post must exist; the comment's
/// author is the session user.
#[utoipa::path(
    post,
    path = "/posts/{id}/comments",
    params(("id" = Uuid, Path, description = "Post ID")),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment added", body = Comment),
        (status = 404, description = "Post not found"),
        (status = 422, description = "Invalid fields", body = FieldErrors)
    )
)]
pub async fn add_comment(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Json(payload): Json<CreateCommentRequest>,
) -> Response {
    if state.repo.get_post(post_id).await.is_none() {
        return StatusCode::NOT_FOUND.into_response();
    }
    if payload.text.trim().is_empty() {
        return unprocessable(FieldErrors::single("text", "Comment must not be empty"));
    }

    match state.repo.add_comment(post_id, user_id, payload.text).await {
        Ok(comment) => (StatusCode::CREATED, Json(comment)).into_response(),
        Err(e) => {
            tracing::error!("add_comment error: {:?}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// update_comment
///
/// [Authenticated Route] Allows a user to edit their own comment. A non-author
/// is redirected to the parent post's detail page without any mutation.
#[utoipa::path(
    put,
    path = "/posts/{id}/comments/{comment_id}",
    params(
        ("id" = Uuid, Path, description = "Post ID"),
        ("comment_id" = i64, Path, description = "Comment ID")
    ),
    request_body = UpdateCommentRequest,
    responses(
        (status = 200, description = "Updated", body = Comment),
        (status = 303, description = "Requester is not the author; redirected to the post detail"),
        (status = 404, description = "Not Found"),
        (status = 422, description = "Invalid fields", body = FieldErrors)
    )
)]
pub async fn update_comment(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path((_post_id, comment_id)): Path<(Uuid, i64)>,
    Json(payload): Json<UpdateCommentRequest>,
) -> Response {
    let Some(comment) = state.repo.get_comment(comment_id).await else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if comment.author_id != user_id {
        return Redirect::to(&post_detail_path(comment.post_id)).into_response();
    }
    if payload.text.trim().is_empty() {
        return unprocessable(FieldErrors::single("text", "Comment must not be empty"));
    }

    match state.repo.update_comment(comment_id, payload.text).await {
        Some(comment) => Json(comment).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// delete_comment
///
/// [Authenticated Route] Allows a user to delete their own comment. A non-author
/// is redirected to the parent post's detail page without any mutation.
#[utoipa::path(
    delete,
    path = "/posts/{id}/comments/{comment_id}",
    params(
        ("id" = Uuid, Path, description = "Post ID"),
        ("comment_id" = i64, Path, description = "Comment ID")
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 303, description = "Requester is not the author; redirected to the post detail"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_comment(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path((_post_id, comment_id)): Path<(Uuid, i64)>,
) -> Response {
    let Some(comment) = state.repo.get_comment(comment_id).await else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if comment.author_id != user_id {
        return Redirect::to(&post_detail_path(comment.post_id)).into_response();
    }

    if state.repo.delete_comment(comment_id).await {
        StatusCode::NO_CONTENT.into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

/// get_presigned_url
///
/// [Authenticated Route] Generates a temporary, secure URL for direct
/// client-to-cloud upload of a post image.
///
/// *Security*: The URL is short-lived (10 minutes), constrained to the supplied
/// image MIME type, and uses a unique, unguessable object key. Image bytes never
/// transit the application server.
#[utoipa::path(
    post,
    path = "/upload/presigned",
    request_body = PresignedUrlRequest,
    responses(
        (status = 200, description = "URL", body = PresignedUrlResponse),
        (status = 422, description = "Not an image MIME type", body = FieldErrors)
    )
)]
pub async fn get_presigned_url(
    AuthUser { id: _user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<PresignedUrlRequest>,
) -> impl IntoResponse {
    // Post images only; arbitrary uploads have no home in this application.
    if !payload.file_type.starts_with("image/") {
        return unprocessable(FieldErrors::single(
            "file_type",
            "Only image uploads are accepted",
        ));
    }

    let object_key = storage::image_object_key(&payload.filename);

    match state
        .storage
        .presigned_upload_url(&object_key, &payload.file_type)
        .await
    {
        Ok(url) => {
            let response = PresignedUrlResponse {
                upload_url: url,
                resource_key: object_key,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            // Log the underlying storage error for debugging but return a generic internal error.
            tracing::error!("storage error while presigning upload: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
