use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Authenticated Router Module
///
/// Defines the routes accessible to any user who has successfully passed the
/// authentication layer. This module implements all write features: authoring
/// posts, commenting, profile editing, and media upload.
///
/// Access Control Strategy:
/// Every handler in this module relies on the `AuthUser` extractor middleware
/// being present on the router layer above this module. The *author-only* rule
/// for edits and deletes is then enforced inside the handlers: the resource is
/// fetched, its author compared against the session user, and a mismatch is
/// answered with a redirect to the post detail page, never a mutation.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // POST /upload/presigned
        // Initiates the secure image upload pipeline. Generates a short-lived
        // (10-minute) presigned S3 URL which allows the client to upload the post
        // image directly to the storage service, bypassing the application server.
        .route("/upload/presigned", post(handlers::get_presigned_url))
        // GET/PUT /me
        // Retrieves or partially updates the authenticated user's own profile.
        .route("/me", get(handlers::get_me).put(handlers::update_me))
        // --- Post Authoring ---
        // POST /posts
        // Submits a new post. The author is the session user; a future pub_date
        // schedules the post.
        .route("/posts", post(handlers::create_post))
        // PUT/DELETE /posts/{id}
        // Allows the author to modify or remove their own post. A non-author is
        // redirected to the post's detail page without any mutation.
        .route(
            "/posts/{id}",
            put(handlers::update_post).delete(handlers::delete_post),
        )
        // --- Commenting System ---
        // POST /posts/{id}/comments
        // Posts a new comment on the specified post.
        .route("/posts/{id}/comments", post(handlers::add_comment))
        // PUT/DELETE /posts/{id}/comments/{comment_id}
        // Allows the comment's author to edit or remove it. Same redirect rule for
        // everyone else.
        .route(
            "/posts/{id}/comments/{comment_id}",
            put(handlers::update_comment).delete(handlers::delete_comment),
        )
}
