use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Defines endpoints that are **unauthenticated** and accessible to any client
/// (anonymous or logged-in). These routes primarily handle read-only data access
/// over live content, and the registration gateway.
///
/// Security Mandate:
/// All post-reading handlers in this module must enforce the live-post predicate
/// (published, publication date reached, category visible) at the Repository
/// level. The only exception is an author reading their *own* posts, resolved by
/// the optional-identity extractor; nothing else may see scheduled or hidden
/// posts.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // A simple, unauthenticated endpoint used for monitoring and load balancer checks.
        // Returns "ok" immediately to verify the service is running and responsive.
        .route("/health", get(|| async { "ok" }))
        // POST /register
        // Endpoint for new user creation and initial profile setup. Credentials are
        // handled by the external auth provider; only the profile row lands here.
        .route("/register", post(handlers::register_user))
        // GET /posts?page=...
        // The paginated public index of live posts, newest publication first.
        .route("/posts", get(handlers::list_posts))
        // GET /posts/{id}
        // Detail view of a single post. Viewer-dependent: the author sees their own
        // unpublished or scheduled post, everyone else 404s unless it is live.
        .route("/posts/{id}", get(handlers::get_post_detail))
        // GET /posts/{id}/comments
        // Comments on a post, ascending by creation time, gated by the same
        // viewer-dependent visibility as the detail view.
        .route("/posts/{id}/comments", get(handlers::get_post_comments))
        // GET /categories
        // Published categories for navigation and the post form.
        .route("/categories", get(handlers::list_categories))
        // GET /categories/{slug}/posts?page=...
        // A category's listing page. Unpublished categories 404 like unknown slugs.
        .route("/categories/{slug}/posts", get(handlers::get_category_posts))
        // GET /locations
        // Published locations for the post form.
        .route("/locations", get(handlers::list_locations))
        // GET /profiles/{username}
        // A user's public profile, addressed by handle.
        .route("/profiles/{username}", get(handlers::get_profile))
        // GET /profiles/{username}/posts?page=...
        // The profile listing. Owners see all of their posts, others the live set.
        .route("/profiles/{username}/posts", get(handlers::get_profile_posts))
}
