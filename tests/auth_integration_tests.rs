use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{Method, Request, StatusCode, header, request::Parts},
};
use blog_api::{
    AppState,
    auth::{AuthUser, Claims, MaybeUser},
    config::{AppConfig, Env},
    models::{
        Category, Comment, CreatePostRequest, Location, Post, PostPage, UpdatePostRequest,
        UpdateProfileRequest, User,
    },
    repository::Repository,
    storage::MockStorageService,
};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use std::{sync::Arc, time::SystemTime};
use uuid::Uuid;

// --- Mock Repository for Auth Logic ---

// The extractor only ever touches get_user; everything else is a placeholder.
#[derive(Default)]
struct MockAuthRepo {
    user_to_return: Option<User>,
}

#[async_trait]
impl Repository for MockAuthRepo {
    async fn get_user(&self, _id: Uuid) -> Option<User> {
        self.user_to_return.clone()
    }

    // Placeholders to satisfy the trait.
    async fn list_live_posts(&self, _page: i64) -> PostPage {
        PostPage::default()
    }
    async fn list_category_posts(&self, _category_id: Uuid, _page: i64) -> PostPage {
        PostPage::default()
    }
    async fn list_posts_by_author(
        &self,
        _author_id: Uuid,
        _include_hidden: bool,
        _page: i64,
    ) -> PostPage {
        PostPage::default()
    }
    async fn get_post(&self, _id: Uuid) -> Option<Post> {
        None
    }
    async fn get_post_for_viewer(&self, _id: Uuid, _viewer: Option<Uuid>) -> Option<Post> {
        None
    }
    async fn create_post(
        &self,
        _req: CreatePostRequest,
        _author_id: Uuid,
    ) -> Result<Post, sqlx::Error> {
        Ok(Post::default())
    }
    async fn update_post(&self, _id: Uuid, _req: UpdatePostRequest) -> Option<Post> {
        None
    }
    async fn delete_post(&self, _id: Uuid) -> bool {
        false
    }
    async fn list_categories(&self) -> Vec<Category> {
        vec![]
    }
    async fn get_published_category(&self, _slug: &str) -> Option<Category> {
        None
    }
    async fn list_locations(&self) -> Vec<Location> {
        vec![]
    }
    async fn add_comment(
        &self,
        _post_id: Uuid,
        _author_id: Uuid,
        _text: String,
    ) -> Result<Comment, sqlx::Error> {
        Ok(Comment::default())
    }
    async fn list_comments(&self, _post_id: Uuid) -> Vec<Comment> {
        vec![]
    }
    async fn get_comment(&self, _id: i64) -> Option<Comment> {
        None
    }
    async fn update_comment(&self, _id: i64, _text: String) -> Option<Comment> {
        None
    }
    async fn delete_comment(&self, _id: i64) -> bool {
        false
    }
    async fn get_user_by_username(&self, _username: &str) -> Option<User> {
        None
    }
    async fn create_user(&self, _user: User) -> Result<User, sqlx::Error> {
        Ok(User::default())
    }
    async fn update_profile(
        &self,
        _id: Uuid,
        _req: UpdateProfileRequest,
    ) -> Result<Option<User>, sqlx::Error> {
        Ok(None)
    }
}

// --- TEST UTILITIES ---

fn test_user(id: Uuid) -> User {
    User {
        id,
        username: "ada".to_string(),
        email: "ada@example.com".to_string(),
        first_name: None,
        last_name: None,
        created_at: Utc::now(),
    }
}

fn state_with(repo: MockAuthRepo, env: Env) -> AppState {
    let config = AppConfig {
        env,
        ..AppConfig::default()
    };
    AppState {
        repo: Arc::new(repo),
        storage: Arc::new(MockStorageService::new()),
        config,
    }
}

fn make_token(sub: Uuid, secret: &str, lifetime_secs: i64) -> String {
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;
    let claims = Claims {
        sub,
        exp: (now + lifetime_secs) as usize,
        iat: now as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

fn request_parts(token: Option<&str>, bypass_user: Option<Uuid>) -> Parts {
    let mut builder = Request::builder().method(Method::GET).uri("/me");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    if let Some(id) = bypass_user {
        builder = builder.header("x-user-id", id.to_string());
    }
    builder.body(()).unwrap().into_parts().0
}

async fn extract(parts: &mut Parts, state: &AppState) -> Result<AuthUser, StatusCode> {
    <AuthUser as FromRequestParts<AppState>>::from_request_parts(parts, state).await
}

// --- TESTS ---

#[tokio::test]
async fn test_valid_token_resolves_user() {
    let user_id = Uuid::new_v4();
    let state = state_with(
        MockAuthRepo {
            user_to_return: Some(test_user(user_id)),
        },
        // Production to make sure resolution went through the JWT path.
        Env::Production,
    );

    let token = make_token(user_id, &state.config.jwt_secret, 3600);
    let mut parts = request_parts(Some(&token), None);

    let auth_user = extract(&mut parts, &state).await.expect("should resolve");
    assert_eq!(auth_user.id, user_id);
    assert_eq!(auth_user.username, "ada");
}

#[tokio::test]
async fn test_expired_token_rejected() {
    let user_id = Uuid::new_v4();
    let state = state_with(
        MockAuthRepo {
            user_to_return: Some(test_user(user_id)),
        },
        Env::Production,
    );

    // Expired an hour ago, well past the default leeway.
    let token = make_token(user_id, &state.config.jwt_secret, -3600);
    let mut parts = request_parts(Some(&token), None);

    assert_eq!(
        extract(&mut parts, &state).await.unwrap_err(),
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_wrong_signature_rejected() {
    let user_id = Uuid::new_v4();
    let state = state_with(
        MockAuthRepo {
            user_to_return: Some(test_user(user_id)),
        },
        Env::Production,
    );

    let token = make_token(user_id, "a-different-secret-entirely", 3600);
    let mut parts = request_parts(Some(&token), None);

    assert_eq!(
        extract(&mut parts, &state).await.unwrap_err(),
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_missing_and_malformed_headers_rejected() {
    let state = state_with(MockAuthRepo::default(), Env::Production);

    let mut no_header = request_parts(None, None);
    assert_eq!(
        extract(&mut no_header, &state).await.unwrap_err(),
        StatusCode::UNAUTHORIZED
    );

    // Authorization present but not a Bearer scheme.
    let req = Request::builder()
        .method(Method::GET)
        .uri("/me")
        .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
        .body(())
        .unwrap();
    let mut basic = req.into_parts().0;
    assert_eq!(
        extract(&mut basic, &state).await.unwrap_err(),
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_valid_token_for_deleted_user_rejected() {
    let user_id = Uuid::new_v4();
    // Token is valid, but the profile row is gone.
    let state = state_with(MockAuthRepo { user_to_return: None }, Env::Production);

    let token = make_token(user_id, &state.config.jwt_secret, 3600);
    let mut parts = request_parts(Some(&token), None);

    assert_eq!(
        extract(&mut parts, &state).await.unwrap_err(),
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_local_bypass_header_resolves_user() {
    let user_id = Uuid::new_v4();
    let state = state_with(
        MockAuthRepo {
            user_to_return: Some(test_user(user_id)),
        },
        Env::Local,
    );

    let mut parts = request_parts(None, Some(user_id));
    let auth_user = extract(&mut parts, &state).await.expect("bypass in local");
    assert_eq!(auth_user.id, user_id);
}

#[tokio::test]
async fn test_bypass_header_ignored_in_production() {
    let user_id = Uuid::new_v4();
    let state = state_with(
        MockAuthRepo {
            user_to_return: Some(test_user(user_id)),
        },
        Env::Production,
    );

    // No JWT, only the dev header: production must fall through to 401.
    let mut parts = request_parts(None, Some(user_id));
    assert_eq!(
        extract(&mut parts, &state).await.unwrap_err(),
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_maybe_user_is_anonymous_on_failure_and_resolved_on_success() {
    let user_id = Uuid::new_v4();
    let state = state_with(
        MockAuthRepo {
            user_to_return: Some(test_user(user_id)),
        },
        Env::Production,
    );

    // No credentials at all: anonymous, never a rejection.
    let mut anon_parts = request_parts(None, None);
    let MaybeUser(resolved) =
        <MaybeUser as FromRequestParts<AppState>>::from_request_parts(&mut anon_parts, &state)
            .await
            .unwrap();
    assert!(resolved.is_none());

    // Valid credentials resolve the same identity AuthUser would.
    let token = make_token(user_id, &state.config.jwt_secret, 3600);
    let mut auth_parts = request_parts(Some(&token), None);
    let MaybeUser(resolved) =
        <MaybeUser as FromRequestParts<AppState>>::from_request_parts(&mut auth_parts, &state)
            .await
            .unwrap();
    assert_eq!(resolved.map(|u| u.id), Some(user_id));
}
