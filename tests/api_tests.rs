use async_trait::async_trait;
use blog_api::{
    AppConfig, AppState, MockStorageService, create_router,
    models::{
        Category, Comment, CreatePostRequest, Location, Post, PostPage, UpdatePostRequest,
        UpdateProfileRequest, User,
    },
    repository::{POSTS_PER_PAGE, Repository},
    storage::StorageState,
};
use chrono::Utc;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use uuid::Uuid;

// An in-memory repository just rich enough to drive the full HTTP stack
// (router, auth middleware, extractors, handlers) over a real socket.
#[derive(Default)]
struct InMemoryRepo {
    users: Mutex<Vec<User>>,
    posts: Mutex<Vec<Post>>,
    comments: Mutex<Vec<Comment>>,
}

impl InMemoryRepo {
    fn seed_user(&self) -> User {
        let user = User {
            id: Uuid::new_v4(),
            username: "writer".to_string(),
            email: "writer@example.com".to_string(),
            first_name: None,
            last_name: None,
            created_at: Utc::now(),
        };
        self.users.lock().unwrap().push(user.clone());
        user
    }

    fn live(posts: Vec<Post>, page: i64) -> PostPage {
        let page = page.max(1);
        let total_count = posts.len() as i64;
        PostPage {
            posts,
            page,
            total_pages: ((total_count + POSTS_PER_PAGE - 1) / POSTS_PER_PAGE).max(1),
            total_count,
        }
    }
}

#[async_trait]
impl Repository for InMemoryRepo {
    async fn list_live_posts(&self, page: i64) -> PostPage {
        let posts: Vec<Post> = self
            .posts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.is_published && p.pub_date <= Utc::now())
            .cloned()
            .collect();
        Self::live(posts, page)
    }
    async fn list_category_posts(&self, _category_id: Uuid, page: i64) -> PostPage {
        Self::live(vec![], page)
    }
    async fn list_posts_by_author(
        &self,
        author_id: Uuid,
        include_hidden: bool,
        page: i64,
    ) -> PostPage {
        let posts: Vec<Post> = self
            .posts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| {
                p.author_id == author_id
                    && (include_hidden || (p.is_published && p.pub_date <= Utc::now()))
            })
            .cloned()
            .collect();
        Self::live(posts, page)
    }
    async fn get_post(&self, id: Uuid) -> Option<Post> {
        self.posts
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }
    async fn get_post_for_viewer(&self, id: Uuid, viewer: Option<Uuid>) -> Option<Post> {
        let post = self.get_post(id).await?;
        if viewer == Some(post.author_id) || (post.is_published && post.pub_date <= Utc::now()) {
            Some(post)
        } else {
            None
        }
    }
    async fn create_post(
        &self,
        req: CreatePostRequest,
        author_id: Uuid,
    ) -> Result<Post, sqlx::Error> {
        let post = Post {
            id: Uuid::new_v4(),
            author_id,
            title: req.title,
            text: req.text,
            pub_date: req.pub_date,
            is_published: true,
            created_at: Utc::now(),
            ..Post::default()
        };
        self.posts.lock().unwrap().push(post.clone());
        Ok(post)
    }
    async fn update_post(&self, _id: Uuid, _req: UpdatePostRequest) -> Option<Post> {
        None
    }
    async fn delete_post(&self, id: Uuid) -> bool {
        let mut posts = self.posts.lock().unwrap();
        let before = posts.len();
        posts.retain(|p| p.id != id);
        posts.len() < before
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
        post_id: Uuid,
        author_id: Uuid,
        text: String,
    ) -> Result<Comment, sqlx::Error> {
        let mut comments = self.comments.lock().unwrap();
        let comment = Comment {
            id: comments.len() as i64 + 1,
            post_id,
            author_id,
            text,
            created_at: Utc::now(),
            author_username: None,
        };
        comments.push(comment.clone());
        Ok(comment)
    }
    async fn list_comments(&self, post_id: Uuid) -> Vec<Comment> {
        self.comments
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect()
    }
    async fn get_comment(&self, id: i64) -> Option<Comment> {
        self.comments
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }
    async fn update_comment(&self, _id: i64, _text: String) -> Option<Comment> {
        None
    }
    async fn delete_comment(&self, id: i64) -> bool {
        let mut comments = self.comments.lock().unwrap();
        let before = comments.len();
        comments.retain(|c| c.id != id);
        comments.len() < before
    }
    async fn get_user(&self, id: Uuid) -> Option<User> {
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == id)
            .cloned()
    }
    async fn get_user_by_username(&self, username: &str) -> Option<User> {
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.username == username)
            .cloned()
    }
    async fn create_user(&self, user: User) -> Result<User, sqlx::Error> {
        self.users.lock().unwrap().push(user.clone());
        Ok(user)
    }
    async fn update_profile(
        &self,
        _id: Uuid,
        _req: UpdateProfileRequest,
    ) -> Result<Option<User>, sqlx::Error> {
        Ok(None)
    }
}

#[derive(Debug)]
pub struct TestApp {
    pub address: String,
}

async fn spawn_app(repo: Arc<InMemoryRepo>) -> TestApp {
    let storage = Arc::new(MockStorageService::new()) as StorageState;
    let config = AppConfig::default();

    let state = AppState {
        repo,
        storage,
        config,
    };
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp { address }
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app(Arc::new(InMemoryRepo::default())).await;
    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("req fail");
    assert!(response.status().is_success());
}

#[tokio::test]
async fn test_post_lifecycle_over_http() {
    let repo = Arc::new(InMemoryRepo::default());
    let user = repo.seed_user();
    let app = spawn_app(repo.clone()).await;
    let client = reqwest::Client::new();

    // Create (local bypass auth via x-user-id).
    let response = client
        .post(format!("{}/posts", app.address))
        .header("x-user-id", user.id.to_string())
        .json(&serde_json::json!({
            "title": "First post", "text": "Hello world", "pub_date": Utc::now()
        }))
        .send()
        .await
        .expect("post fail");
    assert_eq!(response.status(), 201);
    let created: Post = response.json().await.unwrap();
    assert_eq!(created.author_id, user.id);

    // Listed publicly.
    let list: PostPage = client
        .get(format!("{}/posts", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(list.posts.iter().any(|p| p.id == created.id));

    // Comment on it.
    let response = client
        .post(format!("{}/posts/{}/comments", app.address, created.id))
        .header("x-user-id", user.id.to_string())
        .json(&serde_json::json!({ "text": "nice one" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);

    // Delete it as its author.
    let response = client
        .delete(format!("{}/posts/{}", app.address, created.id))
        .header("x-user-id", user.id.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);
}

#[tokio::test]
async fn test_anonymous_cannot_create_posts() {
    let repo = Arc::new(InMemoryRepo::default());
    let app = spawn_app(repo.clone()).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/posts", app.address))
        .json(&serde_json::json!({
            "title": "nope", "text": "nope", "pub_date": Utc::now()
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
    assert!(
        repo.posts.lock().unwrap().is_empty(),
        "rejected request must not create a post"
    );
}

#[tokio::test]
async fn test_unknown_post_detail_404s() {
    let app = spawn_app(Arc::new(InMemoryRepo::default())).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/posts/{}", app.address, Uuid::new_v4()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}
