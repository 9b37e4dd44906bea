#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Request, StatusCode},
    Router,
};
use intranet_accounts::{
    create_account, mark_verified, set_role, update_profile, PasswordHasher, ProfileUpdate,
    TokenIssuer, User,
};
use intranet_db::{create_pool, DbPool, DbRuntimeSettings};
use intranet_server::giphy::{GifError, GifProvider};
use intranet_server::mailer::{Email, MailError, Mailer};
use intranet_server::middleware::RateLimiter;
use intranet_server::{app, AppState};
use intranet_types::{Role, SitePolicy};
use serde_json::Value;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tower::ServiceExt;

pub const PASSWORD: &str = "Secret123";

/// Keeps every message instead of sending it.
#[derive(Default, Clone)]
pub struct RecordingMailer {
    pub sent: Arc<Mutex<Vec<Email>>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

/// Hands out queued URLs; an empty queue behaves like a search with no hits.
#[derive(Default, Clone)]
pub struct StubGifs {
    pub queue: Arc<Mutex<VecDeque<String>>>,
}

impl StubGifs {
    pub fn push(&self, url: &str) {
        self.queue.lock().unwrap().push_back(url.to_string());
    }
}

#[async_trait]
impl GifProvider for StubGifs {
    async fn random_birthday_gif(&self) -> Result<String, GifError> {
        self.queue
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(GifError::NoResults)
    }
}

pub struct TestApp {
    pub app: Router,
    pub pool: DbPool,
    pub mailer: RecordingMailer,
    pub gifs: StubGifs,
    pub tokens: TokenIssuer,
    pub upload_dir: TempDir,
    _db_dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_rate_limit(1000)
    }

    pub fn with_rate_limit(auth_rate_limit: u32) -> Self {
        let db_dir = TempDir::new().unwrap();
        let db_path = db_dir.path().join("test.db");
        let pool = create_pool(db_path.to_str().unwrap(), DbRuntimeSettings::default()).unwrap();
        {
            let conn = pool.get().unwrap();
            intranet_db::run_migrations(&conn).unwrap();
        }

        let upload_dir = TempDir::new().unwrap();
        let mailer = RecordingMailer::default();
        let gifs = StubGifs::default();
        let tokens = TokenIssuer::new("test-secret", 24);

        let state = AppState {
            pool: pool.clone(),
            tokens: tokens.clone(),
            hasher: PasswordHasher::new(4),
            mailer: Arc::new(mailer.clone()),
            gifs: Arc::new(gifs.clone()),
            site: SitePolicy::default(),
            upload_dir: upload_dir.path().to_string_lossy().into_owned(),
            max_upload_bytes: 1024 * 1024,
            rate_limiter: RateLimiter::per_minute(auth_rate_limit),
            reset_ttl_minutes: 60,
        };

        Self {
            app: app(state),
            pool,
            mailer,
            gifs,
            tokens,
            upload_dir,
            _db_dir: db_dir,
        }
    }

    /// Creates a verified account with `role` and returns it with a token.
    pub fn account(&self, username: &str, role: Role) -> (User, String) {
        let conn = self.pool.get().unwrap();
        let hash = PasswordHasher::new(4).hash(PASSWORD).unwrap();
        let user = create_account(&conn, username, &hash, "000000").unwrap();
        mark_verified(&conn, user.id).unwrap();
        set_role(&conn, user.id, role).unwrap();
        let user = intranet_accounts::get_user(&conn, user.id).unwrap();
        let token = self.tokens.issue(&user).unwrap();
        (user, token)
    }

    pub fn set_profile(&self, user_id: i64, update: ProfileUpdate) -> User {
        let conn = self.pool.get().unwrap();
        update_profile(&conn, user_id, &update).unwrap()
    }

    pub async fn send(&self, mut request: Request<Body>) -> (StatusCode, Value) {
        let addr = SocketAddr::from(([127, 0, 0, 1], 40000));
        request.extensions_mut().insert(ConnectInfo(addr));
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .uri(uri)
            .header("x-access-token", token)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("DELETE")
            .uri(uri)
            .header("x-access-token", token)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn json(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Value,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }
}
