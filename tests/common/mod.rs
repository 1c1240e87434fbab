#![allow(dead_code)]

use anyhow::Result;
use axum::body::{self, Body};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`
use uuid::Uuid;

use globoo_auth::authz::Role;
use globoo_auth::db::SqliteStore;
use globoo_auth::jwt::JwtConfig;
use globoo_auth::utils::hash_password;
use globoo_auth::{create_app_with_config, Config};

pub const SECRET: &str = "test-secret";
pub const PASSWORD: &str = "password123";

pub struct TestApp {
    pub app: Router,
    pub pool: SqlitePool,
    pub store: SqliteStore,
    pub jwt: JwtConfig,
    // keeps the database file alive for the duration of the test
    _dir: TempDir,
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl Reply {
    pub fn location(&self) -> Option<&str> {
        self.headers.get("location").and_then(|v| v.to_str().ok())
    }

    pub fn set_cookie(&self) -> Option<&str> {
        self.headers.get("set-cookie").and_then(|v| v.to_str().ok())
    }

    pub fn str(&self, key: &str) -> String {
        self.body.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
    }
}

pub async fn test_pool() -> Result<(SqlitePool, TempDir)> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("test.db");

    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
    migrator.run(&pool).await?;

    Ok((pool, dir))
}

pub async fn spawn_app() -> Result<TestApp> {
    spawn_app_with(|_| {}).await
}

pub async fn spawn_app_with(tweak: impl FnOnce(&mut Config)) -> Result<TestApp> {
    let (pool, dir) = test_pool().await?;

    let jwt = JwtConfig::new(SECRET, 24);
    let mut config = Config::new(jwt.clone());
    tweak(&mut config);

    let app = create_app_with_config(pool.clone(), config).await?;

    Ok(TestApp {
        app,
        store: SqliteStore::new(pool.clone()),
        pool,
        jwt,
        _dir: dir,
    })
}

impl TestApp {
    pub async fn seed_user(&self, name: &str, email: &str, role: Role) -> Result<Uuid> {
        let hash = hash_password(PASSWORD)?;
        let user = self.store.create_user(name, email, &hash, role).await?;
        Ok(user.id)
    }

    pub fn token_for(&self, user_id: Uuid, role: Role) -> Result<String> {
        Ok(self.jwt.encode(user_id, role)?)
    }

    pub async fn send(&self, req: Request<Body>) -> Result<Reply> {
        let resp = self.app.clone().oneshot(req).await?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        Ok(Reply { status, headers, body })
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> Result<Reply> {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))?;
        self.send(req).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Result<Reply> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        self.send(builder.body(Body::empty())?).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Reply> {
        self.post_json("/api/auth/login", serde_json::json!({ "email": email, "password": password }))
            .await
    }
}
