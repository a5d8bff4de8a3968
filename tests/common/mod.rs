#![allow(dead_code)]

use std::path::Path;

use anyhow::Result;
use axum::body::{self, Body};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use serde_json::Value;
use sqlx::migrate::Migrator;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`
use uuid::Uuid;

use site_cms::authz::Role;
use site_cms::gate::RateLimitConfig;
use site_cms::jwt::JwtConfig;
use site_cms::{create_app_with_config, AppConfig};

pub const SITE: &str = "default";
pub const OTHER_SITE: &str = "other-site";
pub const PASSWORD: &str = "correct-horse-battery";

/// Version of the migration that predates `posts.editing_policy`.
const BASE_MIGRATION: i64 = 20240301000000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    Current,
    WithoutPolicyColumn,
}

pub struct TestApp {
    pub app: Router,
    pub pool: SqlitePool,
    pub jwt: JwtConfig,
    _dir: TempDir,
}

pub fn generous_limits() -> RateLimitConfig {
    RateLimitConfig {
        window_secs: 60,
        default_limit: 10_000,
        featured_limit: 10_000,
        latest_limit: 10_000,
    }
}

pub async fn spawn() -> Result<TestApp> {
    spawn_with(Schema::Current, generous_limits()).await
}

pub async fn spawn_with(schema: Schema, limits: RateLimitConfig) -> Result<TestApp> {
    spawn_configured(schema, |config| config.with_rate_limits(limits)).await
}

pub async fn spawn_configured(
    schema: Schema,
    configure: impl FnOnce(AppConfig) -> AppConfig,
) -> Result<TestApp> {
    let dir = tempfile::tempdir()?;
    let pool = connect(&dir).await?;
    migrate(&pool, schema).await?;

    let jwt = JwtConfig::new("test-secret", 1);
    let config = configure(AppConfig::new(jwt.clone()).with_rate_limits(generous_limits()));
    let app = create_app_with_config(pool.clone(), config);

    Ok(TestApp {
        app,
        pool,
        jwt,
        _dir: dir,
    })
}

pub async fn connect(dir: &TempDir) -> Result<SqlitePool> {
    let opts = SqliteConnectOptions::new()
        .filename(dir.path().join("test.db"))
        .create_if_missing(true);
    Ok(SqlitePool::connect_with(opts).await?)
}

pub async fn migrate(pool: &SqlitePool, schema: Schema) -> Result<()> {
    let mut migrator = Migrator::new(Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;

    if schema == Schema::WithoutPolicyColumn {
        let base: Vec<_> = migrator
            .migrations
            .iter()
            .filter(|m| m.version == BASE_MIGRATION)
            .cloned()
            .collect();
        migrator.migrations = base.into();
    }

    migrator.run(pool).await?;
    Ok(())
}

impl TestApp {
    pub async fn admin(&self, role: Role, site: Option<&str>) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO admins (id, name, email, password_hash, role, site_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(format!("{role} user"))
        .bind(format!("{id}@example.com"))
        .bind("unusable")
        .bind(role.as_str())
        .bind(site)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    /// Seeds an admin and returns it with a session token for it.
    pub async fn login_as(&self, role: Role, site: &str) -> Result<(Uuid, String)> {
        let id = self.admin(role, Some(site)).await?;
        let token = self.token(id, role, site)?;
        Ok((id, token))
    }

    pub fn token(&self, id: Uuid, role: Role, site: &str) -> Result<String> {
        Ok(self.jwt.encode(id, role, Some(site))?)
    }

    pub async fn category(&self, site: &str) -> Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO categories (id, site_id, name, slug, created_at) VALUES (?, ?, ?, ?, ?)")
            .bind(id)
            .bind(site)
            .bind("News")
            .bind(format!("news-{}", id.simple()))
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(id)
    }

    pub async fn post(&self, site: &str, author: Uuid, slug: &str, published: bool) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO posts (id, site_id, author_id, title, slug, content, published, featured, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, ?)",
        )
        .bind(id)
        .bind(site)
        .bind(author)
        .bind(format!("Title of {slug}"))
        .bind(slug)
        .bind("<p>original</p>")
        .bind(published)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn share_content_only(&self, slug: &str) -> Result<()> {
        sqlx::query("UPDATE posts SET editing_policy = 'SUPER_ADMIN_CONTENT_ONLY' WHERE slug = ?")
            .bind(slug)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<(StatusCode, HeaderMap, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let req = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&json)?))?,
            None => builder.body(Body::empty())?,
        };

        send_request(&self.app, req).await
    }
}

pub async fn send_request(app: &Router, req: Request<Body>) -> Result<(StatusCode, HeaderMap, Value)> {
    let resp = app.clone().oneshot(req).await?;
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    Ok((status, headers, value))
}
