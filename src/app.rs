use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::middleware;
use axum::routing::{get, patch, post};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::authz::PolicyCapability;
use crate::config::AppConfig;
use crate::errors::{AppError, AppResult};
use crate::gate::{self, RateLimiter};
use crate::routes::{admins, auth, categories, health, portal, posts};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Arc<AppConfig>,
    pub policy: Arc<PolicyCapability>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: AppConfig) -> Self {
        Self {
            pool,
            policy: Arc::new(PolicyCapability::new(config.policy_column)),
            rate_limiter: Arc::new(RateLimiter::new(config.rate_limits)),
            config: Arc::new(config),
        }
    }

    /// Whether `posts.editing_policy` can be read and written on this deployment.
    pub async fn policy_supported(&self) -> AppResult<bool> {
        self.policy.supported(&self.pool).await
    }

    pub fn default_site(&self) -> Option<&str> {
        self.config.default_site_id.as_deref()
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let config = AppConfig::from_env()?;
    Ok(create_app_with_config(pool, config))
}

pub fn create_app_with_config(pool: SqlitePool, config: AppConfig) -> Router {
    let state = AppState::new(pool, config);

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route("/logout", post(auth::logout));

    // Static segments take precedence over `/:slug`.
    let post_routes = Router::new()
        .route("/", get(posts::list_posts).post(posts::create_post))
        .route("/featured", get(posts::featured_posts))
        .route("/latest", get(posts::latest_posts))
        .route(
            "/:slug",
            get(posts::get_post)
                .patch(posts::update_post)
                .delete(posts::delete_post),
        );

    let category_routes = Router::new().route(
        "/",
        get(categories::list_categories).post(categories::create_category),
    );

    let admin_routes = Router::new()
        .route("/", get(admins::list_admins).post(admins::create_admin))
        .route("/:id", patch(admins::update_admin).delete(admins::delete_admin));

    let portal_routes = Router::new()
        .route(gate::STAFF_LOGIN, get(portal::landing))
        .route("/admin", get(portal::landing))
        .route("/admin/*rest", get(portal::landing));

    Router::new()
        .route("/api/health", get(health::health))
        .nest("/api/auth", auth_routes)
        .nest("/api/posts", post_routes)
        .nest("/api/categories", category_routes)
        .nest("/api/admins", admin_routes)
        .merge(portal_routes)
        .layer(middleware::from_fn_with_state(state.clone(), gate::routing_gate))
        .with_state(state)
        .layer(cors)
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .layer(TraceLayer::new_for_http())
}
