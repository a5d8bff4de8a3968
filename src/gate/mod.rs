//! Front-door request gate.
//!
//! Runs before any handler: per-client rate limiting on the API, portal redirects driven by a
//! transition table, and cache headers on the way out. It never makes post-level decisions.

mod rate_limit;

pub use rate_limit::{Bucket, RateDecision, RateLimitConfig, RateLimiter, FEATURED_PREFIX, LATEST_PREFIX};

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderMap, HeaderValue, Method};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};

use crate::app::AppState;
use crate::authz::Principal;
use crate::errors::AppError;
use crate::jwt::session_token;

pub const STAFF_LOGIN: &str = "/login";
pub const SUPER_ADMIN_LOGIN: &str = "/admin/login";
pub const SUPER_ADMIN_DASHBOARD: &str = "/admin/dashboard";
pub const STAFF_POST_LIST: &str = "/admin/posts";

/// Admin UI sections reserved for super administrators.
pub const SUPER_ADMIN_SECTIONS: &[&str] = &[
    "/admin/dashboard",
    "/admin/users",
    "/admin/settings",
    "/admin/categories",
    "/admin/ads",
    "/admin/newsletter",
    "/admin/legal",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathCategory {
    PublicApi,
    AdminApi,
    AuthApi,
    StaffLogin,
    SuperAdminLogin,
    SuperAdminSection,
    AdminUi,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Anonymous,
    SuperAdmin,
    Staff,
}

impl AuthState {
    pub fn of(principal: Option<&Principal>) -> Self {
        match principal {
            None => AuthState::Anonymous,
            Some(p) if p.is_super_admin() => AuthState::SuperAdmin,
            Some(_) => AuthState::Staff,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateAction {
    Proceed,
    Redirect(&'static str),
}

/// One row of the gate table. `None` in `auth` matches every auth state.
#[derive(Debug, Clone, Copy)]
pub struct Transition {
    pub path: PathCategory,
    pub auth: Option<AuthState>,
    pub action: GateAction,
}

const fn to(path: PathCategory, auth: Option<AuthState>, target: &'static str) -> Transition {
    Transition {
        path,
        auth,
        action: GateAction::Redirect(target),
    }
}

/// First matching row wins; anything unmatched proceeds.
pub const TRANSITIONS: &[Transition] = &[
    to(PathCategory::StaffLogin, Some(AuthState::SuperAdmin), SUPER_ADMIN_DASHBOARD),
    to(PathCategory::SuperAdminLogin, Some(AuthState::Staff), STAFF_POST_LIST),
    to(PathCategory::SuperAdminSection, Some(AuthState::Anonymous), SUPER_ADMIN_LOGIN),
    to(PathCategory::SuperAdminSection, Some(AuthState::Staff), STAFF_POST_LIST),
    to(PathCategory::AdminUi, Some(AuthState::Anonymous), SUPER_ADMIN_LOGIN),
];

pub fn decide(category: PathCategory, auth: AuthState) -> GateAction {
    TRANSITIONS
        .iter()
        .find(|t| t.path == category && t.auth.map(|a| a == auth).unwrap_or(true))
        .map(|t| t.action)
        .unwrap_or(GateAction::Proceed)
}

fn under(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

fn admin_query(query: Option<&str>) -> bool {
    query
        .map(|q| q.split('&').any(|pair| pair == "admin=true" || pair == "admin=1"))
        .unwrap_or(false)
}

pub fn categorize(method: &Method, path: &str, query: Option<&str>) -> PathCategory {
    let path = if path.len() > 1 { path.trim_end_matches('/') } else { path };

    if path == STAFF_LOGIN {
        return PathCategory::StaffLogin;
    }
    if path == SUPER_ADMIN_LOGIN {
        return PathCategory::SuperAdminLogin;
    }
    if SUPER_ADMIN_SECTIONS.iter().any(|section| under(path, section)) {
        return PathCategory::SuperAdminSection;
    }
    if under(path, "/admin") {
        return PathCategory::AdminUi;
    }
    if under(path, "/api/auth") {
        return PathCategory::AuthApi;
    }
    if under(path, "/api") {
        let read_only = matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS);
        if under(path, "/api/admins") || admin_query(query) || !read_only {
            return PathCategory::AdminApi;
        }
        return PathCategory::PublicApi;
    }
    PathCategory::Other
}

/// Client address for rate limiting: proxy headers first, then the socket peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.trim().to_string())
        })
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

fn cache_policy(category: PathCategory, method: &Method) -> Option<&'static str> {
    match category {
        PathCategory::PublicApi if *method == Method::GET => {
            Some("public, max-age=60, stale-while-revalidate=300")
        }
        PathCategory::Other => None,
        _ => Some("no-store, max-age=0"),
    }
}

pub async fn routing_gate(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let category = categorize(&method, &path, req.uri().query());

    if let Some(bucket) = state.rate_limiter.bucket_for(&path) {
        let peer = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let client = client_ip(req.headers(), peer);

        if let RateDecision::Limited { retry_after } = state.rate_limiter.check(&client, &bucket) {
            tracing::warn!(client = %client, prefix = %bucket.prefix, "rate limit exceeded");
            return AppError::rate_limited(retry_after).into_response();
        }
    }

    let principal = session_token(req.headers(), &state.config.session_cookie)
        .and_then(|token| state.config.jwt.resolve(token));

    if let GateAction::Redirect(target) = decide(category, AuthState::of(principal.as_ref())) {
        tracing::debug!(path = %path, target, "gate redirect");
        return Redirect::temporary(target).into_response();
    }

    if let Some(principal) = principal {
        req.extensions_mut().insert(principal);
    }

    let mut response = next.run(req).await;

    if let Some(policy) = cache_policy(category, &method) {
        response
            .headers_mut()
            .entry(header::CACHE_CONTROL)
            .or_insert(HeaderValue::from_static(policy));
    }

    response
}
