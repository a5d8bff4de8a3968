use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue};
use axum::Json;
use serde::Serialize;
use sqlx::SqlitePool;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::app::AppState;
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::admin::{Admin, AuthResponse, DbAdmin, LoginRequest, SessionResponse};
use crate::utils::verify_password;

const INVALID_CREDENTIALS: &str = "invalid credentials";

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    message: String,
}

pub(crate) const ADMIN_COLUMNS: &str =
    "id, name, email, password_hash, role, site_id, created_at, updated_at";

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful; the session cookie is set", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<(HeaderMap, Json<AuthResponse>)> {
    let db_admin = sqlx::query_as::<_, DbAdmin>(&format!(
        "SELECT {ADMIN_COLUMNS} FROM admins WHERE email = ?"
    ))
    .bind(payload.email.trim().to_ascii_lowercase())
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::unauthorized(INVALID_CREDENTIALS))?;

    if !verify_password(&payload.password, &db_admin.password_hash)? {
        tracing::info!(admin_id = %db_admin.id, "login rejected");
        return Err(AppError::unauthorized(INVALID_CREDENTIALS));
    }

    let token = state
        .config
        .jwt
        .encode(db_admin.id, db_admin.role(), db_admin.site_id.as_deref())?;
    let admin: Admin = db_admin.try_into()?;

    let max_age = state.config.jwt.exp_hours * 3600;
    let cookie = format!(
        "{}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}",
        state.config.session_cookie
    );

    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, header_value(&cookie)?);

    tracing::info!(admin_id = %admin.id, role = %admin.role, "admin logged in");

    Ok((headers, Json(AuthResponse { token, admin })))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Auth",
    responses(
        (status = 200, description = "Current admin and the permissions of its role", body = SessionResponse),
        (status = 401, description = "No valid session")
    ),
    security(("bearerAuth" = []))
)]
pub async fn me(State(state): State<AppState>, AuthUser(principal): AuthUser) -> AppResult<Json<SessionResponse>> {
    // Stored role wins over the token so demotions apply immediately.
    let db_admin = fetch_admin(&state.pool, principal.admin_id)
        .await
        .map_err(|err| match err {
            AppError::NotFound(_) => AppError::unauthorized("session no longer valid"),
            other => other,
        })?;

    let admin: Admin = db_admin.try_into()?;
    let permissions = admin.role.permissions();

    Ok(Json(SessionResponse { admin, permissions }))
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Auth",
    responses((status = 200, description = "Session cookie cleared", body = MessageResponse))
)]
pub async fn logout(State(state): State<AppState>) -> AppResult<(HeaderMap, Json<MessageResponse>)> {
    let cookie = format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
        state.config.session_cookie
    );

    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, header_value(&cookie)?);

    Ok((
        headers,
        Json(MessageResponse {
            message: "Logged out".to_string(),
        }),
    ))
}

pub(crate) async fn fetch_admin(pool: &SqlitePool, admin_id: Uuid) -> AppResult<DbAdmin> {
    sqlx::query_as::<_, DbAdmin>(&format!("SELECT {ADMIN_COLUMNS} FROM admins WHERE id = ?"))
        .bind(admin_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("admin not found"))
}

fn header_value(raw: &str) -> AppResult<HeaderValue> {
    HeaderValue::from_str(raw).map_err(|err| AppError::internal(format!("invalid header value: {err}")))
}
