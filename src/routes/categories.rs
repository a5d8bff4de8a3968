use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{require_site, scope_for, Capability};
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::category::{Category, CategoryCreateRequest};
use crate::models::post::SiteQuery;
use crate::utils::{slug_or_derive, utc_now};

#[utoipa::path(
    get,
    path = "/api/categories",
    tag = "Categories",
    params(SiteQuery),
    responses(
        (status = 200, description = "Categories of the resolved site", body = [Category]),
        (status = 400, description = "No site could be resolved")
    )
)]
pub async fn list_categories(
    State(state): State<AppState>,
    Query(query): Query<SiteQuery>,
) -> AppResult<Json<Vec<Category>>> {
    let site_id = require_site(scope_for(None, query.site_id.as_deref(), state.default_site()))?;

    let categories = sqlx::query_as::<_, Category>(
        "SELECT id, site_id, name, slug, created_at FROM categories WHERE site_id = ? ORDER BY name ASC",
    )
    .bind(&site_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(categories))
}

#[utoipa::path(
    post,
    path = "/api/categories",
    tag = "Categories",
    params(SiteQuery),
    request_body = CategoryCreateRequest,
    responses(
        (status = 201, description = "Category created", body = Category),
        (status = 403, description = "Missing canPublishPost"),
        (status = 409, description = "Slug already used in this site")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_category(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Query(query): Query<SiteQuery>,
    Json(payload): Json<CategoryCreateRequest>,
) -> AppResult<(StatusCode, Json<Category>)> {
    if !principal.can(Capability::PublishPost) {
        return Err(AppError::forbidden(format!(
            "missing permission: {}",
            Capability::PublishPost.as_str()
        )));
    }

    let site_id = require_site(scope_for(
        Some(&principal),
        query.site_id.as_deref(),
        state.default_site(),
    ))?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("name is required"));
    }
    let slug = slug_or_derive(payload.slug.as_deref(), name)?;

    let category = Category {
        id: Uuid::new_v4(),
        site_id,
        name: name.to_string(),
        slug,
        created_at: utc_now(),
    };

    sqlx::query("INSERT INTO categories (id, site_id, name, slug, created_at) VALUES (?, ?, ?, ?, ?)")
        .bind(category.id)
        .bind(&category.site_id)
        .bind(&category.name)
        .bind(&category.slug)
        .bind(category.created_at)
        .execute(&state.pool)
        .await
        .map_err(|err| match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::conflict("category slug already in use for this site")
            }
            _ => err.into(),
        })?;

    Ok((StatusCode::CREATED, Json(category)))
}
