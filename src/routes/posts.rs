use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::{Sqlite, SqliteConnection};
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{
    apply_patch, decide_create, decide_delete, decide_list, decide_read, decide_update,
    require_site, scope_for, sharing_active, ChangeSet, CreateFlags, EditingPolicy, ListScope,
    Operation, PostFacts, PostField, Principal, Role,
};
use crate::errors::{AppError, AppResult};
use crate::jwt::{AuthUser, MaybeAuthUser};
use crate::models::post::{
    DbPost, HighlightQuery, Pagination, Post, PostCreateRequest, PostListQuery,
    PostListResponse, PostReadQuery, PostUpdateRequest, SiteQuery,
};
use crate::utils::{slug_or_derive, utc_now};

const DEFAULT_HIGHLIGHT_LIMIT: i64 = 6;
const MAX_HIGHLIGHT_LIMIT: i64 = 20;

/// Projection shared by every post query. The policy column is selected only when storage
/// carries it.
fn select_posts(policy_column: bool) -> String {
    let policy = if policy_column {
        "p.editing_policy"
    } else {
        "NULL AS editing_policy"
    };

    format!(
        "SELECT p.id, p.site_id, p.author_id, p.category_id, p.title, p.slug, p.short_desc, \
         p.content, p.main_image, p.og_image, p.meta_title, p.meta_desc, p.published, \
         p.featured, {policy}, a.role AS author_role, p.created_at, p.updated_at \
         FROM posts p LEFT JOIN admins a ON a.id = p.author_id"
    )
}

fn facts(post: &DbPost, policy_column: bool) -> PostFacts {
    PostFacts {
        author_id: post.author_id,
        author_role: post.author_role(),
        published: post.published,
        shared_content_only: sharing_active(policy_column, post.policy(), post.author_role()),
    }
}

fn site_for(state: &AppState, principal: Option<&Principal>, requested: Option<&str>) -> AppResult<String> {
    require_site(scope_for(principal, requested, state.default_site()))
}

/// Session principal with role and site as currently stored. Writes decide on this so a
/// demotion or removal takes effect before the token expires.
async fn stored_principal(conn: &mut SqliteConnection, session: Principal) -> AppResult<Principal> {
    let row: Option<(String, Option<String>)> =
        sqlx::query_as("SELECT role, site_id FROM admins WHERE id = ?")
            .bind(session.admin_id)
            .fetch_optional(&mut *conn)
            .await?;

    let (role, site_id) = row.ok_or_else(|| AppError::unauthorized("session no longer valid"))?;

    Ok(Principal {
        role: Role::normalize(&role),
        site_id: site_id.filter(|s| !s.trim().is_empty()),
        ..session
    })
}

/// Public projection of a post. The editing policy is administrative detail.
fn public_post(row: DbPost) -> AppResult<Post> {
    let mut post = Post::try_from(row)?;
    post.editing_policy = None;
    Ok(post)
}

#[utoipa::path(
    get,
    path = "/api/posts",
    tag = "Posts",
    params(PostListQuery),
    responses(
        (status = 200, description = "Paginated posts of the resolved site", body = PostListResponse),
        (status = 400, description = "No site could be resolved"),
        (status = 401, description = "Administrative listing without a session")
    )
)]
pub async fn list_posts(
    State(state): State<AppState>,
    MaybeAuthUser(session): MaybeAuthUser,
    Query(query): Query<PostListQuery>,
) -> AppResult<Json<PostListResponse>> {
    let viewer = if query.admin.unwrap_or(false) {
        Some(session.ok_or_else(|| AppError::unauthorized("authentication required"))?)
    } else {
        None
    };

    let site_id = site_for(&state, viewer.as_ref(), query.site_id.as_deref())?;
    let policy_column = state.policy_supported().await?;
    let (page, limit) = Pagination::window(query.page, query.limit);

    let mut filter = String::from("p.site_id = ?");
    let mut owner = None;

    match viewer.as_ref() {
        None => filter.push_str(" AND p.published = 1"),
        Some(principal) => match decide_list(principal, policy_column) {
            ListScope::All => {}
            ListScope::OwnedOrShared { include_shared } => {
                owner = Some(principal.admin_id);
                if include_shared {
                    filter.push_str(&format!(
                        " AND (p.author_id = ? OR (p.editing_policy = '{}' AND UPPER(a.role) = '{}'))",
                        EditingPolicy::SuperAdminContentOnly.as_str(),
                        Role::SuperAdmin.as_str()
                    ));
                } else {
                    filter.push_str(" AND p.author_id = ?");
                }
            }
        },
    }

    let count_sql = format!(
        "SELECT COUNT(1) FROM posts p LEFT JOIN admins a ON a.id = p.author_id WHERE {filter}"
    );
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql).bind(&site_id);
    if let Some(owner) = owner {
        count_query = count_query.bind(owner);
    }
    let total = count_query.fetch_one(&state.pool).await?;

    let pagination = Pagination::new(page, limit, total);

    let sql = format!(
        "{} WHERE {filter} ORDER BY p.created_at DESC LIMIT ? OFFSET ?",
        select_posts(policy_column)
    );
    let mut rows_query = sqlx::query_as::<_, DbPost>(&sql).bind(&site_id);
    if let Some(owner) = owner {
        rows_query = rows_query.bind(owner);
    }
    let rows = rows_query
        .bind(pagination.limit)
        .bind(pagination.offset())
        .fetch_all(&state.pool)
        .await?;

    let posts = rows
        .into_iter()
        .map(|row| match viewer {
            Some(_) => Post::try_from(row),
            None => public_post(row),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(PostListResponse { posts, pagination }))
}

#[utoipa::path(
    get,
    path = "/api/posts/{slug}",
    tag = "Posts",
    params(("slug" = String, Path, description = "Post slug"), PostReadQuery),
    responses(
        (status = 200, description = "Post", body = Post),
        (status = 403, description = "Administrative read of a post the caller may not see"),
        (status = 404, description = "No such post in the resolved site")
    )
)]
pub async fn get_post(
    State(state): State<AppState>,
    MaybeAuthUser(session): MaybeAuthUser,
    Path(slug): Path<String>,
    Query(query): Query<PostReadQuery>,
) -> AppResult<Json<Post>> {
    let viewer = if query.admin.unwrap_or(false) {
        Some(session.ok_or_else(|| AppError::unauthorized("authentication required"))?)
    } else {
        None
    };

    let site_id = site_for(&state, viewer.as_ref(), query.site_id.as_deref())?;
    let policy_column = state.policy_supported().await?;

    let mut conn = state.pool.acquire().await?;
    let post = fetch_post(&mut conn, &site_id, &slug, policy_column).await?;

    decide_read(viewer.as_ref(), &facts(&post, policy_column))
        .traced(viewer.as_ref(), Operation::Read)
        .into_result()?;

    match viewer {
        Some(_) => Ok(Json(post.try_into()?)),
        None => Ok(Json(public_post(post)?)),
    }
}

#[utoipa::path(
    post,
    path = "/api/posts",
    tag = "Posts",
    params(SiteQuery),
    request_body = PostCreateRequest,
    responses(
        (status = 201, description = "Post created", body = Post),
        (status = 400, description = "Invalid payload or category outside the site"),
        (status = 401, description = "No valid session or account removed"),
        (status = 403, description = "Missing create permission"),
        (status = 409, description = "Slug already used in this site")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_post(
    State(state): State<AppState>,
    AuthUser(session): AuthUser,
    Query(query): Query<SiteQuery>,
    Json(payload): Json<PostCreateRequest>,
) -> AppResult<(StatusCode, Json<Post>)> {
    let mut tx = state.pool.begin().await?;
    let principal = stored_principal(&mut tx, session).await?;

    let requested = CreateFlags {
        published: payload.published.unwrap_or(false),
        featured: payload.featured.unwrap_or(false),
    };

    let stripped = decide_create(&principal, requested)
        .traced(Some(&principal), Operation::Create)
        .into_result()?;

    if !stripped.is_empty() {
        tracing::debug!(admin_id = %principal.admin_id, ?stripped, "publish flags reset on create");
    }

    let published = requested.published && !stripped.contains(&PostField::Published);
    let featured = requested.featured && !stripped.contains(&PostField::Featured);

    let site_id = site_for(&state, Some(&principal), query.site_id.as_deref())?;
    let policy_column = state.policy_supported().await?;

    let title = payload.title.trim();
    if title.is_empty() {
        return Err(AppError::bad_request("title is required"));
    }
    let slug = slug_or_derive(payload.slug.as_deref(), title)?;

    ensure_category(&mut tx, &site_id, payload.category_id).await?;

    let now = utc_now();
    let post_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO posts (id, site_id, author_id, category_id, title, slug, short_desc, content, main_image, og_image, meta_title, meta_desc, published, featured, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(post_id)
    .bind(&site_id)
    .bind(principal.admin_id)
    .bind(payload.category_id)
    .bind(title)
    .bind(&slug)
    .bind(&payload.short_desc)
    .bind(&payload.content)
    .bind(&payload.main_image)
    .bind(&payload.og_image)
    .bind(&payload.meta_title)
    .bind(&payload.meta_desc)
    .bind(published)
    .bind(featured)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .map_err(slug_conflict)?;

    let post = fetch_post(&mut tx, &site_id, &slug, policy_column).await?;
    tx.commit().await?;

    tracing::info!(post_id = %post.id, site_id = %site_id, author_id = %principal.admin_id, "post created");

    Ok((StatusCode::CREATED, Json(post.try_into()?)))
}

#[utoipa::path(
    patch,
    path = "/api/posts/{slug}",
    tag = "Posts",
    params(("slug" = String, Path, description = "Post slug"), SiteQuery),
    request_body = PostUpdateRequest,
    responses(
        (status = 200, description = "Post after the update", body = Post),
        (status = 400, description = "Invalid payload or editingPolicy unavailable"),
        (status = 401, description = "No valid session or account removed"),
        (status = 403, description = "Update denied; the message names the rule"),
        (status = 404, description = "No such post in the resolved site"),
        (status = 409, description = "Slug already used in this site")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_post(
    State(state): State<AppState>,
    AuthUser(session): AuthUser,
    Path(slug): Path<String>,
    Query(query): Query<SiteQuery>,
    Json(payload): Json<PostUpdateRequest>,
) -> AppResult<Json<Post>> {
    let policy_column = state.policy_supported().await?;

    // Read, decide and write under one transaction so the decision sees the row it changes.
    let mut tx = state.pool.begin().await?;
    let principal = stored_principal(&mut tx, session).await?;
    let site_id = site_for(&state, Some(&principal), query.site_id.as_deref())?;

    let existing = fetch_post(&mut tx, &site_id, &slug, policy_column).await?;
    let changes = ChangeSet::between(&existing, &payload, policy_column)?;

    let existing_facts = facts(&existing, policy_column);
    decide_update(&principal, &existing_facts, &changes)
        .traced(Some(&principal), Operation::Update)
        .into_result()?;

    // Nothing to write, but the response still discloses the post.
    if changes.is_empty() {
        tx.rollback().await?;
        decide_read(Some(&principal), &existing_facts)
            .traced(Some(&principal), Operation::Read)
            .into_result()?;
        return Ok(Json(existing.try_into()?));
    }

    if changes.requested_policy() == Some(EditingPolicy::SuperAdminContentOnly)
        && !existing.author_role().map(|r| r.is_super_admin()).unwrap_or(false)
    {
        return Err(AppError::bad_request(
            "content-only sharing is only available on posts authored by a super administrator",
        ));
    }

    if changes.contains(PostField::CategoryId) {
        if let Some(category_id) = payload.category_id {
            ensure_category(&mut tx, &site_id, category_id).await?;
        }
    }

    let mut next = apply_patch(&existing, &payload, &changes);

    if changes.contains(PostField::Title) {
        next.title = next.title.trim().to_string();
        if next.title.is_empty() {
            return Err(AppError::bad_request("title is required"));
        }
    }
    if changes.contains(PostField::Slug) {
        next.slug = slug_or_derive(Some(&next.slug), &next.title)?;
    }

    let policy_assignment = if policy_column { ", editing_policy = ?" } else { "" };
    let sql = format!(
        "UPDATE posts SET title = ?, slug = ?, short_desc = ?, content = ?, main_image = ?, og_image = ?, \
         meta_title = ?, meta_desc = ?, category_id = ?, published = ?, featured = ?, updated_at = ?{policy_assignment} \
         WHERE id = ? AND site_id = ?"
    );

    let mut update = sqlx::query(&sql)
        .bind(&next.title)
        .bind(&next.slug)
        .bind(&next.short_desc)
        .bind(&next.content)
        .bind(&next.main_image)
        .bind(&next.og_image)
        .bind(&next.meta_title)
        .bind(&next.meta_desc)
        .bind(next.category_id)
        .bind(next.published)
        .bind(next.featured)
        .bind(utc_now());
    if policy_column {
        update = update.bind(next.policy().as_str());
    }
    update
        .bind(existing.id)
        .bind(&site_id)
        .execute(&mut *tx)
        .await
        .map_err(slug_conflict)?;

    let updated = fetch_post(&mut tx, &site_id, &next.slug, policy_column).await?;
    tx.commit().await?;

    tracing::info!(
        post_id = %updated.id,
        admin_id = %principal.admin_id,
        fields = ?changes.fields(),
        "post updated"
    );

    Ok(Json(updated.try_into()?))
}

#[utoipa::path(
    delete,
    path = "/api/posts/{slug}",
    tag = "Posts",
    params(("slug" = String, Path, description = "Post slug"), SiteQuery),
    responses(
        (status = 204, description = "Post deleted"),
        (status = 401, description = "No valid session or account removed"),
        (status = 403, description = "Missing delete permission"),
        (status = 404, description = "No such post in the resolved site")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_post(
    State(state): State<AppState>,
    AuthUser(session): AuthUser,
    Path(slug): Path<String>,
    Query(query): Query<SiteQuery>,
) -> AppResult<StatusCode> {
    let policy_column = state.policy_supported().await?;

    let mut tx = state.pool.begin().await?;
    let principal = stored_principal(&mut tx, session).await?;
    let site_id = site_for(&state, Some(&principal), query.site_id.as_deref())?;
    let existing = fetch_post(&mut tx, &site_id, &slug, policy_column).await?;

    decide_delete(&principal)
        .traced(Some(&principal), Operation::Delete)
        .into_result()?;

    sqlx::query("DELETE FROM posts WHERE id = ? AND site_id = ?")
        .bind(existing.id)
        .bind(&site_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(post_id = %existing.id, admin_id = %principal.admin_id, "post deleted");

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/posts/featured",
    tag = "Posts",
    params(HighlightQuery),
    responses((status = 200, description = "Published featured posts", body = [Post]))
)]
pub async fn featured_posts(
    State(state): State<AppState>,
    Query(query): Query<HighlightQuery>,
) -> AppResult<Json<Vec<Post>>> {
    highlights(&state, &query, "p.featured = 1", "p.updated_at DESC").await
}

#[utoipa::path(
    get,
    path = "/api/posts/latest",
    tag = "Posts",
    params(HighlightQuery),
    responses((status = 200, description = "Most recent published posts", body = [Post]))
)]
pub async fn latest_posts(
    State(state): State<AppState>,
    Query(query): Query<HighlightQuery>,
) -> AppResult<Json<Vec<Post>>> {
    highlights(&state, &query, "1 = 1", "p.created_at DESC").await
}

async fn highlights(
    state: &AppState,
    query: &HighlightQuery,
    extra_filter: &str,
    order: &str,
) -> AppResult<Json<Vec<Post>>> {
    let site_id = site_for(state, None, query.site_id.as_deref())?;
    let policy_column = state.policy_supported().await?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HIGHLIGHT_LIMIT)
        .clamp(1, MAX_HIGHLIGHT_LIMIT);

    let sql = format!(
        "{} WHERE p.site_id = ? AND p.published = 1 AND {extra_filter} ORDER BY {order} LIMIT ?",
        select_posts(policy_column)
    );

    let rows = sqlx::query_as::<_, DbPost>(&sql)
        .bind(&site_id)
        .bind(limit)
        .fetch_all(&state.pool)
        .await?;

    let posts = rows
        .into_iter()
        .map(public_post)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(posts))
}

/// Tenant-scoped lookup. A post of another site is indistinguishable from a missing one.
async fn fetch_post(
    conn: &mut SqliteConnection,
    site_id: &str,
    slug: &str,
    policy_column: bool,
) -> AppResult<DbPost> {
    let sql = format!("{} WHERE p.site_id = ? AND p.slug = ?", select_posts(policy_column));

    sqlx::query_as::<Sqlite, DbPost>(&sql)
        .bind(site_id)
        .bind(slug)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("post not found"))
}

async fn ensure_category(conn: &mut SqliteConnection, site_id: &str, category_id: Uuid) -> AppResult<()> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM categories WHERE id = ? AND site_id = ?")
        .bind(category_id)
        .bind(site_id)
        .fetch_one(&mut *conn)
        .await?;

    if count == 0 {
        return Err(AppError::bad_request("categoryId does not exist in this site"));
    }

    Ok(())
}

fn slug_conflict(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::conflict("slug already in use for this site")
        }
        _ => err.into(),
    }
}
