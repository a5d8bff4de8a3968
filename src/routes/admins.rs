use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{scope_for, Capability, Principal, Role};
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::admin::{Admin, AdminCreateRequest, AdminUpdateRequest, DbAdmin};
use crate::routes::auth::{fetch_admin, ADMIN_COLUMNS};
use crate::utils::{hash_password, utc_now};

fn require_manager(principal: &Principal) -> AppResult<()> {
    if principal.can(Capability::ManageAdminUsers) {
        Ok(())
    } else {
        tracing::info!(
            admin_id = %principal.admin_id,
            role = %principal.role,
            rule = "missing_capability",
            "admin management denied"
        );
        Err(AppError::forbidden(format!(
            "missing permission: {}",
            Capability::ManageAdminUsers.as_str()
        )))
    }
}

fn parse_role(raw: &str) -> AppResult<Role> {
    raw.parse::<Role>()
        .map_err(|err| AppError::bad_request(err.to_string()))
}

#[utoipa::path(
    get,
    path = "/api/admins",
    tag = "Admins",
    responses(
        (status = 200, description = "All admin accounts", body = [Admin]),
        (status = 403, description = "Missing canManageAdminUsers")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_admins(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
) -> AppResult<Json<Vec<Admin>>> {
    require_manager(&principal)?;

    let rows = sqlx::query_as::<_, DbAdmin>(&format!(
        "SELECT {ADMIN_COLUMNS} FROM admins ORDER BY created_at ASC"
    ))
    .fetch_all(&state.pool)
    .await?;

    let admins = rows
        .into_iter()
        .map(Admin::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(admins))
}

#[utoipa::path(
    post,
    path = "/api/admins",
    tag = "Admins",
    request_body = AdminCreateRequest,
    responses(
        (status = 201, description = "Admin created", body = Admin),
        (status = 400, description = "Unknown role or weak password"),
        (status = 403, description = "Missing canManageAdminUsers"),
        (status = 409, description = "Email already in use")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_admin(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Json(payload): Json<AdminCreateRequest>,
) -> AppResult<(StatusCode, Json<Admin>)> {
    require_manager(&principal)?;

    let role = parse_role(&payload.role)?;
    let name = payload.name.trim();
    let email = payload.email.trim().to_ascii_lowercase();
    if name.is_empty() || email.is_empty() {
        return Err(AppError::bad_request("name and email are required"));
    }

    let site_id = scope_for(Some(&principal), payload.site_id.as_deref(), state.default_site());
    let password_hash = hash_password(&payload.password)?;
    let now = utc_now();
    let admin_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO admins (id, name, email, password_hash, role, site_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(admin_id)
    .bind(name)
    .bind(&email)
    .bind(password_hash)
    .bind(role.as_str())
    .bind(&site_id)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await
    .map_err(|err| match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::conflict("email already in use")
        }
        _ => err.into(),
    })?;

    let admin: Admin = fetch_admin(&state.pool, admin_id).await?.try_into()?;
    tracing::info!(admin_id = %admin.id, role = %admin.role, created_by = %principal.admin_id, "admin created");

    Ok((StatusCode::CREATED, Json(admin)))
}

#[utoipa::path(
    patch,
    path = "/api/admins/{id}",
    tag = "Admins",
    params(("id" = Uuid, Path, description = "Admin id")),
    request_body = AdminUpdateRequest,
    responses(
        (status = 200, description = "Admin updated", body = Admin),
        (status = 400, description = "Unknown role, self-demotion or last super administrator"),
        (status = 403, description = "Missing canManageAdminUsers"),
        (status = 404, description = "Admin not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_admin(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(admin_id): Path<Uuid>,
    Json(payload): Json<AdminUpdateRequest>,
) -> AppResult<Json<Admin>> {
    require_manager(&principal)?;

    let new_role = payload.role.as_deref().map(parse_role).transpose()?;

    let mut tx = state.pool.begin().await?;
    let existing = fetch_admin_in(&mut tx, admin_id).await?;

    if let Some(role) = new_role {
        let demotes_super_admin = existing.role().is_super_admin() && !role.is_super_admin();
        if demotes_super_admin {
            if existing.id == principal.admin_id {
                return Err(AppError::bad_request("you cannot remove your own super administrator role"));
            }
            ensure_other_super_admin(&mut tx, existing.id).await?;
        }
    }

    let name = match payload.name.as_deref().map(str::trim) {
        Some("") => return Err(AppError::bad_request("name cannot be empty")),
        Some(name) => name.to_string(),
        None => existing.name.clone(),
    };
    let role = new_role.unwrap_or_else(|| existing.role());
    let site_id = match payload.site_id.as_deref().map(str::trim) {
        Some("") => None,
        Some(site) => Some(site.to_string()),
        None => existing.site_id.clone(),
    };

    sqlx::query("UPDATE admins SET name = ?, role = ?, site_id = ?, updated_at = ? WHERE id = ?")
        .bind(&name)
        .bind(role.as_str())
        .bind(&site_id)
        .bind(utc_now())
        .bind(existing.id)
        .execute(&mut *tx)
        .await?;

    let updated: Admin = fetch_admin_in(&mut tx, existing.id).await?.try_into()?;
    tx.commit().await?;

    tracing::info!(admin_id = %updated.id, role = %updated.role, updated_by = %principal.admin_id, "admin updated");

    Ok(Json(updated))
}

#[utoipa::path(
    delete,
    path = "/api/admins/{id}",
    tag = "Admins",
    params(("id" = Uuid, Path, description = "Admin id")),
    responses(
        (status = 204, description = "Admin deleted"),
        (status = 400, description = "Last super administrator or own account"),
        (status = 403, description = "Missing canManageAdminUsers"),
        (status = 404, description = "Admin not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_admin(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(admin_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    require_manager(&principal)?;

    let mut tx = state.pool.begin().await?;
    let existing = fetch_admin_in(&mut tx, admin_id).await?;

    if existing.id == principal.admin_id {
        return Err(AppError::bad_request("you cannot delete your own account"));
    }
    if existing.role().is_super_admin() {
        ensure_other_super_admin(&mut tx, existing.id).await?;
    }

    sqlx::query("DELETE FROM admins WHERE id = ?")
        .bind(existing.id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(admin_id = %existing.id, deleted_by = %principal.admin_id, "admin deleted");

    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_admin_in(conn: &mut SqliteConnection, admin_id: Uuid) -> AppResult<DbAdmin> {
    sqlx::query_as::<_, DbAdmin>(&format!("SELECT {ADMIN_COLUMNS} FROM admins WHERE id = ?"))
        .bind(admin_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("admin not found"))
}

/// Rejects when `admin_id` is the only stored super administrator.
async fn ensure_other_super_admin(conn: &mut SqliteConnection, admin_id: Uuid) -> AppResult<()> {
    let others: i64 = sqlx::query_scalar(
        "SELECT COUNT(1) FROM admins WHERE UPPER(role) = ? AND id != ?",
    )
    .bind(Role::SuperAdmin.as_str())
    .bind(admin_id)
    .fetch_one(&mut *conn)
    .await?;

    if others == 0 {
        return Err(AppError::bad_request(
            "the last super administrator cannot be demoted or deleted",
        ));
    }

    Ok(())
}
