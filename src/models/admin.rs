use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::{Role, RolePermissions};
use crate::errors::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Admin {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub site_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbAdmin {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub site_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbAdmin {
    pub fn role(&self) -> Role {
        Role::normalize(&self.role)
    }
}

impl TryFrom<DbAdmin> for Admin {
    type Error = AppError;

    fn try_from(value: DbAdmin) -> Result<Self, Self::Error> {
        let role = value.role();
        Ok(Admin {
            id: value.id,
            name: value.name,
            email: value.email,
            role,
            site_id: value.site_id,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "editor@example.com")]
    pub email: String,
    #[schema(example = "S3cureP@ssw0rd")]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub admin: Admin,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub admin: Admin,
    pub permissions: RolePermissions,
}

/// Role is kept as a raw string so an unknown value is a 400, not a silent downgrade.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminCreateRequest {
    #[schema(example = "Grace Hopper")]
    pub name: String,
    #[schema(example = "grace@example.com")]
    pub email: String,
    #[schema(example = "S3cureP@ssw0rd")]
    pub password: String,
    #[schema(example = "POSTS_EDITOR")]
    pub role: String,
    pub site_id: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminUpdateRequest {
    pub name: Option<String>,
    #[schema(example = "POSTS_MANAGER")]
    pub role: Option<String>,
    pub site_id: Option<String>,
}
