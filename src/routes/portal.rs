use axum::http::Uri;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::authz::{Role, RolePermissions};
use crate::jwt::MaybeAuthUser;

/// Landing payload for admin UI paths that made it through the routing gate.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PortalPage {
    pub path: String,
    pub role: Option<Role>,
    pub permissions: Option<RolePermissions>,
}

pub async fn landing(uri: Uri, MaybeAuthUser(session): MaybeAuthUser) -> Json<PortalPage> {
    Json(PortalPage {
        path: uri.path().to_string(),
        role: session.as_ref().map(|p| p.role),
        permissions: session.as_ref().map(|p| p.permissions()),
    })
}
