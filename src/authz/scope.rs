use super::principal::Principal;
use crate::errors::{AppError, AppResult};

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Decide which tenant a request touches.
///
/// An explicit, non-empty `requested` id wins; otherwise the session's tenant; otherwise the
/// process-wide default. Empty strings never come back: callers get `None` and reject the
/// request.
pub fn resolve_site_id(
    session_site_id: Option<&str>,
    requested_site_id: Option<&str>,
    default_site_id: Option<&str>,
) -> Option<String> {
    non_empty(requested_site_id)
        .or_else(|| non_empty(session_site_id))
        .or_else(|| non_empty(default_site_id))
        .map(str::to_string)
}

/// Tenant resolution for a possibly-anonymous caller.
///
/// Only principals that may access every admin section get to pick a tenant through the
/// request; everyone else is pinned to their session tenant, so a crafted `siteId` can never
/// move a restricted admin across the isolation boundary.
pub fn scope_for(
    principal: Option<&Principal>,
    requested_site_id: Option<&str>,
    default_site_id: Option<&str>,
) -> Option<String> {
    match principal {
        None => resolve_site_id(None, requested_site_id, default_site_id),
        Some(p) if p.is_super_admin() => {
            resolve_site_id(p.site_id.as_deref(), requested_site_id, default_site_id)
        }
        Some(p) => resolve_site_id(p.site_id.as_deref(), None, default_site_id),
    }
}

pub fn require_site(site_id: Option<String>) -> AppResult<String> {
    site_id.ok_or_else(|| AppError::bad_request("siteId is required"))
}
