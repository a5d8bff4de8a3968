use uuid::Uuid;

use super::roles::{Capability, Role, RolePermissions};

/// The authenticated admin acting on a request, as resolved from the session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub admin_id: Uuid,
    pub role: Role,
    /// Tenant the session is bound to. `None` for principals provisioned without a site.
    pub site_id: Option<String>,
}

impl Principal {
    pub fn new(admin_id: Uuid, role: Role) -> Self {
        Self {
            admin_id,
            role,
            site_id: None,
        }
    }

    pub fn with_site(mut self, site_id: impl Into<String>) -> Self {
        self.site_id = Some(site_id.into());
        self
    }

    pub fn permissions(&self) -> RolePermissions {
        self.role.permissions()
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.role.can(capability)
    }

    pub fn is_super_admin(&self) -> bool {
        self.role.is_super_admin()
    }

    pub fn owns(&self, author_id: Uuid) -> bool {
        self.admin_id == author_id
    }
}

/// What the engine needs to know about a stored post to decide on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostFacts {
    pub author_id: Uuid,
    /// Role of the author as currently stored. `None` when the author row is gone.
    pub author_role: Option<Role>,
    pub published: bool,
    /// Content-only sharing is in force for this post (see `policy::sharing_active`).
    pub shared_content_only: bool,
}
