use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Closed set of administrative roles.
///
/// Role strings arriving from sessions or storage go through [`Role::normalize`], which never
/// fails: anything unrecognised becomes [`Role::PostsWriter`], the lowest-privilege role.
/// Payloads from the user-management API use [`FromStr`] instead so a typo is a 400.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    SuperAdmin,
    PostsManager,
    PostsEditor,
    PostsWriter,
    ClientAdmin,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::SuperAdmin,
        Role::PostsManager,
        Role::PostsEditor,
        Role::PostsWriter,
        Role::ClientAdmin,
    ];

    /// Fail-closed normalization for untrusted role strings.
    pub fn normalize(raw: &str) -> Role {
        raw.parse().unwrap_or(Role::PostsWriter)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "SUPER_ADMIN",
            Role::PostsManager => "POSTS_MANAGER",
            Role::PostsEditor => "POSTS_EDITOR",
            Role::PostsWriter => "POSTS_WRITER",
            Role::ClientAdmin => "CLIENT_ADMIN",
        }
    }

    pub fn is_super_admin(&self) -> bool {
        matches!(self, Role::SuperAdmin)
    }

    pub fn permissions(&self) -> RolePermissions {
        permissions_for(*self)
    }

    pub fn can(&self, capability: Capability) -> bool {
        can(*self, capability)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let key = raw.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        match key.as_str() {
            "SUPER_ADMIN" => Ok(Role::SuperAdmin),
            "POSTS_MANAGER" => Ok(Role::PostsManager),
            "POSTS_EDITOR" => Ok(Role::PostsEditor),
            "POSTS_WRITER" => Ok(Role::PostsWriter),
            "CLIENT_ADMIN" => Ok(Role::ClientAdmin),
            _ => Err(UnknownRole(raw.to_string())),
        }
    }
}

/// Named boolean capabilities carried by a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    CreatePost,
    EditPost,
    DeletePost,
    PublishPost,
    ManageAdminUsers,
    AccessAllAdminSections,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::CreatePost => "canCreatePost",
            Capability::EditPost => "canEditPost",
            Capability::DeletePost => "canDeletePost",
            Capability::PublishPost => "canPublishPost",
            Capability::ManageAdminUsers => "canManageAdminUsers",
            Capability::AccessAllAdminSections => "canAccessAllAdminSections",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RolePermissions {
    pub can_create_post: bool,
    pub can_edit_post: bool,
    pub can_delete_post: bool,
    pub can_publish_post: bool,
    pub can_manage_admin_users: bool,
    pub can_access_all_admin_sections: bool,
}

impl RolePermissions {
    pub fn allows(&self, capability: Capability) -> bool {
        match capability {
            Capability::CreatePost => self.can_create_post,
            Capability::EditPost => self.can_edit_post,
            Capability::DeletePost => self.can_delete_post,
            Capability::PublishPost => self.can_publish_post,
            Capability::ManageAdminUsers => self.can_manage_admin_users,
            Capability::AccessAllAdminSections => self.can_access_all_admin_sections,
        }
    }
}

const SUPER_ADMIN: RolePermissions = RolePermissions {
    can_create_post: true,
    can_edit_post: true,
    can_delete_post: true,
    can_publish_post: true,
    can_manage_admin_users: true,
    can_access_all_admin_sections: true,
};

const POSTS_MANAGER: RolePermissions = RolePermissions {
    can_create_post: true,
    can_edit_post: true,
    can_delete_post: true,
    can_publish_post: true,
    can_manage_admin_users: false,
    can_access_all_admin_sections: false,
};

// Editors and writers carry the same flags; what they may touch is decided by ownership
// and the per-post editing policy.
const POSTS_EDITOR: RolePermissions = RolePermissions {
    can_create_post: true,
    can_edit_post: true,
    can_delete_post: false,
    can_publish_post: false,
    can_manage_admin_users: false,
    can_access_all_admin_sections: false,
};

const POSTS_WRITER: RolePermissions = RolePermissions {
    can_create_post: true,
    can_edit_post: true,
    can_delete_post: false,
    can_publish_post: false,
    can_manage_admin_users: false,
    can_access_all_admin_sections: false,
};

const CLIENT_ADMIN: RolePermissions = RolePermissions {
    can_create_post: false,
    can_edit_post: false,
    can_delete_post: false,
    can_publish_post: false,
    can_manage_admin_users: false,
    can_access_all_admin_sections: false,
};

pub fn permissions_for(role: Role) -> RolePermissions {
    match role {
        Role::SuperAdmin => SUPER_ADMIN,
        Role::PostsManager => POSTS_MANAGER,
        Role::PostsEditor => POSTS_EDITOR,
        Role::PostsWriter => POSTS_WRITER,
        Role::ClientAdmin => CLIENT_ADMIN,
    }
}

pub fn can(role: Role, capability: Capability) -> bool {
    permissions_for(role).allows(capability)
}
