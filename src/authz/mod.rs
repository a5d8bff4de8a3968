//! Authorization for post content.
//!
//! - Role permission table with fail-closed role normalization
//! - Tenant (site) scope resolution
//! - Per-post editing policy and the schema capability it depends on
//! - Field-change classification for partial updates
//! - One decision function per post operation

mod diff;
mod engine;
mod policy;
mod principal;
mod roles;
mod scope;

pub use diff::{apply_patch, ChangeSet, FieldGroup, PostField};
pub use engine::{
    decide_create, decide_delete, decide_list, decide_read, decide_update, CreateFlags, Denial,
    ListScope, Operation, Verdict,
};
pub use policy::{
    sharing_active, EditingPolicy, PolicyCapability, PolicyColumnMode, SchemaProbe,
};
pub use principal::{PostFacts, Principal};
pub use roles::{can, permissions_for, Capability, Role, RolePermissions, UnknownRole};
pub use scope::{require_site, resolve_site_id, scope_for};
