//! Per-operation authorization decisions for posts.
//!
//! Each operation has exactly one decision function taking the principal, what is known about
//! the post, and (for updates) the field diff. Handlers never test capabilities inline; they
//! ask here and act on the [`Verdict`].

use std::fmt;

use super::diff::{ChangeSet, FieldGroup, PostField};
use super::principal::{PostFacts, Principal};
use super::roles::Capability;
use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    List,
    Read,
    Create,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::List => "list",
            Operation::Read => "read",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        })
    }
}

/// The rule that rejected a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    /// Anonymous callers asking for something that is not public. Reported as 404.
    NotPublic,
    MissingCapability(Capability),
    CannotPublish,
    CannotEditContent,
    NotOwner,
    ContentOnly(Vec<PostField>),
    PolicyRequiresSuperAdmin,
}

impl Denial {
    pub fn rule(&self) -> &'static str {
        match self {
            Denial::NotPublic => "not_public",
            Denial::MissingCapability(_) => "missing_capability",
            Denial::CannotPublish => "cannot_publish",
            Denial::CannotEditContent => "cannot_edit_content",
            Denial::NotOwner => "not_owner",
            Denial::ContentOnly(_) => "content_only",
            Denial::PolicyRequiresSuperAdmin => "policy_requires_super_admin",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Denial::NotPublic => "post not found".to_string(),
            Denial::MissingCapability(cap) => format!("missing permission: {}", cap.as_str()),
            Denial::CannotPublish => "you cannot publish or feature posts".to_string(),
            Denial::CannotEditContent => "you cannot edit post content".to_string(),
            Denial::NotOwner => "you can only modify your own posts".to_string(),
            Denial::ContentOnly(fields) => {
                let names: Vec<&str> = fields.iter().map(PostField::as_str).collect();
                format!(
                    "content-only edits allowed on this shared post (rejected: {})",
                    names.join(", ")
                )
            }
            Denial::PolicyRequiresSuperAdmin => {
                "only a super administrator can change the editing policy".to_string()
            }
        }
    }
}

impl From<Denial> for AppError {
    fn from(denial: Denial) -> Self {
        match denial {
            Denial::NotPublic => AppError::not_found(denial.message()),
            other => AppError::forbidden(other.message()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    /// Allowed once the listed fields are reset to their defaults in the effective payload.
    AllowedPartial(Vec<PostField>),
    Denied(Denial),
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Verdict::Denied(_))
    }

    /// Fields to strip from the payload, or the rejection.
    pub fn into_result(self) -> Result<Vec<PostField>, AppError> {
        match self {
            Verdict::Allowed => Ok(Vec::new()),
            Verdict::AllowedPartial(fields) => Ok(fields),
            Verdict::Denied(denial) => Err(denial.into()),
        }
    }

    /// Log a denial with the context it was made in; pass the verdict through.
    pub fn traced(self, principal: Option<&Principal>, operation: Operation) -> Self {
        if let Verdict::Denied(denial) = &self {
            tracing::info!(
                admin_id = ?principal.map(|p| p.admin_id),
                role = ?principal.map(|p| p.role),
                operation = %operation,
                rule = denial.rule(),
                "post access denied"
            );
        }
        self
    }
}

/// Row filter applied server-side to the administrative post listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListScope {
    /// Every post of the tenant.
    All,
    /// Own posts, plus super-admin posts under content-only sharing when `include_shared`.
    OwnedOrShared { include_shared: bool },
}

pub fn decide_list(principal: &Principal, policy_column: bool) -> ListScope {
    if principal.can(Capability::PublishPost) {
        ListScope::All
    } else {
        ListScope::OwnedOrShared {
            include_shared: policy_column && principal.can(Capability::EditPost),
        }
    }
}

/// Single-post read. Anonymous readers only see published posts.
pub fn decide_read(principal: Option<&Principal>, post: &PostFacts) -> Verdict {
    let Some(principal) = principal else {
        return if post.published {
            Verdict::Allowed
        } else {
            Verdict::Denied(Denial::NotPublic)
        };
    };

    if principal.owns(post.author_id)
        || principal.can(Capability::PublishPost)
        || covered_by_sharing(principal, post)
    {
        Verdict::Allowed
    } else {
        Verdict::Denied(Denial::NotOwner)
    }
}

/// What a create payload asks for that needs more than create-capability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CreateFlags {
    pub published: bool,
    pub featured: bool,
}

pub fn decide_create(principal: &Principal, requested: CreateFlags) -> Verdict {
    if !principal.can(Capability::CreatePost) {
        return Verdict::Denied(Denial::MissingCapability(Capability::CreatePost));
    }

    if principal.can(Capability::PublishPost) {
        return Verdict::Allowed;
    }

    let mut stripped = Vec::new();
    if requested.published {
        stripped.push(PostField::Published);
    }
    if requested.featured {
        stripped.push(PostField::Featured);
    }

    if stripped.is_empty() {
        Verdict::Allowed
    } else {
        Verdict::AllowedPartial(stripped)
    }
}

/// Update decision over the value diff. Rules apply in order; the first failure wins and
/// nothing of the update is applied.
pub fn decide_update(principal: &Principal, post: &PostFacts, changes: &ChangeSet) -> Verdict {
    if changes.is_empty() {
        return Verdict::Allowed;
    }

    let can_publish = principal.can(Capability::PublishPost);

    if changes.touches(FieldGroup::Publish) && !can_publish {
        return Verdict::Denied(Denial::CannotPublish);
    }

    if changes.touches(FieldGroup::Content) && !principal.can(Capability::EditPost) {
        return Verdict::Denied(Denial::CannotEditContent);
    }

    let owner = principal.owns(post.author_id);
    if !owner && !can_publish {
        if !covered_by_sharing(principal, post) {
            return Verdict::Denied(Denial::NotOwner);
        }

        let restricted = changes.beyond_content();
        if !restricted.is_empty() {
            return Verdict::Denied(Denial::ContentOnly(restricted));
        }
    }

    if changes.touches(FieldGroup::Policy) && !principal.is_super_admin() {
        return Verdict::Denied(Denial::PolicyRequiresSuperAdmin);
    }

    Verdict::Allowed
}

/// Delete needs only the capability; tenant match is enforced by the lookup.
pub fn decide_delete(principal: &Principal) -> Verdict {
    if principal.can(Capability::DeletePost) {
        Verdict::Allowed
    } else {
        Verdict::Denied(Denial::MissingCapability(Capability::DeletePost))
    }
}

fn covered_by_sharing(principal: &Principal, post: &PostFacts) -> bool {
    post.shared_content_only && principal.can(Capability::EditPost)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::Role;
    use uuid::Uuid;

    fn facts(author_id: Uuid, shared: bool) -> PostFacts {
        PostFacts {
            author_id,
            author_role: Some(Role::SuperAdmin),
            published: false,
            shared_content_only: shared,
        }
    }

    fn principal(role: Role) -> Principal {
        Principal::new(Uuid::new_v4(), role).with_site("default")
    }

    #[test]
    fn publish_change_needs_publish_capability_even_for_owner() {
        for role in Role::ALL {
            let actor = principal(role);
            let post = facts(actor.admin_id, false);
            for field in [PostField::Published, PostField::Featured] {
                let verdict = decide_update(&actor, &post, &ChangeSet::of(&[field]));
                assert_eq!(
                    verdict.is_allowed(),
                    role.can(Capability::PublishPost),
                    "{role} / {field}"
                );
            }
        }
    }

    #[test]
    fn content_change_needs_edit_capability() {
        let actor = principal(Role::ClientAdmin);
        let post = facts(actor.admin_id, false);
        let verdict = decide_update(&actor, &post, &ChangeSet::of(&[PostField::Title]));
        assert_eq!(verdict, Verdict::Denied(Denial::CannotEditContent));
    }

    #[test]
    fn non_owner_without_sharing_is_denied() {
        let actor = principal(Role::PostsEditor);
        let post = facts(Uuid::new_v4(), false);
        let verdict = decide_update(&actor, &post, &ChangeSet::of(&[PostField::Content]));
        assert_eq!(verdict, Verdict::Denied(Denial::NotOwner));
    }

    #[test]
    fn sharing_allows_content_only() {
        let actor = principal(Role::PostsEditor);
        let post = facts(Uuid::new_v4(), true);

        let ok = decide_update(&actor, &post, &ChangeSet::of(&[PostField::Content]));
        assert_eq!(ok, Verdict::Allowed);

        let bundled = decide_update(
            &actor,
            &post,
            &ChangeSet::of(&[PostField::Title, PostField::Content]),
        );
        assert_eq!(bundled, Verdict::Denied(Denial::ContentOnly(vec![PostField::Title])));
    }

    #[test]
    fn publish_capability_implies_full_control() {
        let actor = principal(Role::PostsManager);
        let post = facts(Uuid::new_v4(), false);
        let changes = ChangeSet::of(&[PostField::Title, PostField::Published]);
        assert_eq!(decide_update(&actor, &post, &changes), Verdict::Allowed);
    }

    #[test]
    fn policy_change_is_super_admin_only() {
        let manager = principal(Role::PostsManager);
        let post = facts(manager.admin_id, false);
        let changes = ChangeSet::of(&[PostField::EditingPolicy]);
        assert_eq!(
            decide_update(&manager, &post, &changes),
            Verdict::Denied(Denial::PolicyRequiresSuperAdmin)
        );

        let root = principal(Role::SuperAdmin);
        assert_eq!(decide_update(&root, &post, &changes), Verdict::Allowed);
    }

    #[test]
    fn empty_diff_is_always_allowed() {
        let actor = principal(Role::ClientAdmin);
        let post = facts(Uuid::new_v4(), false);
        assert_eq!(decide_update(&actor, &post, &ChangeSet::default()), Verdict::Allowed);
    }

    #[test]
    fn create_strips_publish_flags_for_writers() {
        let writer = principal(Role::PostsWriter);
        let requested = CreateFlags {
            published: true,
            featured: true,
        };
        assert_eq!(
            decide_create(&writer, requested),
            Verdict::AllowedPartial(vec![PostField::Published, PostField::Featured])
        );
        assert_eq!(decide_create(&principal(Role::PostsManager), requested), Verdict::Allowed);
        assert_eq!(
            decide_create(&principal(Role::ClientAdmin), requested),
            Verdict::Denied(Denial::MissingCapability(Capability::CreatePost))
        );
    }

    #[test]
    fn anonymous_reads_only_published() {
        let mut post = facts(Uuid::new_v4(), false);
        assert_eq!(decide_read(None, &post), Verdict::Denied(Denial::NotPublic));
        post.published = true;
        assert_eq!(decide_read(None, &post), Verdict::Allowed);
    }

    #[test]
    fn admin_read_requires_owner_publisher_or_sharing() {
        let editor = principal(Role::PostsEditor);
        assert!(!decide_read(Some(&editor), &facts(Uuid::new_v4(), false)).is_allowed());
        assert!(decide_read(Some(&editor), &facts(Uuid::new_v4(), true)).is_allowed());
        assert!(decide_read(Some(&editor), &facts(editor.admin_id, false)).is_allowed());
        assert!(decide_read(Some(&principal(Role::PostsManager)), &facts(Uuid::new_v4(), false))
            .is_allowed());
    }

    #[test]
    fn list_scope_narrows_for_non_publishers() {
        assert_eq!(decide_list(&principal(Role::SuperAdmin), true), ListScope::All);
        assert_eq!(
            decide_list(&principal(Role::PostsWriter), true),
            ListScope::OwnedOrShared { include_shared: true }
        );
        assert_eq!(
            decide_list(&principal(Role::PostsWriter), false),
            ListScope::OwnedOrShared { include_shared: false }
        );
        assert_eq!(
            decide_list(&principal(Role::ClientAdmin), true),
            ListScope::OwnedOrShared { include_shared: false }
        );
    }

    #[test]
    fn delete_is_capability_only() {
        assert!(decide_delete(&principal(Role::PostsManager)).is_allowed());
        assert!(!decide_delete(&principal(Role::PostsEditor)).is_allowed());
    }

    #[test]
    fn denials_map_to_status() {
        let not_public: AppError = Denial::NotPublic.into();
        assert!(matches!(not_public, AppError::NotFound(_)));
        let forbidden: AppError = Denial::CannotPublish.into();
        assert!(matches!(forbidden, AppError::Forbidden(_)));
    }
}
