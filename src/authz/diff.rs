//! Field-change classification for post updates.
//!
//! Changes are detected by value against the stored row, never by key presence, so
//! resubmitting current values is a no-op that needs no capability at all.

use std::fmt;

use super::policy::EditingPolicy;
use crate::errors::{AppError, AppResult};
use crate::models::post::{DbPost, PostUpdateRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostField {
    Title,
    Slug,
    ShortDesc,
    Content,
    MainImage,
    OgImage,
    MetaTitle,
    MetaDesc,
    CategoryId,
    Published,
    Featured,
    EditingPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldGroup {
    Content,
    Publish,
    Policy,
}

impl PostField {
    pub fn group(&self) -> FieldGroup {
        match self {
            PostField::Published | PostField::Featured => FieldGroup::Publish,
            PostField::EditingPolicy => FieldGroup::Policy,
            _ => FieldGroup::Content,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PostField::Title => "title",
            PostField::Slug => "slug",
            PostField::ShortDesc => "shortDesc",
            PostField::Content => "content",
            PostField::MainImage => "mainImage",
            PostField::OgImage => "ogImage",
            PostField::MetaTitle => "metaTitle",
            PostField::MetaDesc => "metaDesc",
            PostField::CategoryId => "categoryId",
            PostField::Published => "published",
            PostField::Featured => "featured",
            PostField::EditingPolicy => "editingPolicy",
        }
    }
}

impl fmt::Display for PostField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields whose requested value differs from the stored one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    changed: Vec<PostField>,
    requested_policy: Option<EditingPolicy>,
}

fn differs<T: PartialEq + ?Sized>(requested: Option<&T>, stored: &T) -> bool {
    requested.map(|value| value != stored).unwrap_or(false)
}

fn differs_opt(requested: Option<&String>, stored: Option<&String>) -> bool {
    requested.map(|value| Some(value) != stored).unwrap_or(false)
}

impl ChangeSet {
    /// Classify `patch` against `existing`.
    ///
    /// Any mention of `editingPolicy` while the column is unavailable is rejected outright
    /// rather than dropped.
    pub fn between(
        existing: &DbPost,
        patch: &PostUpdateRequest,
        policy_column: bool,
    ) -> AppResult<ChangeSet> {
        let requested_policy = match patch.editing_policy.as_deref() {
            None => None,
            Some(_) if !policy_column => {
                return Err(AppError::bad_request(
                    "editingPolicy is not available on this deployment",
                ))
            }
            Some(raw) => Some(raw.parse::<EditingPolicy>()?),
        };

        let mut changed = Vec::new();
        let mut mark = |field: PostField, did_change: bool| {
            if did_change {
                changed.push(field);
            }
        };

        mark(PostField::Title, differs(patch.title.as_ref(), &existing.title));
        mark(PostField::Slug, differs(patch.slug.as_ref(), &existing.slug));
        mark(
            PostField::ShortDesc,
            differs_opt(patch.short_desc.as_ref(), existing.short_desc.as_ref()),
        );
        mark(
            PostField::Content,
            differs_opt(patch.content.as_ref(), existing.content.as_ref()),
        );
        mark(
            PostField::MainImage,
            differs_opt(patch.main_image.as_ref(), existing.main_image.as_ref()),
        );
        mark(
            PostField::OgImage,
            differs_opt(patch.og_image.as_ref(), existing.og_image.as_ref()),
        );
        mark(
            PostField::MetaTitle,
            differs_opt(patch.meta_title.as_ref(), existing.meta_title.as_ref()),
        );
        mark(
            PostField::MetaDesc,
            differs_opt(patch.meta_desc.as_ref(), existing.meta_desc.as_ref()),
        );
        mark(
            PostField::CategoryId,
            patch
                .category_id
                .map(|id| Some(id) != existing.category_id)
                .unwrap_or(false),
        );
        mark(PostField::Published, differs(patch.published.as_ref(), &existing.published));
        mark(PostField::Featured, differs(patch.featured.as_ref(), &existing.featured));
        mark(
            PostField::EditingPolicy,
            differs(requested_policy.as_ref(), &existing.policy()),
        );

        Ok(ChangeSet {
            changed,
            requested_policy,
        })
    }

    #[cfg(test)]
    pub(crate) fn of(fields: &[PostField]) -> ChangeSet {
        ChangeSet {
            changed: fields.to_vec(),
            requested_policy: None,
        }
    }

    pub fn fields(&self) -> &[PostField] {
        &self.changed
    }

    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }

    pub fn contains(&self, field: PostField) -> bool {
        self.changed.contains(&field)
    }

    pub fn in_group(&self, group: FieldGroup) -> impl Iterator<Item = PostField> + '_ {
        self.changed.iter().copied().filter(move |f| f.group() == group)
    }

    pub fn touches(&self, group: FieldGroup) -> bool {
        self.in_group(group).next().is_some()
    }

    /// Changed fields other than `content`.
    pub fn beyond_content(&self) -> Vec<PostField> {
        self.changed
            .iter()
            .copied()
            .filter(|f| *f != PostField::Content)
            .collect()
    }

    pub fn requested_policy(&self) -> Option<EditingPolicy> {
        self.requested_policy
    }
}

/// Row to persist: every omitted field keeps its stored value.
pub fn apply_patch(existing: &DbPost, patch: &PostUpdateRequest, changes: &ChangeSet) -> DbPost {
    let mut next = existing.clone();

    if let Some(title) = &patch.title {
        next.title = title.clone();
    }
    if let Some(slug) = &patch.slug {
        next.slug = slug.clone();
    }
    if patch.short_desc.is_some() {
        next.short_desc = patch.short_desc.clone();
    }
    if patch.content.is_some() {
        next.content = patch.content.clone();
    }
    if patch.main_image.is_some() {
        next.main_image = patch.main_image.clone();
    }
    if patch.og_image.is_some() {
        next.og_image = patch.og_image.clone();
    }
    if patch.meta_title.is_some() {
        next.meta_title = patch.meta_title.clone();
    }
    if patch.meta_desc.is_some() {
        next.meta_desc = patch.meta_desc.clone();
    }
    if patch.category_id.is_some() {
        next.category_id = patch.category_id;
    }
    if let Some(published) = patch.published {
        next.published = published;
    }
    if let Some(featured) = patch.featured {
        next.featured = featured;
    }
    if let Some(policy) = changes.requested_policy() {
        next.editing_policy = Some(policy.as_str().to_string());
    }

    next
}


#[cfg(test)]
mod tests {
    use super::fixtures::stored_post;
    use super::*;
    use uuid::Uuid;

    #[test]
    fn resubmitted_values_are_not_changes() {
        let post = stored_post(Uuid::new_v4());
        let patch = PostUpdateRequest {
            title: Some(post.title.clone()),
            slug: Some(post.slug.clone()),
            content: post.content.clone(),
            published: Some(false),
            featured: Some(false),
            editing_policy: Some("OWNER_ONLY".to_string()),
            ..Default::default()
        };

        let changes = ChangeSet::between(&post, &patch, true).unwrap();
        assert!(changes.is_empty(), "unexpected changes: {:?}", changes.fields());
    }

    #[test]
    fn classifies_groups() {
        let post = stored_post(Uuid::new_v4());
        let patch = PostUpdateRequest {
            content: Some("<p>new</p>".to_string()),
            featured: Some(true),
            editing_policy: Some("SUPER_ADMIN_CONTENT_ONLY".to_string()),
            ..Default::default()
        };

        let changes = ChangeSet::between(&post, &patch, true).unwrap();
        assert!(changes.contains(PostField::Content));
        assert!(changes.touches(FieldGroup::Publish));
        assert!(changes.touches(FieldGroup::Policy));
        assert_eq!(
            changes.beyond_content(),
            vec![PostField::Featured, PostField::EditingPolicy]
        );
    }

    #[test]
    fn policy_rejected_when_column_missing() {
        let post = stored_post(Uuid::new_v4());
        let patch = PostUpdateRequest {
            editing_policy: Some("OWNER_ONLY".to_string()),
            ..Default::default()
        };

        let err = ChangeSet::between(&post, &patch, false).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn unknown_policy_value_is_bad_request() {
        let post = stored_post(Uuid::new_v4());
        let patch = PostUpdateRequest {
            editing_policy: Some("EVERYONE".to_string()),
            ..Default::default()
        };

        assert!(matches!(
            ChangeSet::between(&post, &patch, true),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn setting_a_cleared_field_counts_as_change() {
        let post = stored_post(Uuid::new_v4());
        let patch = PostUpdateRequest {
            main_image: Some("/img/cover.png".to_string()),
            ..Default::default()
        };

        let changes = ChangeSet::between(&post, &patch, true).unwrap();
        assert_eq!(changes.fields(), &[PostField::MainImage]);
    }

    #[test]
    fn apply_keeps_omitted_fields() {
        let post = stored_post(Uuid::new_v4());
        let patch = PostUpdateRequest {
            content: Some("<p>rewritten</p>".to_string()),
            ..Default::default()
        };
        let changes = ChangeSet::between(&post, &patch, true).unwrap();

        let next = apply_patch(&post, &patch, &changes);
        assert_eq!(next.content.as_deref(), Some("<p>rewritten</p>"));
        assert_eq!(next.title, post.title);
        assert_eq!(next.short_desc, post.short_desc);
        assert_eq!(next.category_id, post.category_id);
        assert_eq!(next.editing_policy, post.editing_policy);
    }
}
