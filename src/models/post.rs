use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::authz::{EditingPolicy, Role};
use crate::errors::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Uuid,
    pub site_id: String,
    pub author_id: Uuid,
    pub category_id: Option<Uuid>,
    pub title: String,
    pub slug: String,
    pub short_desc: Option<String>,
    pub content: Option<String>,
    pub main_image: Option<String>,
    pub og_image: Option<String>,
    pub meta_title: Option<String>,
    pub meta_desc: Option<String>,
    pub published: bool,
    pub featured: bool,
    /// Absent while storage does not carry the editing-policy column.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub editing_policy: Option<EditingPolicy>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row shape shared by every post projection. `editing_policy` is selected as NULL when the
/// column is unavailable; `author_role` comes from a join on `admins`.
#[derive(Debug, Clone, FromRow)]
pub struct DbPost {
    pub id: Uuid,
    pub site_id: String,
    pub author_id: Uuid,
    pub category_id: Option<Uuid>,
    pub title: String,
    pub slug: String,
    pub short_desc: Option<String>,
    pub content: Option<String>,
    pub main_image: Option<String>,
    pub og_image: Option<String>,
    pub meta_title: Option<String>,
    pub meta_desc: Option<String>,
    pub published: bool,
    pub featured: bool,
    pub editing_policy: Option<String>,
    pub author_role: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbPost {
    pub fn policy(&self) -> EditingPolicy {
        EditingPolicy::from_stored(self.editing_policy.as_deref())
    }

    pub fn author_role(&self) -> Option<Role> {
        self.author_role.as_deref().map(Role::normalize)
    }
}

impl TryFrom<DbPost> for Post {
    type Error = AppError;

    fn try_from(value: DbPost) -> Result<Self, Self::Error> {
        let editing_policy = value
            .editing_policy
            .as_deref()
            .map(|raw| EditingPolicy::from_stored(Some(raw)));

        Ok(Post {
            id: value.id,
            site_id: value.site_id,
            author_id: value.author_id,
            category_id: value.category_id,
            title: value.title,
            slug: value.slug,
            short_desc: value.short_desc,
            content: value.content,
            main_image: value.main_image,
            og_image: value.og_image,
            meta_title: value.meta_title,
            meta_desc: value.meta_desc,
            published: value.published,
            featured: value.featured,
            editing_policy,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

/// Body of `POST /api/posts`. Tenant and author always come from the session; any `siteId`
/// or `authorId` in the body is ignored.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PostCreateRequest {
    #[schema(example = "Spring release notes")]
    pub title: String,
    #[schema(example = "spring-release-notes")]
    pub slug: Option<String>,
    pub short_desc: Option<String>,
    pub content: Option<String>,
    pub category_id: Uuid,
    pub main_image: Option<String>,
    pub og_image: Option<String>,
    pub meta_title: Option<String>,
    pub meta_desc: Option<String>,
    pub published: Option<bool>,
    pub featured: Option<bool>,
}

/// Body of `PATCH /api/posts/{slug}`. Omitted fields keep their stored value.
#[derive(Debug, Default, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PostUpdateRequest {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub short_desc: Option<String>,
    pub content: Option<String>,
    pub main_image: Option<String>,
    pub og_image: Option<String>,
    pub meta_title: Option<String>,
    pub meta_desc: Option<String>,
    pub category_id: Option<Uuid>,
    pub published: Option<bool>,
    pub featured: Option<bool>,
    #[schema(example = "SUPER_ADMIN_CONTENT_ONLY")]
    pub editing_policy: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct PostListQuery {
    /// `true` for the administrative listing (requires a session).
    pub admin: Option<bool>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub site_id: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct PostReadQuery {
    pub admin: Option<bool>,
    pub site_id: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct SiteQuery {
    pub site_id: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct HighlightQuery {
    pub site_id: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub const DEFAULT_LIMIT: i64 = 10;
    pub const MAX_LIMIT: i64 = 100;
    pub const MAX_PAGE: i64 = 1_000_000;

    /// Normalised `(page, limit)` from raw query values.
    pub fn window(page: Option<i64>, limit: Option<i64>) -> (i64, i64) {
        let page = page.unwrap_or(1).clamp(1, Self::MAX_PAGE);
        let limit = limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT);
        (page, limit)
    }

    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        let total_pages = if total == 0 { 0 } else { (total + limit - 1) / limit };
        Self {
            page,
            limit,
            total,
            total_pages,
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PostListResponse {
    pub posts: Vec<Post>,
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_clamps_inputs() {
        assert_eq!(Pagination::window(None, None), (1, 10));
        assert_eq!(Pagination::window(Some(0), Some(1000)), (1, 100));
        assert_eq!(Pagination::window(Some(3), Some(0)), (3, 1));
    }

    #[test]
    fn huge_page_numbers_do_not_overflow() {
        let (page, limit) = Pagination::window(Some(i64::MAX), Some(100));
        assert_eq!(page, Pagination::MAX_PAGE);
        let p = Pagination::new(page, limit, 5);
        assert_eq!(p.offset(), (Pagination::MAX_PAGE - 1) * 100);

        let unclamped = Pagination::new(i64::MAX, 100, 5);
        assert_eq!(unclamped.offset(), i64::MAX);
    }

    #[test]
    fn pagination_counts_pages() {
        let p = Pagination::new(2, 10, 21);
        assert_eq!(p.total_pages, 3);
        assert_eq!(p.offset(), 10);
        assert_eq!(Pagination::new(1, 10, 0).total_pages, 0);
    }
}
