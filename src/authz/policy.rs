use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tokio::sync::OnceCell;
use utoipa::ToSchema;

use super::roles::Role;
use crate::errors::{AppError, AppResult};

/// Per-post rule for who besides the author may modify it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EditingPolicy {
    /// Only the author, or a publish-capable role, may modify the post.
    #[default]
    OwnerOnly,
    /// A super-admin-authored post whose body may be edited by editing roles that do not own it.
    SuperAdminContentOnly,
}

impl EditingPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            EditingPolicy::OwnerOnly => "OWNER_ONLY",
            EditingPolicy::SuperAdminContentOnly => "SUPER_ADMIN_CONTENT_ONLY",
        }
    }

    /// Stored values outside the known set are treated as the restrictive default.
    pub fn from_stored(raw: Option<&str>) -> EditingPolicy {
        raw.and_then(|v| v.parse().ok()).unwrap_or_default()
    }
}

impl fmt::Display for EditingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EditingPolicy {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "OWNER_ONLY" => Ok(EditingPolicy::OwnerOnly),
            "SUPER_ADMIN_CONTENT_ONLY" => Ok(EditingPolicy::SuperAdminContentOnly),
            other => Err(AppError::bad_request(format!("unknown editingPolicy: {other}"))),
        }
    }
}

/// Whether content-only sharing is in force for a post.
///
/// The policy only counts when the column exists and the post's author is currently a super
/// administrator; a stale flag on a post whose author was demoted grants nothing.
pub fn sharing_active(
    column_supported: bool,
    policy: EditingPolicy,
    author_role: Option<Role>,
) -> bool {
    column_supported
        && policy == EditingPolicy::SuperAdminContentOnly
        && author_role.map(|r| r.is_super_admin()).unwrap_or(false)
}

/// How the service learns whether `posts.editing_policy` exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyColumnMode {
    /// Probe storage once, lazily, and cache the answer for the process lifetime.
    Auto,
    Enabled,
    Disabled,
}

impl FromStr for PolicyColumnMode {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(PolicyColumnMode::Auto),
            "enabled" | "on" | "true" => Ok(PolicyColumnMode::Enabled),
            "disabled" | "off" | "false" => Ok(PolicyColumnMode::Disabled),
            other => Err(AppError::configuration(format!(
                "EDITING_POLICY_COLUMN must be auto, enabled or disabled (got {other})"
            ))),
        }
    }
}

/// Storage-side check for the editing-policy column.
#[async_trait]
pub trait SchemaProbe: Send + Sync {
    /// `Ok(false)` only when storage reports the column as unknown.
    async fn editing_policy_column(&self) -> AppResult<bool>;
}

#[async_trait]
impl SchemaProbe for SqlitePool {
    async fn editing_policy_column(&self) -> AppResult<bool> {
        let result = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(1) FROM posts WHERE editing_policy = ?",
        )
        .bind(EditingPolicy::OwnerOnly.as_str())
        .fetch_one(self)
        .await;

        match result {
            Ok(_) => Ok(true),
            Err(err) if is_unknown_column(&err) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

fn is_unknown_column(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            let message = db.message().to_ascii_lowercase();
            message.contains("no such column") || message.contains("unknown column")
        }
        sqlx::Error::ColumnNotFound(_) => true,
        _ => false,
    }
}

/// Process-wide answer to "does storage have the editing-policy column".
///
/// Written at most once. Concurrent first callers wait on the same initialisation; a probe
/// that fails for any reason other than an unknown column is not cached and surfaces as an
/// internal error.
#[derive(Debug)]
pub struct PolicyCapability {
    mode: PolicyColumnMode,
    supported: OnceCell<bool>,
    probes: AtomicUsize,
}

impl PolicyCapability {
    pub fn new(mode: PolicyColumnMode) -> Self {
        Self {
            mode,
            supported: OnceCell::new(),
            probes: AtomicUsize::new(0),
        }
    }

    pub fn mode(&self) -> PolicyColumnMode {
        self.mode
    }

    pub async fn supported(&self, probe: &dyn SchemaProbe) -> AppResult<bool> {
        match self.mode {
            PolicyColumnMode::Enabled => Ok(true),
            PolicyColumnMode::Disabled => Ok(false),
            PolicyColumnMode::Auto => {
                let supported = self
                    .supported
                    .get_or_try_init(|| async {
                        self.probes.fetch_add(1, Ordering::Relaxed);
                        let supported = probe.editing_policy_column().await?;
                        tracing::info!(supported, "editing policy column probed");
                        Ok::<bool, AppError>(supported)
                    })
                    .await?;
                Ok(*supported)
            }
        }
    }

    /// Number of storage probes performed so far.
    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::Relaxed)
    }
}
