use std::str::FromStr;

use crate::authz::PolicyColumnMode;
use crate::errors::AppError;
use crate::gate::RateLimitConfig;
use crate::jwt::JwtConfig;

pub const DEFAULT_SITE_ID: &str = "default";
pub const DEFAULT_SESSION_COOKIE: &str = "admin_session";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub jwt: JwtConfig,
    /// Tenant used when neither the request nor the session names one.
    pub default_site_id: Option<String>,
    pub policy_column: PolicyColumnMode,
    pub rate_limits: RateLimitConfig,
    pub session_cookie: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let jwt = JwtConfig::from_env()?;

        let default_site_id = match std::env::var("DEFAULT_SITE_ID") {
            Ok(value) if value.trim().is_empty() => None,
            Ok(value) => Some(value.trim().to_string()),
            Err(_) => Some(DEFAULT_SITE_ID.to_string()),
        };

        let policy_column = std::env::var("EDITING_POLICY_COLUMN")
            .unwrap_or_default()
            .parse::<PolicyColumnMode>()?;

        let defaults = RateLimitConfig::default();
        let rate_limits = RateLimitConfig {
            window_secs: env_parse("RATE_LIMIT_WINDOW_SECS", defaults.window_secs)?,
            default_limit: env_parse("RATE_LIMIT_DEFAULT", defaults.default_limit)?,
            featured_limit: env_parse("RATE_LIMIT_FEATURED", defaults.featured_limit)?,
            latest_limit: env_parse("RATE_LIMIT_LATEST", defaults.latest_limit)?,
        };

        let session_cookie = std::env::var("SESSION_COOKIE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SESSION_COOKIE.to_string());

        Ok(Self {
            jwt,
            default_site_id,
            policy_column,
            rate_limits,
            session_cookie,
        })
    }

    /// Configuration with explicit values, for embedding and tests.
    pub fn new(jwt: JwtConfig) -> Self {
        Self {
            jwt,
            default_site_id: Some(DEFAULT_SITE_ID.to_string()),
            policy_column: PolicyColumnMode::Auto,
            rate_limits: RateLimitConfig::default(),
            session_cookie: DEFAULT_SESSION_COOKIE.to_string(),
        }
    }

    pub fn with_policy_column(mut self, mode: PolicyColumnMode) -> Self {
        self.policy_column = mode;
        self
    }

    pub fn with_rate_limits(mut self, limits: RateLimitConfig) -> Self {
        self.rate_limits = limits;
        self
    }

    pub fn with_default_site(mut self, site_id: Option<&str>) -> Self {
        self.default_site_id = site_id.map(str::to_string);
        self
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::configuration(format!("{key} must be a valid number"))),
        Err(_) => Ok(default),
    }
}
