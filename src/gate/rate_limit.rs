use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Share of requests that also sweep expired windows out of the map.
const SWEEP_PROBABILITY: f64 = 0.01;

const API_PREFIX: &str = "/api";
const AUTH_PREFIX: &str = "/api/auth";
pub const FEATURED_PREFIX: &str = "/api/posts/featured";
pub const LATEST_PREFIX: &str = "/api/posts/latest";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub window_secs: u64,
    /// Limit for any API prefix without a dedicated rule.
    pub default_limit: u32,
    pub featured_limit: u32,
    pub latest_limit: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: 60,
            default_limit: 30,
            featured_limit: 30,
            latest_limit: 20,
        }
    }
}

/// Counter key and limit a request path falls under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    pub prefix: String,
    pub limit: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after: u64 },
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window request counter keyed by client address and path prefix.
#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    default_limit: u32,
    rules: Vec<(&'static str, u32)>,
    windows: Mutex<HashMap<String, Window>>,
}

fn under_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            window: Duration::from_secs(config.window_secs.max(1)),
            default_limit: config.default_limit,
            rules: vec![
                (FEATURED_PREFIX, config.featured_limit),
                (LATEST_PREFIX, config.latest_limit),
            ],
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Bucket for `path`, or `None` for paths that are never limited (non-API and auth).
    pub fn bucket_for(&self, path: &str) -> Option<Bucket> {
        if !under_prefix(path, API_PREFIX) || under_prefix(path, AUTH_PREFIX) {
            return None;
        }

        if let Some((prefix, limit)) = self
            .rules
            .iter()
            .filter(|(prefix, _)| under_prefix(path, prefix))
            .max_by_key(|(prefix, _)| prefix.len())
        {
            return Some(Bucket {
                prefix: prefix.to_string(),
                limit: *limit,
            });
        }

        // Default tier: one counter per top-level API resource, e.g. `/api/posts`.
        let resource = path[API_PREFIX.len()..]
            .trim_start_matches('/')
            .split('/')
            .next()
            .unwrap_or_default();

        Some(Bucket {
            prefix: format!("{API_PREFIX}/{resource}"),
            limit: self.default_limit,
        })
    }

    pub fn check(&self, client: &str, bucket: &Bucket) -> RateDecision {
        self.check_at(client, bucket, Instant::now())
    }

    pub fn check_at(&self, client: &str, bucket: &Bucket, now: Instant) -> RateDecision {
        let key = format!("{client}|{}", bucket.prefix);
        let mut windows = self.windows.lock();

        if rand::random::<f64>() < SWEEP_PROBABILITY {
            let window = self.window;
            windows.retain(|_, w| now.saturating_duration_since(w.started) < window);
        }

        let entry = windows.entry(key).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.saturating_duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }

        if entry.count >= bucket.limit {
            return RateDecision::Limited {
                retry_after: self.window.as_secs(),
            };
        }

        entry.count += 1;
        RateDecision::Allowed {
            remaining: bucket.limit - entry.count,
        }
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows.lock().len()
    }
}
