//! Shared types for the HTTP API layer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::config::{AppConfig, GenerationConfig, RateLimitConfig};
use crate::db::Database;
use crate::pipeline::emergency::EmergencyKeywords;
use crate::pipeline::generation::TextGenerator;
use crate::pipeline::persist::{ResponsePersister, SqlitePersister};

/// Header carrying the caller's session id, in both directions.
pub const SESSION_HEADER: &str = "x-session-id";

// ═══════════════════════════════════════════════════════════
// API context: shared state for the router
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub db: Database,
    pub generator: Arc<dyn TextGenerator>,
    pub persister: Arc<dyn ResponsePersister>,
    pub generation: GenerationConfig,
    pub keywords: EmergencyKeywords,
    pub rate_limits: RateLimitConfig,
    pub rate_limiter: Arc<Mutex<RateLimiter>>,
}

impl ApiContext {
    pub fn new(db: Database, generator: Arc<dyn TextGenerator>, config: &AppConfig) -> Self {
        let persister = Arc::new(SqlitePersister::new(
            db.clone(),
            config.generation.model.clone(),
        ));
        Self {
            db,
            generator,
            persister,
            generation: config.generation.clone(),
            keywords: config.emergency_keywords.clone(),
            rate_limits: config.rate_limits.clone(),
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(
                config.rate_limits.requests_per_hour,
            ))),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Session context: injected by the session middleware
// ═══════════════════════════════════════════════════════════

/// The caller's session, taken from `X-Session-Id` or freshly issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub id: String,
    /// True when the request carried no usable session id.
    pub issued: bool,
}

impl SessionContext {
    /// Accept a caller-supplied id if it looks like one we issued.
    pub fn from_header(value: Option<&str>) -> Self {
        match value
            .map(str::trim)
            .filter(|v| uuid::Uuid::parse_str(v).is_ok())
        {
            Some(id) => Self {
                id: id.to_string(),
                issued: false,
            },
            None => Self {
                id: uuid::Uuid::new_v4().to_string(),
                issued: true,
            },
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Rate limiter: per-session sliding window
// ═══════════════════════════════════════════════════════════

const WINDOW: Duration = Duration::from_secs(3600);

/// Per-session limiter over a one-hour sliding window.
pub struct RateLimiter {
    windows: HashMap<String, Vec<Instant>>,
    per_hour: u32,
}

impl RateLimiter {
    pub fn new(per_hour: u32) -> Self {
        Self {
            windows: HashMap::new(),
            per_hour,
        }
    }

    /// Check if a session is within its limit. Returns `Ok(())` or
    /// `Err(retry_after_secs)` if exceeded.
    pub fn check(&mut self, key: &str) -> Result<(), u64> {
        self.check_at(key, Instant::now())
    }

    fn check_at(&mut self, key: &str, now: Instant) -> Result<(), u64> {
        if self.windows.len() > 10_000 {
            self.windows.retain(|_, entries| {
                entries
                    .last()
                    .map(|ts| now.duration_since(*ts) < WINDOW)
                    .unwrap_or(false)
            });
        }

        let entries = self.windows.entry(key.to_string()).or_default();
        entries.retain(|ts| now.duration_since(*ts) < WINDOW);

        if entries.len() as u32 >= self.per_hour {
            let oldest = entries.first().copied().unwrap_or(now);
            let wait = WINDOW.saturating_sub(now.duration_since(oldest));
            return Err(wait.as_secs().max(1));
        }

        entries.push(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limiter_blocks_after_quota() {
        let mut limiter = RateLimiter::new(3);
        for _ in 0..3 {
            assert!(limiter.check("s").is_ok());
        }
        let retry = limiter.check("s").unwrap_err();
        assert!(retry > 0 && retry <= 3600);
        assert!(limiter.check("other").is_ok());
    }

    #[test]
    fn limiter_window_slides() {
        let mut limiter = RateLimiter::new(1);
        let start = Instant::now();
        assert!(limiter.check_at("s", start).is_ok());
        assert!(limiter.check_at("s", start + Duration::from_secs(10)).is_err());
        assert!(limiter.check_at("s", start + WINDOW + Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn session_header_validation() {
        let id = uuid::Uuid::new_v4().to_string();
        let session = SessionContext::from_header(Some(&id));
        assert_eq!(session.id, id);
        assert!(!session.issued);

        let issued = SessionContext::from_header(Some("not-a-session"));
        assert!(issued.issued);
        assert!(uuid::Uuid::parse_str(&issued.id).is_ok());

        assert!(SessionContext::from_header(None).issued);
    }
}
