//! Application Configuration
//!
//! Configuration for the Dashboard application layer.

use std::time::Duration;

use platform::coalesce::QueueConfig;
use platform::cookie::CookieConfig;
use platform::crypto::random_bytes;
use platform::rate_limit::RateLimitConfig;

/// Re-export SameSite from platform
pub use platform::cookie::SameSite;

/// Route-scoped admission policies
///
/// Each route gets an independent quota per caller.
#[derive(Debug, Clone)]
pub struct RateLimits {
    /// POST /session (token exchange probes the document store)
    pub open_session: RateLimitConfig,
    /// Read-only project routes
    pub read: RateLimitConfig,
    /// POST /projects/{id}/submissions
    pub submit: RateLimitConfig,
    /// POST /projects/{id}/recompute
    pub recompute: RateLimitConfig,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            open_session: RateLimitConfig::new(5, 60),
            read: RateLimitConfig::new(60, 60),
            submit: RateLimitConfig::new(30, 60),
            recompute: RateLimitConfig::new(3, 60),
        }
    }
}

/// Dashboard application configuration
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// Session cookie name
    pub session_cookie_name: String,
    /// Session secret key for HMAC signing (32 bytes)
    pub session_secret: [u8; 32],
    pub session_ttl: Duration,
    /// Whether to require Secure cookie
    pub cookie_secure: bool,
    pub cookie_same_site: SameSite,
    /// Emails allowed to use the admin routes (lowercase)
    pub admin_emails: Vec<String>,
    pub rate_limits: RateLimits,
    pub formula_queue: QueueConfig,
    /// How often idle limiter buckets are swept
    pub limiter_sweep_interval: Duration,
    /// Buckets idle this many windows are dropped
    pub limiter_idle_windows: u32,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            session_cookie_name: "dashboard_session".to_string(),
            session_secret: [0u8; 32],
            session_ttl: Duration::from_secs(8 * 3600), // 8 hours
            cookie_secure: true,
            cookie_same_site: SameSite::Lax,
            admin_emails: Vec::new(),
            rate_limits: RateLimits::default(),
            formula_queue: QueueConfig::default(),
            limiter_sweep_interval: Duration::from_secs(60),
            limiter_idle_windows: 2,
        }
    }
}

impl DashboardConfig {
    /// Create config with a random session secret
    pub fn with_random_secret() -> Self {
        let mut secret = [0u8; 32];
        secret.copy_from_slice(&random_bytes(32));
        Self {
            session_secret: secret,
            ..Default::default()
        }
    }

    /// Create config for development (insecure cookie)
    pub fn development() -> Self {
        Self {
            cookie_secure: false,
            ..Self::with_random_secret()
        }
    }

    /// Get session TTL in milliseconds
    pub fn session_ttl_ms(&self) -> i64 {
        self.session_ttl.as_millis() as i64
    }

    pub fn is_admin(&self, email: &str) -> bool {
        let email = email.trim().to_ascii_lowercase();
        self.admin_emails.iter().any(|admin| *admin == email)
    }

    /// Cookie attributes for the session cookie
    pub fn session_cookie(&self) -> CookieConfig {
        CookieConfig {
            name: self.session_cookie_name.clone(),
            secure: self.cookie_secure,
            http_only: true,
            same_site: self.cookie_same_site,
            path: "/".to_string(),
            max_age_secs: Some(self.session_ttl.as_secs() as i64),
        }
    }
}
