//! Client identification utilities
//!
//! Derives the caller key the admission controller buckets on.

use axum::http::HeaderMap;
use std::fmt;
use std::net::IpAddr;

/// Stable identifier for a rate-limit subject
///
/// `user:<id>` for an authenticated caller, `ip:<addr>` when only the
/// network origin is known, `anonymous` otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallerKey(String);

impl CallerKey {
    pub const ANONYMOUS: &'static str = "anonymous";

    /// Identify the caller behind a request
    ///
    /// ## Arguments
    /// * `user_id` - Authenticated user id, if a valid session exists
    /// * `headers` - HTTP request headers
    /// * `direct_ip` - Socket peer address
    pub fn identify(user_id: Option<&str>, headers: &HeaderMap, direct_ip: Option<IpAddr>) -> Self {
        if let Some(id) = user_id.map(str::trim).filter(|id| !id.is_empty()) {
            return Self(format!("user:{id}"));
        }
        match extract_client_ip(headers, direct_ip) {
            Some(ip) => Self(format!("ip:{ip}")),
            None => Self(Self::ANONYMOUS.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_authenticated(&self) -> bool {
        self.0.starts_with("user:")
    }
}

impl fmt::Display for CallerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CallerKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Extract client IP address from headers
///
/// Checks X-Forwarded-For header first (for reverse proxy setups),
/// then falls back to direct connection IP.
pub fn extract_client_ip(headers: &HeaderMap, direct_ip: Option<IpAddr>) -> Option<IpAddr> {
    // First entry is the original client
    if let Some(xff) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first_ip) = xff.split(',').next() {
            if let Ok(ip) = first_ip.trim().parse::<IpAddr>() {
                return Some(ip);
            }
        }
    }
    direct_ip
}
