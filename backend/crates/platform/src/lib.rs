//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations:
//! - Admission control (sliding-window rate limiting per caller and route)
//! - Coalescing deferred work queue (debounced formula recomputes)
//! - Caller identification from request headers
//! - Cookie management
//! - Cryptographic utilities (HMAC-SHA256, Base64)

pub mod client;
pub mod coalesce;
pub mod cookie;
pub mod crypto;
pub mod rate_limit;
