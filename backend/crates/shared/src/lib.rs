//! Shared Kernel - Domain-crossing minimal core
//!
//! Vocabulary every dashboard crate agrees on:
//! - The unified error type and its HTTP classification
//! - Typed identifiers for sessions and submissions
//!
//! Keep this crate small. Anything that only one domain needs belongs in
//! that domain's crate.

pub mod error {
    pub mod app_error;
    pub mod conversions;
    pub mod kind;
}
pub mod id;
