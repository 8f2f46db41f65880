//! Presentation Layer
//!
//! HTTP handlers, DTOs, middleware, router.

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod router;
