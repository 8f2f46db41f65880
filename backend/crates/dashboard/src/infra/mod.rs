//! Infrastructure Layer
//!
//! Document store client and session storage.

pub mod memory;
pub mod sheets;

pub use memory::InMemorySessionRepository;
pub use sheets::{SheetsClient, SheetsConfig};
