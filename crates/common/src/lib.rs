//! MoltWatch Common Library
//!
//! Shared code for the MoltWatch services including:
//! - Database entities, schema bootstrap and read queries
//! - Translation capability abstraction
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod config;
pub mod db;
pub mod errors;
pub mod language;
pub mod metrics;
pub mod translation;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{DbPool, Repository};
pub use errors::{AppError, Result};
pub use language::Language;
pub use translation::{Translation, Translator};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default number of top-scored posts kept by retention
pub const DEFAULT_KEEP_TOP_SCORED: u64 = 100;

/// Default number of most recent posts kept by retention
pub const DEFAULT_KEEP_MOST_RECENT: u64 = 200;
