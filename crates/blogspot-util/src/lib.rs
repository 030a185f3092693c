//! Shared utilities for the blogspot MCP server.
//!
//! - ULID-based request identifiers
//! - Logging setup with tracing
//! - RAII timing for operation measurement

pub mod id;
pub mod log;
pub mod timing;

pub use id::{IdPrefix, Identifier};
pub use log::{LogConfig, LogLevel, LogTarget};
pub use timing::TimingGuard;
