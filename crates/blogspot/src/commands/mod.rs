//! Command handlers for the blogspot CLI.

pub mod auth;
pub mod logging;
pub mod serve;
pub mod tools;

pub use auth::*;
pub use logging::*;
pub use serve::*;
pub use tools::*;
