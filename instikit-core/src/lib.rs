//! InstiKit Core - Shared types, configuration and error handling
//!
//! This crate defines the foundation the rest of the client runtime builds on:
//! the error taxonomy, the API response envelope, configuration loading, and
//! logging bootstrap.

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use error::*;
pub use logging::*;
pub use types::*;

// Re-export commonly used external types
pub use tracing;
