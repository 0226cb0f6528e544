//! stint core - Shared functionality for the stint timer
//!
//! Duration codec, configuration validation and standard paths.

pub mod config;
pub mod format;
pub mod paths;

pub use config::Config;
pub use paths::Paths;
