//! Lexvault configuration
//!
//! TOML file, validated on load, then overridden from the environment.

pub mod loader;
pub mod types;

pub use loader::{ConfigError, ConfigLoader};
pub use types::*;
