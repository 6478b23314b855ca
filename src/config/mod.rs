//! Configuration module
//!
//! Locates the rule files and sets up logging. Values come from a TOML file
//! and `REPO_AUTHZ__*` environment variables.

pub mod loader;
pub mod types;

pub use loader::{load_config, load_config_from_str};
pub use types::*;
