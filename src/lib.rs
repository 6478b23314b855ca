//! Repository Authorization
//!
//! A path-based authorization engine for multi-repository version-control
//! servers: it decides whether a user may read or write a path in a
//! repository, based on an INI-like rules file.
//!
//! ## Features
//!
//! - **Repository and path scoped rules**, with inheritance from ancestor paths
//! - **Groups and aliases**, expanded and checked for cycles at load time
//! - **Glob rules** (`*`, `**`, prefix/suffix and shell-style segments)
//! - **Aggregated rights** for cheap "anywhere" and recursive checks
//! - **Fail-closed reloads**: a rules file that does not load denies everything
//!
//! ## Example
//!
//! ```
//! use repo_authz::authz::{self, AccessLevel};
//!
//! let model = authz::load("[greek:/trunk]\nharry = rw\n* = r\n", None).unwrap();
//! assert!(model.check("greek", "/trunk/A", Some("harry"), AccessLevel::WRITE, false));
//! assert!(!model.check("greek", "/trunk/A", None, AccessLevel::WRITE, false));
//! ```

pub mod authz;
pub mod config;
pub mod error;
pub mod files;

// Re-export main types
pub use authz::{AccessLevel, AuthzModel, Rights, SharedAuthz};
pub use config::{AppConfig, load_config};
pub use error::{AppError, AuthzError, Result};
