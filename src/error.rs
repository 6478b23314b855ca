//! Error types for repo-authz
//!
//! This module defines the error hierarchy used throughout the crate.
//! Rule-file problems are reported through [`AuthzError`]; every variant is
//! fatal to the load that raised it. Host-side concerns (configuration, file
//! access) have their own types and are aggregated by [`AppError`].

use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Authorization rules error: {0}")]
    Authz(#[from] AuthzError),

    #[error("Failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {field}")]
    Missing { field: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while compiling rule and group files into a model
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("Line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("Section [{section}] is defined more than once")]
    DuplicateSection { section: String },

    #[error("Section [{section}]: expected 'glob' but found '{token}'")]
    InvalidGlobToken { section: String, token: String },

    #[error("Section [{section}]: empty repository name")]
    EmptyRepoName { section: String },

    #[error("Section [{section}]: invalid repository name '{repo}'")]
    InvalidRepoName { section: String, repo: String },

    #[error("Section [{section}]: path '{path}' is not canonical")]
    NonCanonicalPath { section: String, path: String },

    #[error("Section [{section}] is not a valid rule, groups or aliases section")]
    InvalidSection { section: String },

    #[error("Section [{section}]: invalid glob segment '{pattern}': {reason}")]
    InvalidGlobPattern {
        section: String,
        pattern: String,
        reason: String,
    },

    #[error("Section [{section}]: name '{name}' starts with a reserved character")]
    ReservedNameStart { section: String, name: String },

    #[error("Section [{section}]: access '{value}' for '{option}' contains invalid character '{found}'")]
    UnknownAccessChar {
        section: String,
        option: String,
        value: String,
        found: char,
    },

    #[error("Group '{group}' is defined more than once")]
    DuplicateGroup { group: String },

    #[error("Alias '{alias}' is defined more than once")]
    DuplicateAlias { alias: String },

    #[error("Undefined alias '{alias}' referenced in {context}")]
    UndefinedAlias { alias: String, context: String },

    #[error("Undefined group '{group}' referenced in {context}")]
    UndefinedGroup { group: String, context: String },

    #[error("Recursive definition of group '{group}'")]
    RecursiveGroupDefinition { group: String },

    #[error("The rules file must not define [groups] when a global groups file is used")]
    GroupsNotAllowedHere,
}

impl AuthzError {
    pub(crate) fn syntax(line: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            message: message.into(),
        }
    }

    pub(crate) fn reserved(section: &str, name: impl Into<String>) -> Self {
        Self::ReservedNameStart {
            section: section.to_string(),
            name: name.into(),
        }
    }
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, AppError>;

/// Result type alias for rule compilation
pub type AuthzResult<T> = std::result::Result<T, AuthzError>;
