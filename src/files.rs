//! Reading rule files named by configuration

use crate::authz::AuthzModel;
use crate::config::AuthzFilesConfig;
use crate::error::{AppError, ConfigError, Result};
use std::fs;
use tracing::debug;

/// Read a rule file, expanding a leading `~`
pub fn read_rule_file(path: &str) -> Result<String> {
    let expanded = shellexpand::tilde(path);
    debug!(path = %expanded, "Reading rule file");
    fs::read_to_string(expanded.as_ref()).map_err(|source| AppError::Io {
        path: expanded.into_owned(),
        source,
    })
}

/// Load the model described by `files`
pub fn load_model(files: &AuthzFilesConfig) -> Result<AuthzModel> {
    let Some(rules_path) = files.rules_file.as_deref() else {
        return Err(ConfigError::Missing {
            field: "authz.rules_file".to_string(),
        }
        .into());
    };

    let rules = read_rule_file(rules_path)?;
    let groups = files.groups_file.as_deref().map(read_rule_file).transpose()?;

    Ok(AuthzModel::load(&rules, groups.as_deref())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::AccessLevel;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_model_with_groups_file() {
        let rules = temp_file("[greek:/]\n@team = rw\n");
        let groups = temp_file("[groups]\nteam = harry\n");
        let files = AuthzFilesConfig {
            rules_file: Some(rules.path().to_string_lossy().into_owned()),
            groups_file: Some(groups.path().to_string_lossy().into_owned()),
        };

        let model = load_model(&files).unwrap();
        assert!(model.check("greek", "/A", Some("harry"), AccessLevel::WRITE, false));
    }

    #[test]
    fn test_missing_rules_file_is_an_io_error() {
        let files = AuthzFilesConfig {
            rules_file: Some("/nonexistent/repo-authz/rules".to_string()),
            groups_file: None,
        };
        let err = load_model(&files).unwrap_err();
        assert!(matches!(err, AppError::Io { path, .. } if path == "/nonexistent/repo-authz/rules"));
    }

    #[test]
    fn test_unconfigured_rules_file() {
        let err = load_model(&AuthzFilesConfig::default()).unwrap_err();
        assert!(matches!(err, AppError::Config(ConfigError::Missing { .. })));
    }

    #[test]
    fn test_rule_errors_are_reported() {
        let rules = temp_file("[/]\n@senate = r\n");
        let files = AuthzFilesConfig {
            rules_file: Some(rules.path().to_string_lossy().into_owned()),
            groups_file: None,
        };
        assert!(matches!(load_model(&files), Err(AppError::Authz(_))));
    }
}
