//! Configuration loading tests

use repo_authz::config::{LogFormat, load_config, load_config_from_str};
use repo_authz::error::ConfigError;

const MINIMAL_CONFIG: &str = r#"
[authz]
rules_file = "/srv/svn/authz"
"#;

const FULL_CONFIG: &str = r#"
[authz]
rules_file = "~/svn/authz"
groups_file = "~/svn/groups"

[logging]
level = "warn"
format = "json"
"#;

#[test]
fn test_minimal_config() {
    let config = load_config_from_str(MINIMAL_CONFIG).unwrap();

    assert_eq!(config.authz.rules_file.as_deref(), Some("/srv/svn/authz"));
    assert!(config.authz.groups_file.is_none());
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.logging.format, LogFormat::Pretty);
}

#[test]
fn test_full_config() {
    let config = load_config_from_str(FULL_CONFIG).unwrap();

    // Paths are kept as written; expansion happens when the files are read
    assert_eq!(config.authz.rules_file.as_deref(), Some("~/svn/authz"));
    assert_eq!(config.authz.groups_file.as_deref(), Some("~/svn/groups"));
    assert_eq!(config.logging.level, "warn");
    assert_eq!(config.logging.format, LogFormat::Json);
}

#[test]
fn test_uppercase_log_level_is_accepted() {
    let config = load_config_from_str("[logging]\nlevel = \"DEBUG\"\n").unwrap();
    assert_eq!(config.logging.level, "DEBUG");
}

#[test]
fn test_invalid_config_values() {
    for config_str in [
        "[authz]\ngroups_file = \"/srv/svn/groups\"\n",
        "[authz]\nrules_file = \"\"\n",
        "[logging]\nlevel = \"verbose\"\n",
        "[logging]\nformat = \"yaml\"\n",
    ] {
        assert!(
            load_config_from_str(config_str).is_err(),
            "should reject: {config_str}"
        );
    }
}

#[test]
fn test_unknown_keys_are_ignored() {
    let config = load_config_from_str("[authz]\nrules_file = \"a\"\ncolour = \"red\"\n").unwrap();
    assert_eq!(config.authz.rules_file.as_deref(), Some("a"));
}

#[test]
#[serial_test::serial]
fn test_explicit_config_file_must_exist() {
    let result = load_config(Some("/nonexistent/repo-authz/config.toml"));
    assert!(matches!(result, Err(ConfigError::Load(_))));
}

#[test]
#[serial_test::serial]
fn test_load_config_from_file() {
    use std::fs;
    use tempfile::tempdir;

    let dir = tempdir().unwrap();
    let config_path = dir.path().join("test-config.toml");
    fs::write(&config_path, FULL_CONFIG).unwrap();

    let config = load_config(Some(config_path.to_str().unwrap())).unwrap();
    assert_eq!(config.authz.rules_file.as_deref(), Some("~/svn/authz"));
    assert_eq!(config.logging.format, LogFormat::Json);
}

#[test]
#[serial_test::serial]
fn test_env_vars_override_file() {
    use std::env;
    use std::fs;
    use tempfile::tempdir;

    let dir = tempdir().unwrap();
    let config_path = dir.path().join("test-config.toml");
    fs::write(&config_path, FULL_CONFIG).unwrap();

    unsafe {
        env::set_var("REPO_AUTHZ__AUTHZ__RULES_FILE", "/etc/svn/authz");
        env::set_var("REPO_AUTHZ__LOGGING__LEVEL", "trace");
    }

    let config = load_config(Some(config_path.to_str().unwrap()));

    // Cleanup before asserting so a failure does not leak into other tests
    unsafe {
        env::remove_var("REPO_AUTHZ__AUTHZ__RULES_FILE");
        env::remove_var("REPO_AUTHZ__LOGGING__LEVEL");
    }

    let config = config.unwrap();
    assert_eq!(config.authz.rules_file.as_deref(), Some("/etc/svn/authz"));
    assert_eq!(config.authz.groups_file.as_deref(), Some("~/svn/groups"));
    assert_eq!(config.logging.level, "trace");
}

#[test]
#[serial_test::serial]
fn test_invalid_env_value_is_rejected() {
    use std::env;
    use std::fs;
    use tempfile::tempdir;

    let dir = tempdir().unwrap();
    let config_path = dir.path().join("test-config.toml");
    fs::write(&config_path, MINIMAL_CONFIG).unwrap();

    unsafe {
        env::set_var("REPO_AUTHZ__LOGGING__LEVEL", "shouty");
    }

    let result = load_config(Some(config_path.to_str().unwrap()));

    unsafe {
        env::remove_var("REPO_AUTHZ__LOGGING__LEVEL");
    }

    assert!(matches!(result, Err(ConfigError::Invalid { .. })));
}
