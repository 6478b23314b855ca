//! repo-authz command-line tool
//!
//! Validates rule files and answers access questions against them.

use clap::Parser;
use repo_authz::{
    authz::{AccessLevel, AuthzModel, Rights},
    config::{AppConfig, AuthzFilesConfig, LogFormat, load_config},
    files::load_model,
};
use serde::Serialize;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Exit status of `accessof --is` when the access differs
const EXIT_MISMATCH: u8 = 3;

/// Repository authorization rules tool
#[derive(Parser, Debug)]
#[command(name = "repo-authz")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "REPO_AUTHZ_CONFIG", global = true)]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "REPO_AUTHZ_LOG_LEVEL", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct RuleFiles {
    /// Rules file (defaults to authz.rules_file from the configuration)
    rules: Option<String>,

    /// Global groups file
    #[arg(long)]
    groups_file: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Load the rules and report any error
    Validate {
        #[command(flatten)]
        files: RuleFiles,
    },

    /// Print the access a user has
    Accessof {
        #[command(flatten)]
        files: RuleFiles,

        /// Repository name
        #[arg(long)]
        repository: Option<String>,

        /// Path inside the repository; without it, access anywhere is reported
        #[arg(long)]
        path: Option<String>,

        /// User name; anonymous when omitted
        #[arg(long)]
        username: Option<String>,

        /// Require the access for the whole subtree below the path
        #[arg(long)]
        recursive: bool,

        /// Print nothing and exit 0 if the access is exactly this (no/none, r, w, rw), 3 otherwise
        #[arg(long, value_parser = parse_access)]
        is: Option<AccessLevel>,
    },

    /// Print the aggregated floor and ceiling of a user's access
    Rights {
        #[command(flatten)]
        files: RuleFiles,

        /// Repository name; all repositories when omitted
        #[arg(long)]
        repository: Option<String>,

        /// User name; anonymous when omitted
        #[arg(long)]
        username: Option<String>,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct RightsReport<'a> {
    repository: Option<&'a str>,
    username: Option<&'a str>,
    #[serde(flatten)]
    rights: Rights,
    found: bool,
}

fn parse_access(s: &str) -> Result<AccessLevel, String> {
    AccessLevel::try_parse(s).ok_or_else(|| format!("expected one of no, none, r, w, rw; got '{s}'"))
}

fn init_logging(config: &AppConfig, level: Option<&str>) {
    let level = level.unwrap_or(&config.logging.level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match config.logging.format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init(),
    }
}

/// Command-line files override the configured ones
fn load(files: RuleFiles, config: &AppConfig) -> anyhow::Result<AuthzModel> {
    let files = AuthzFilesConfig {
        rules_file: files.rules.or_else(|| config.authz.rules_file.clone()),
        groups_file: files.groups_file.or_else(|| config.authz.groups_file.clone()),
    };
    let model = load_model(&files).inspect_err(|e| error!(error = %e, "Failed to load rules"))?;
    Ok(model)
}

fn main() -> anyhow::Result<ExitCode> {
    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration
    let config = load_config(args.config.as_deref())?;

    // Initialize logging
    init_logging(&config, args.log_level.as_deref());

    match args.command {
        Command::Validate { files } => {
            load(files, &config)?;
            info!("Rules are valid");
        }

        Command::Accessof {
            files,
            repository,
            path,
            username,
            recursive,
            is,
        } => {
            let model = load(files, &config)?;
            let repo = repository.as_deref().unwrap_or_default();
            let identity = username.as_deref();

            let access = match path.as_deref() {
                Some(path) => model.effective_access(repo, path, identity, recursive),
                None => {
                    model
                        .global_rights(identity, repository.as_deref())
                        .max_access
                }
            };

            match is {
                Some(expected) if expected == access => {}
                Some(_) => return Ok(ExitCode::from(EXIT_MISMATCH)),
                None => println!("{access}"),
            }
        }

        Command::Rights {
            files,
            repository,
            username,
            json,
        } => {
            let model = load(files, &config)?;
            let (rights, found) =
                model.lookup_global_rights(username.as_deref(), repository.as_deref());

            if json {
                let report = RightsReport {
                    repository: repository.as_deref(),
                    username: username.as_deref(),
                    rights,
                    found,
                };
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("min: {}", rights.min_access);
                println!("max: {}", rights.max_access);
                println!("found: {found}");
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
