// src/cli/handlers/commons.rs

// Shared helpers for the command handlers.

use crate::core::config_loader;
use crate::core::config_resolver::{Config, ConfigError};
use crate::core::paths::{self, PathError};
use std::env;
use std::path::PathBuf;
use thiserror::Error;

/// Exit code for an invalid schema or config document.
pub const EXIT_INVALID: i32 = 1;
/// Exit code for a config file that is required but missing.
pub const EXIT_MISSING_CONFIG: i32 = 2;

/// Failures that decide the exit status of the command line tool.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("This must be run in the git repository that is being tested.\n{0}")]
    NotInRepository(#[source] PathError),
    #[error("Could not find {0}")]
    MissingConfig(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Failed running {group}, using command: {command}")]
    GroupFailed { group: String, command: String },
}

impl CliError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::MissingConfig(_) => EXIT_MISSING_CONFIG,
            _ => EXIT_INVALID,
        }
    }
}

/// Root of the repository the current directory belongs to.
pub fn repo_root() -> Result<PathBuf, CliError> {
    let cwd = env::current_dir().map_err(|e| CliError::NotInRepository(PathError::GitUnavailable(e)))?;
    paths::get_repo_root(&cwd).map_err(CliError::NotInRepository)
}

/// Loads bundled and repository schemas plus `config_file`.
///
/// A missing config file is an error when `required`; otherwise it is logged and
/// `Ok(None)` is returned so the caller can fall back to defaults.
pub fn load_config(config_file: Option<&str>, required: bool) -> Result<Option<Config>, CliError> {
    let root = repo_root()?;
    let config_path = config_file
        .map(paths::expand_path)
        .transpose()
        .map_err(|e| CliError::Config(ConfigError::Path(e)))?;

    match config_loader::load_config_with_defaults(config_path.as_deref(), Some(&root)) {
        Ok(config) => Ok(Some(config)),
        Err(e) if e.is_missing_file() => {
            let name = config_file.unwrap_or_default().to_string();
            if required {
                log::error!("Could not find {}", name);
                Err(CliError::MissingConfig(name))
            } else {
                log::warn!("Could not find {}", name);
                Ok(None)
            }
        }
        Err(e) => Err(e.into()),
    }
}

/// Like `load_config`, for commands that cannot run without a config.
pub fn load_required_config(config_file: Option<&str>) -> Result<Config, CliError> {
    load_config(config_file, true)?.ok_or_else(|| {
        CliError::MissingConfig(config_file.unwrap_or_default().to_string())
    })
}
