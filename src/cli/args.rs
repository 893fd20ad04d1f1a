// src/cli/args.rs

use crate::constants::{CONFIG_ENV_VAR, DEFAULT_CONFIG_FILENAME};
use clap::{Args, Subcommand};
use std::path::PathBuf;

/// Selects the config file for commands that read one.
#[derive(Args, Debug, Clone)]
pub struct ConfigFileArgs {
    /// Config file to use.
    #[arg(long, short, env = CONFIG_ENV_VAR, default_value = DEFAULT_CONFIG_FILENAME)]
    pub config: String,
}

/// Subcommands of `config`.
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommands {
    /// Show the config schema.
    Schema,
    /// Generate a sample config.
    Generate,
    /// Validate the test config.
    Validate(ConfigFileArgs),
}

/// Subcommands of `template`.
#[derive(Subcommand, Debug, Clone)]
pub enum TemplateCommands {
    /// Show template parse results with a given config.
    Parse(ParseArgs),
    /// List the templates found in the repository.
    List,
}

/// Arguments for `template parse`.
#[derive(Args, Debug, Clone)]
pub struct ParseArgs {
    /// Path of the template to render.
    pub template_path: PathBuf,

    #[command(flatten)]
    pub config: ConfigFileArgs,
}

/// Arguments for `run`.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Config file to use. If none can be found, tests requiring config will not run.
    #[arg(long, short, env = CONFIG_ENV_VAR, default_value = DEFAULT_CONFIG_FILENAME)]
    pub config: String,
}
