// src/cli/handlers/mod.rs

// One module per top-level command.

/// Helpers shared by the handlers.
pub mod commons;
/// `config schema`, `config generate` and `config validate`.
pub mod config;
/// `run`.
pub mod run;
/// `template parse` and `template list`.
pub mod template;

use crate::cli::{Cli, Commands};
use anyhow::Result;

/// Routes a parsed command line to its handler.
pub fn dispatch(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Config(command) => config::handle(command),
        Commands::Template(command) => template::handle(command),
        Commands::Run(args) => run::handle(args),
    }
}
