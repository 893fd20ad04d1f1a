// src/cli/mod.rs

use clap::{Parser, Subcommand};

/// Argument structs for the subcommands.
pub mod args;
/// Command implementations.
pub mod handlers;

use args::{ConfigCommands, RunArgs, TemplateCommands};

/// cloudify_tester: schema-validated configuration and tooling for plugin system tests.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    styles = clap::builder::Styles::styled()
        .header(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .usage(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .literal(clap::builder::styling::AnsiColor::Cyan.on_default().bold())
        .placeholder(clap::builder::styling::AnsiColor::Green.on_default()),
)]
pub struct Cli {
    /// Increase log output (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Config tools, e.g. show schema or generate sample config.
    #[command(subcommand)]
    Config(ConfigCommands),
    /// Template tools, e.g. show parsed template.
    #[command(subcommand)]
    Template(TemplateCommands),
    /// Run the tests.
    Run(RunArgs),
}
