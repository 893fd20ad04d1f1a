// src/bin/cloudify_tester.rs

use clap::Parser;
use cloudify_tester::{
    cli::{Cli, handlers},
    system::logging,
};
use colored::*;

fn main() {
    let cli = Cli::parse();
    logging::init_console(cli.verbose);

    if let Err(e) = handlers::dispatch(&cli) {
        // Handlers report through `CliError` where the exit code matters.
        let code = e
            .downcast_ref::<handlers::commons::CliError>()
            .map_or(handlers::commons::EXIT_INVALID, handlers::commons::CliError::exit_code);

        eprintln!("\n{}: {}", "Error".red().bold(), e);
        std::process::exit(code);
    }
}
