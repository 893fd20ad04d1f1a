// src/cli/handlers/config.rs

use crate::cli::args::{ConfigCommands, ConfigFileArgs};
use crate::cli::handlers::commons;
use crate::core::schema_display;
use crate::models::ValidationReport;
use anyhow::Result;
use colored::Colorize;

/// Entry point for the `config` subcommands.
pub fn handle(command: &ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Schema => handle_schema(),
        ConfigCommands::Generate => handle_generate(),
        ConfigCommands::Validate(args) => handle_validate(args),
    }
}

fn handle_schema() -> Result<()> {
    let config = commons::load_required_config(None)?;
    for line in schema_display::describe_schema(config.schema()) {
        println!("{}", line);
    }
    Ok(())
}

fn handle_generate() -> Result<()> {
    let config = commons::load_required_config(None)?;
    for line in schema_display::generate_sample_config(config.schema()) {
        println!("{}", line);
    }
    Ok(())
}

fn handle_validate(args: &ConfigFileArgs) -> Result<()> {
    let config = commons::load_required_config(Some(&args.config))?;
    let report = config.validation_report();
    for line in validation_messages(&report) {
        eprintln!("{}", line.yellow());
    }
    if report.is_clean() {
        println!("{} {}", "✓".green(), args.config.bold());
    }
    Ok(())
}

fn validation_messages(report: &ValidationReport) -> Vec<String> {
    report
        .unset
        .iter()
        .map(|key| format!("{} is not set and has no default!", key))
        .chain(report.ignored_magic.iter().map(|key| {
            format!(
                "{} is set. This will be ignored, as magic values cannot be configured.",
                key
            )
        }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_validation_messages() {
        let report = ValidationReport {
            unset: vec!["cloudify.existing_manager_ip".to_string()],
            ignored_magic: vec!["magic.workdir".to_string()],
        };
        assert_eq!(
            validation_messages(&report),
            vec![
                "cloudify.existing_manager_ip is not set and has no default!".to_string(),
                "magic.workdir is set. This will be ignored, as magic values cannot be configured."
                    .to_string(),
            ]
        );
        assert!(validation_messages(&ValidationReport::default()).is_empty());
    }
}
