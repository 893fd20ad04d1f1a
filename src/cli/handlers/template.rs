// src/cli/handlers/template.rs

use crate::cli::args::{ParseArgs, TemplateCommands};
use crate::cli::handlers::commons;
use crate::core::{config_loader, interpolator, paths};
use crate::constants::REPO_TEMPLATES_DIR;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Stand-in workdir used when rendering outside a test run.
const PLACEHOLDER_WORKDIR: &str = "/path/to/your/workdir";

/// Entry point for the `template` subcommands.
pub fn handle(command: &TemplateCommands) -> Result<()> {
    match command {
        TemplateCommands::Parse(args) => handle_parse(args),
        TemplateCommands::List => handle_list(),
    }
}

fn handle_list() -> Result<()> {
    let root = commons::repo_root()?;
    let templates = paths::get_templates(&root)?;
    if templates.is_empty() {
        log::warn!("No templates found in {}", root.join(REPO_TEMPLATES_DIR).display());
    }
    for (name, path) in templates {
        println!("{}: {}", name, path.display());
    }
    Ok(())
}

fn handle_parse(args: &ParseArgs) -> Result<()> {
    let mut config = commons::load_required_config(Some(&args.config.config))?;
    config_loader::set_workdir(&mut config, Path::new(PLACEHOLDER_WORKDIR));

    let template = fs::read_to_string(&args.template_path)
        .with_context(|| format!("Could not read template '{}'", args.template_path.display()))?;
    let rendered = interpolator::render_template(&template, &config)?;
    println!("{}", rendered);
    Ok(())
}
