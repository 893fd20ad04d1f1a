// src/core/config_loader.rs

//! # Config Loader
//!
//! Builds the `Config` a command or test run works with. Schemas come from two
//! places: the schemas bundled with this crate, then any `*.yaml` schema the
//! repository under test ships. A single optional config file is layered on top.

use crate::constants::{MAGIC_REPO_ROOT, MAGIC_WORKDIR};
use crate::core::config_resolver::{Config, ConfigError};
use crate::core::paths;
use std::path::Path;

/// A schema document compiled into the binary.
#[derive(Debug, Clone, Copy)]
pub struct BundledSchema {
    pub name: &'static str,
    pub content: &'static str,
}

/// Schemas compiled into the binary, applied before any repository schema.
pub const BUNDLED_SCHEMAS: &[BundledSchema] = &[
    BundledSchema {
        name: "core.yaml",
        content: include_str!("../../schemas/core.yaml"),
    },
    BundledSchema {
        name: "logging.yaml",
        content: include_str!("../../schemas/logging.yaml"),
    },
    BundledSchema {
        name: "cleanup.yaml",
        content: include_str!("../../schemas/cleanup.yaml"),
    },
    BundledSchema {
        name: "magic.yaml",
        content: include_str!("../../schemas/magic.yaml"),
    },
];

/// Loads only the bundled schemas.
pub fn load_bundled_schemas(config: &mut Config) -> Result<(), ConfigError> {
    for schema in BUNDLED_SCHEMAS {
        config.update_schema_str(schema.name, schema.content)?;
    }
    Ok(())
}

/// Loads bundled and repository schemas, then `config_file` if one is given.
///
/// When `repo_root` is given, its schemas are loaded and `magic.repo_root` is set.
///
/// # Errors
/// Schema problems surface as `ConfigError::Schema`. A config file that cannot be
/// read surfaces as `ConfigError::Io`; callers decide whether a missing file is fatal
/// with `ConfigError::is_missing_file`.
pub fn load_config_with_defaults(
    config_file: Option<&Path>,
    repo_root: Option<&Path>,
) -> Result<Config, ConfigError> {
    let mut config = Config::new();

    // 1. Schemas: bundled first, so repositories may extend the built-in namespaces.
    load_bundled_schemas(&mut config)?;
    if let Some(root) = repo_root {
        for schema_path in paths::find_repo_schemas(root)? {
            config.update_schema(&schema_path)?;
        }
        config.set_magic(MAGIC_REPO_ROOT, root.display().to_string());
    }
    config.ensure_schema_not_empty()?;

    // 2. Config values.
    if let Some(path) = config_file {
        config.update_config(path)?;
    }

    Ok(config)
}

/// Injects the working directory of the current run.
pub fn set_workdir(config: &mut Config, workdir: &Path) {
    config.set_magic(MAGIC_WORKDIR, workdir.display().to_string());
}
