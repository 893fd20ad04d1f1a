// src/core/paths.rs

use crate::constants::{REPO_SCHEMAS_DIR, REPO_TEMPLATES_DIR, WORKDIR_PREFIX};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use walkdir::WalkDir;

/// Failures while locating the repository and its files.
#[derive(Error, Debug)]
pub enum PathError {
    #[error("Error trying to find repo root: {0}")]
    NotInRepository(String),
    #[error("Could not run git to find the repo root: {0}")]
    GitUnavailable(#[source] std::io::Error),
    #[error("Could not read directory '{path}': {source}")]
    DirectoryRead {
        path: String,
        #[source]
        source: walkdir::Error,
    },
    #[error("Failed to expand path '{path}': {reason}")]
    Expansion { path: String, reason: String },
}

/// Returns the top level of the git repository containing `start`.
pub fn get_repo_root(start: &Path) -> Result<PathBuf, PathError> {
    let output = Command::new("git")
        .args(["rev-parse", "--show-toplevel"])
        .current_dir(start)
        .output()
        .map_err(PathError::GitUnavailable)?;

    if !output.status.success() {
        return Err(PathError::NotInRepository(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
    log::debug!("Repository root is '{}'", root);
    Ok(PathBuf::from(root))
}

/// Lists the `*.yaml` schema files a repository ships, sorted by name.
/// A repository without a schema directory simply has none.
pub fn find_repo_schemas(repo_root: &Path) -> Result<Vec<PathBuf>, PathError> {
    let schemas_dir = repo_root.join(REPO_SCHEMAS_DIR);
    if !schemas_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut schemas = Vec::new();
    for entry in WalkDir::new(&schemas_dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|source| PathError::DirectoryRead {
            path: schemas_dir.display().to_string(),
            source,
        })?;
        let is_yaml = entry.path().extension().is_some_and(|ext| ext == "yaml");
        if entry.file_type().is_file() && is_yaml {
            schemas.push(entry.into_path());
        }
    }
    Ok(schemas)
}

/// Maps every template under the repository's template directory (recursively) to
/// its path. Keys are relative paths joined with `/`.
pub fn get_templates(repo_root: &Path) -> Result<BTreeMap<String, PathBuf>, PathError> {
    let templates_dir = repo_root.join(REPO_TEMPLATES_DIR);
    let mut templates = BTreeMap::new();
    if !templates_dir.is_dir() {
        return Ok(templates);
    }

    for entry in WalkDir::new(&templates_dir).min_depth(1) {
        let entry = entry.map_err(|source| PathError::DirectoryRead {
            path: templates_dir.display().to_string(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(&templates_dir) else {
            continue;
        };
        let key = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        templates.insert(key, entry.into_path());
    }
    Ok(templates)
}

/// Builds the temporary directory prefix for a test: the first ten characters of
/// its name, with anything that is not alphanumeric replaced by `_`.
pub fn generate_workdir_prefix(test_name: &str) -> String {
    let feature: String = test_name
        .chars()
        .take(10)
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    format!("{}_{}_", WORKDIR_PREFIX, feature)
}

/// Expands `~` and environment variables in a user supplied path.
pub fn expand_path(path: &str) -> Result<PathBuf, PathError> {
    let expanded = shellexpand::full(path).map_err(|e| PathError::Expansion {
        path: path.to_string(),
        reason: e.to_string(),
    })?;
    Ok(dunce::simplified(Path::new(expanded.as_ref())).to_path_buf())
}
