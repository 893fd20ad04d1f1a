// src/system/env_cache.rs

//! # Environment Cache
//!
//! Every distinct environment an executor runs a command with is written once to a
//! dotfile in the work directory, so an operator can `. env_cfyinit_1` and replay a
//! failing command by hand. Identical environments reuse the file written first.
//! The cache belongs to a single executor and is never shared or persisted.

use crate::constants::ENV_FILE_PREFIX;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Number of leading command tokens used to name an environment file.
const NAME_TOKENS: usize = 3;
/// Longest stem, in bytes, taken from those tokens. Keeps names well under NAME_MAX.
const MAX_STEM_BYTES: usize = 64;

/// An environment file that could not be written.
#[derive(Error, Debug)]
#[error("Could not write environment file '{path}': {source}")]
pub struct EnvFileError {
    pub path: String,
    #[source]
    pub source: std::io::Error,
}

/// Environment files written by one executor, keyed by the exact environment.
#[derive(Debug, Clone)]
pub struct EnvCache {
    dir: PathBuf,
    entries: Vec<(String, BTreeMap<String, String>)>,
}

impl EnvCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            entries: Vec::new(),
        }
    }

    /// The file name already holding exactly `env`, if any.
    pub fn find(&self, env: &BTreeMap<String, String>) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, cached)| cached == env)
            .map(|(name, _)| name.as_str())
    }

    /// Returns the path of the file holding `env`, writing a new one if this
    /// environment has not been seen before.
    pub fn resolve(
        &mut self,
        command: &[String],
        env: &BTreeMap<String, String>,
    ) -> Result<PathBuf, EnvFileError> {
        if let Some(name) = self.find(env) {
            return Ok(self.dir.join(name));
        }

        let name = self.candidate_name(command);
        let path = self.dir.join(&name);
        fs::write(&path, render_env_file(env)).map_err(|source| EnvFileError {
            path: path.display().to_string(),
            source,
        })?;
        log::debug!("Wrote environment for '{}' to '{}'", command.join(" "), path.display());

        self.entries.push((name, env.clone()));
        Ok(path)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of distinct environments written so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `env_<first tokens>_<n>`, with the smallest `n` not yet used by this cache.
    fn candidate_name(&self, command: &[String]) -> String {
        let mut stem = String::new();
        for c in command.iter().take(NAME_TOKENS).flat_map(|token| token.chars()) {
            if stem.len() + c.len_utf8() > MAX_STEM_BYTES {
                break;
            }
            let unsafe_char =
                matches!(c, '/' | '\\' | '"') || c.is_whitespace() || c.is_control();
            stem.push(if unsafe_char { '_' } else { c });
        }
        let base = format!("{}{}", ENV_FILE_PREFIX, stem);

        let mut suffix = 1;
        loop {
            let candidate = format!("{}_{}", base, suffix);
            if !self.entries.iter().any(|(name, _)| *name == candidate) {
                return candidate;
            }
            suffix += 1;
        }
    }
}

/// One `KEY="value"` line per variable, in key order, safe to source from a POSIX shell.
pub fn render_env_file(env: &BTreeMap<String, String>) -> String {
    env.iter()
        .map(|(key, value)| format!("{}=\"{}\"\n", key, escape_value(value)))
        .collect()
}

fn escape_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '"' | '$' | '`') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn command(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_identical_environment_reuses_file() {
        // --- Setup ---
        let dir = tempdir().unwrap();
        let mut cache = EnvCache::new(dir.path());
        let environment = env(&[("PATH", "/usr/bin")]);

        // --- Execute ---
        let first = cache.resolve(&command(&["cfy", "init"]), &environment).unwrap();
        let second = cache.resolve(&command(&["ls"]), &environment).unwrap();

        // --- Assert ---
        assert_eq!(first, second);
        assert_eq!(first, dir.path().join("env_cfyinit_1"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_name_collisions_get_increasing_suffixes() {
        let dir = tempdir().unwrap();
        let mut cache = EnvCache::new(dir.path());
        let cmd = command(&["/usr/bin/cfy", "\"status\"", "-v", "ignored"]);

        let first = cache.resolve(&cmd, &env(&[("A", "1")])).unwrap();
        let second = cache.resolve(&cmd, &env(&[("A", "2")])).unwrap();

        assert_eq!(first.file_name().unwrap(), "env__usr_bin_cfy_status_-v_1");
        assert_eq!(second.file_name().unwrap(), "env__usr_bin_cfy_status_-v_2");
    }

    #[test]
    fn test_long_commands_get_a_bounded_file_name() {
        // --- Setup ---
        let dir = tempdir().unwrap();
        let mut cache = EnvCache::new(dir.path());
        let script = format!("echo {}", "é".repeat(300));

        // --- Execute ---
        let path = cache.resolve(&command(&["sh", "-c", script.as_str()]), &env(&[("A", "1")])).unwrap();

        // --- Assert ---
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.len() <= ENV_FILE_PREFIX.len() + MAX_STEM_BYTES + 2, "got {}", name);
        assert!(name.starts_with("env_sh-cecho_é"));
        assert!(path.exists());
    }

    #[test]
    fn test_whitespace_and_control_characters_are_replaced() {
        let dir = tempdir().unwrap();
        let cache = EnvCache::new(dir.path());
        assert_eq!(cache.candidate_name(&command(&["a b", "c\td\n"])), "env_a_bc_d__1");
    }

    #[test]
    fn test_env_file_is_sorted_and_escaped() {
        let dir = tempdir().unwrap();
        let mut cache = EnvCache::new(dir.path());
        let path = cache
            .resolve(&command(&["x"]), &env(&[("B", "say \"hi\" $HOME"), ("A", "plain")]))
            .unwrap();

        let content = fs::read_to_string(path).unwrap();
        assert_eq!(content, "A=\"plain\"\nB=\"say \\\"hi\\\" \\$HOME\"\n");
    }

    #[test]
    fn test_unwritable_directory_is_reported() {
        let mut cache = EnvCache::new("/definitely/not/a/real/dir");
        let err = cache.resolve(&command(&["x"]), &env(&[])).unwrap_err();
        assert!(err.path.contains("env_x_1"));
        assert!(cache.is_empty());
    }
}
