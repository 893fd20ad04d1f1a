// src/core/config_resolver.rs

//! # Config Resolver
//!
//! The `Config` aggregate owns the merged schema and the raw config tree and computes
//! the effective configuration from them on demand. Lifecycle is explicit:
//! construction, then any number of `update_schema` / `update_config` calls, then
//! read-only lookups. Nothing is cached between reads, so every view reflects the
//! latest update.

use crate::constants::{DELIMITER, MAGIC_NAMESPACE};
use crate::core::config_tree::ConfigTree;
use crate::core::paths::PathError;
use crate::core::schema::{Schema, SchemaError};
use crate::models::{
    ConfigValue, ConfigWarning, ResolvedNode, ResolvedView, SchemaEntry, SchemaNode,
    ValidationReport,
};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Failures while reading schema or config documents.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Error parsing YAML in '{path}': {source}")]
    YamlParse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("'{path}' must contain a mapping of dotted keys to values.")]
    NotAMapping { path: String },
    #[error("'{path}' has a key that is not a string, number or boolean: {key}")]
    InvalidKey { path: String, key: String },
    #[error("Config entry {key} in '{path}' has a value that cannot be used: {source}")]
    InvalidValue {
        path: String,
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Path(#[from] PathError),
}

impl ConfigError {
    /// `true` when the error means the file simply does not exist.
    pub fn is_missing_file(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

/// A lookup that could not produce a value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyNotFoundError {
    #[error(
        "Config entry {key} was supplied but was not in the schema. Please update the schema to use this config entry."
    )]
    NotInSchema { key: String },
    #[error("Config entry {key} was not supplied and is not in schema.")]
    Unknown { key: String },
    #[error("Config entry {key} is in the schema but is not set and has no default.")]
    NotSet { key: String },
}

/// The configuration aggregate for one test run.
#[derive(Debug, Clone, Default)]
pub struct Config {
    schema: Schema,
    raw_config: ConfigTree,
    magic: BTreeMap<String, Value>,
}

impl Config {
    /// Creates an empty aggregate. Use `load` for the usual schema-then-config flow.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every schema file, then every config file.
    ///
    /// # Errors
    /// Fails with `ConfigError::Schema` if any schema document is invalid or if no
    /// entries were loaded at all, and with I/O or YAML errors for unreadable files.
    pub fn load<S: AsRef<Path>, C: AsRef<Path>>(
        schema_paths: &[S],
        config_paths: &[C],
    ) -> Result<Self, ConfigError> {
        let mut config = Self::new();
        for path in schema_paths {
            config.update_schema(path.as_ref())?;
        }
        config.ensure_schema_not_empty()?;
        for path in config_paths {
            config.update_config(path.as_ref())?;
        }
        Ok(config)
    }

    // --- LOADING ---

    /// Applies one more schema file and re-checks the raw config against it.
    pub fn update_schema(&mut self, path: &Path) -> Result<Vec<ConfigWarning>, ConfigError> {
        let origin = path.display().to_string();
        let content = read_file(path)?;
        self.update_schema_str(&origin, &content)
    }

    /// Merges a schema document given as text and re-checks the raw config.
    pub fn update_schema_str(
        &mut self,
        origin: &str,
        content: &str,
    ) -> Result<Vec<ConfigWarning>, ConfigError> {
        let document: Value = parse_yaml(origin, content)?;
        self.schema.apply_document(origin, document)?;
        log::debug!("Loaded schema from '{}'", origin);
        Ok(self.check_config_is_valid())
    }

    /// Merges one more config file over the ones already loaded.
    pub fn update_config(&mut self, path: &Path) -> Result<Vec<ConfigWarning>, ConfigError> {
        let origin = path.display().to_string();
        let content = read_file(path)?;
        self.update_config_str(&origin, &content)
    }

    /// Merges a flat, dotted-key config document given as text.
    pub fn update_config_str(
        &mut self,
        origin: &str,
        content: &str,
    ) -> Result<Vec<ConfigWarning>, ConfigError> {
        let document: serde_yaml::Value = parse_yaml(origin, content)?;
        let mapping = match document {
            serde_yaml::Value::Null => serde_yaml::Mapping::new(),
            serde_yaml::Value::Mapping(mapping) => mapping,
            _ => {
                return Err(ConfigError::NotAMapping {
                    path: origin.to_string(),
                });
            }
        };

        let mut processed = ConfigTree::new();
        for (key, value) in mapping {
            let key = yaml_key_to_string(&key).ok_or_else(|| ConfigError::InvalidKey {
                path: origin.to_string(),
                key: format!("{:?}", key),
            })?;
            let value = serde_json::to_value(value).map_err(|source| ConfigError::InvalidValue {
                path: origin.to_string(),
                key: key.clone(),
                source,
            })?;
            processed.insert_dotted(&key, value);
        }
        self.raw_config.merge(&processed);
        log::debug!("Loaded config from '{}'", origin);
        Ok(self.check_config_is_valid())
    }

    /// Fails when no schema document contributed anything.
    pub fn ensure_schema_not_empty(&self) -> Result<(), SchemaError> {
        if self.schema.is_empty() {
            return Err(SchemaError::Empty);
        }
        Ok(())
    }

    /// Injects a runtime value into the reserved namespace.
    pub fn set_magic(&mut self, key: &str, value: impl Into<Value>) {
        self.magic.insert(key.to_string(), value.into());
    }

    /// Walks the raw config against the schema, logging and returning every key
    /// that cannot be used. Never fails.
    pub fn check_config_is_valid(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        for key in self.raw_config.child_keys(&[]) {
            match self.schema.get(&key) {
                None => warnings.push(ConfigWarning::UnknownKey { key }),
                Some(SchemaNode::Entry(_)) => {}
                Some(SchemaNode::Namespace(entries)) => {
                    if self.raw_config.is_leaf(&[key.as_str()]) {
                        warnings.push(ConfigWarning::NamespaceValue { namespace: key });
                        continue;
                    }
                    for sub_key in self.raw_config.child_keys(&[key.as_str()]) {
                        let known = entries.contains_key(&sub_key);
                        let display_key = format!("{}{}{}", key, DELIMITER, sub_key);
                        if key == MAGIC_NAMESPACE {
                            warnings.push(ConfigWarning::MagicKey {
                                key: display_key,
                                known,
                            });
                        } else if !known {
                            warnings.push(ConfigWarning::UnknownKey { key: display_key });
                        }
                    }
                }
            }
        }

        for warning in &warnings {
            log::warn!("{}", warning);
        }
        warnings
    }

    // --- INSPECTION ---

    /// The merged schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Namespaces known to the schema, always including the root (`None`).
    pub fn namespaces(&self) -> BTreeSet<Option<String>> {
        self.schema.namespaces()
    }

    // --- RESOLVED VIEW ---

    /// The effective configuration: schema defaults overlaid with raw overrides,
    /// namespaces nested under their name.
    pub fn items(&self) -> ResolvedView {
        self.schema
            .iter()
            .map(|(key, node)| {
                let resolved = match node {
                    SchemaNode::Entry(entry) => {
                        ResolvedNode::Value(self.resolve_entry(None, key, entry))
                    }
                    SchemaNode::Namespace(entries) => ResolvedNode::Namespace(
                        entries
                            .iter()
                            .map(|(sub_key, entry)| {
                                (sub_key.clone(), self.resolve_entry(Some(key), sub_key, entry))
                            })
                            .collect(),
                    ),
                };
                (key.clone(), resolved)
            })
            .collect()
    }

    /// Root-level keys of the resolved view.
    pub fn keys(&self) -> Vec<String> {
        self.items().into_keys().collect()
    }

    /// Root-level nodes of the resolved view, in key order.
    pub fn values(&self) -> Vec<ResolvedNode> {
        self.items().into_values().collect()
    }

    /// The resolved view plus a `"namespace.key"` alias for every namespaced entry.
    pub fn get_with_dotted(&self) -> ResolvedView {
        let mut view = self.items();
        let aliases: Vec<(String, ResolvedNode)> = view
            .iter()
            .filter_map(|(namespace, node)| node.as_namespace().map(|entries| (namespace, entries)))
            .flat_map(|(namespace, entries)| {
                entries.iter().map(move |(key, value)| {
                    (
                        format!("{}{}{}", namespace, DELIMITER, key),
                        ResolvedNode::Value(value.clone()),
                    )
                })
            })
            .collect();
        view.extend(aliases);
        view
    }

    /// Looks up a root key, a namespace, or a `"namespace.key"` alias.
    ///
    /// # Errors
    /// `KeyNotFoundError::NotInSchema` when the key only exists in raw config,
    /// `KeyNotFoundError::Unknown` when it exists nowhere.
    pub fn get(&self, key: &str) -> Result<ResolvedNode, KeyNotFoundError> {
        self.get_with_dotted()
            .remove(key)
            .ok_or_else(|| self.missing_key(key))
    }

    /// Resolves a dotted path to a concrete value, descending into namespaces and
    /// then into nested mappings.
    ///
    /// # Errors
    /// Besides the `get` errors, `KeyNotFoundError::NotSet` when the entry exists
    /// but has neither a value nor a default.
    pub fn lookup(&self, path: &str) -> Result<Value, KeyNotFoundError> {
        let mut segments = path.split(DELIMITER);
        let head = segments.next().unwrap_or_default();

        let value = match self.get(head)? {
            ResolvedNode::Value(value) => value,
            ResolvedNode::Namespace(mut entries) => match segments.next() {
                Some(key) => entries.remove(key).ok_or_else(|| self.missing_key(path))?,
                None => return Ok(ResolvedNode::Namespace(entries).to_json()),
            },
        };

        let mut current = match value {
            ConfigValue::Set(value) => value,
            ConfigValue::NotSet => {
                return Err(KeyNotFoundError::NotSet {
                    key: path.to_string(),
                });
            }
        };

        for segment in segments {
            current = match current {
                Value::Object(mut map) => map.remove(segment).ok_or_else(|| self.missing_key(path))?,
                _ => return Err(self.missing_key(path)),
            };
        }
        Ok(current)
    }

    /// Entries that are unset without default, and magic entries set in config.
    pub fn validation_report(&self) -> ValidationReport {
        let mut report = ValidationReport::default();

        for (key, node) in self.items() {
            match node {
                ResolvedNode::Value(ConfigValue::NotSet) => report.unset.push(key),
                ResolvedNode::Value(ConfigValue::Set(_)) => {}
                ResolvedNode::Namespace(entries) => {
                    for (sub_key, value) in entries {
                        let display_key = format!("{}{}{}", key, DELIMITER, sub_key);
                        if key == MAGIC_NAMESPACE {
                            if self.raw_config.contains(&[key.as_str(), sub_key.as_str()]) {
                                report.ignored_magic.push(display_key);
                            }
                        } else if !value.is_set() {
                            report.unset.push(display_key);
                        }
                    }
                }
            }
        }
        report
    }

    // --- HELPERS ---

    fn resolve_entry(&self, namespace: Option<&str>, key: &str, entry: &SchemaEntry) -> ConfigValue {
        let supplied = match namespace {
            Some(MAGIC_NAMESPACE) => self.magic.get(key).cloned(),
            Some(ns) => self.raw_config.value_at(&[ns, key]),
            None => self.raw_config.value_at(&[key]),
        };
        supplied.map_or_else(
            || ConfigValue::from_default(entry.default.as_ref()),
            ConfigValue::Set,
        )
    }

    fn missing_key(&self, key: &str) -> KeyNotFoundError {
        let segments: Vec<&str> = key.split(DELIMITER).collect();
        if self.raw_config.contains(&segments) {
            KeyNotFoundError::NotInSchema {
                key: key.to_string(),
            }
        } else {
            KeyNotFoundError::Unknown {
                key: key.to_string(),
            }
        }
    }
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn parse_yaml<T: serde::de::DeserializeOwned>(origin: &str, content: &str) -> Result<T, ConfigError> {
    serde_yaml::from_str(content).map_err(|source| ConfigError::YamlParse {
        path: origin.to_string(),
        source,
    })
}

/// Config keys are dotted strings, but YAML happily parses `1.5: x` as a number.
fn yaml_key_to_string(key: &serde_yaml::Value) -> Option<String> {
    match key {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
