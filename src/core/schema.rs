// src/core/schema.rs

//! # Schema Store
//!
//! Accumulates schema documents into one merged schema. Each document is a YAML
//! mapping of entry names to `{description, default}` mappings, optionally tagged
//! with a top-level `namespace` key. Documents are validated as a whole before any
//! of their entries are merged, so a rejected document never leaves partial state.

use crate::constants::{DELIMITER, NAMESPACE_KEY};
use crate::models::{SchemaEntry, SchemaNode};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// A schema that cannot be used. Always fatal to the load.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error(
        "Schema \"{path}\" is not viable. Please correct the following errors:\n  {}",
        .errors.join("\n  ")
    )]
    Invalid { path: String, errors: Vec<String> },
    #[error("Attempted to define namespace {0} but this is already a configuration entry!")]
    NamespaceIsEntry(String),
    #[error("Attempted to define configuration entry {0} but this is already a namespace!")]
    EntryIsNamespace(String),
    #[error("No valid config entries loaded from schemas.")]
    Empty,
}

/// The merged schema: root entries and namespaces side by side.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    nodes: BTreeMap<String, SchemaNode>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The root entry or namespace named `key`.
    pub fn get(&self, key: &str) -> Option<&SchemaNode> {
        self.nodes.get(key)
    }

    /// Root entries and namespaces, in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &SchemaNode)> {
        self.nodes.iter()
    }

    /// Every namespace name plus `None` for the implicit root namespace.
    pub fn namespaces(&self) -> BTreeSet<Option<String>> {
        let mut namespaces: BTreeSet<Option<String>> = self
            .nodes
            .iter()
            .filter(|(_, node)| node.is_namespace())
            .map(|(name, _)| Some(name.clone()))
            .collect();
        namespaces.insert(None);
        namespaces
    }

    /// Entries of the namespace `name`, if it is one.
    pub fn namespace(&self, name: &str) -> Option<&BTreeMap<String, SchemaEntry>> {
        match self.nodes.get(name) {
            Some(SchemaNode::Namespace(entries)) => Some(entries),
            _ => None,
        }
    }

    /// Looks up an entry in the root (`None`) or in a named namespace.
    pub fn entry(&self, namespace: Option<&str>, key: &str) -> Option<&SchemaEntry> {
        match namespace {
            None => match self.nodes.get(key) {
                Some(SchemaNode::Entry(entry)) => Some(entry),
                _ => None,
            },
            Some(name) => self.namespace(name).and_then(|entries| entries.get(key)),
        }
    }

    /// Validates and merges one parsed schema document.
    ///
    /// `origin` names the document in error messages (usually its path).
    /// Entry-level problems are logged one by one and then reported together.
    pub fn apply_document(&mut self, origin: &str, document: Value) -> Result<(), SchemaError> {
        let mut mapping = match document {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            _ => {
                return Err(SchemaError::Invalid {
                    path: origin.to_string(),
                    errors: vec!["A schema document must be a mapping of entries.".to_string()],
                });
            }
        };

        let mut errors = Vec::new();

        // 1. Namespace selection. The key is consumed and never treated as an entry.
        let namespace = match mapping.remove(NAMESPACE_KEY) {
            None => None,
            Some(Value::String(name)) if name.contains(DELIMITER) => {
                errors.push(format!(
                    "Namespace {} is not a valid name. Namespaces must not contain dots.",
                    name
                ));
                None
            }
            Some(Value::String(name)) => Some(name),
            Some(other) => {
                errors.push(format!("Namespace must be a string, found {}.", other));
                None
            }
        };

        // 2. Entry validation.
        let mut entries = BTreeMap::new();
        for (key, value) in mapping {
            let display_key = match &namespace {
                Some(ns) => format!("{}{}{}", ns, DELIMITER, key),
                None => key.clone(),
            };
            if let Some(entry) = validate_entry(&key, &display_key, value, &mut errors) {
                entries.insert(key, entry);
            }
        }

        if !errors.is_empty() {
            for error in &errors {
                log::error!("{}", error);
            }
            return Err(SchemaError::Invalid {
                path: origin.to_string(),
                errors,
            });
        }

        // 3. Merge, refusing namespace/entry collisions in either direction.
        match namespace {
            Some(name) => {
                let node = self
                    .nodes
                    .entry(name.clone())
                    .or_insert_with(|| SchemaNode::Namespace(BTreeMap::new()));
                match node {
                    SchemaNode::Namespace(existing) => existing.extend(entries),
                    SchemaNode::Entry(_) => return Err(SchemaError::NamespaceIsEntry(name)),
                }
            }
            None => {
                if let Some(key) = entries
                    .keys()
                    .find(|key| self.nodes.get(*key).is_some_and(SchemaNode::is_namespace))
                {
                    return Err(SchemaError::EntryIsNamespace(key.clone()));
                }
                self.nodes.extend(
                    entries
                        .into_iter()
                        .map(|(key, entry)| (key, SchemaNode::Entry(entry))),
                );
            }
        }

        Ok(())
    }
}

/// Checks a single entry, pushing every problem found into `errors`.
fn validate_entry(
    key: &str,
    display_key: &str,
    value: Value,
    errors: &mut Vec<String>,
) -> Option<SchemaEntry> {
    let mut healthy = true;

    if key.contains(DELIMITER) {
        errors.push(format!(
            "{} is not a valid name for a configuration entry. Keys must not contain dots as this will interfere with processing in input substitution.",
            display_key
        ));
        healthy = false;
    }

    let Value::Object(mut details) = value else {
        errors.push(format!(
            "{} in schema must be a mapping with a description and an optional default.",
            display_key
        ));
        return None;
    };

    let description = match details.remove("description") {
        Some(Value::String(description)) => Some(description),
        Some(_) => {
            errors.push(format!("{} in schema has a description that is not a string.", display_key));
            None
        }
        None => {
            errors.push(format!(
                "{} in schema does not have description. Please add a description for this schema entry.",
                display_key
            ));
            None
        }
    };

    match description {
        Some(description) if healthy => Some(SchemaEntry {
            description,
            default: details.remove("default"),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn doc(yaml: &str) -> Value {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_root_and_namespaced_entries_are_merged() {
        let mut schema = Schema::new();
        schema
            .apply_document(
                "root.yaml",
                doc("test_groups:\n  description: Groups to run\n  default: [internal]\n"),
            )
            .unwrap();
        schema
            .apply_document(
                "cloudify.yaml",
                doc("namespace: cloudify\ndefault_version:\n  description: Version\n  default: '4.0'\n"),
            )
            .unwrap();

        assert_eq!(
            schema.entry(None, "test_groups").unwrap().default,
            Some(json!(["internal"]))
        );
        assert_eq!(
            schema.entry(Some("cloudify"), "default_version").unwrap().default,
            Some(json!("4.0"))
        );
        assert_eq!(
            schema.namespaces(),
            BTreeSet::from([None, Some("cloudify".to_string())])
        );
    }

    #[test]
    fn test_same_namespace_across_documents_extends_it() {
        let mut schema = Schema::new();
        schema
            .apply_document("a.yaml", doc("namespace: ssh\nuser:\n  description: User\n"))
            .unwrap();
        schema
            .apply_document("b.yaml", doc("namespace: ssh\nkey_path:\n  description: Key\n"))
            .unwrap();

        let ssh = schema.namespace("ssh").unwrap();
        assert_eq!(ssh.keys().collect::<Vec<_>>(), vec!["key_path", "user"]);
        assert_eq!(ssh.get("user").unwrap().default, None);
    }

    #[test]
    fn test_errors_in_one_document_are_batched() {
        let mut schema = Schema::new();
        let err = schema
            .apply_document(
                "bad.yaml",
                doc("no_description:\n  default: 1\n'dotted.key':\n  description: Nope\nscalar: 5\n"),
            )
            .unwrap_err();

        let SchemaError::Invalid { path, errors } = err else {
            panic!("expected an invalid schema error");
        };
        assert_eq!(path, "bad.yaml");
        assert_eq!(errors.len(), 3);
        assert!(schema.is_empty(), "a rejected document must not be merged");
    }

    #[test]
    fn test_namespace_cannot_shadow_an_entry() {
        let mut schema = Schema::new();
        schema
            .apply_document("a.yaml", doc("logging:\n  description: A plain entry\n"))
            .unwrap();
        let err = schema
            .apply_document("b.yaml", doc("namespace: logging\nlevel:\n  description: Level\n"))
            .unwrap_err();
        assert_eq!(err, SchemaError::NamespaceIsEntry("logging".to_string()));
    }

    #[test]
    fn test_entry_cannot_shadow_a_namespace() {
        let mut schema = Schema::new();
        schema
            .apply_document("a.yaml", doc("namespace: logging\nlevel:\n  description: Level\n"))
            .unwrap();
        let err = schema
            .apply_document("b.yaml", doc("logging:\n  description: A plain entry\n"))
            .unwrap_err();
        assert_eq!(err, SchemaError::EntryIsNamespace("logging".to_string()));
    }

    #[test]
    fn test_explicit_null_default_is_kept() {
        let mut schema = Schema::new();
        schema
            .apply_document("a.yaml", doc("proxy:\n  description: Proxy\n  default: null\n"))
            .unwrap();
        assert_eq!(schema.entry(None, "proxy").unwrap().default, Some(Value::Null));
    }

    #[test]
    fn test_non_mapping_document_is_rejected() {
        let mut schema = Schema::new();
        assert!(matches!(
            schema.apply_document("list.yaml", doc("- a\n- b\n")),
            Err(SchemaError::Invalid { .. })
        ));
        assert!(schema.apply_document("empty.yaml", Value::Null).is_ok());
    }
}
