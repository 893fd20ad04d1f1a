// src/core/schema_display.rs

use crate::constants::{DELIMITER, MAGIC_NAMESPACE};
use crate::core::schema::Schema;
use crate::models::{SchemaEntry, SchemaNode};
use std::collections::BTreeMap;

/// Renders the schema for humans: root entries first, then each namespace with
/// its entries indented below it.
pub fn describe_schema(schema: &Schema) -> Vec<String> {
    let mut lines = Vec::new();

    for (key, node) in schema.iter() {
        if let SchemaNode::Entry(entry) = node {
            lines.push(describe_entry("", key, entry));
        }
    }
    for (name, node) in schema.iter() {
        if let SchemaNode::Namespace(entries) = node {
            lines.push(format!("{}:", name));
            lines.extend(
                entries
                    .iter()
                    .map(|(key, entry)| describe_entry("  ", key, entry)),
            );
        }
    }
    lines
}

/// Produces a sample config file: one dotted key per line, prefilled with the
/// default where one exists. Magic entries are left out since config cannot set them.
pub fn generate_sample_config(schema: &Schema) -> Vec<String> {
    let mut lines = Vec::new();

    for (key, node) in schema.iter() {
        match node {
            SchemaNode::Entry(entry) => lines.push(sample_line(key, entry)),
            SchemaNode::Namespace(_) => {}
        }
    }
    for (name, node) in schema.iter() {
        if name == MAGIC_NAMESPACE {
            continue;
        }
        if let SchemaNode::Namespace(entries) = node {
            lines.extend(sample_namespace(name, entries));
        }
    }
    lines
}

fn describe_entry(indent: &str, key: &str, entry: &SchemaEntry) -> String {
    match &entry.default {
        Some(default) => format!(
            "{}{}: {} (Default: {})",
            indent, key, entry.description, default
        ),
        None => format!("{}{}: {}", indent, key, entry.description),
    }
}

fn sample_namespace(name: &str, entries: &BTreeMap<String, SchemaEntry>) -> Vec<String> {
    entries
        .iter()
        .map(|(key, entry)| sample_line(&format!("{}{}{}", name, DELIMITER, key), entry))
        .collect()
}

fn sample_line(key: &str, entry: &SchemaEntry) -> String {
    match &entry.default {
        // JSON is valid YAML and avoids the document markers a YAML dump would add.
        Some(default) => format!("{}: {}", key, default),
        None => format!("{}: ", key),
    }
}
