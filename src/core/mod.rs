// src/core/mod.rs

/// Bundled and repository schema loading.
pub mod config_loader;
/// The `Config` aggregate.
pub mod config_resolver;
/// Dotted-key tree for raw config.
pub mod config_tree;
/// Per-test working directory and cleanups.
pub mod environment;
/// Placeholder substitution and template rendering.
pub mod interpolator;
/// Repository, schema and template locations.
pub mod paths;
/// Schema validation and merging.
pub mod schema;
/// Human readable schema listings.
pub mod schema_display;
