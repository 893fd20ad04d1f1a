//! Schema-validated, namespaced configuration and a retrying command executor
//! for driving plugin system tests.

/// Command line surface.
pub mod cli;
/// Names and values shared across modules.
pub mod constants;
/// Configuration engine, templates and test environments.
pub mod core;
/// Plain data types passed between modules.
pub mod models;
/// Process execution and logging.
pub mod system;
