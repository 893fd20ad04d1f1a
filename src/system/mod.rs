//! # System Interaction Layer
//!
//! Everything that touches the operating system directly: spawning processes,
//! recording their environments, and routing log output.
//!
//! ## Modules
//!
//! - **`executor`**: runs commands with config substitution, a prepared environment,
//!   retries, and a dry-run mode that reports the equivalent shell line.
//! - **`env_cache`**: writes each distinct command environment to a dotfile in the
//!   work directory so failing commands can be replayed by hand.
//! - **`logging`**: console logging for the CLI and the per-run log file.

/// On-disk environment files.
pub mod env_cache;
/// The command executor.
pub mod executor;
/// Console and run-log setup.
pub mod logging;
