// src/core/environment.rs

//! # Test Environment
//!
//! One `TestEnvironment` backs one test module: it owns a temporary working
//! directory, the executor that runs commands inside it, and the stack of cleanups
//! the test registered along the way. At teardown the cleanups run last-in
//! first-out so dependent resources are removed before the things they depend on.

use crate::constants::{CLEANUP_INTENT_FILENAME, RUN_LOG_FILENAME};
use crate::core::{config_loader, paths};
use crate::core::config_resolver::{Config, KeyNotFoundError};
use crate::models::{Cleanup, ExecuteOptions, ExecutionOutcome};
use crate::system::executor::{ExecutionError, Executor};
use crate::system::logging::{self, LoggingError};
use serde_json::Value;
use std::env;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failures while starting or tearing down a test environment.
#[derive(Error, Debug)]
pub enum EnvironmentError {
    #[error("Could not create a working directory: {0}")]
    Workdir(#[source] std::io::Error),
    #[error(
        "An attempt was made to delete something not in a temp directory. Target was: {0}"
    )]
    DangerousPath(String),
    #[error("Could not record cleanup intent in '{path}': {source}")]
    IntentLog {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Config entry {key} must be {expected}.")]
    InvalidSetting { key: String, expected: &'static str },
    #[error("{failed} of {total} cleanups failed.")]
    CleanupsFailed { failed: usize, total: usize },
    #[error(transparent)]
    Config(#[from] KeyNotFoundError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    #[error(transparent)]
    Logging(#[from] LoggingError),
}

/// Work directory, executor and registered cleanups of one test.
#[derive(Debug)]
pub struct TestEnvironment {
    executor: Executor,
    cleanups: Vec<Cleanup>,
}

impl TestEnvironment {
    /// Creates a fresh working directory under the system temp directory, records
    /// it as `magic.workdir`, and starts the run log there according to `logging.*`.
    pub fn start(mut config: Config, workdir_prefix: &str) -> Result<Self, EnvironmentError> {
        let workdir = create_workdir(workdir_prefix)?;
        config_loader::set_workdir(&mut config, &workdir);

        let level = logging::parse_level(&config_string(&config, "logging.level")?)?;
        let to_console = config_bool(&config, "logging.to_console")?;
        logging::init_run_log(&workdir, RUN_LOG_FILENAME, level, to_console)?;
        log::info!("Test environment started in {}", workdir.display());

        Ok(Self::with_executor(Executor::new(workdir, config)))
    }

    /// Like [`TestEnvironment::start`], naming the workdir after `test_name`.
    pub fn for_test(config: Config, test_name: &str) -> Result<Self, EnvironmentError> {
        Self::start(config, &paths::generate_workdir_prefix(test_name))
    }

    /// Wraps an executor whose working directory already exists.
    pub fn with_executor(executor: Executor) -> Self {
        Self {
            executor,
            cleanups: Vec::new(),
        }
    }

    /// The temporary working directory of this test.
    pub fn workdir(&self) -> &Path {
        self.executor.workdir()
    }

    pub fn config(&self) -> &Config {
        self.executor.config()
    }

    pub fn cleanups(&self) -> &[Cleanup] {
        &self.cleanups
    }

    /// Runs a command in the working directory.
    pub fn execute<S: AsRef<str>>(
        &mut self,
        command: &[S],
        options: &ExecuteOptions,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        self.executor.execute(command, options)
    }

    /// Registers a command to run at teardown. Later cleanups run first.
    pub fn add_cleanup(&mut self, cleanup: Cleanup) {
        self.cleanups.push(cleanup);
    }

    /// Removes the most recently added cleanup equal to `cleanup`. Returns whether
    /// one was found.
    pub fn remove_cleanup(&mut self, cleanup: &Cleanup) -> bool {
        match self.cleanups.iter().rposition(|registered| registered == cleanup) {
            Some(index) => {
                self.cleanups.remove(index);
                true
            }
            None => false,
        }
    }

    /// Runs (or, when `run_cleanup` is false, records) every cleanup in reverse
    /// order, then removes the working directory if asked to.
    ///
    /// Every cleanup is attempted even if an earlier one fails; failures are
    /// reported together once the workdir has been dealt with.
    pub fn teardown(&mut self, run_cleanup: bool, remove_workdir: bool) -> Result<(), EnvironmentError> {
        let total = self.cleanups.len();
        let mut failed = 0;
        let intent_path = self.workdir().join(CLEANUP_INTENT_FILENAME);

        // 1. Cleanups, last registered first.
        while let Some(cleanup) = self.cleanups.pop() {
            let options = ExecuteOptions {
                fake: !run_cleanup,
                ..cleanup.options.clone()
            };
            match self.executor.execute(cleanup.command.as_slice(), &options) {
                Ok(ExecutionOutcome::Faked(line)) => append_intent(&intent_path, &line)?,
                Ok(ExecutionOutcome::Completed(_)) => {}
                Err(e) => {
                    log::error!("Cleanup '{}' failed: {}", cleanup.command.join(" "), e);
                    failed += 1;
                }
            }
        }

        // 2. The workdir itself.
        let workdir = self.workdir().to_path_buf();
        ensure_in_temp_dir(&workdir)?;
        let options = ExecuteOptions {
            cwd: Some(env::temp_dir()),
            fake: !remove_workdir,
            ..ExecuteOptions::default()
        };
        let workdir_arg = workdir.display().to_string();
        if let ExecutionOutcome::Faked(line) =
            self.executor.execute(&["rm", "-rf", workdir_arg.as_str()], &options)?
        {
            log::info!("Workdir remains in {} (would run: {})", workdir.display(), line);
        }

        if failed > 0 {
            return Err(EnvironmentError::CleanupsFailed { failed, total });
        }
        Ok(())
    }

    /// Tears down according to the `cleanup.*` settings for a run with `failures`
    /// failed tests.
    pub fn finish(mut self, failures: usize) -> Result<(), EnvironmentError> {
        log::info!("Executing cleanup modules");
        let (run_key, remove_key) = if failures > 0 {
            ("cleanup.on_failure", "cleanup.remove_workdir_on_failure")
        } else {
            ("cleanup.on_success", "cleanup.remove_workdir_on_success")
        };
        let run_cleanup = config_bool(self.config(), run_key)?;
        let remove_workdir = config_bool(self.config(), remove_key)?;
        self.teardown(run_cleanup, remove_workdir)
    }
}

fn create_workdir(prefix: &str) -> Result<PathBuf, EnvironmentError> {
    let dir = tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .map_err(EnvironmentError::Workdir)?;
    Ok(dir.keep())
}

/// Refuses to delete anything outside the system temp directory.
fn ensure_in_temp_dir(path: &Path) -> Result<(), EnvironmentError> {
    let temp = env::temp_dir();
    let temp = dunce::canonicalize(&temp).unwrap_or(temp);
    let target = dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    if target.starts_with(&temp) && target != temp {
        Ok(())
    } else {
        Err(EnvironmentError::DangerousPath(path.display().to_string()))
    }
}

fn append_intent(path: &Path, line: &str) -> Result<(), EnvironmentError> {
    let to_error = |source: std::io::Error| EnvironmentError::IntentLog {
        path: path.display().to_string(),
        source,
    };
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(to_error)?;
    writeln!(file, "{}", line).map_err(to_error)
}

fn config_bool(config: &Config, key: &str) -> Result<bool, EnvironmentError> {
    match config.lookup(key)? {
        Value::Bool(value) => Ok(value),
        _ => Err(EnvironmentError::InvalidSetting {
            key: key.to_string(),
            expected: "true or false",
        }),
    }
}

fn config_string(config: &Config, key: &str) -> Result<String, EnvironmentError> {
    match config.lookup(key)? {
        Value::String(value) => Ok(value),
        _ => Err(EnvironmentError::InvalidSetting {
            key: key.to_string(),
            expected: "a string",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn config() -> Config {
        config_loader::load_config_with_defaults(None, None).unwrap()
    }

    fn environment(config: Config) -> TestEnvironment {
        let workdir = create_workdir("cloudify_tester_unit_").unwrap();
        TestEnvironment::with_executor(Executor::new(workdir, config))
    }

    #[test]
    fn test_for_test_names_workdir_after_the_test() {
        let env = TestEnvironment::for_test(config(), "deploy hello world").unwrap();
        let name = env.workdir().file_name().unwrap().to_string_lossy().to_string();
        let workdir = env.workdir().to_path_buf();

        assert!(name.starts_with("cloudify_tester_deploy_hel_"), "got {}", name);
        assert_eq!(env.config().lookup("magic.workdir").unwrap(), Value::String(workdir.display().to_string()));
        fs::remove_dir_all(workdir).unwrap();
    }

    #[test]
    fn test_cleanups_are_removed_by_value() {
        let mut env = environment(config());
        let first = Cleanup::new(["echo", "first"]);
        let second = Cleanup::new(["echo", "second"]);
        env.add_cleanup(first.clone());
        env.add_cleanup(second.clone());

        assert!(env.remove_cleanup(&first));
        assert!(!env.remove_cleanup(&first));
        assert_eq!(env.cleanups(), &[second]);

        env.teardown(false, true).unwrap();
    }

    #[test]
    fn test_faked_teardown_records_intent_in_reverse_order() {
        // --- Setup ---
        let mut env = environment(config());
        env.add_cleanup(Cleanup::new(["cfy", "blueprints", "delete", "bp"]));
        env.add_cleanup(Cleanup::new(["cfy", "deployments", "delete", "dep"]));
        let workdir = env.workdir().to_path_buf();

        // --- Execute ---
        env.teardown(false, false).unwrap();

        // --- Assert ---
        let intent = fs::read_to_string(workdir.join(CLEANUP_INTENT_FILENAME)).unwrap();
        let lines: Vec<&str> = intent.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("cfy deployments delete dep"));
        assert!(lines[1].ends_with("cfy blueprints delete bp"));
        assert!(workdir.exists(), "workdir must be kept when removal is disabled");
        fs::remove_dir_all(workdir).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_teardown_runs_cleanups_and_removes_workdir() {
        let mut env = environment(config());
        let marker = env.workdir().join("marker");
        env.add_cleanup(Cleanup::new(["touch", marker.to_str().unwrap()]));
        let workdir = env.workdir().to_path_buf();

        env.teardown(true, true).unwrap();

        assert!(!workdir.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_cleanup_does_not_stop_the_rest() {
        let mut env = environment(config());
        let marker = env.workdir().join("marker");
        env.add_cleanup(Cleanup::new(["touch", marker.to_str().unwrap()]));
        let mut failing = Cleanup::new(["false"]);
        failing.options.retries = 0;
        env.add_cleanup(failing);

        let err = env.teardown(true, false).unwrap_err();

        assert!(matches!(err, EnvironmentError::CleanupsFailed { failed: 1, total: 2 }));
        assert!(marker.exists());
        fs::remove_dir_all(env.workdir()).unwrap();
    }

    #[test]
    fn test_workdir_outside_temp_is_refused() {
        let mut env = TestEnvironment::with_executor(
            Executor::new("/definitely/not/temp", config()).with_env_files(false),
        );
        let err = env.teardown(false, true).unwrap_err();
        assert!(matches!(err, EnvironmentError::DangerousPath(_)));
    }

    #[test]
    fn test_finish_keeps_workdir_on_failure_by_default() {
        let env = environment(config());
        let workdir = env.workdir().to_path_buf();

        env.finish(1).unwrap();

        assert!(workdir.exists());
        fs::remove_dir_all(workdir).unwrap();
    }

    #[test]
    fn test_finish_honours_cleanup_settings() {
        let mut config = config();
        config
            .update_config_str("c.yaml", "cleanup.on_success: false\n")
            .unwrap();
        let mut env = environment(config);
        env.add_cleanup(Cleanup::new(["cfy", "uninstall"]));
        let workdir = env.workdir().to_path_buf();

        env.finish(0).unwrap();

        // Cleanups were only recorded, then the workdir was removed as configured.
        assert!(!workdir.exists());
    }

    #[test]
    fn test_start_creates_workdir_and_sets_magic() {
        let env = TestEnvironment::start(config(), "cloudify_tester_start_").unwrap();
        let workdir = env.workdir().to_path_buf();

        assert!(workdir.is_dir());
        assert_eq!(
            env.config().lookup("magic.workdir").unwrap(),
            Value::String(workdir.display().to_string())
        );
        env.finish(0).unwrap();
        assert!(!workdir.exists());
    }
}
