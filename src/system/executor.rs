// src/system/executor.rs

use crate::core::config_resolver::Config;
use crate::core::interpolator::{InterpolationError, Interpolator};
use crate::models::{ExecuteOptions, ExecutionOutcome, ExecutionResult};
use crate::system::env_cache::{EnvCache, EnvFileError};
use std::collections::BTreeMap;
use std::env;
use std::ffi::OsString;
use std::fmt;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command as StdCommand, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// How long the wait loop blocks on output before polling the child again.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Failures of a single `execute` call.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("No command specified to run.")]
    EmptyCommand,
    #[error(transparent)]
    Substitution(#[from] InterpolationError),
    #[error("Command '{command}' could not be executed: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Lost track of command '{command}': {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    EnvFile(#[from] EnvFileError),
    #[error("Cannot prepend '{entry}' to PATH: {reason}")]
    InvalidPathEntry { entry: String, reason: String },
    #[error("Retries exceeded for command {command} with final return code {code}.")]
    RetriesExceeded {
        command: String,
        code: i32,
        attempts: u32,
    },
}

/// Pause between retry attempts. Injected so tests can observe delays without waiting.
pub trait Sleeper: fmt::Debug {
    fn sleep(&self, duration: Duration);
}

/// Blocks the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

/// Runs commands for one test environment: substitutes config values, prepares the
/// environment, records it to disk, and retries failures.
#[derive(Debug)]
pub struct Executor {
    workdir: PathBuf,
    config: Config,
    generate_env_files: bool,
    env_cache: EnvCache,
    sleeper: Box<dyn Sleeper>,
}

impl Executor {
    /// An executor running commands in `workdir` and resolving placeholders against `config`.
    pub fn new(workdir: impl Into<PathBuf>, config: Config) -> Self {
        let workdir = workdir.into();
        Self {
            env_cache: EnvCache::new(&workdir),
            workdir,
            config,
            generate_env_files: true,
            sleeper: Box::new(ThreadSleeper),
        }
    }

    /// Turns writing environment files for each new environment on or off.
    pub fn with_env_files(mut self, generate_env_files: bool) -> Self {
        self.generate_env_files = generate_env_files;
        self
    }

    /// Replaces the sleeper used between retry attempts.
    pub fn with_sleeper(mut self, sleeper: Box<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// The configuration placeholders are resolved against.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Environment files written so far.
    pub fn env_cache(&self) -> &EnvCache {
        &self.env_cache
    }

    /// Executes `command` according to `options`.
    ///
    /// Returns `ExecutionOutcome::Faked` with the equivalent shell line when
    /// `options.fake` is set; nothing is spawned in that case.
    ///
    /// # Errors
    /// * `ExecutionError::Substitution` if a `{{path}}` token cannot be resolved.
    /// * `ExecutionError::Spawn` / `Io` if the process cannot be started or observed.
    ///   These are never retried.
    /// * `ExecutionError::RetriesExceeded` once every attempt returned an unexpected
    ///   code and `options.exception_on_failure` is set.
    pub fn execute<S: AsRef<str>>(
        &mut self,
        command: &[S],
        options: &ExecuteOptions,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        if command.is_empty() {
            return Err(ExecutionError::EmptyCommand);
        }

        // 1. Substitute config values.
        let command = Interpolator::new(&self.config).substitute_command(command)?;
        let display = command.join(" ");
        let cwd = options.cwd.clone().unwrap_or_else(|| self.workdir.clone());

        // 2. Build the environment.
        let environment = build_environment(env::vars_os(), options)?;

        // 3. Record it for troubleshooting.
        let env_file = if self.generate_env_files {
            Some(self.env_cache.resolve(&command, &environment)?)
        } else {
            None
        };

        // 4. Fake runs stop here.
        if options.fake {
            return Ok(ExecutionOutcome::Faked(fake_command_line(
                &cwd,
                env_file.as_deref(),
                &command,
            )));
        }

        // 5. Run, retrying unexpected return codes.
        let total_attempts = options.retries.saturating_add(1);
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match &env_file {
                Some(path) => log::info!(
                    "Running {} in {} with env vars from {}",
                    display,
                    cwd.display(),
                    path.display()
                ),
                None => log::info!("Running {} in {}", display, cwd.display()),
            }

            let (return_code, stdout, stderr) = run_once(&command, &cwd, &environment)
                .inspect_err(|e| log::error!("Command {} failed: {}", display, e))?;
            let succeeded = options.expected_return_codes.contains(&return_code);
            let result = ExecutionResult {
                return_code,
                stdout,
                stderr,
                attempts: attempt,
                succeeded,
            };

            if succeeded {
                return Ok(ExecutionOutcome::Completed(result));
            }

            if attempt >= total_attempts {
                if options.exception_on_failure {
                    return Err(ExecutionError::RetriesExceeded {
                        command: display,
                        code: return_code,
                        attempts: attempt,
                    });
                }
                log::warn!(
                    "Command {} failed with return code {} after {} attempts.",
                    display,
                    return_code,
                    attempt
                );
                return Ok(ExecutionOutcome::Completed(result));
            }

            log::warn!(
                "Command {} failed with return code {}, retrying.",
                display,
                return_code
            );
            self.sleeper.sleep(options.retry_delay);
        }
    }
}

/// Inherited variables, then overrides, then `path_prepends` in front of `PATH`.
fn build_environment(
    inherited: impl Iterator<Item = (OsString, OsString)>,
    options: &ExecuteOptions,
) -> Result<BTreeMap<String, String>, ExecutionError> {
    let mut environment: BTreeMap<String, String> = inherited
        .map(|(key, value)| {
            (
                key.to_string_lossy().into_owned(),
                value.to_string_lossy().into_owned(),
            )
        })
        .collect();
    environment.extend(
        options
            .env_var_overrides
            .iter()
            .map(|(key, value)| (key.clone(), value.clone())),
    );

    if !options.path_prepends.is_empty() {
        let mut entries: Vec<PathBuf> = options.path_prepends.clone();
        if let Some(existing) = environment.get("PATH").filter(|path| !path.is_empty()) {
            entries.extend(env::split_paths(existing));
        }
        let joined = env::join_paths(&entries).map_err(|e| ExecutionError::InvalidPathEntry {
            entry: options
                .path_prepends
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
            reason: e.to_string(),
        })?;
        environment.insert("PATH".to_string(), joined.to_string_lossy().into_owned());
    }

    Ok(environment)
}

/// `cd <cwd> && . "<env file>" && <command>`: what a human would type to do the same.
fn fake_command_line(cwd: &Path, env_file: Option<&Path>, command: &[String]) -> String {
    let joined = shlex::try_join(command.iter().map(String::as_str))
        .unwrap_or_else(|_| command.join(" "));
    match env_file {
        Some(env_file) => format!(
            "cd {} && . \"{}\" && {}",
            cwd.display(),
            env_file.display(),
            joined
        ),
        None => format!("cd {} && {}", cwd.display(), joined),
    }
}

/// Spawns the command once and collects its output while it runs.
fn run_once(
    command: &[String],
    cwd: &Path,
    environment: &BTreeMap<String, String>,
) -> Result<(i32, Vec<String>, Vec<String>), ExecutionError> {
    let display = command.join(" ");
    let Some((program, args)) = command.split_first() else {
        return Err(ExecutionError::EmptyCommand);
    };

    let mut child = StdCommand::new(program)
        .args(args)
        .current_dir(dunce::simplified(cwd))
        .env_clear()
        .envs(environment)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ExecutionError::Spawn {
            command: display.clone(),
            source,
        })?;

    let (tx, rx) = mpsc::channel();
    let mut readers = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(spawn_reader(stdout, Stream::Stdout, tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(spawn_reader(stderr, Stream::Stderr, tx.clone()));
    }
    drop(tx);

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();

    // Poll the child, forwarding output as it arrives.
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => match rx.recv_timeout(POLL_INTERVAL) {
                Ok((stream, line)) => record_line(stream, line, &mut stdout, &mut stderr),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    // Both pipes closed; only the exit status is left to collect.
                    break child.wait().map_err(|source| ExecutionError::Io {
                        command: display.clone(),
                        source,
                    })?;
                }
            },
            Err(source) => {
                return Err(ExecutionError::Io {
                    command: display,
                    source,
                });
            }
        }
    };

    drain(&rx, &mut stdout, &mut stderr);
    for reader in readers {
        if reader.join().is_err() {
            log::warn!("Output reader for '{}' panicked", display);
        }
    }
    drain(&rx, &mut stdout, &mut stderr);

    Ok((exit_code(status), stdout, stderr))
}

fn spawn_reader<R: Read + Send + 'static>(
    pipe: R,
    stream: Stream,
    tx: Sender<(Stream, String)>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut reader = BufReader::new(pipe);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf)
                        .trim_end_matches(['\n', '\r'])
                        .to_string();
                    if tx.send((stream, line)).is_err() {
                        break;
                    }
                }
            }
        }
    })
}

fn drain(rx: &Receiver<(Stream, String)>, stdout: &mut Vec<String>, stderr: &mut Vec<String>) {
    while let Ok((stream, line)) = rx.try_recv() {
        record_line(stream, line, stdout, stderr);
    }
}

fn record_line(stream: Stream, line: String, stdout: &mut Vec<String>, stderr: &mut Vec<String>) {
    match stream {
        Stream::Stdout => {
            log::info!("{}", line);
            stdout.push(line);
        }
        Stream::Stderr => {
            log::error!("{}", line);
            stderr.push(line);
        }
    }
}

/// A process killed by a signal has no exit code; report `-1`.
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

/// Runs a command with the terminal attached, returning its exit code.
/// Used for top-level tooling such as `tox` where output belongs to the user.
pub fn run_inherited<S: AsRef<str>>(command: &[S], cwd: &Path) -> Result<i32, ExecutionError> {
    let command: Vec<&str> = command.iter().map(|token| token.as_ref()).collect();
    let Some((program, args)) = command.split_first() else {
        return Err(ExecutionError::EmptyCommand);
    };

    let status = StdCommand::new(program)
        .args(args)
        .current_dir(dunce::simplified(cwd))
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .map_err(|source| ExecutionError::Spawn {
            command: command.join(" "),
            source,
        })?;
    Ok(exit_code(status))
}
