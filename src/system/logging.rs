// src/system/logging.rs

use env_logger::{Builder, Env, Target};
use log::LevelFilter;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Failures while setting up logging.
#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("'{0}' is not a valid logging level.")]
    InvalidLevel(String),
    #[error("Could not open log file '{path}': {source}")]
    LogFile {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Console logging for the command line tool. `RUST_LOG` wins over `verbose`.
pub fn init_console(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let initialized = Builder::from_env(Env::default().default_filter_or(default_level))
        .format_target(false)
        .format_timestamp(None)
        .try_init();
    if initialized.is_err() {
        log::debug!("Logger already initialized; keeping the existing one.");
    }
}

/// Parses a level name such as `debug`, ignoring case and surrounding spaces.
pub fn parse_level(level: &str) -> Result<LevelFilter, LoggingError> {
    LevelFilter::from_str(level.trim()).map_err(|_| LoggingError::InvalidLevel(level.to_string()))
}

/// Installs the process logger writing to `<dir>/<file_name>`, optionally echoing
/// every record to stderr as well.
///
/// Returns `Ok(None)` if another logger is already installed; the first logger of
/// a process keeps receiving records.
pub fn init_run_log(
    dir: &Path,
    file_name: &str,
    level: LevelFilter,
    to_console: bool,
) -> Result<Option<PathBuf>, LoggingError> {
    let path = dir.join(file_name);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|source| LoggingError::LogFile {
            path: path.display().to_string(),
            source,
        })?;

    let installed = Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            let timestamp = buf.timestamp();
            writeln!(buf, "{}|{}|{}", timestamp, record.level(), record.args())
        })
        .target(Target::Pipe(Box::new(TeeWriter { file, to_console })))
        .try_init();

    match installed {
        Ok(()) => Ok(Some(path)),
        Err(_) => {
            log::debug!(
                "Logger already initialized; run log '{}' will not be used.",
                path.display()
            );
            Ok(None)
        }
    }
}

/// Writes every log line to the run log file and, when enabled, to stderr.
#[derive(Debug)]
struct TeeWriter {
    file: File,
    to_console: bool,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write_all(buf)?;
        if self.to_console {
            io::stderr().write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()?;
        if self.to_console {
            io::stderr().flush()?;
        }
        Ok(())
    }
}
