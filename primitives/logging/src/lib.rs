#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::unwrap_used)]

//! Logging setup for lnbridge processes.
//!
//! Library crates only emit `tracing` events; a process that embeds them
//! calls [`init`] once to install a `tracing-subscriber` formatter built from
//! its [`LoggingConfig`]. `RUST_LOG`, when set, takes precedence over the
//! configured level.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use config::LoggingConfig;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Errors raised while installing the global subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The level or filter directive could not be parsed
    #[error("Invalid log filter \"{directive}\": {reason}")]
    Filter {
        /// The rejected directive
        directive: String,
        /// Parser message
        reason: String,
    },
    /// The log file could not be opened for appending
    #[error("Failed to open log file {path}: {source}")]
    File {
        /// Log file path
        path: PathBuf,
        /// Underlying I/O failure
        source: std::io::Error,
    },
    /// A global subscriber is already installed
    #[error("Failed to install subscriber: {0}")]
    Install(String),
}

/// Builds the event filter: `RUST_LOG` if set and valid, else `config.level`.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level).map_err(|e| LoggingError::Filter {
        directive: config.level.clone(),
        reason: e.to_string(),
    })
}

/// Installs the global `tracing` subscriber described by `config`.
pub fn init(config: &LoggingConfig) -> Result<(), LoggingError> {
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter(config)?).with_target(true);

    let installed = match (&config.file, config.json) {
        (Some(path), json) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| LoggingError::File { path: path.clone(), source })?;
            if json {
                builder.json().with_writer(Mutex::new(file)).try_init()
            } else {
                builder.with_ansi(false).with_writer(Mutex::new(file)).try_init()
            }
        }
        (None, true) => builder.json().with_writer(std::io::stderr).try_init(),
        (None, false) => builder.with_writer(std::io::stderr).try_init(),
    };

    installed.map_err(|e| LoggingError::Install(e.to_string()))?;
    tracing::debug!(level = %config.level, json = config.json, "logging initialized");
    Ok(())
}
