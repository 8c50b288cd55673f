#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::unwrap_used)]

//! lnbridge Configuration
//!
//! This crate provides configuration management for lnbridge.
//! It handles loading, saving, and validating configuration files that specify:
//! - Which Lightning backend to drive (Core Lightning or LND) and how to reach it
//! - Credential material for the REST backend (certificate, macaroon)
//! - Logging configuration
//!
//! Configuration is stored in TOML format. Every backend declares its default
//! options as serde defaults and its required options as a static list,
//! checked once by [`BackendConfig::validate`] before a backend is built.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use transport::BackendError;

pub mod backend;
pub mod credentials;

pub use backend::{BackendConfig, CmdOptions, CoreLightningOptions, LndOptions, RestProtocol};
pub use credentials::CredentialSource;

/// Errors that can occur when loading, saving, or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    /// Failed to parse the TOML configuration file
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    /// Failed to serialize configuration to TOML format
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    /// Could not locate the user's configuration directory
    #[error("Could not find user config directory")]
    ConfigDirUnavailable,
    /// A required backend option was not provided
    #[error("Missing required option (\"{option}\") for {backend} backend")]
    MissingOption {
        /// Backend name, e.g. `lnd`
        backend: &'static str,
        /// Option name
        option: &'static str,
    },
    /// A backend option was provided with an unusable value
    #[error("Invalid option (\"{option}\"): {reason}")]
    InvalidOption {
        /// Option name
        option: &'static str,
        /// What is wrong with it
        reason: String,
    },
    /// Credential material could not be loaded
    #[error("Failed to load credential (\"{option}\") from {path}: {source}")]
    Credential {
        /// Option name, `cert` or `macaroon`
        option: &'static str,
        /// Path that was read
        path: PathBuf,
        /// Underlying I/O failure
        source: std::io::Error,
    },
}

impl From<ConfigError> for BackendError {
    fn from(err: ConfigError) -> Self { BackendError::Configuration(err.to_string()) }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Backend connection settings
    pub backend: BackendConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive (e.g. `info`, `ipc=debug,warn`)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
    /// Log file path (optional, stderr when absent)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String { "info".to_string() }

impl Default for LoggingConfig {
    fn default() -> Self { Self { level: default_log_level(), json: false, file: None } }
}

impl Config {
    /// Load configuration from a TOML file at `path`
    ///
    /// The backend section is validated against its required options.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.backend.validate()?;
        Ok(config)
    }

    /// Save this configuration as a pretty-printed TOML file at `path`
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Returns the default config file path:
    /// `{config_dir()}/lnbridge/config.toml`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let config_dir =
            dirs::config_dir().ok_or(ConfigError::ConfigDirUnavailable)?.join("lnbridge");
        Ok(config_dir.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_from_file() {
        let temp_file = NamedTempFile::new().expect("Failed to create temporary file");
        let toml_content = r#"
            [backend]
            kind = "core_lightning"
            node_uri = "02abc@127.0.0.1:9735"
            socket = "/tmp/lightning-rpc"

            [logging]
            level = "debug"
        "#;
        fs::write(&temp_file, toml_content)
            .expect("Failed to write TOML content to temporary file");

        let loaded =
            Config::from_file(&temp_file).expect("Failed to load config from temporary file");
        match &loaded.backend {
            BackendConfig::CoreLightning(options) => {
                assert_eq!(options.node_uri.as_deref(), Some("02abc@127.0.0.1:9735"));
                assert_eq!(options.socket.as_deref(), Some("/tmp/lightning-rpc"));
                assert_eq!(options.cmd.concurrency, 7);
                assert_eq!(options.cmd.prefix, "clightning");
                assert_eq!(options.delimiter, "\n");
            }
            other => panic!("Expected core_lightning backend, got {:?}", other),
        }
        assert_eq!(loaded.logging.level, "debug");
        assert!(!loaded.logging.json);

        // Test file not found error
        let result = Config::from_file("nonexistent_file.toml");
        match result.expect_err("Expected error for nonexistent file") {
            ConfigError::FileRead(_) => {}
            other => panic!("Expected FileRead error, got {:?}", other),
        }

        // Test parse error
        let temp_file =
            NamedTempFile::new().expect("Failed to create temporary file for parse error test");
        fs::write(&temp_file, "invalid toml content")
            .expect("Failed to write invalid TOML content");
        match Config::from_file(&temp_file).expect_err("Expected parse error for invalid TOML") {
            ConfigError::Parse(_) => {}
            other => panic!("Expected Parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_from_toml_rejects_missing_required_option() {
        let toml_content = r#"
            [backend]
            kind = "lnd"
            cert = "/tmp/tls.cert"
        "#;
        match Config::from_toml(toml_content).expect_err("macaroon is required") {
            ConfigError::MissingOption { backend, option } => {
                assert_eq!(backend, "lnd");
                assert_eq!(option, "macaroon");
            }
            other => panic!("Expected MissingOption error, got {:?}", other),
        }
    }

    #[test]
    fn test_save_round_trip() {
        let config = Config {
            backend: BackendConfig::Lnd(LndOptions {
                cert: Some(CredentialSource::Path(PathBuf::from("/tmp/tls.cert"))),
                macaroon: Some(CredentialSource::Inline { data: "0201abcd".to_string() }),
                ..LndOptions::default()
            }),
            logging: LoggingConfig::default(),
        };
        let temp_file =
            NamedTempFile::new().expect("Failed to create temporary file for save test");
        config.save(&temp_file).expect("save");

        let contents = fs::read_to_string(&temp_file).expect("Failed to read saved config file");
        assert!(contents.contains("kind = \"lnd\""));
        assert!(contents.contains("127.0.0.1:8080"));

        let loaded = Config::from_file(&temp_file).expect("reload");
        match loaded.backend {
            BackendConfig::Lnd(options) => {
                assert_eq!(options.hostname, "127.0.0.1:8080");
                assert_eq!(options.protocol, RestProtocol::Https);
                assert_eq!(
                    options.macaroon,
                    Some(CredentialSource::Inline { data: "0201abcd".to_string() })
                );
            }
            other => panic!("Expected lnd backend, got {:?}", other),
        }

        // Saving into a directory that does not exist fails with an I/O error
        let temp_dir = tempfile::tempdir().expect("Failed to create temporary directory");
        let missing = temp_dir.path().join("nonexistent").join("config.toml");
        match config.save(&missing).expect_err("Expected file write error") {
            ConfigError::FileRead(_) => (),
            other => panic!("Expected FileRead error, got {:?}", other),
        }
    }

    #[test]
    fn test_default_path() {
        let path = Config::default_path().expect("Failed to get default config path");
        let path_str = path.to_str().expect("Path should be valid UTF-8");
        assert!(path_str.contains("lnbridge"));
        assert!(path_str.ends_with("config.toml"));
    }

    #[test]
    fn test_config_error_into_backend_error() {
        let err: BackendError =
            ConfigError::MissingOption { backend: "core_lightning", option: "socket" }.into();
        match err {
            BackendError::Configuration(msg) => assert!(msg.contains("socket")),
            other => panic!("Expected Configuration error, got {:?}", other),
        }
    }
}
