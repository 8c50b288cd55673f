//! Backend option schemas.
//!
//! Defaults live in serde `default` attributes and `Default` impls; required
//! options are listed in each backend's `REQUIRED_OPTIONS` and checked by
//! `validate`. Nothing is checked lazily at call time.

use serde::{Deserialize, Serialize};
use types::Implementation;

use crate::credentials::CredentialSource;
use crate::ConfigError;

/// Settings for one configured Lightning backend, tagged by `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Core Lightning over its JSON-RPC socket
    CoreLightning(CoreLightningOptions),
    /// LND over its REST interface
    Lnd(LndOptions),
}

impl BackendConfig {
    /// The implementation this configuration targets.
    pub fn implementation(&self) -> Implementation {
        match self {
            BackendConfig::CoreLightning(_) => Implementation::CoreLightning,
            BackendConfig::Lnd(_) => Implementation::Lnd,
        }
    }

    /// Checks required options and value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            BackendConfig::CoreLightning(options) => options.validate(),
            BackendConfig::Lnd(options) => options.validate(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn require(
    backend: &'static str,
    option: &'static str,
    value: Option<&str>,
) -> Result<(), ConfigError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(()),
        _ => Err(ConfigError::MissingOption { backend, option }),
    }
}

/// Command queue settings for the socket backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CmdOptions {
    /// Maximum number of requests admitted to the socket writer at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Prefix for generated request identifiers
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

fn default_concurrency() -> usize { 7 }
fn default_prefix() -> String { "clightning".to_string() }
fn default_delimiter() -> String { "\n".to_string() }
fn default_max_frame_len() -> usize { 16 * 1024 * 1024 }

impl Default for CmdOptions {
    fn default() -> Self { Self { concurrency: default_concurrency(), prefix: default_prefix() } }
}

/// Core Lightning backend options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreLightningOptions {
    /// `pubkey@host:port` URI reported as this node's identity
    #[serde(default)]
    pub node_uri: Option<String>,
    /// UNIX socket path of `lightning-rpc`, or `tcp://host:port`
    #[serde(default)]
    pub socket: Option<String>,
    /// Command queue settings
    #[serde(default)]
    pub cmd: CmdOptions,
    /// Message framing delimiter
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    /// Upper bound on calls awaiting a reply; unbounded when absent
    #[serde(default)]
    pub max_pending: Option<usize>,
    /// Largest inbound frame accepted before it is discarded
    #[serde(default = "default_max_frame_len")]
    pub max_frame_len: usize,
}

impl Default for CoreLightningOptions {
    fn default() -> Self {
        Self {
            node_uri: None,
            socket: None,
            cmd: CmdOptions::default(),
            delimiter: default_delimiter(),
            max_pending: None,
            max_frame_len: default_max_frame_len(),
        }
    }
}

impl CoreLightningOptions {
    /// Options that must be provided.
    pub const REQUIRED_OPTIONS: &'static [&'static str] = &["node_uri", "socket"];

    /// Create options from environment variables
    ///
    /// Reads `CLN_NODE_URI`, `CLN_RPC_SOCKET`, `CLN_RPC_CONCURRENCY` and
    /// `CLN_RPC_PREFIX`; everything else keeps its default.
    pub fn from_env() -> Self {
        let mut options = Self::default();
        options.node_uri = std::env::var("CLN_NODE_URI").ok();
        options.socket = std::env::var("CLN_RPC_SOCKET").ok();
        options.cmd.concurrency = parse_env("CLN_RPC_CONCURRENCY", options.cmd.concurrency);
        options.cmd.prefix = parse_env("CLN_RPC_PREFIX", options.cmd.prefix);
        options
    }

    /// Checks required options and value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require("core_lightning", "node_uri", self.node_uri.as_deref())?;
        require("core_lightning", "socket", self.socket.as_deref())?;
        if self.cmd.concurrency == 0 {
            return Err(ConfigError::InvalidOption {
                option: "cmd.concurrency",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.delimiter.is_empty() {
            return Err(ConfigError::InvalidOption {
                option: "delimiter",
                reason: "must not be empty".to_string(),
            });
        }
        if self.max_frame_len == 0 {
            return Err(ConfigError::InvalidOption {
                option: "max_frame_len",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_pending == Some(0) {
            return Err(ConfigError::InvalidOption {
                option: "max_pending",
                reason: "must be at least 1 when set".to_string(),
            });
        }
        Ok(())
    }
}

/// URL scheme used to reach the REST backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RestProtocol {
    /// TLS, verified against the configured certificate
    #[default]
    Https,
    /// Plain HTTP, for local test doubles only
    Http,
}

impl RestProtocol {
    /// URL scheme string.
    pub fn as_str(&self) -> &'static str {
        match self {
            RestProtocol::Https => "https",
            RestProtocol::Http => "http",
        }
    }
}

impl std::str::FromStr for RestProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "https" => Ok(RestProtocol::Https),
            "http" => Ok(RestProtocol::Http),
            _ => Err(format!("Unknown protocol: {}", s)),
        }
    }
}

/// LND backend options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LndOptions {
    /// `host:port` of the REST listener
    #[serde(default = "default_hostname")]
    pub hostname: String,
    /// TLS certificate (PEM) trusted for the REST listener
    #[serde(default)]
    pub cert: Option<CredentialSource>,
    /// Macaroon sent in the `Grpc-Metadata-macaroon` header
    #[serde(default)]
    pub macaroon: Option<CredentialSource>,
    /// URL scheme
    #[serde(default)]
    pub protocol: RestProtocol,
}

fn default_hostname() -> String { "127.0.0.1:8080".to_string() }

impl Default for LndOptions {
    fn default() -> Self {
        Self { hostname: default_hostname(), cert: None, macaroon: None, protocol: RestProtocol::Https }
    }
}

impl LndOptions {
    /// Options that must be provided. `cert` may be omitted over plain HTTP.
    pub const REQUIRED_OPTIONS: &'static [&'static str] = &["hostname", "cert", "macaroon"];

    /// Create options from environment variables
    ///
    /// Reads `LND_REST_HOST`, `LND_CERT_PATH`, `LND_MACAROON_PATH` and
    /// `LND_REST_PROTOCOL`.
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let Ok(host) = std::env::var("LND_REST_HOST") {
            options.hostname = host;
        }
        options.cert = std::env::var("LND_CERT_PATH").ok().map(|p| CredentialSource::Path(p.into()));
        options.macaroon =
            std::env::var("LND_MACAROON_PATH").ok().map(|p| CredentialSource::Path(p.into()));
        options.protocol = parse_env("LND_REST_PROTOCOL", options.protocol);
        options
    }

    /// Checks required options.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require("lnd", "hostname", Some(self.hostname.as_str()))?;
        if self.protocol == RestProtocol::Https && self.cert.is_none() {
            return Err(ConfigError::MissingOption { backend: "lnd", option: "cert" });
        }
        if let Some(cert) = &self.cert {
            cert.check("cert")?;
        }
        match &self.macaroon {
            Some(macaroon) => macaroon.check("macaroon"),
            None => Err(ConfigError::MissingOption { backend: "lnd", option: "macaroon" }),
        }
    }

    /// Base URL built from protocol and hostname, without a trailing slash.
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.protocol.as_str(), self.hostname.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    fn cln() -> CoreLightningOptions {
        CoreLightningOptions {
            node_uri: Some("02abc@127.0.0.1:9735".to_string()),
            socket: Some("/tmp/lightning-rpc".to_string()),
            ..CoreLightningOptions::default()
        }
    }

    #[test]
    fn test_core_lightning_defaults() {
        let options = CoreLightningOptions::default();
        assert_eq!(options.cmd.concurrency, 7);
        assert_eq!(options.cmd.prefix, "clightning");
        assert_eq!(options.delimiter, "\n");
        assert_eq!(options.max_pending, None);
        assert_eq!(CoreLightningOptions::REQUIRED_OPTIONS, &["node_uri", "socket"]);
    }

    #[test]
    fn test_core_lightning_validate() {
        assert!(cln().validate().is_ok());

        let missing = CoreLightningOptions { socket: None, ..cln() };
        match missing.validate().expect_err("socket is required") {
            ConfigError::MissingOption { option, .. } => assert_eq!(option, "socket"),
            other => panic!("Expected MissingOption, got {:?}", other),
        }

        let blank = CoreLightningOptions { node_uri: Some("  ".to_string()), ..cln() };
        assert!(matches!(
            blank.validate(),
            Err(ConfigError::MissingOption { option: "node_uri", .. })
        ));

        let mut zero = cln();
        zero.cmd.concurrency = 0;
        assert!(matches!(
            zero.validate(),
            Err(ConfigError::InvalidOption { option: "cmd.concurrency", .. })
        ));

        let no_delimiter = CoreLightningOptions { delimiter: String::new(), ..cln() };
        assert!(matches!(
            no_delimiter.validate(),
            Err(ConfigError::InvalidOption { option: "delimiter", .. })
        ));
    }

    #[test]
    fn test_lnd_validate() {
        let options = LndOptions {
            cert: Some(CredentialSource::Inline { data: "-----BEGIN CERTIFICATE-----".into() }),
            macaroon: Some(CredentialSource::Inline { data: "0201".into() }),
            ..LndOptions::default()
        };
        assert!(options.validate().is_ok());
        assert_eq!(options.base_url(), "https://127.0.0.1:8080");

        let no_cert = LndOptions { cert: None, ..options.clone() };
        assert!(matches!(no_cert.validate(), Err(ConfigError::MissingOption { option: "cert", .. })));

        let plain_http = LndOptions { protocol: RestProtocol::Http, ..no_cert };
        assert!(plain_http.validate().is_ok());
        assert_eq!(plain_http.base_url(), "http://127.0.0.1:8080");

        let no_macaroon = LndOptions { macaroon: None, ..options };
        assert!(matches!(
            no_macaroon.validate(),
            Err(ConfigError::MissingOption { option: "macaroon", .. })
        ));
    }

    #[test]
    fn test_backend_config_implementation() {
        assert_eq!(
            BackendConfig::CoreLightning(cln()).implementation(),
            Implementation::CoreLightning
        );
        assert_eq!(BackendConfig::Lnd(LndOptions::default()).implementation(), Implementation::Lnd);
    }

    #[test]
    #[serial]
    fn test_core_lightning_from_env() {
        std::env::set_var("CLN_NODE_URI", "02def@10.0.0.1:9735");
        std::env::set_var("CLN_RPC_SOCKET", "/var/run/lightning-rpc");
        std::env::set_var("CLN_RPC_CONCURRENCY", "3");

        let options = CoreLightningOptions::from_env();
        assert_eq!(options.node_uri.as_deref(), Some("02def@10.0.0.1:9735"));
        assert_eq!(options.socket.as_deref(), Some("/var/run/lightning-rpc"));
        assert_eq!(options.cmd.concurrency, 3);
        assert_eq!(options.cmd.prefix, "clightning");

        std::env::remove_var("CLN_NODE_URI");
        std::env::remove_var("CLN_RPC_SOCKET");
        std::env::remove_var("CLN_RPC_CONCURRENCY");
    }

    #[test]
    #[serial]
    fn test_lnd_from_env() {
        std::env::set_var("LND_REST_HOST", "lnd.local:8081");
        std::env::set_var("LND_CERT_PATH", "/path/to/tls.cert");
        std::env::set_var("LND_MACAROON_PATH", "/path/to/admin.macaroon");
        std::env::set_var("LND_REST_PROTOCOL", "http");

        let options = LndOptions::from_env();
        assert_eq!(options.hostname, "lnd.local:8081");
        assert_eq!(options.cert, Some(CredentialSource::Path("/path/to/tls.cert".into())));
        assert_eq!(
            options.macaroon,
            Some(CredentialSource::Path("/path/to/admin.macaroon".into()))
        );
        assert_eq!(options.protocol, RestProtocol::Http);

        std::env::remove_var("LND_REST_HOST");
        std::env::remove_var("LND_CERT_PATH");
        std::env::remove_var("LND_MACAROON_PATH");
        std::env::remove_var("LND_REST_PROTOCOL");
    }
}
