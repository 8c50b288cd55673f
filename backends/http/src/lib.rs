#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::unwrap_used)]

//! # `lnbridge-http`: REST transport for LND-style nodes
//!
//! [`RestTransport`] wraps one [`reqwest::Client`] configured for a single
//! node: the node's TLS certificate is the only trust anchor, and every
//! request carries the macaroon in the `Grpc-Metadata-macaroon` header.
//!
//! ## Example
//! ```no_run
//! use lnbridge_http::{RestConfig, RestTransport};
//! use reqwest::Method;
//!
//! # async fn demo() -> transport::Result<()> {
//! let rest = RestTransport::new(RestConfig {
//!     base_url: "https://127.0.0.1:8080".to_string(),
//!     cert_pem: Some(std::fs::read_to_string("/home/lnd/.lnd/tls.cert")?),
//!     macaroon_hex: "0201036c6e64".to_string(),
//! })?;
//! let info = rest.request(Method::GET, "/v1/getinfo", None).await?;
//! println!("{}", info["alias"]);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::Value;
use transport::{BackendError, Result, Transport};

/// Header carrying the hex-encoded macaroon.
pub const MACAROON_HEADER: &str = "Grpc-Metadata-macaroon";

/// Connection settings for one REST node.
#[derive(Clone, PartialEq, Eq)]
pub struct RestConfig {
    /// `https://host:port` or `http://host:port`, without a trailing slash
    pub base_url: String,
    /// PEM certificate to trust; required for `https`
    pub cert_pem: Option<String>,
    /// Macaroon, hex encoded
    pub macaroon_hex: String,
}

impl std::fmt::Debug for RestConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestConfig")
            .field("base_url", &self.base_url)
            .field("cert_pem", &self.cert_pem.as_ref().map(|_| "<pem>"))
            .field("macaroon_hex", &"<redacted>")
            .finish()
    }
}

/// JSON over HTTP(S) to a single node.
#[derive(Clone, Debug)]
pub struct RestTransport {
    client: reqwest::Client,
    base_url: String,
}

impl RestTransport {
    /// Builds the client.
    ///
    /// # Errors
    /// [`BackendError::Configuration`] when the certificate does not parse,
    /// is missing for `https`, or the macaroon is not a valid header value.
    pub fn new(config: RestConfig) -> Result<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        let https = base_url.starts_with("https://");
        if !https && !base_url.starts_with("http://") {
            return Err(BackendError::Configuration(format!(
                "Unsupported URL scheme in {}",
                base_url
            )));
        }

        let mut macaroon = HeaderValue::from_str(config.macaroon_hex.trim()).map_err(|e| {
            BackendError::Configuration(format!("Invalid macaroon header value: {}", e))
        })?;
        macaroon.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(MACAROON_HEADER, macaroon);

        let mut builder = reqwest::Client::builder().use_rustls_tls().default_headers(headers);
        if https {
            let pem = config.cert_pem.as_deref().ok_or_else(|| {
                BackendError::Configuration("A TLS certificate is required for https".to_string())
            })?;
            if !pem.contains("-----BEGIN CERTIFICATE-----") {
                return Err(BackendError::Configuration(
                    "TLS certificate is not PEM encoded".to_string(),
                ));
            }
            let cert = reqwest::Certificate::from_pem(pem.as_bytes()).map_err(|e| {
                BackendError::Configuration(format!("Invalid TLS certificate: {}", e))
            })?;
            builder = builder.tls_built_in_root_certs(false).add_root_certificate(cert);
        }
        let client = builder.build().map_err(|e| {
            BackendError::Configuration(format!("Failed to build HTTP client: {}", e))
        })?;

        tracing::debug!(%base_url, "initialized REST transport");
        Ok(Self { client, base_url })
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str { &self.base_url }

    /// Sends one request and returns the parsed JSON body.
    ///
    /// `body` is sent as JSON only when it is a non-empty object.
    ///
    /// # Errors
    /// - [`BackendError::Transport`] if the request cannot be sent or read
    /// - [`BackendError::Remote`] with the status for any status of 300 or above
    /// - [`BackendError::Protocol`] if the body is not JSON
    pub async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%method, %url, "→ REST request");

        let mut req = self.client.request(method.clone(), &url);
        if let Some(body) = body.filter(|b| b.as_object().is_some_and(|o| !o.is_empty())) {
            req = req.json(body);
        }

        let resp = req.send().await.map_err(|e| {
            tracing::error!("REST transport - request to {} failed: {}", url, e);
            BackendError::Transport(e.to_string())
        })?;
        let status = resp.status();
        let text = resp.text().await.map_err(|e| {
            tracing::error!("REST transport - failed to read body from {}: {}", url, e);
            BackendError::Transport(e.to_string())
        })?;

        if status.as_u16() >= 300 {
            tracing::warn!(%method, %url, status = status.as_u16(), "REST request rejected");
            return Err(BackendError::Remote {
                status: Some(status.as_u16()),
                message: text.trim().to_string(),
            });
        }

        serde_json::from_str(&text).map_err(|e| {
            BackendError::Protocol(format!("JSON data expected from {} {}: {}", method, path, e))
        })
    }
}

/// Splits a route such as `POST /v1/invoices` into method and path.
pub fn parse_route(route: &str) -> Result<(Method, &str)> {
    let (verb, path) = route.trim().split_once(' ').ok_or_else(|| {
        BackendError::InvalidArgument(format!("Expected \"METHOD /path\", got \"{}\"", route))
    })?;
    let path = path.trim();
    if !path.starts_with('/') {
        return Err(BackendError::InvalidArgument(format!("Path must start with '/': {}", path)));
    }
    let method = Method::from_bytes(verb.to_uppercase().as_bytes())
        .map_err(|e| BackendError::InvalidArgument(format!("Invalid HTTP method {}: {}", verb, e)))?;
    Ok((method, path))
}

#[async_trait]
impl Transport for RestTransport {
    /// Treats `method` as a route (`GET /v1/getinfo`) and `params` as the body.
    async fn send(&self, method: &str, params: Value) -> Result<Value> {
        let (method, path) = parse_route(method)?;
        let body = match params {
            Value::Null => None,
            Value::Object(_) => Some(params),
            other => {
                return Err(BackendError::InvalidArgument(format!(
                    "REST body must be an object, got {}",
                    transport::json_type_name(&other)
                )))
            }
        };
        self.request(method, path, body.as_ref()).await
    }

    fn endpoint(&self) -> &str { &self.base_url }
}
