#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::unwrap_used)]

//! # `lnbridge-transport`: Shared Transport Vocabulary
//!
//! This crate defines the pieces every lnbridge backend agrees on, whatever
//! wire protocol it speaks underneath.
//!
//! ## Core Concepts
//!
//! ### `BackendError`
//! The single failure vocabulary surfaced to callers. The stream (JSON-RPC
//! over a socket) and REST (HTTPS + credential header) backends both
//! normalize their transport-level failures into one of six variants, so a
//! caller can react to "the node said no" differently from "the node said
//! something we could not read" without knowing which backend is in use.
//!
//! ### `Transport` Trait
//! Defines how a JSON-RPC method call is carried to a node and how its
//! `result` member comes back as a [`serde_json::Value`].
//!
//! ### `JsonRpcRequest` / `JsonRpcResponse`
//! The JSON-RPC 2.0 envelopes written to and read from the stream socket.
//!
//! ## Example
//! ```no_run
//! use transport::{BackendError, DynTransport};
//! use serde_json::json;
//!
//! async fn demo(transport: DynTransport) -> Result<(), BackendError> {
//!     let info = transport.send("getinfo", json!({})).await?;
//!     println!("id = {}", info["id"]);
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// Type alias for structured error handling in backend operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// JSON-RPC protocol version tag written into every request.
pub const JSONRPC_VERSION: &str = "2.0";

/// Canonical error type for every backend and transport.
///
/// Each variant corresponds to one failure class. Backend-specific details
/// travel in the message, never in the variant, so higher layers can match
/// on the class alone.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The call itself was malformed (bad method name, params shape, amount, key).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The backend options are missing a required value or carry a bad one.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The connection, socket, or HTTP transport failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The node answered with an explicit error or a non-success status.
    #[error("{}", remote_message(*status, message))]
    Remote {
        /// HTTP status code, when the failure came from a REST backend.
        status: Option<u16>,
        /// The node's error payload or reason.
        message: String,
    },

    /// The reply bytes are not the expected wire format.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The reply parsed, but a required field is missing or has the wrong type.
    #[error("Unexpected response from LN backend [{operation}]: \"{field}\"")]
    UnexpectedResponse {
        /// Operation that produced the reply, e.g. `GET /v1/getinfo` or `pay`.
        operation: String,
        /// Offending field name.
        field: String,
    },
}

fn remote_message(status: Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("Remote error: HTTP_{}_ERROR {}", code, message).trim_end().to_string(),
        None => format!("Remote error: {}", message),
    }
}

impl BackendError {
    /// Builds a [`BackendError::UnexpectedResponse`] for `field` of `operation`.
    pub fn unexpected(operation: impl Into<String>, field: impl Into<String>) -> Self {
        BackendError::UnexpectedResponse { operation: operation.into(), field: field.into() }
    }

    /// Builds a [`BackendError::Remote`] without an HTTP status.
    pub fn remote(message: impl Into<String>) -> Self {
        BackendError::Remote { status: None, message: message.into() }
    }

    /// Returns the HTTP status carried by a [`BackendError::Remote`], if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Remote { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self { BackendError::Protocol(err.to_string()) }
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self { BackendError::Transport(err.to_string()) }
}

/// The base transport trait for single JSON-RPC calls.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a single RPC call and returns the `result` member of its reply.
    ///
    /// `params` must be a JSON array or object; `Value::Null` is treated as an
    /// empty array.
    async fn send(&self, method: &str, params: Value) -> Result<Value>;

    /// Returns the configured endpoint or connection descriptor.
    ///
    /// For socket transports this is the socket path or `host:port`.
    fn endpoint(&self) -> &str;
}

/// Type alias for a shared, dynamically dispatched transport instance.
///
/// ```
/// use transport::{DynTransport, Transport};
///
/// fn use_transport(t: DynTransport) {
///     println!("Using endpoint: {}", t.endpoint());
/// }
/// ```
pub type DynTransport = Arc<dyn Transport>;

/// Normalizes call parameters: arrays and objects pass through, `null`
/// becomes `[]`, anything else is rejected.
pub fn normalize_params(params: Value) -> Result<Value> {
    match params {
        Value::Null => Ok(Value::Array(Vec::new())),
        Value::Array(_) | Value::Object(_) => Ok(params),
        other => Err(BackendError::InvalidArgument(format!(
            "params: Array or Object expected, got {}",
            json_type_name(&other)
        ))),
    }
}

/// Human-readable JSON type name, used in error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// JSON-RPC 2.0 request envelope.
///
/// Field order is the wire order: `jsonrpc`, `method`, `params`, `id`.
#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<'a> {
    /// Always [`JSONRPC_VERSION`].
    pub jsonrpc: &'static str,
    /// Method name.
    pub method: &'a str,
    /// Array or object parameters.
    pub params: &'a Value,
    /// Correlation identifier echoed back by the node.
    pub id: &'a str,
}

impl<'a> JsonRpcRequest<'a> {
    /// Creates a request envelope.
    pub fn new(method: &'a str, params: &'a Value, id: &'a str) -> Self {
        Self { jsonrpc: JSONRPC_VERSION, method, params, id }
    }
}

/// Minimal structure representing a JSON-RPC response envelope.
///
/// `result` distinguishes an absent member (`None`) from an explicit
/// `null` (`Some(Value::Null)`).
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRpcResponse {
    /// The value returned by the RPC call, if present.
    pub result: Option<Value>,
    /// The error object returned by the node, if present.
    pub error: Option<Value>,
    /// The identifier correlating request and response.
    pub id: Value,
}

impl JsonRpcResponse {
    /// Splits a parsed JSON document into an envelope.
    ///
    /// Returns `None` when the document is not a JSON object.
    pub fn from_value(value: Value) -> Option<Self> {
        let Value::Object(mut map) = value else {
            return None;
        };
        Some(Self {
            id: map.remove("id").unwrap_or(Value::Null),
            result: map.remove("result"),
            error: map.remove("error"),
        })
    }

    /// The identifier as a string, when the node echoed a string id.
    pub fn id_str(&self) -> Option<&str> { self.id.as_str() }

    /// Converts the envelope into the call outcome.
    ///
    /// A non-null `error` member wins over `result` and is carried serialized.
    pub fn into_result(self) -> Result<Value> {
        if let Some(error) = self.error.filter(|e| !e.is_null()) {
            return Err(BackendError::remote(error.to_string()));
        }
        self.result.ok_or_else(|| {
            BackendError::Protocol("JSON-RPC response is missing the `result` member".to_string())
        })
    }
}

/// Gets a random free port assigned by the OS.
///
/// Binds to `127.0.0.1:0`, reads the assigned port and drops the listener.
///
/// ```
/// use transport::get_random_free_port;
///
/// let port = get_random_free_port()?;
/// println!("Using port: {}", port);
/// # Ok::<(), std::io::Error>(())
/// ```
pub fn get_random_free_port() -> std::io::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_from() {
        let err = serde_json::from_str::<serde_json::Value>("not-json")
            .expect_err("Expected JSON parsing to fail");
        let berr: BackendError = err.into();

        match berr {
            BackendError::Protocol(msg) => assert!(!msg.is_empty()),
            _ => panic!("expected Protocol error variant"),
        }

        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        assert!(matches!(BackendError::from(io), BackendError::Transport(_)));
    }

    #[test]
    fn test_display() {
        let err = BackendError::Remote { status: Some(404), message: String::new() };
        assert_eq!(err.to_string(), "Remote error: HTTP_404_ERROR");
        assert_eq!(err.status(), Some(404));

        let err = BackendError::unexpected("POST /v1/invoices", "payment_request");
        assert_eq!(
            err.to_string(),
            "Unexpected response from LN backend [POST /v1/invoices]: \"payment_request\""
        );
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_normalize_params() {
        assert_eq!(normalize_params(Value::Null).expect("null"), json!([]));
        assert_eq!(normalize_params(json!([1])).expect("array"), json!([1]));
        assert_eq!(normalize_params(json!({"a": 1})).expect("object"), json!({"a": 1}));

        match normalize_params(json!("x")) {
            Err(BackendError::InvalidArgument(msg)) => assert!(msg.contains("string")),
            other => panic!("expected InvalidArgument, got {:?}", other),
        }
    }

    #[test]
    fn test_request_wire_order() {
        let params = json!({"bolt11": "lnbc1"});
        let request = JsonRpcRequest::new("pay", &params, "clightning1-req2");
        let text = serde_json::to_string(&request).expect("serialize");
        assert_eq!(
            text,
            r#"{"jsonrpc":"2.0","method":"pay","params":{"bolt11":"lnbc1"},"id":"clightning1-req2"}"#
        );
    }

    #[test]
    fn test_response_into_result() {
        let ok = JsonRpcResponse::from_value(json!({"id": "a", "result": {"x": 1}}))
            .expect("object");
        assert_eq!(ok.id_str(), Some("a"));
        assert_eq!(ok.into_result().expect("result"), json!({"x": 1}));

        let null_error = JsonRpcResponse::from_value(json!({"id": "a", "error": null, "result": 5}))
            .expect("object");
        assert_eq!(null_error.into_result().expect("null error ignored"), json!(5));

        let err = JsonRpcResponse::from_value(json!({"id": "a", "error": {"code": -1}}))
            .expect("object");
        match err.into_result() {
            Err(BackendError::Remote { status: None, message }) => {
                assert_eq!(message, r#"{"code":-1}"#)
            }
            other => panic!("expected Remote, got {:?}", other),
        }

        let missing = JsonRpcResponse::from_value(json!({"id": "a"})).expect("object");
        assert!(matches!(missing.into_result(), Err(BackendError::Protocol(_))));

        assert!(JsonRpcResponse::from_value(json!([1, 2])).is_none());
    }

    #[test]
    fn test_get_random_free_port() {
        let port = get_random_free_port().expect("Should get a free port");

        assert!(port > 0);
    }
}
