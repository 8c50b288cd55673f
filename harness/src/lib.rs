#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::unwrap_used)]

//! Mock Lightning nodes for tests.
//!
//! [`MockLightningNode`] answers the handful of Core Lightning JSON-RPC
//! methods and LND REST endpoints the adapters use, with canned but
//! well-formed replies. It records every request it sees so tests can assert
//! on the wire format. [`MockRestNode`] serves it over HTTP and
//! [`MockRpcNode`] over a UNIX socket.
//!
//! Any reply can be replaced with [`MockLightningNode::script_rest`] or
//! [`MockLightningNode::script_rpc`] to exercise failure paths.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::{json, Value};
use thiserror::Error;

mod rest;
#[cfg(unix)]
mod rpc;

pub use rest::{serve_rest, MockRestNode};
#[cfg(unix)]
pub use rpc::MockRpcNode;

/// Identity key of the mock node (2·G on secp256k1).
pub const NODE_PUBKEY: &str = "02c6047f9441ed7d6d3045406e95c07cd85c778e4b8cef3ca7abac09b95c709ee5";
/// A valid remote peer key (the secp256k1 generator).
pub const PEER_PUBKEY: &str = "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
/// Funding txid returned by LND, base64 as LND encodes bytes fields.
pub const FUNDING_TXID_BASE64: &str = "AcydW4l0U+PyehTekDKBdNR3+jYWTWUQpU3PRHaLYKQ=";
/// The same txid bytes as lowercase hex.
pub const FUNDING_TXID_HEX: &str =
    "01cc9d5b897453e3f27a14de90328174d477fa36164d6510a54dcf44768b60a4";
/// Preimage returned for every successful payment.
pub const PAYMENT_PREIMAGE: &str =
    "0102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f20";
/// SHA-256 of [`PAYMENT_PREIMAGE`].
pub const PAYMENT_HASH: &str = "ae216c2ef5247a3782c135efa279a3e4cdc61094270f5d2be58c6204b7a612c9";
/// Invoice returned by the invoice endpoints.
pub const BOLT11: &str = "lnbcrt10u1pjmockinvoicexqrrssmockmockmockmock";

/// Errors raised by the mock node
#[derive(Debug, Error)]
pub enum HarnessError {
    /// A JSON-RPC call was rejected
    #[error("RPC call failed: {message}")]
    Rpc {
        /// JSON-RPC error code
        code: i64,
        /// Error message
        message: String,
    },

    /// A REST call was rejected
    #[error("HTTP {status}: {body}")]
    Http {
        /// HTTP status
        status: u16,
        /// Response body
        body: String,
    },

    /// Socket or listener failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The server did not come up in time
    #[error("Mock server not ready: {0}")]
    NotReady(String),
}

/// One request received over REST.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    /// HTTP method, upper case
    pub method: String,
    /// Request path
    pub path: String,
    /// `Grpc-Metadata-macaroon` header, if sent
    pub macaroon: Option<String>,
    /// `Content-Type` header, if sent
    pub content_type: Option<String>,
    /// Parsed JSON body; `None` when the body was empty
    pub body: Option<Value>,
}

/// A REST reply that replaces the canned one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedResponse {
    /// HTTP status to send
    pub status: u16,
    /// Raw body to send
    pub body: String,
}

/// Canned replies plus request log.
#[derive(Debug, Default)]
pub struct MockLightningNode {
    rest_log: Mutex<Vec<RecordedRequest>>,
    rpc_log: Mutex<Vec<Value>>,
    rest_scripts: Mutex<HashMap<String, ScriptedResponse>>,
    rpc_scripts: Mutex<HashMap<String, Result<Value, Value>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn route_key(method: &str, path: &str) -> String { format!("{} {}", method.to_uppercase(), path) }

fn missing(name: &str) -> HarnessError {
    HarnessError::Rpc { code: -32602, message: format!("Missing required parameter: {}", name) }
}

fn param<'a>(params: &'a Value, name: &str, position: usize) -> Option<&'a Value> {
    match params {
        Value::Object(map) => map.get(name),
        Value::Array(items) => items.get(position),
        _ => None,
    }
}

impl MockLightningNode {
    /// Creates a node with the default canned replies.
    pub fn new() -> Self { Self::default() }

    /// Replaces the reply to `method path` (e.g. `POST /v1/channels`).
    pub fn script_rest(&self, method: &str, path: &str, status: u16, body: impl Into<String>) {
        lock(&self.rest_scripts)
            .insert(route_key(method, path), ScriptedResponse { status, body: body.into() });
    }

    /// Replaces the reply to JSON-RPC `method`: `Ok` becomes `result`,
    /// `Err` becomes `error`.
    pub fn script_rpc(&self, method: &str, reply: Result<Value, Value>) {
        lock(&self.rpc_scripts).insert(method.to_string(), reply);
    }

    /// REST requests seen so far.
    pub fn rest_requests(&self) -> Vec<RecordedRequest> { lock(&self.rest_log).clone() }

    /// JSON-RPC requests seen so far, as received.
    pub fn rpc_requests(&self) -> Vec<Value> { lock(&self.rpc_log).clone() }

    /// Builds the reply envelope for one JSON-RPC request.
    pub fn handle_rpc_request(&self, request: Value) -> Value {
        lock(&self.rpc_log).push(request.clone());
        let id = request.get("id").cloned().unwrap_or(Value::Null);
        let method = request.get("method").and_then(Value::as_str).unwrap_or_default();
        let params = request.get("params").cloned().unwrap_or_else(|| json!([]));

        let scripted = lock(&self.rpc_scripts).get(method).cloned();
        let outcome = match scripted {
            Some(Ok(result)) => Ok(result),
            Some(Err(error)) => Err(error),
            None => self
                .handle_rpc_call(method, &params)
                .map_err(|e| json!({"code": error_code(&e), "message": e.to_string()})),
        };

        match outcome {
            Ok(result) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
            Err(error) => json!({"jsonrpc": "2.0", "id": id, "error": error}),
        }
    }

    /// Handles a Core Lightning JSON-RPC method.
    pub fn handle_rpc_call(&self, method: &str, params: &Value) -> Result<Value, HarnessError> {
        match method {
            "getinfo" => Ok(json!({
                "id": NODE_PUBKEY,
                "alias": "mock-cln",
                "color": "02c604",
                "num_peers": 0,
                "address": [{"type": "ipv4", "address": "127.0.0.1", "port": 9735}],
                "version": "v24.02",
                "blockheight": 800000,
                "network": "regtest"
            })),
            "fundchannel" => {
                param(params, "id", 0).and_then(Value::as_str).ok_or_else(|| missing("id"))?;
                param(params, "amount", 1).filter(|v| v.is_u64()).ok_or_else(|| missing("amount"))?;
                Ok(json!({
                    "tx": "020000000001",
                    "txid": FUNDING_TXID_HEX,
                    "channel_id": "a4608b7644cf4da510654d1636fa77d474813290de147af2e3537489",
                    "outnum": 1
                }))
            }
            "pay" => {
                param(params, "bolt11", 0).and_then(Value::as_str).ok_or_else(|| missing("bolt11"))?;
                Ok(json!({
                    "payment_preimage": PAYMENT_PREIMAGE,
                    "payment_hash": PAYMENT_HASH,
                    "created_at": 1700000000.0,
                    "parts": 1,
                    "amount_msat": 1000,
                    "amount_sent_msat": 1000,
                    "status": "complete"
                }))
            }
            "invoice" => {
                param(params, "msatoshi", 0).filter(|v| v.is_u64()).ok_or_else(|| missing("msatoshi"))?;
                Ok(json!({
                    "payment_hash": PAYMENT_HASH,
                    "expires_at": 1700003600,
                    "bolt11": BOLT11
                }))
            }
            _ => Err(HarnessError::Rpc { code: -32601, message: format!("Unknown command '{}'", method) }),
        }
    }

    /// Records a REST request and builds `(status, body)` for it.
    pub fn handle_rest_request(&self, request: RecordedRequest) -> (u16, String) {
        let key = route_key(&request.method, &request.path);
        let body = request.body.clone().unwrap_or_else(|| json!({}));
        lock(&self.rest_log).push(request);

        if let Some(scripted) = lock(&self.rest_scripts).get(&key).cloned() {
            return (scripted.status, scripted.body);
        }
        match self.handle_rest_call(&key, &body) {
            Ok(reply) => (200, reply.to_string()),
            Err(HarnessError::Http { status, body }) => (status, body),
            Err(e) => (500, json!({"error": e.to_string(), "code": 2}).to_string()),
        }
    }

    /// Handles an LND REST endpoint identified by `METHOD path`.
    pub fn handle_rest_call(&self, route: &str, body: &Value) -> Result<Value, HarnessError> {
        match route {
            "GET /v1/getinfo" => Ok(json!({
                "alias": "mock-lnd",
                "identity_pubkey": NODE_PUBKEY,
                "num_active_channels": 0,
                "block_height": 800000,
                "synced_to_chain": true,
                "uris": [format!("{}@127.0.0.1:9735", NODE_PUBKEY)]
            })),
            "POST /v1/channels" => {
                if !body["node_pubkey_string"].is_string() {
                    return Err(bad_request("node_pubkey_string"));
                }
                Ok(json!({"funding_txid_bytes": FUNDING_TXID_BASE64, "output_index": 0}))
            }
            "POST /v1/channels/transactions" => {
                if !body["payment_request"].is_string() {
                    return Err(bad_request("payment_request"));
                }
                Ok(json!({
                    "payment_error": "",
                    "payment_preimage": PAYMENT_PREIMAGE,
                    "payment_hash": PAYMENT_HASH,
                    "payment_route": {"total_time_lock": 144, "total_amt": "1", "hops": []}
                }))
            }
            "POST /v1/invoices" => Ok(json!({
                "r_hash": PAYMENT_HASH,
                "payment_request": BOLT11,
                "add_index": "1"
            })),
            _ => Err(HarnessError::Http {
                status: 404,
                body: json!({"error": "Not Found", "code": 5}).to_string(),
            }),
        }
    }
}

fn bad_request(field: &str) -> HarnessError {
    HarnessError::Http {
        status: 400,
        body: json!({"error": format!("missing {}", field), "code": 3}).to_string(),
    }
}

fn error_code(error: &HarnessError) -> i64 {
    match error {
        HarnessError::Rpc { code, .. } => *code,
        _ => -1,
    }
}
