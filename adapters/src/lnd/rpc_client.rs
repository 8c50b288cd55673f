//! LND REST Client
//!
//! Talks to LND's REST gateway. Credentials are loaded once at construction:
//! the TLS certificate as PEM text, the macaroon as hex for the
//! `Grpc-Metadata-macaroon` header.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use config::{BackendConfig, LndOptions};
use lnbridge_http::{RestConfig, RestTransport};
use reqwest::Method;
use serde_json::{json, Map, Value};
use transport::{BackendError, Result};
use types::{ChannelOpening, Implementation, InvoiceExtra, NodeInfo, OpenChannelRequest, Payment};

use crate::backend::{mismatched, validate_node_id, BackendProvider, LightningBackend};
use crate::validation::{LND_ADD_INVOICE, LND_GET_INFO, LND_OPEN_CHANNEL, LND_PAY_INVOICE};

/// LND over REST.
#[derive(Debug, Clone)]
pub struct LndBackend {
    rest: RestTransport,
}

impl LndBackend {
    /// Validates `options`, loads the credentials and builds the HTTP client.
    pub fn new(options: &LndOptions) -> Result<Self> {
        options.validate()?;
        let cert_pem = options.cert.as_ref().map(|cert| cert.load_text("cert")).transpose()?;
        let macaroon_hex = match &options.macaroon {
            Some(macaroon) => macaroon.load_hex("macaroon")?,
            None => return Err(BackendError::Configuration("Missing macaroon".to_string())),
        };
        let rest = RestTransport::new(RestConfig { base_url: options.base_url(), cert_pem, macaroon_hex })?;
        Ok(Self::with_transport(rest))
    }

    /// Wraps an existing REST transport.
    pub fn with_transport(rest: RestTransport) -> Self { Self { rest } }

    /// Create backend from environment variables
    pub fn from_env() -> Result<Self> { Self::new(&LndOptions::from_env()) }

    /// The underlying REST transport.
    pub fn rest(&self) -> &RestTransport { &self.rest }

    /// Fetches `GET /v1/getinfo`.
    pub async fn get_node_info(&self) -> Result<NodeInfo> {
        let reply = self.rest.request(Method::GET, "/v1/getinfo", None).await?;
        LND_GET_INFO.validate(&reply)?;
        let uris = reply["uris"]
            .as_array()
            .map(|uris| uris.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();
        Ok(NodeInfo {
            alias: reply["alias"].as_str().unwrap_or_default().to_string(),
            identity_pubkey: reply["identity_pubkey"].as_str().unwrap_or_default().to_string(),
            uris,
        })
    }
}

/// Re-encodes LND's base64 `funding_txid_bytes` as lowercase hex.
///
/// Bytes are kept in the order LND sends them.
pub fn funding_txid_hex(funding_txid_bytes: &str) -> Result<String> {
    BASE64
        .decode(funding_txid_bytes)
        .map(hex::encode)
        .map_err(|_| LND_OPEN_CHANNEL.unexpected("funding_txid_bytes"))
}

/// Re-encodes a hex description hash as base64 for `POST /v1/invoices`.
pub fn description_hash_base64(description_hash: &str) -> Result<String> {
    hex::decode(description_hash).map(|bytes| BASE64.encode(bytes)).map_err(|e| {
        BackendError::InvalidArgument(format!(
            "description_hash must be hex, got \"{}\": {}",
            description_hash, e
        ))
    })
}

#[async_trait]
impl LightningBackend for LndBackend {
    fn implementation(&self) -> Implementation { Implementation::Lnd }

    async fn get_node_uri(&self) -> Result<String> {
        let info = self.get_node_info().await?;
        info.uris.into_iter().next().ok_or_else(|| LND_GET_INFO.unexpected("uris"))
    }

    async fn open_channel(&self, request: &OpenChannelRequest) -> Result<ChannelOpening> {
        validate_node_id(&request.remote_id)?;
        let body = json!({
            "node_pubkey_string": request.remote_id,
            "local_funding_amount": request.local_amount.to_sat(),
            "push_sat": request.push_amount.to_sat(),
            "private": request.private,
        });

        let mut reply = self.rest.request(Method::POST, "/v1/channels", Some(&body)).await?;
        if let Some(bytes) = reply.get("funding_txid_bytes").and_then(Value::as_str) {
            let txid = funding_txid_hex(bytes)?;
            if let Some(map) = reply.as_object_mut() {
                map.insert("funding_txid_str".to_string(), Value::String(txid));
            }
        }
        LND_OPEN_CHANNEL.validate(&reply)?;

        let funding_txid = LND_OPEN_CHANNEL.non_empty_str(&reply, "funding_txid_str")?.to_string();
        let output_index = LND_OPEN_CHANNEL.u64_field(&reply, "output_index")?;
        tracing::info!(%funding_txid, output_index, "channel funding broadcast");
        Ok(ChannelOpening { funding_txid, output_index, raw: reply })
    }

    async fn pay_invoice(&self, invoice: &str) -> Result<Payment> {
        let body = json!({ "payment_request": invoice });
        let reply = self.rest.request(Method::POST, "/v1/channels/transactions", Some(&body)).await?;
        LND_PAY_INVOICE.validate(&reply)?;

        if let Some(error) = reply.get("payment_error").and_then(Value::as_str).filter(|e| !e.is_empty()) {
            tracing::warn!(%error, "payment failed");
            return Err(BackendError::remote(format!("Failed to pay invoice: \"{}\"", error)));
        }
        let payment_preimage = reply["payment_preimage"].as_str().unwrap_or_default().to_string();
        if payment_preimage.is_empty() {
            return Err(BackendError::remote(
                "Probable failed payment: Did not receive payment_preimage in response",
            ));
        }

        Ok(Payment {
            payment_preimage,
            payment_hash: reply["payment_hash"].as_str().unwrap_or_default().to_string(),
            payment_route: reply.get("payment_route").cloned(),
            raw: reply,
        })
    }

    async fn add_invoice(&self, amount_msat: u64, extra: &InvoiceExtra) -> Result<String> {
        let mut body = Map::new();
        body.insert("value_msat".into(), amount_msat.into());
        if let Some(hash) = &extra.description_hash {
            body.insert("description_hash".into(), description_hash_base64(hash)?.into());
        }

        let reply =
            self.rest.request(Method::POST, "/v1/invoices", Some(&Value::Object(body))).await?;
        LND_ADD_INVOICE.validate(&reply)?;
        Ok(LND_ADD_INVOICE.non_empty_str(&reply, "payment_request")?.to_string())
    }
}

impl BackendProvider for LndBackend {
    fn implementation() -> Implementation { Implementation::Lnd }

    fn build(config: &BackendConfig) -> Result<Box<dyn LightningBackend>> {
        match config {
            BackendConfig::Lnd(options) => Ok(Box::new(Self::new(options)?)),
            other => Err(mismatched(Implementation::Lnd, other)),
        }
    }
}
