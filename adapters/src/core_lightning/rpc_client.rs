//! Core Lightning backend
//!
//! Drives a Core Lightning node through its `lightning-rpc` socket. Every
//! operation is one JSON-RPC call on the shared [`IpcTransport`], so any
//! number of operations may be in flight at once.

use async_trait::async_trait;
use config::{BackendConfig, CoreLightningOptions};
use ipc::{IpcConfig, IpcTransport, SocketAddress};
use serde_json::{json, Map, Value};
use transport::{BackendError, Result};
use types::{
    sat_to_msat, ChannelOpening, Implementation, InvoiceExtra, OpenChannelRequest, Payment,
};

use crate::backend::{mismatched, validate_node_id, BackendProvider, LightningBackend};
use crate::validation::{CLN_FUND_CHANNEL, CLN_INVOICE, CLN_PAY};

/// Core Lightning over JSON-RPC.
#[derive(Debug)]
pub struct CoreLightningBackend {
    node_uri: String,
    rpc: IpcTransport,
}

/// Maps backend options onto transport settings.
pub fn ipc_config(options: &CoreLightningOptions) -> IpcConfig {
    IpcConfig {
        concurrency: options.cmd.concurrency,
        prefix: options.cmd.prefix.clone(),
        delimiter: options.delimiter.as_bytes().to_vec(),
        max_pending: options.max_pending,
        max_frame_len: options.max_frame_len,
    }
}

impl CoreLightningBackend {
    /// Validates `options` and starts connecting to the socket.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(options: &CoreLightningOptions) -> Result<Self> {
        options.validate()?;
        let node_uri = options.node_uri.clone().unwrap_or_default();
        let socket = options.socket.as_deref().unwrap_or_default();
        let address: SocketAddress = socket
            .parse()
            .map_err(|e| BackendError::Configuration(format!("Invalid socket option: {}", e)))?;
        let rpc = IpcTransport::new(address, ipc_config(options))?;
        Ok(Self::with_transport(node_uri, rpc))
    }

    /// Wraps an existing transport.
    pub fn with_transport(node_uri: impl Into<String>, rpc: IpcTransport) -> Self {
        Self { node_uri: node_uri.into(), rpc }
    }

    /// Create backend from environment variables
    pub fn from_env() -> Result<Self> { Self::new(&CoreLightningOptions::from_env()) }

    /// The underlying transport, for raw calls and registry inspection.
    pub fn rpc(&self) -> &IpcTransport { &self.rpc }

    /// Calls `getinfo` and returns the reply unchanged.
    pub async fn get_info(&self) -> Result<Value> { self.rpc.invoke("getinfo", json!({})).await }

    /// Closes the socket and fails every outstanding call.
    pub fn shutdown(&self) { self.rpc.shutdown() }
}

#[async_trait]
impl LightningBackend for CoreLightningBackend {
    fn implementation(&self) -> Implementation { Implementation::CoreLightning }

    async fn get_node_uri(&self) -> Result<String> { Ok(self.node_uri.clone()) }

    async fn open_channel(&self, request: &OpenChannelRequest) -> Result<ChannelOpening> {
        validate_node_id(&request.remote_id)?;
        let push_msat = sat_to_msat(request.push_amount).ok_or_else(|| {
            BackendError::InvalidArgument(format!("push amount overflows: {}", request.push_amount))
        })?;
        let params = json!({
            "id": request.remote_id,
            "amount": request.local_amount.to_sat(),
            "announce": !request.private,
            "push_msat": push_msat,
        });

        let reply = self.rpc.invoke("fundchannel", params).await?;
        CLN_FUND_CHANNEL.validate(&reply)?;
        let funding_txid = CLN_FUND_CHANNEL.non_empty_str(&reply, "txid")?.to_string();
        let output_index = CLN_FUND_CHANNEL.u64_field(&reply, "outnum")?;
        tracing::info!(%funding_txid, output_index, "channel funding broadcast");
        Ok(ChannelOpening { funding_txid, output_index, raw: reply })
    }

    async fn pay_invoice(&self, invoice: &str) -> Result<Payment> {
        let reply = self.rpc.invoke("pay", json!({ "bolt11": invoice })).await?;
        CLN_PAY.validate(&reply)?;
        Ok(Payment {
            payment_preimage: CLN_PAY.non_empty_str(&reply, "payment_preimage")?.to_string(),
            payment_hash: CLN_PAY.non_empty_str(&reply, "payment_hash")?.to_string(),
            payment_route: None,
            raw: reply,
        })
    }

    async fn add_invoice(&self, amount_msat: u64, extra: &InvoiceExtra) -> Result<String> {
        let mut params = Map::new();
        params.insert("msatoshi".into(), amount_msat.into());
        if let Some(description) = &extra.description {
            params.insert("description".into(), description.clone().into());
        }
        if let Some(label) = &extra.label {
            params.insert("label".into(), label.clone().into());
        }

        let reply = self.rpc.invoke("invoice", Value::Object(params)).await?;
        CLN_INVOICE.validate(&reply)?;
        Ok(CLN_INVOICE.non_empty_str(&reply, "bolt11")?.to_string())
    }
}

impl BackendProvider for CoreLightningBackend {
    fn implementation() -> Implementation { Implementation::CoreLightning }

    fn build(config: &BackendConfig) -> Result<Box<dyn LightningBackend>> {
        match config {
            BackendConfig::CoreLightning(options) => Ok(Box::new(Self::new(options)?)),
            other => Err(mismatched(Implementation::CoreLightning, other)),
        }
    }
}
