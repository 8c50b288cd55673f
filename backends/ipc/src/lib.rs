#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::unwrap_used)]

//! JSON-RPC over a persistent stream socket.
//!
//! [`IpcTransport`] keeps one connection to a node's RPC socket and lets any
//! number of callers share it. Requests are delimiter-framed JSON-RPC 2.0
//! objects; replies may arrive in any order and are matched back to their
//! caller by request id.
//!
//! ```no_run
//! use ipc::{IpcConfig, IpcTransport, SocketAddress};
//! use serde_json::json;
//!
//! # async fn demo() -> transport::Result<()> {
//! let address: SocketAddress = "/home/cln/.lightning/bitcoin/lightning-rpc".parse().expect("path");
//! let rpc = IpcTransport::new(address, IpcConfig::default())?;
//! let info = rpc.invoke("getinfo", json!([])).await?;
//! println!("{}", info["id"]);
//! # Ok(())
//! # }
//! ```
//!
//! Calls made before the connection is established wait in arrival order and
//! are released as soon as it is, and reach the socket in that same order
//! on any runtime flavor. At most `concurrency` requests are handed
//! to the writer at a time. There is no per-call timeout; see
//! [`IpcTransport::expire_pending`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use transport::{normalize_params, BackendError, JsonRpcRequest, Result, Transport};

pub mod admission;
pub mod codec;
pub mod connector;
mod driver;
pub mod id;
pub mod registry;

use admission::{AdmissionQueue, Slot};
use codec::{contains_delimiter, DelimitedCodec};
pub use connector::{BoxedStream, Connector, SocketAddress, StreamConnector};
use id::RequestIdGenerator;
pub use registry::RegistryStats;
use registry::PendingRegistry;

/// Default number of requests admitted to the writer at once.
pub const DEFAULT_CONCURRENCY: usize = 7;
/// Default prefix for request ids.
pub const DEFAULT_PREFIX: &str = "clightning";
/// Default largest inbound frame.
pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Transport settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpcConfig {
    /// Requests admitted to the writer at once
    pub concurrency: usize,
    /// Request id prefix
    pub prefix: String,
    /// Message delimiter, both directions
    pub delimiter: Vec<u8>,
    /// Cap on calls awaiting a reply; new calls fail beyond it
    pub max_pending: Option<usize>,
    /// Inbound frames longer than this are discarded
    pub max_frame_len: usize,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            prefix: DEFAULT_PREFIX.to_string(),
            delimiter: b"\n".to_vec(),
            max_pending: None,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl IpcConfig {
    /// Rejects settings the transport cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(BackendError::Configuration("concurrency must be at least 1".into()));
        }
        if self.delimiter.is_empty() {
            return Err(BackendError::Configuration("delimiter must not be empty".into()));
        }
        if self.max_frame_len == 0 {
            return Err(BackendError::Configuration("max_frame_len must be at least 1".into()));
        }
        if self.max_pending == Some(0) {
            return Err(BackendError::Configuration("max_pending must be at least 1".into()));
        }
        Ok(())
    }
}

/// Lifecycle of the single connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connection attempt in progress; calls queue up
    Connecting,
    /// Requests are flowing
    Connected,
    /// Connecting failed, the peer went away, or the transport was shut down
    Closed(String),
}

pub(crate) struct Outbound {
    pub(crate) id: String,
    pub(crate) frame: Bytes,
    pub(crate) slot: Slot,
}

pub(crate) struct Shared {
    pub(crate) config: IpcConfig,
    pub(crate) registry: PendingRegistry,
    pub(crate) admission: AdmissionQueue,
    state: watch::Sender<ConnectionState>,
}

impl Shared {
    pub(crate) fn codec(&self) -> DelimitedCodec {
        DelimitedCodec::new(self.config.delimiter.clone(), self.config.max_frame_len)
    }

    pub(crate) fn mark_connected(&self) {
        self.state.send_if_modified(|state| {
            if *state == ConnectionState::Connecting {
                *state = ConnectionState::Connected;
                return true;
            }
            false
        });
        self.admission.open();
    }

    /// Logs the failure, then closes the connection for good.
    pub(crate) fn fail_connection(&self, reason: String) {
        error!(%reason, "connection closed");
        let failed = self.close(reason);
        if failed > 0 {
            error!(failed, "failed pending calls");
        }
    }

    /// Closes admission and fails every pending call. Returns how many failed.
    ///
    /// The first reason recorded is kept.
    pub(crate) fn close(&self, reason: String) -> usize {
        self.state.send_if_modified(|state| {
            if matches!(state, ConnectionState::Closed(_)) {
                return false;
            }
            *state = ConnectionState::Closed(reason.clone());
            true
        });
        self.admission.close();
        let error = self.unavailable();
        self.registry.fail_all(&error)
    }

    pub(crate) fn closed_reason(&self) -> Option<String> {
        match &*self.state.borrow() {
            ConnectionState::Closed(reason) => Some(reason.clone()),
            _ => None,
        }
    }

    pub(crate) fn unavailable(&self) -> BackendError {
        BackendError::Transport(
            self.closed_reason().unwrap_or_else(|| "connection unavailable".to_string()),
        )
    }
}

/// A JSON-RPC client multiplexed over one stream socket.
pub struct IpcTransport {
    shared: Arc<Shared>,
    outbound: mpsc::UnboundedSender<Outbound>,
    ids: RequestIdGenerator,
    endpoint: String,
    driver: JoinHandle<()>,
}

impl IpcTransport {
    /// Starts connecting to `address` in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(address: SocketAddress, config: IpcConfig) -> Result<Self> {
        Self::with_connector(Arc::new(address), config)
    }

    /// Starts connecting through `connector` in the background.
    pub fn with_connector(connector: Arc<dyn Connector>, config: IpcConfig) -> Result<Self> {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            BackendError::Configuration(format!("IpcTransport needs a tokio runtime: {}", e))
        })?;

        let endpoint = connector.endpoint();
        let ids = RequestIdGenerator::new(&config.prefix);
        let (state, _) = watch::channel(ConnectionState::Connecting);
        let shared = Arc::new(Shared {
            registry: PendingRegistry::new(config.max_pending),
            admission: AdmissionQueue::paused(config.concurrency),
            config,
            state,
        });
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let driver = runtime.spawn(driver::run(Arc::clone(&shared), connector, outbound_rx));

        debug!(%endpoint, prefix = ids.prefix(), "transport created");
        Ok(Self { shared, outbound, ids, endpoint, driver })
    }

    /// Sends `method` with `params` and waits for the matching reply.
    ///
    /// `params` must be an array or object; `null` is sent as `[]`. Returns
    /// the reply's `result` member unchanged.
    pub async fn invoke(&self, method: &str, params: Value) -> Result<Value> {
        if method.is_empty() {
            return Err(BackendError::InvalidArgument("method name must not be empty".into()));
        }
        let params = normalize_params(params)?;
        let id = self.ids.next_id();
        let body = serde_json::to_vec(&JsonRpcRequest::new(method, &params, &id))?;
        if contains_delimiter(&body, &self.shared.config.delimiter) {
            return Err(BackendError::InvalidArgument(format!(
                "serialized {} request contains the message delimiter",
                method
            )));
        }

        let pending = self.shared.registry.register(id.clone())?;
        if self.shared.closed_reason().is_some() {
            return Err(self.shared.unavailable());
        }
        debug!(%id, method, "dispatching");

        let frame = Bytes::from(body);
        let sent = self
            .shared
            .admission
            .admit(|slot| self.outbound.send(Outbound { id, frame, slot }))
            .await;
        if !matches!(sent, Some(Ok(()))) {
            return Err(self.shared.unavailable());
        }

        pending.wait().await
    }

    /// Waits until the connection is up, or fails with the reason it never
    /// came up or went away.
    pub async fn wait_connected(&self) -> Result<()> {
        let mut state = self.shared.state.subscribe();
        loop {
            let current = state.borrow_and_update().clone();
            match current {
                ConnectionState::Connected => return Ok(()),
                ConnectionState::Closed(reason) => return Err(BackendError::Transport(reason)),
                ConnectionState::Connecting => {}
            }
            if state.changed().await.is_err() {
                return Err(self.shared.unavailable());
            }
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState { self.shared.state.borrow().clone() }

    /// Whether requests are currently flowing.
    pub fn is_connected(&self) -> bool { self.state() == ConnectionState::Connected }

    /// Number of calls awaiting a reply.
    pub fn pending_calls(&self) -> usize { self.shared.registry.len() }

    /// Ids of calls awaiting a reply, oldest first.
    pub fn pending_ids(&self) -> Vec<String> { self.shared.registry.ids() }

    /// Registry counters.
    pub fn registry_stats(&self) -> RegistryStats { self.shared.registry.stats() }

    /// Requests admitted but not yet fully written.
    pub fn in_flight_requests(&self) -> usize { self.shared.admission.in_flight() }

    /// Calls waiting for admission.
    pub fn queued_calls(&self) -> usize { self.shared.admission.waiting() }

    /// Fails every call that has been waiting for at least `max_age`.
    ///
    /// Returns the expired ids. Replies that arrive for them later are
    /// ignored.
    pub fn expire_pending(&self, max_age: Duration) -> Vec<String> {
        let expired = self.shared.registry.expire_older_than(max_age);
        if !expired.is_empty() {
            info!(count = expired.len(), ?max_age, "expired pending calls");
        }
        expired
    }

    /// Closes the connection and fails every pending and queued call.
    pub fn shutdown(&self) {
        let failed = self.shared.close(format!("Transport to {} shut down", self.endpoint));
        self.driver.abort();
        info!(endpoint = %self.endpoint, failed, "transport shut down");
    }
}

impl Drop for IpcTransport {
    fn drop(&mut self) { self.driver.abort(); }
}

impl std::fmt::Debug for IpcTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpcTransport")
            .field("endpoint", &self.endpoint)
            .field("prefix", &self.ids.prefix())
            .field("state", &self.state())
            .field("pending", &self.pending_calls())
            .finish()
    }
}

#[async_trait]
impl Transport for IpcTransport {
    async fn send(&self, method: &str, params: Value) -> Result<Value> {
        self.invoke(method, params).await
    }

    fn endpoint(&self) -> &str { &self.endpoint }
}
