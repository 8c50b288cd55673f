//! The uniform Lightning node contract and the backend registry.
//!
//! Every supported implementation provides a [`LightningBackend`] and a row
//! in [`REGISTERED_BACKENDS`]; [`build_backend`] picks the row matching the
//! configuration's `kind`.

use async_trait::async_trait;
use bitcoin::secp256k1::PublicKey;
use config::BackendConfig;
use transport::{BackendError, Result};
use types::{ChannelOpening, Implementation, InvoiceExtra, OpenChannelRequest, Payment};

use crate::core_lightning::rpc_client::CoreLightningBackend;
use crate::lnd::rpc_client::LndBackend;

/// Node control operations shared by every backend.
///
/// Results are built only from replies that passed shape validation; a
/// reply missing a required field fails with
/// [`BackendError::UnexpectedResponse`].
#[async_trait]
pub trait LightningBackend: Send + Sync {
    /// Which implementation this backend drives.
    fn implementation(&self) -> Implementation;

    /// `pubkey@host:port` URI peers use to reach the node.
    async fn get_node_uri(&self) -> Result<String>;

    /// Opens a channel to `request.remote_id`.
    ///
    /// # Errors
    /// [`BackendError::InvalidArgument`] if the remote id is not a public key
    /// or the amounts overflow.
    async fn open_channel(&self, request: &OpenChannelRequest) -> Result<ChannelOpening>;

    /// Pays a BOLT11 invoice.
    async fn pay_invoice(&self, invoice: &str) -> Result<Payment>;

    /// Creates an invoice for `amount_msat` and returns its BOLT11 string.
    async fn add_invoice(&self, amount_msat: u64, extra: &InvoiceExtra) -> Result<String>;
}

/// Builder function stored in the registry.
pub type BuildFn = fn(&BackendConfig) -> Result<Box<dyn LightningBackend>>;

/// Provider-based backend registration
pub struct RegisteredBackend {
    /// The implementation of the backend
    pub implementation: Implementation,
    /// The function to build the backend
    pub build: BuildFn,
}

/// Trait for providing a backend
pub trait BackendProvider {
    /// The implementation of the backend
    fn implementation() -> Implementation;
    /// Builds the backend from a configuration of the matching `kind`
    fn build(config: &BackendConfig) -> Result<Box<dyn LightningBackend>>;
}

/// Registered backends
pub static REGISTERED_BACKENDS: &[RegisteredBackend] = &[
    RegisteredBackend {
        implementation: Implementation::CoreLightning,
        build: <CoreLightningBackend as BackendProvider>::build,
    },
    RegisteredBackend {
        implementation: Implementation::Lnd,
        build: <LndBackend as BackendProvider>::build,
    },
];

/// Validates `config` and builds the backend it names.
///
/// # Errors
/// [`BackendError::Configuration`] when a required option is missing or no
/// backend is registered for the configured implementation.
pub fn build_backend(config: &BackendConfig) -> Result<Box<dyn LightningBackend>> {
    config.validate()?;
    let implementation = config.implementation();
    let entry = REGISTERED_BACKENDS.iter().find(|r| r.implementation == implementation).ok_or_else(
        || BackendError::Configuration(format!("No backend registered for {}", implementation)),
    )?;
    tracing::info!(backend = implementation.display_name(), "building Lightning backend");
    (entry.build)(config)
}

/// Rejects anything that is not a hex-encoded secp256k1 public key.
pub fn validate_node_id(remote_id: &str) -> Result<PublicKey> {
    remote_id.parse::<PublicKey>().map_err(|e| {
        BackendError::InvalidArgument(format!("Invalid remote node id \"{}\": {}", remote_id, e))
    })
}

pub(crate) fn mismatched(expected: Implementation, config: &BackendConfig) -> BackendError {
    BackendError::Configuration(format!(
        "Expected {} options, got {}",
        expected.as_str(),
        config.implementation().as_str()
    ))
}
