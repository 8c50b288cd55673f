#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::unwrap_used)]

//! Lightning Backend Adapters
//!
//! This crate puts Core Lightning and LND behind one [`LightningBackend`]
//! contract: node URI lookup, channel opening, invoice payment and invoice
//! creation. Each backend translates the operation into its own wire
//! protocol (JSON-RPC over the node socket, or REST over TLS), checks the
//! reply against a [`ResponseSchema`], and returns a typed result.
//! Add a backend by implementing [`BackendProvider`] and registering it in
//! [`backend::REGISTERED_BACKENDS`].
//!
//! ## Example
//! ```no_run
//! use adapters::build_backend;
//! use config::{BackendConfig, CoreLightningOptions};
//!
//! # async fn demo() -> transport::Result<()> {
//! let backend = build_backend(&BackendConfig::CoreLightning(CoreLightningOptions {
//!     node_uri: Some("02c6...@127.0.0.1:9735".to_string()),
//!     socket: Some("/home/cln/.lightning/regtest/lightning-rpc".to_string()),
//!     ..CoreLightningOptions::default()
//! }))?;
//! let bolt11 = backend.add_invoice(50_000, &Default::default()).await?;
//! println!("{}", bolt11);
//! # Ok(())
//! # }
//! ```

/// Core Lightning backend over the JSON-RPC socket
pub mod core_lightning {
    /// Core Lightning backend implementation
    pub mod rpc_client;
}

/// LND backend over REST
pub mod lnd {
    /// LND backend implementation
    pub mod rpc_client;
}

pub mod backend;
pub mod validation;

pub use backend::{build_backend, validate_node_id, BackendProvider, LightningBackend};
pub use core_lightning::rpc_client::CoreLightningBackend;
pub use lnd::rpc_client::LndBackend;
pub use validation::{FieldKind, FieldRule, ResponseSchema};
