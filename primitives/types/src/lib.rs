#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::unwrap_used)]

//! Core Types for lnbridge
//!
//! This crate defines the request and result shapes of the uniform Lightning
//! node contract, independent of the wire protocol a backend speaks. Results
//! keep the raw (already validated) reply next to the typed fields, so callers
//! that need backend-specific extras can still reach them.

use bitcoin::Amount;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Type-safe implementation names for Lightning node backends.
///
/// This module provides the `Implementation` enum that identifies the
/// supported node implementations (Core Lightning, LND) together with the
/// static metadata each one carries.
pub mod implementation;
/// Re-export the `Implementation` enum for convenience.
pub use implementation::Implementation;

/// Millisatoshis per satoshi.
pub const MSAT_PER_SAT: u64 = 1_000;

/// Converts a satoshi amount to millisatoshis.
///
/// Returns `None` on overflow.
pub fn sat_to_msat(amount: Amount) -> Option<u64> { amount.to_sat().checked_mul(MSAT_PER_SAT) }

/// Parameters for opening a channel to a remote node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenChannelRequest {
    /// Hex-encoded compressed public key of the remote node
    pub remote_id: String,
    /// Amount committed to the channel by the local node
    pub local_amount: Amount,
    /// Amount pushed to the remote side on open
    pub push_amount: Amount,
    /// Whether the channel should stay unannounced
    pub private: bool,
}

impl OpenChannelRequest {
    /// Creates a public channel request with nothing pushed to the remote side.
    pub fn new(remote_id: impl Into<String>, local_amount: Amount) -> Self {
        Self { remote_id: remote_id.into(), local_amount, push_amount: Amount::ZERO, private: false }
    }

    /// Sets the amount pushed to the remote side.
    pub fn with_push_amount(mut self, push_amount: Amount) -> Self {
        self.push_amount = push_amount;
        self
    }

    /// Marks the channel as private (unannounced).
    pub fn private(mut self, private: bool) -> Self {
        self.private = private;
        self
    }
}

/// Backend-specific extras for invoice creation.
///
/// Core Lightning uses `description` (and `label` when given); LND commits to
/// `description_hash`, a hex-encoded SHA-256 digest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceExtra {
    /// Free-form invoice description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Hex-encoded SHA-256 of the description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_hash: Option<String>,
    /// Unique invoice label (Core Lightning)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Outcome of a channel open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelOpening {
    /// Funding transaction id, lowercase hex
    pub funding_txid: String,
    /// Funding output index within the funding transaction
    pub output_index: u64,
    /// The validated backend reply
    pub raw: Value,
}

/// Outcome of a successful payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    /// Payment preimage as reported by the backend
    pub payment_preimage: String,
    /// Payment hash as reported by the backend
    pub payment_hash: String,
    /// Route the payment took, when the backend reports one
    pub payment_route: Option<Value>,
    /// The validated backend reply
    pub raw: Value,
}

/// Identity of a node as reported by LND's `getinfo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Node alias
    pub alias: String,
    /// Hex-encoded node public key
    pub identity_pubkey: String,
    /// Advertised `pubkey@host:port` URIs
    pub uris: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sat_to_msat() {
        assert_eq!(sat_to_msat(Amount::from_sat(0)), Some(0));
        assert_eq!(sat_to_msat(Amount::from_sat(21)), Some(21_000));
        assert_eq!(sat_to_msat(Amount::from_sat(u64::MAX)), None);
    }

    #[test]
    fn test_open_channel_request_builder() {
        let request = OpenChannelRequest::new("02ab", Amount::from_sat(100_000))
            .with_push_amount(Amount::from_sat(500))
            .private(true);
        assert_eq!(request.remote_id, "02ab");
        assert_eq!(request.local_amount.to_sat(), 100_000);
        assert_eq!(request.push_amount.to_sat(), 500);
        assert!(request.private);
    }

    #[test]
    fn test_invoice_extra_skips_empty_fields() {
        let extra = InvoiceExtra { description: Some("coffee".into()), ..Default::default() };
        let json = serde_json::to_value(&extra).expect("serialize");
        assert_eq!(json, serde_json::json!({"description": "coffee"}));
    }
}
