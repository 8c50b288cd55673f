// SPDX-License-Identifier: CC0-1.0

//! lnbridge umbrella crate.
//!
//! This crate primarily serves as the workspace root and re-exports the
//! crates a consumer needs to build and drive a backend.
//!
//! All functional code lives in the workspace member crates under
//! `adapters`, `backends`, and `primitives`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::unwrap_used)]
#![warn(deprecated_in_future)]
#![doc(test(attr(warn(unused))))]

pub use adapters::{build_backend, CoreLightningBackend, LightningBackend, LndBackend};
pub use config::{BackendConfig, Config};
pub use transport::{BackendError, Result};
pub use types::{ChannelOpening, Implementation, InvoiceExtra, OpenChannelRequest, Payment};

/// Miscellaneous metadata about the lnbridge workspace.
pub mod lnbridge_meta {
    /// Version string for the umbrella crate, as reported by Cargo.
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}
