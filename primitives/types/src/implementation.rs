//! Type-safe implementation names for Lightning node backends.
//!
//! To add a new backend later: add a variant here, a metadata row, and an
//! adapter in `lnbridge-adapters` registered in its backend registry.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lightning node implementations lnbridge can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Implementation {
    /// Core Lightning, JSON-RPC over its UNIX socket
    #[default]
    CoreLightning,
    /// LND, REST over HTTPS
    Lnd,
}

/// Metadata for an implementation variant.
struct ImplementationMetadata {
    as_str: &'static str,
    display_name: &'static str,
    transport_protocol: &'static str,
    example_method: &'static str,
}

impl ImplementationMetadata {
    const fn new(
        as_str: &'static str,
        display_name: &'static str,
        transport_protocol: &'static str,
        example_method: &'static str,
    ) -> Self {
        Self { as_str, display_name, transport_protocol, example_method }
    }
}

const IMPLEMENTATION_METADATA: [ImplementationMetadata; 2] = [
    ImplementationMetadata::new("core_lightning", "Core Lightning", "ipc", "getinfo"),
    ImplementationMetadata::new("lnd", "LND", "https", "GET /v1/getinfo"),
];

impl Implementation {
    /// All known implementations, in registry order.
    pub const ALL: [Implementation; 2] = [Implementation::CoreLightning, Implementation::Lnd];

    fn metadata(&self) -> &'static ImplementationMetadata {
        let index = match self {
            Implementation::CoreLightning => 0,
            Implementation::Lnd => 1,
        };
        &IMPLEMENTATION_METADATA[index]
    }

    /// Get the string representation of the implementation name.
    pub fn as_str(&self) -> &'static str { self.metadata().as_str }

    /// Get the human-readable display name for the implementation.
    pub fn display_name(&self) -> &'static str { self.metadata().display_name }

    /// Get the wire transport used to reach the implementation.
    pub fn transport_protocol(&self) -> &'static str { self.metadata().transport_protocol }

    /// Get a representative call for documentation and smoke tests.
    pub fn example_method(&self) -> &'static str { self.metadata().example_method }
}

impl FromStr for Implementation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "core_lightning" | "c-lightning" | "clightning" => Ok(Implementation::CoreLightning),
            "lnd" => Ok(Implementation::Lnd),
            _ => Err(format!("Unknown implementation name: {}", s)),
        }
    }
}

impl fmt::Display for Implementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.as_str()) }
}
