//! Response shape validation.
//!
//! Each backend operation declares the fields its raw reply must carry and
//! the JSON type of each. A reply is checked against its schema before any
//! field is read from it; the first missing or mistyped field is reported as
//! [`BackendError::UnexpectedResponse`] naming the operation and the field.

use serde_json::Value;
use transport::{json_type_name, BackendError, Result};

/// JSON type a required field must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// JSON string
    String,
    /// JSON number
    Number,
    /// `true` or `false`
    Boolean,
    /// JSON object
    Object,
    /// JSON array
    Array,
}

impl FieldKind {
    /// Whether `value` has this kind.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Number => value.is_number(),
            FieldKind::Boolean => value.is_boolean(),
            FieldKind::Object => value.is_object(),
            FieldKind::Array => value.is_array(),
        }
    }
}

/// One required field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    /// Field name in the reply object
    pub name: &'static str,
    /// Expected type
    pub kind: FieldKind,
}

/// Required fields of one operation's reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseSchema {
    /// Operation label used in errors, e.g. `POST /v1/channels` or `pay`
    pub operation: &'static str,
    /// Fields checked in order
    pub fields: &'static [FieldRule],
}

const fn rule(name: &'static str, kind: FieldKind) -> FieldRule { FieldRule { name, kind } }

/// LND `GET /v1/getinfo`.
pub const LND_GET_INFO: ResponseSchema = ResponseSchema {
    operation: "GET /v1/getinfo",
    fields: &[
        rule("alias", FieldKind::String),
        rule("identity_pubkey", FieldKind::String),
        rule("uris", FieldKind::Array),
    ],
};

/// LND `POST /v1/channels`, after `funding_txid_str` has been derived.
pub const LND_OPEN_CHANNEL: ResponseSchema = ResponseSchema {
    operation: "POST /v1/channels",
    fields: &[rule("output_index", FieldKind::Number), rule("funding_txid_str", FieldKind::String)],
};

/// LND `POST /v1/channels/transactions`.
pub const LND_PAY_INVOICE: ResponseSchema = ResponseSchema {
    operation: "POST /v1/channels/transactions",
    fields: &[
        rule("payment_preimage", FieldKind::String),
        rule("payment_hash", FieldKind::String),
        rule("payment_route", FieldKind::Object),
    ],
};

/// LND `POST /v1/invoices`.
pub const LND_ADD_INVOICE: ResponseSchema = ResponseSchema {
    operation: "POST /v1/invoices",
    fields: &[rule("payment_request", FieldKind::String)],
};

/// Core Lightning `fundchannel`.
pub const CLN_FUND_CHANNEL: ResponseSchema = ResponseSchema {
    operation: "fundchannel",
    fields: &[rule("txid", FieldKind::String), rule("outnum", FieldKind::Number)],
};

/// Core Lightning `pay`.
pub const CLN_PAY: ResponseSchema = ResponseSchema {
    operation: "pay",
    fields: &[rule("payment_preimage", FieldKind::String), rule("payment_hash", FieldKind::String)],
};

/// Core Lightning `invoice`.
pub const CLN_INVOICE: ResponseSchema =
    ResponseSchema { operation: "invoice", fields: &[rule("bolt11", FieldKind::String)] };

impl ResponseSchema {
    /// Checks `reply` against every rule.
    pub fn validate(&self, reply: &Value) -> Result<()> {
        for field in self.fields {
            match reply.get(field.name) {
                Some(value) if field.kind.matches(value) => {}
                found => {
                    tracing::warn!(
                        operation = self.operation,
                        field = field.name,
                        expected = ?field.kind,
                        found = found.map(json_type_name).unwrap_or("nothing"),
                        "reply failed shape validation"
                    );
                    return Err(self.unexpected(field.name));
                }
            }
        }
        Ok(())
    }

    /// The error for `field` of this operation.
    pub fn unexpected(&self, field: &str) -> BackendError {
        BackendError::unexpected(self.operation, field)
    }

    /// Reads a string field, failing on absent or empty.
    pub fn non_empty_str<'a>(&self, reply: &'a Value, field: &str) -> Result<&'a str> {
        reply
            .get(field)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| self.unexpected(field))
    }

    /// Reads a non-negative integer field.
    pub fn u64_field(&self, reply: &Value, field: &str) -> Result<u64> {
        reply.get(field).and_then(Value::as_u64).ok_or_else(|| self.unexpected(field))
    }
}
