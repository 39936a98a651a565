//! # Structured Value Model
//!
//! The recursive value model exchanged between a helper and its clients.
//! A `StructuredValue` is built fresh for every message, handed to the wire
//! codec immutably, and never shared across messages.
//!
//! Two variants have no native wire representation and ride inside reserved
//! map shapes instead: [`StructuredValue::Url`] and
//! [`StructuredValue::Error`]. See the `wire` module for the codec contract.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// String-keyed map of structured values. Insertion order is irrelevant.
pub type StructuredMap = BTreeMap<String, StructuredValue>;

/// Error domain used for failures raised by the helper runtime itself.
pub const GATEHOUSE_ERROR_DOMAIN: &str = "com.gatehouse.helper";

/// Error domain used when bridging POSIX/IO failures into an envelope.
pub const POSIX_ERROR_DOMAIN: &str = "posix";

/// Codes used with [`GATEHOUSE_ERROR_DOMAIN`].
///
/// Broker denials keep the broker's own domain and status code; these codes
/// cover failures the runtime detects on its own.
pub mod error_codes {
    /// The request named a command the registry does not know.
    pub const UNKNOWN_COMMAND: i64 = 1;
    /// The request envelope was missing a required field or exceeded a limit.
    pub const MALFORMED_ENVELOPE: i64 = 2;
    /// The peer's code identity did not satisfy the command's requirement.
    pub const IDENTITY_CHECK_FAILED: i64 = 3;
    /// The privilege broker refused the command's right.
    pub const AUTHORIZATION_DENIED: i64 = 4;
    /// The command handler failed without supplying its own envelope.
    pub const HANDLER_FAILURE: i64 = 5;
    /// A reply could not be constructed or sent.
    pub const TRANSPORT_FAILURE: i64 = 6;
}

/// A tagged union of every value kind that may cross the IPC boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum StructuredValue {
    /// Explicit null.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed 64-bit integer. All integer kinds narrow to this on the wire.
    Int64(i64),
    /// IEEE 754 double.
    Double(f64),
    /// Instant as nanoseconds since the Unix epoch.
    DateTime(i64),
    /// Opaque byte buffer.
    Bytes(Vec<u8>),
    /// UTF-8 string.
    String(String),
    /// 16-byte UUID.
    Uuid(Uuid),
    /// Ordered sequence.
    Array(Vec<StructuredValue>),
    /// String-keyed map.
    Map(StructuredMap),
    /// Absolute URL in string form. Encoded as a reserved map shape.
    Url(String),
    /// A failure crossing the IPC boundary. Encoded as a reserved map shape.
    Error(ErrorEnvelope),
}

impl StructuredValue {
    /// Returns the contained string, if this is a `String`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the contained integer, if this is an `Int64`.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int64(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the contained boolean, if this is a `Bool`.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the contained map, if this is a `Map`.
    #[must_use]
    pub fn as_map(&self) -> Option<&StructuredMap> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Returns the contained array, if this is an `Array`.
    #[must_use]
    pub fn as_array(&self) -> Option<&[StructuredValue]> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Returns the contained error envelope, if this is an `Error`.
    #[must_use]
    pub fn as_error(&self) -> Option<&ErrorEnvelope> {
        match self {
            Self::Error(e) => Some(e),
            _ => None,
        }
    }
}

impl From<bool> for StructuredValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for StructuredValue {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<f64> for StructuredValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<&str> for StructuredValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for StructuredValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<u8>> for StructuredValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<Uuid> for StructuredValue {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

impl From<StructuredMap> for StructuredValue {
    fn from(value: StructuredMap) -> Self {
        Self::Map(value)
    }
}

impl From<Vec<StructuredValue>> for StructuredValue {
    fn from(value: Vec<StructuredValue>) -> Self {
        Self::Array(value)
    }
}

impl From<ErrorEnvelope> for StructuredValue {
    fn from(value: ErrorEnvelope) -> Self {
        Self::Error(value)
    }
}

/// A failure crossing the IPC boundary: a domain/code/context triple.
///
/// Every error the helper reports to a client, and every error a handler
/// returns, is representable as one of these. The `user_info` map carries
/// whatever context the producing side attached.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{domain} error {code}")]
pub struct ErrorEnvelope {
    /// Reverse-DNS style namespace identifying who produced the code.
    pub domain: String,
    /// Domain-specific error code.
    pub code: i64,
    /// Additional context, keyed by producer-defined strings.
    pub user_info: StructuredMap,
}

impl ErrorEnvelope {
    /// Create an envelope with an empty `user_info` map.
    #[must_use]
    pub fn new(domain: impl Into<String>, code: i64) -> Self {
        Self {
            domain: domain.into(),
            code,
            user_info: StructuredMap::new(),
        }
    }

    /// Attach a context entry, builder-style.
    #[must_use]
    pub fn with_info(mut self, key: impl Into<String>, value: StructuredValue) -> Self {
        self.user_info.insert(key.into(), value);
        self
    }

    /// Attach a human-readable description under the conventional key.
    #[must_use]
    pub fn with_description(self, description: impl fmt::Display) -> Self {
        self.with_info(
            "description",
            StructuredValue::String(description.to_string()),
        )
    }
}

impl From<std::io::Error> for ErrorEnvelope {
    /// Bridge an IO failure into the POSIX error domain, so handlers can
    /// propagate OS errors with `?`. Errors without a raw OS code map to
    /// code 0 with the message preserved in `user_info`.
    fn from(err: std::io::Error) -> Self {
        let code = i64::from(err.raw_os_error().unwrap_or(0));
        ErrorEnvelope::new(POSIX_ERROR_DOMAIN, code).with_description(&err)
    }
}
