//! # Wire Codec
//!
//! Bidirectional codec between [`StructuredValue`] and the wire value model.
//!
//! The wire format natively carries `Null | Bool | Int64 | UInt64 | Double |
//! Date | Bytes | String | Uuid | Array | Map`. Two higher-level variants
//! have no native representation and are smuggled through reserved map
//! shapes instead:
//!
//! - a URL encodes as a single-entry map under [`RESERVED_URL_KEY`];
//! - an error envelope encodes as a map under [`RESERVED_ERROR_KEY`]
//!   wrapping a `{domain, code, userInfo}` map.
//!
//! Decode checks the reserved keys *before* treating a map generically, so
//! round-tripping is lossless for both. A map of unknown shape decodes as a
//! plain map. Both directions are total: there is no error path.
//!
//! Numeric narrowing is deliberate and load-bearing for compatibility:
//! floating-point kinds travel as doubles, every other numeric kind travels
//! as a signed 64-bit integer. Unsigned wire integers therefore decode as
//! `Int64` with wrapping reinterpretation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value::{ErrorEnvelope, StructuredMap, StructuredValue};

/// Reserved map key marking an encoded URL.
pub const RESERVED_URL_KEY: &str = "com.gatehouse.encoded-url";

/// Reserved map key marking an encoded error envelope.
pub const RESERVED_ERROR_KEY: &str = "com.gatehouse.encoded-error";

/// Key of the domain entry inside an encoded error envelope.
pub const ERROR_DOMAIN_KEY: &str = "com.gatehouse.error.domain";

/// Key of the code entry inside an encoded error envelope.
pub const ERROR_CODE_KEY: &str = "com.gatehouse.error.code";

/// Key of the context entry inside an encoded error envelope.
pub const ERROR_USER_INFO_KEY: &str = "com.gatehouse.error.user-info";

/// The value kinds the wire format carries natively.
///
/// `UInt64` never appears in codec *output*; it exists so that wire input
/// produced by other writers still decodes (narrowing to `Int64`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WireValue {
    /// Explicit null.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed 64-bit integer.
    Int64(i64),
    /// Unsigned 64-bit integer (decode-only; narrows to `Int64`).
    UInt64(u64),
    /// IEEE 754 double.
    Double(f64),
    /// Instant as nanoseconds since the Unix epoch.
    Date(i64),
    /// Opaque byte buffer.
    Bytes(Vec<u8>),
    /// UTF-8 string.
    String(String),
    /// 16-byte UUID.
    Uuid(Uuid),
    /// Ordered sequence.
    Array(Vec<WireValue>),
    /// String-keyed map.
    Map(BTreeMap<String, WireValue>),
}

/// Encode a structured value into its wire representation.
///
/// Containers are copied depth-first; arrays preserve order. Total for all
/// inputs.
#[must_use]
pub fn encode(value: StructuredValue) -> WireValue {
    match value {
        StructuredValue::Null => WireValue::Null,
        StructuredValue::Bool(b) => WireValue::Bool(b),
        StructuredValue::Int64(i) => WireValue::Int64(i),
        StructuredValue::Double(d) => WireValue::Double(d),
        StructuredValue::DateTime(ns) => WireValue::Date(ns),
        StructuredValue::Bytes(b) => WireValue::Bytes(b),
        StructuredValue::String(s) => WireValue::String(s),
        StructuredValue::Uuid(u) => WireValue::Uuid(u),
        StructuredValue::Array(items) => {
            WireValue::Array(items.into_iter().map(encode).collect())
        }
        StructuredValue::Map(map) => WireValue::Map(encode_map(map)),
        StructuredValue::Url(url) => {
            let mut wrapper = BTreeMap::new();
            wrapper.insert(RESERVED_URL_KEY.to_owned(), WireValue::String(url));
            WireValue::Map(wrapper)
        }
        StructuredValue::Error(envelope) => encode_error(envelope),
    }
}

/// Decode a wire value back into the structured model.
///
/// Reserved map shapes are checked before generic map handling: the URL key
/// first, then the error key. A map of unknown shape decodes as a plain map.
/// Total for all inputs.
#[must_use]
pub fn decode(value: WireValue) -> StructuredValue {
    match value {
        WireValue::Null => StructuredValue::Null,
        WireValue::Bool(b) => StructuredValue::Bool(b),
        WireValue::Int64(i) => StructuredValue::Int64(i),
        // Deliberate lossy narrowing: the structured model has one integer
        // kind, and it is signed.
        WireValue::UInt64(u) => StructuredValue::Int64(u as i64),
        WireValue::Double(d) => StructuredValue::Double(d),
        WireValue::Date(ns) => StructuredValue::DateTime(ns),
        WireValue::Bytes(b) => StructuredValue::Bytes(b),
        WireValue::String(s) => StructuredValue::String(s),
        WireValue::Uuid(u) => StructuredValue::Uuid(u),
        WireValue::Array(items) => {
            StructuredValue::Array(items.into_iter().map(decode).collect())
        }
        WireValue::Map(map) => decode_map(map),
    }
}

fn encode_map(map: StructuredMap) -> BTreeMap<String, WireValue> {
    // Keys are `String` by construction, so every key re-encodes; a writer
    // with foreign key types would skip unencodable entries here rather
    // than fail the whole message.
    map.into_iter().map(|(k, v)| (k, encode(v))).collect()
}

fn encode_error(envelope: ErrorEnvelope) -> WireValue {
    let mut body = BTreeMap::new();
    body.insert(
        ERROR_DOMAIN_KEY.to_owned(),
        WireValue::String(envelope.domain),
    );
    body.insert(ERROR_CODE_KEY.to_owned(), WireValue::Int64(envelope.code));
    body.insert(
        ERROR_USER_INFO_KEY.to_owned(),
        WireValue::Map(encode_map(envelope.user_info)),
    );

    let mut wrapper = BTreeMap::new();
    wrapper.insert(RESERVED_ERROR_KEY.to_owned(), WireValue::Map(body));
    WireValue::Map(wrapper)
}

fn decode_map(mut map: BTreeMap<String, WireValue>) -> StructuredValue {
    // Reserved shapes win over generic map handling, even when the map
    // carries stray extra keys.
    if matches!(map.get(RESERVED_URL_KEY), Some(WireValue::String(_))) {
        if let Some(WireValue::String(url)) = map.remove(RESERVED_URL_KEY) {
            return StructuredValue::Url(url);
        }
    }
    if matches!(map.get(RESERVED_ERROR_KEY), Some(WireValue::Map(_))) {
        if let Some(WireValue::Map(body)) = map.remove(RESERVED_ERROR_KEY) {
            return StructuredValue::Error(decode_error_body(body));
        }
    }

    StructuredValue::Map(map.into_iter().map(|(k, v)| (k, decode(v))).collect())
}

fn decode_error_body(mut body: BTreeMap<String, WireValue>) -> ErrorEnvelope {
    let domain = match body.remove(ERROR_DOMAIN_KEY) {
        Some(WireValue::String(s)) => s,
        _ => String::new(),
    };
    let code = match body.remove(ERROR_CODE_KEY) {
        Some(WireValue::Int64(i)) => i,
        Some(WireValue::UInt64(u)) => u as i64,
        _ => 0,
    };
    let user_info = match body.remove(ERROR_USER_INFO_KEY) {
        Some(WireValue::Map(m)) => match decode_map(m) {
            StructuredValue::Map(decoded) => decoded,
            other => {
                // A reserved shape inside userInfo; keep it under a
                // synthetic key rather than discard it.
                let mut wrapped = StructuredMap::new();
                wrapped.insert(ERROR_USER_INFO_KEY.to_owned(), other);
                wrapped
            }
        },
        _ => StructuredMap::new(),
    };

    ErrorEnvelope {
        domain,
        code,
        user_info,
    }
}
