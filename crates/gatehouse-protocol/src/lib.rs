//! # Gatehouse Protocol
//!
//! The shared vocabulary of every Gatehouse helper and client: the
//! structured value model, the wire codec, the request/reply envelopes, and
//! the identity/capability types that cross the IPC boundary.
//!
//! ## Layering
//!
//! - **Value model** (`value`): the recursive [`StructuredValue`] union and
//!   [`ErrorEnvelope`], the one shape every failure takes when it crosses
//!   the boundary.
//! - **Wire codec** (`wire`): total, bidirectional translation between the
//!   value model and the wire's native kinds, including the two reserved
//!   map shapes (URL, error envelope).
//! - **Envelopes** (`envelope`): the request/reply frames, reserved message
//!   keys, and the protocol's hard size limits.
//! - **Identity** (`credentials`, `handle`): caller credentials as reported
//!   by transports, opaque authorization tokens, and owned out-of-band
//!   handles.
//! - **Transport faults** (`transport`): the error vocabulary every
//!   endpoint implementation reports through.
//!
//! This crate is deliberately runtime-free: no async, no OS integration.
//! Both `gatehouse-helper` and `gatehouse-client` build on it.

pub mod credentials;
pub mod envelope;
pub mod handle;
pub mod transport;
pub mod value;
pub mod wire;

pub use credentials::{AuthorizationToken, CallerCredentials};
pub use envelope::{
    command_name_within_limit, ReplyEnvelope, ReplyFrame, RequestEnvelope, RequestFrame,
    MAX_COMMAND_NAME_UTF16, MAX_EXTERNAL_TOKEN_LEN, MAX_FRAME_BYTES, MAX_HANDLES_PER_MESSAGE,
};
#[cfg(feature = "test-utils")]
pub use handle::HandleProbe;
pub use handle::OutHandle;
pub use transport::TransportError;
pub use value::{
    error_codes, ErrorEnvelope, StructuredMap, StructuredValue, GATEHOUSE_ERROR_DOMAIN,
    POSIX_ERROR_DOMAIN,
};
pub use wire::{decode, encode, WireValue, RESERVED_ERROR_KEY, RESERVED_URL_KEY};
