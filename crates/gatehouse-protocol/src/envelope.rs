//! # Message Envelopes
//!
//! The request/reply pair carried by every transport, plus the protocol's
//! hard size limits. Field names serialize under reserved reverse-DNS keys
//! so that frames from any Gatehouse generation stay recognizable on the
//! wire.
//!
//! A reply is always tied to the message it answers via `in_reply_to`;
//! transports deliver replies on a connection in request order, so the id is
//! a correctness check rather than a reordering mechanism.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::handle::OutHandle;
use crate::wire::WireValue;

/// Upper bound on a command name, counted in UTF-16 code units. Bounds the
/// memory spent validating an untrusted string before any authorization has
/// happened.
pub const MAX_COMMAND_NAME_UTF16: usize = 1024;

/// Exact size of an externalized authorization token blob. Receivers must
/// reject anything larger before copying.
pub const MAX_EXTERNAL_TOKEN_LEN: usize = 32;

/// Upper bound on a serialized frame, enforced by transports.
pub const MAX_FRAME_BYTES: usize = 256 * 1024;

/// Upper bound on out-of-band handles attached to a single reply.
pub const MAX_HANDLES_PER_MESSAGE: usize = 16;

/// True when `name` fits within [`MAX_COMMAND_NAME_UTF16`].
#[must_use]
pub fn command_name_within_limit(name: &str) -> bool {
    // Counting UTF-16 units is O(len) and allocation-free; the limit exists
    // to bound work on untrusted input, so avoid materializing anything.
    name.encode_utf16().take(MAX_COMMAND_NAME_UTF16 + 1).count() <= MAX_COMMAND_NAME_UTF16
}

/// The client-to-helper half of a message exchange.
///
/// On a persistent connection every field may be absent: the payload routes
/// straight to the installed handler without re-authentication.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Name of the command to invoke. Required on ephemeral connections.
    #[serde(rename = "com.gatehouse.command", default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Externalized authorization token. Required on ephemeral connections;
    /// at most [`MAX_EXTERNAL_TOKEN_LEN`] bytes.
    #[serde(rename = "com.gatehouse.authorization", default, skip_serializing_if = "Option::is_none")]
    pub authorization: Option<Vec<u8>>,

    /// Command payload, already in wire form. Absent decodes as null.
    #[serde(rename = "com.gatehouse.request", default, skip_serializing_if = "Option::is_none")]
    pub body: Option<WireValue>,
}

/// A request plus the correlation id the transport stamped on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFrame {
    /// Correlation id echoed back in the reply.
    #[serde(rename = "com.gatehouse.message-id")]
    pub message_id: Uuid,

    /// The request itself.
    #[serde(flatten)]
    pub envelope: RequestEnvelope,
}

impl RequestFrame {
    /// Stamp a fresh correlation id onto an envelope.
    #[must_use]
    pub fn new(envelope: RequestEnvelope) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            envelope,
        }
    }
}

/// The helper-to-client half of a message exchange, as held in memory.
///
/// Owns any out-of-band handles until the transport attaches them; handles
/// never ride inside the serialized frame.
#[derive(Debug)]
pub struct ReplyEnvelope {
    /// Correlation id of the request this answers.
    pub in_reply_to: Uuid,
    /// Successful response payload, when the command produced one.
    pub response: Option<WireValue>,
    /// Error envelope in wire form, when anything failed.
    pub error: Option<WireValue>,
    /// True once the connection has gone persistent and will accept further
    /// payloads without re-authentication.
    pub can_accept_further_input: bool,
    /// Handles to deliver out-of-band alongside the frame.
    pub handles: Vec<OutHandle>,
}

impl ReplyEnvelope {
    /// An empty reply correlated to `request_id`.
    #[must_use]
    pub fn for_request(request_id: Uuid) -> Self {
        Self {
            in_reply_to: request_id,
            response: None,
            error: None,
            can_accept_further_input: false,
            handles: Vec::new(),
        }
    }

    /// True when the error slot is populated.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Split into the serializable frame and the handles to send
    /// out-of-band. The frame records how many handles to expect.
    #[must_use]
    pub fn into_frame(self) -> (ReplyFrame, Vec<OutHandle>) {
        let frame = ReplyFrame {
            in_reply_to: self.in_reply_to,
            response: self.response,
            error: self.error,
            can_accept_further_input: self.can_accept_further_input,
            handle_count: self.handles.len() as u32,
        };
        (frame, self.handles)
    }

    /// Reassemble from a received frame and the handles that arrived with
    /// it. Trusts the transport to have matched `handle_count` already.
    #[must_use]
    pub fn from_frame(frame: ReplyFrame, handles: Vec<OutHandle>) -> Self {
        Self {
            in_reply_to: frame.in_reply_to,
            response: frame.response,
            error: frame.error,
            can_accept_further_input: frame.can_accept_further_input,
            handles,
        }
    }
}

/// The serializable part of a reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyFrame {
    /// Correlation id of the request this answers.
    #[serde(rename = "com.gatehouse.in-reply-to")]
    pub in_reply_to: Uuid,

    /// Successful response payload.
    #[serde(rename = "com.gatehouse.response", default, skip_serializing_if = "Option::is_none")]
    pub response: Option<WireValue>,

    /// Error envelope in wire form.
    #[serde(rename = "com.gatehouse.error", default, skip_serializing_if = "Option::is_none")]
    pub error: Option<WireValue>,

    /// Persistent-connection signal.
    #[serde(rename = "com.gatehouse.can-accept-further-input", default)]
    pub can_accept_further_input: bool,

    /// Number of out-of-band handles accompanying this frame.
    #[serde(rename = "com.gatehouse.descriptor-count", default)]
    pub handle_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_name_limit_counts_utf16_units() {
        assert!(command_name_within_limit("GetVersion"));
        assert!(command_name_within_limit(&"a".repeat(MAX_COMMAND_NAME_UTF16)));
        assert!(!command_name_within_limit(
            &"a".repeat(MAX_COMMAND_NAME_UTF16 + 1)
        ));
        // Surrogate pairs count as two units each.
        assert!(!command_name_within_limit(&"𝄞".repeat(513)));
    }

    #[test]
    fn request_frame_serializes_under_reserved_keys() {
        let frame = RequestFrame::new(RequestEnvelope {
            command: Some("GetVersion".into()),
            authorization: Some(vec![0; 4]),
            body: None,
        });
        let json = serde_json::to_value(&frame).expect("serialize");
        assert!(json.get("com.gatehouse.command").is_some());
        assert!(json.get("com.gatehouse.authorization").is_some());
        assert!(json.get("com.gatehouse.request").is_none());
    }

    #[test]
    fn reply_round_trips_through_frame() {
        let mut reply = ReplyEnvelope::for_request(Uuid::nil());
        reply.response = Some(WireValue::Bool(true));
        reply.can_accept_further_input = true;
        let (frame, handles) = reply.into_frame();
        assert_eq!(frame.handle_count, 0);
        let back = ReplyEnvelope::from_frame(frame, handles);
        assert_eq!(back.in_reply_to, Uuid::nil());
        assert!(back.can_accept_further_input);
        assert!(!back.is_error());
    }
}
