//! # Helper Transport Port
//!
//! The listener/connection pair the dispatcher serves. Adapters own the
//! framing; the dispatcher only ever sees whole request frames and hands
//! back whole reply envelopes (handles included, carried out-of-band by
//! adapters that support them).

use async_trait::async_trait;
use gatehouse_protocol::{CallerCredentials, ReplyEnvelope, RequestFrame, TransportError};

/// One accepted peer connection.
///
/// Messages on a single connection are consumed one at a time; the
/// dispatcher never calls `next_request` concurrently with itself.
#[async_trait]
pub trait HelperConnection: Send {
    /// The peer's OS-reported credentials, captured at accept time.
    fn peer_credentials(&self) -> CallerCredentials;

    /// The next inbound request, or `None` once the peer has disconnected
    /// cleanly.
    async fn next_request(&mut self) -> Result<Option<RequestFrame>, TransportError>;

    /// Deliver a reply, including any attached out-handles.
    async fn send_reply(&mut self, reply: ReplyEnvelope) -> Result<(), TransportError>;
}

/// A listening endpoint producing connections.
#[async_trait]
pub trait HelperListener: Send {
    /// The next inbound connection, or `None` once the listener has shut
    /// down.
    async fn accept(&mut self) -> Result<Option<Box<dyn HelperConnection>>, TransportError>;
}
