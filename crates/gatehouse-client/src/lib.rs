//! # Gatehouse Client
//!
//! The application-side half of a Gatehouse helper deployment. A
//! [`HelperClient`] builds request envelopes, externalizes the caller's
//! authorization per request, and keeps the two failure planes apart for
//! the caller:
//!
//! - **transport failed**: no reply at all ([`ClientError::Transport`]);
//! - **command failed**: the helper replied with a populated error envelope
//!   ([`ClientError::Command`]).
//!
//! Callers must be prepared for both. The client also tracks whether the
//! connection has gone persistent: once a reply carries the
//! can-accept-further-input flag, further traffic uses [`HelperClient::send`]
//! and skips command names and authorization entirely.

use std::sync::Arc;

use async_trait::async_trait;
use gatehouse_protocol::{
    wire, ErrorEnvelope, OutHandle, ReplyEnvelope, RequestEnvelope, RequestFrame, StructuredMap,
    StructuredValue, TransportError,
};
use thiserror::Error;
use tracing::debug;

/// The caller's source of externalized authorization tokens.
///
/// Implementations wrap the OS broker's create/externalize pair; test fakes
/// return a fixed blob.
pub trait ClientAuthorization: Send + Sync {
    /// Externalize the caller's authorization for one request.
    fn externalize(&self) -> Result<Vec<u8>, AuthorizationError>;
}

/// The caller's authorization could not be created or externalized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("authorization unavailable: {0}")]
pub struct AuthorizationError(pub String);

/// A client-side connection to a helper: one request in flight at a time,
/// replies delivered in request order.
#[async_trait]
pub trait ClientTransport: Send {
    /// Send a request and wait for its reply.
    async fn roundtrip(&mut self, frame: RequestFrame) -> Result<ReplyEnvelope, TransportError>;
}

/// Why a command invocation failed on the client side.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The transport itself failed; no reply was received.
    #[error("transport failure")]
    Transport(#[from] TransportError),

    /// The caller's authorization could not be externalized; nothing was
    /// sent.
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    /// The helper replied, and the reply reports a failure.
    #[error("helper reported {0}")]
    Command(ErrorEnvelope),

    /// The reply answers a different request than the one sent.
    #[error("reply answers a different request")]
    CorrelationMismatch,

    /// The reply's error slot held something other than an error envelope.
    #[error("helper reply was malformed")]
    MalformedReply,

    /// [`HelperClient::execute`] on a connection that has gone persistent.
    #[error("connection is persistent; command dispatch no longer applies")]
    AlreadyPersistent,

    /// [`HelperClient::send`] on a connection that is not persistent.
    #[error("connection is not persistent")]
    NotPersistent,
}

/// A successful reply.
#[derive(Debug)]
pub struct CommandResponse {
    /// The decoded response payload; an empty map when the handler set
    /// nothing.
    pub body: StructuredValue,
    /// Out-of-band handles delivered with the reply.
    pub handles: Vec<OutHandle>,
    /// True when this reply upgraded (or confirmed) the connection as
    /// persistent.
    pub persistent: bool,
}

/// Client endpoint for one helper connection.
pub struct HelperClient<T: ClientTransport> {
    transport: T,
    authorization: Arc<dyn ClientAuthorization>,
    persistent: bool,
}

impl<T: ClientTransport> HelperClient<T> {
    /// Wrap a connected transport.
    #[must_use]
    pub fn new(transport: T, authorization: Arc<dyn ClientAuthorization>) -> Self {
        Self {
            transport,
            authorization,
            persistent: false,
        }
    }

    /// True once the helper has flagged this connection persistent.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    /// Invoke a named command with full per-request authorization.
    pub async fn execute(
        &mut self,
        command: &str,
        body: Option<StructuredValue>,
    ) -> Result<CommandResponse, ClientError> {
        if self.persistent {
            return Err(ClientError::AlreadyPersistent);
        }
        let token = self.authorization.externalize()?;
        let envelope = RequestEnvelope {
            command: Some(command.to_owned()),
            authorization: Some(token),
            body: body.map(wire::encode),
        };
        self.roundtrip(envelope).await
    }

    /// Send a follow-up payload on a persistent connection. No command
    /// name, no authorization; the upgrade already authorized the
    /// connection's remaining lifetime.
    pub async fn send(
        &mut self,
        body: Option<StructuredValue>,
    ) -> Result<CommandResponse, ClientError> {
        if !self.persistent {
            return Err(ClientError::NotPersistent);
        }
        let envelope = RequestEnvelope {
            command: None,
            authorization: None,
            body: body.map(wire::encode),
        };
        self.roundtrip(envelope).await
    }

    async fn roundtrip(&mut self, envelope: RequestEnvelope) -> Result<CommandResponse, ClientError> {
        let frame = RequestFrame::new(envelope);
        let request_id = frame.message_id;
        let reply = self.transport.roundtrip(frame).await?;

        if reply.in_reply_to != request_id {
            return Err(ClientError::CorrelationMismatch);
        }

        // Track persistence before inspecting the outcome: an error on a
        // persistent connection does not demote it.
        self.persistent = reply.can_accept_further_input;

        if let Some(error) = reply.error {
            debug!("helper reported an error");
            return match wire::decode(error) {
                StructuredValue::Error(envelope) => Err(ClientError::Command(envelope)),
                _ => Err(ClientError::MalformedReply),
            };
        }

        let body = reply
            .response
            .map(wire::decode)
            .unwrap_or_else(|| StructuredValue::Map(StructuredMap::new()));
        Ok(CommandResponse {
            body,
            handles: reply.handles,
            persistent: self.persistent,
        })
    }
}
