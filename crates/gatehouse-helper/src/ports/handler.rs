//! # Command Handler SPI
//!
//! The interface application authors implement. A handler receives the
//! authenticated request and a mutable reply builder; it may fill the
//! response map, attach out-handles, install a persistent handler for the
//! connection, or fail.
//!
//! Failure precedence: an error set explicitly on the reply always wins
//! over the handler's returned `Err`. Returning `Err` without touching the
//! reply is the common case and produces that envelope verbatim.

use std::sync::Arc;

use async_trait::async_trait;
use gatehouse_protocol::{
    AuthorizationToken, CallerCredentials, ErrorEnvelope, OutHandle, StructuredMap,
    StructuredValue,
};

/// Everything a handler knows about the request it is serving.
pub struct CommandRequest<'a> {
    /// OS-reported credentials of the calling process.
    pub credentials: CallerCredentials,
    /// The externalized authorization token the client sent, if any. The
    /// dispatcher has already internalized and right-checked it when the
    /// command declares a right.
    pub authorization: Option<&'a AuthorizationToken>,
    /// The decoded request payload, if the client sent one.
    pub body: Option<&'a StructuredValue>,
}

/// Mutable reply builder handed to handlers.
#[derive(Default)]
pub struct CommandReply {
    response: StructuredMap,
    handles: Vec<OutHandle>,
    error: Option<ErrorEnvelope>,
    persistent: Option<Arc<dyn PersistentHandler>>,
}

impl CommandReply {
    /// An empty reply.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Put an entry into the response map.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<StructuredValue>) {
        self.response.insert(key.into(), value.into());
    }

    /// Attach an out-of-band handle to the reply. Handles attached before a
    /// failure are closed by the dispatcher, never delivered.
    pub fn attach_handle(&mut self, handle: OutHandle) {
        self.handles.push(handle);
    }

    /// Record a failure. Overrides any `Err` the handler later returns.
    pub fn fail(&mut self, error: ErrorEnvelope) {
        self.error = Some(error);
    }

    /// Install a persistent handler: all further messages on this
    /// connection bypass authorization and go straight to `handler` until
    /// the peer disconnects.
    pub fn upgrade_to_persistent(&mut self, handler: Arc<dyn PersistentHandler>) {
        self.persistent = Some(handler);
    }

    /// The explicitly recorded failure, if any.
    #[must_use]
    pub fn error(&self) -> Option<&ErrorEnvelope> {
        self.error.as_ref()
    }

    /// True when a persistent handler has been installed.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        self.persistent.is_some()
    }

    /// Number of handles currently attached.
    #[must_use]
    pub fn handle_count(&self) -> usize {
        self.handles.len()
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        StructuredMap,
        Vec<OutHandle>,
        Option<ErrorEnvelope>,
        Option<Arc<dyn PersistentHandler>>,
    ) {
        (self.response, self.handles, self.error, self.persistent)
    }
}

/// One command's implementation.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Serve one request. The dispatcher has already performed identity and
    /// right checks before this runs.
    async fn handle(
        &self,
        request: CommandRequest<'_>,
        reply: &mut CommandReply,
    ) -> Result<(), ErrorEnvelope>;
}

/// Handler for all traffic on a connection after a persistent upgrade.
///
/// No re-authentication happens for these messages; whatever authorization
/// justified the upgrade covers the connection's remaining lifetime.
#[async_trait]
pub trait PersistentHandler: Send + Sync {
    /// Serve one follow-up message.
    async fn handle_message(
        &self,
        body: Option<&StructuredValue>,
        reply: &mut CommandReply,
    ) -> Result<(), ErrorEnvelope>;
}
