//! # Connection Dispatcher
//!
//! The per-connection request/reply state machine. A connection starts
//! ephemeral: every message names a command and is authenticated in full.
//! Once a handler installs a persistent handler the connection stays alive
//! and all further payloads route straight to it, with no re-authentication,
//! until the peer disconnects.
//!
//! Per message, in order and short-circuiting on first failure: correlate a
//! reply, route persistent traffic, look the command up, check the peer's
//! code identity, acquire the command's right from the broker, run the
//! handler, send the reply. Every failure up to and including the handler is
//! a command-level error delivered in the reply's error slot; none of them
//! tears the connection down. Only transport failures end a connection.

use std::sync::Arc;

use gatehouse_protocol::{
    command_name_within_limit, error_codes, wire, AuthorizationToken, CallerCredentials,
    ErrorEnvelope, ReplyEnvelope, RequestFrame, StructuredValue, GATEHOUSE_ERROR_DOMAIN,
    MAX_EXTERNAL_TOKEN_LEN, MAX_HANDLES_PER_MESSAGE,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::HelperConfig;
use crate::domain::errors::DispatchError;
use crate::domain::registry::CommandRegistry;
use crate::domain::watchdog::IdleWatchdog;
use crate::ports::broker::PrivilegeBroker;
use crate::ports::handler::{CommandReply, CommandRequest, PersistentHandler};
use crate::ports::identity::IdentityVerifier;
use crate::ports::transport::HelperConnection;

/// Serves connections against a fixed registry. Shared read-only across all
/// connection tasks.
pub struct Dispatcher {
    registry: Arc<CommandRegistry>,
    config: Arc<HelperConfig>,
    broker: Arc<dyn PrivilegeBroker>,
    identity: Arc<dyn IdentityVerifier>,
    watchdog: Arc<IdleWatchdog>,
}

impl Dispatcher {
    /// Assemble a dispatcher from its collaborators.
    #[must_use]
    pub fn new(
        registry: Arc<CommandRegistry>,
        config: Arc<HelperConfig>,
        broker: Arc<dyn PrivilegeBroker>,
        identity: Arc<dyn IdentityVerifier>,
        watchdog: Arc<IdleWatchdog>,
    ) -> Self {
        Self {
            registry,
            config,
            broker,
            identity,
            watchdog,
        }
    }

    /// Serve one connection to completion. Returns when the peer
    /// disconnects or the transport fails; never propagates request-level
    /// failures.
    pub async fn serve_connection(&self, mut connection: Box<dyn HelperConnection>) {
        // The connection itself holds the watchdog open; a persistent peer
        // may stay quiet for an arbitrary time and must not be killed for
        // it.
        self.watchdog.disable_automatic_termination();
        let credentials = connection.peer_credentials();
        debug!(pid = credentials.pid, uid = credentials.uid, "connection accepted");

        let mut persistent: Option<Arc<dyn PersistentHandler>> = None;

        loop {
            let frame = match connection.next_request().await {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(err) => {
                    if !err.is_disconnect() {
                        warn!(pid = credentials.pid, error = %err, "receive failed");
                    }
                    break;
                }
            };

            self.watchdog.disable_automatic_termination();
            let outcome = self
                .process(&frame, credentials, persistent.as_ref())
                .await;
            let (reply, upgraded) =
                self.assemble(frame.message_id, outcome, persistent.is_some());
            if let Some(handler) = upgraded {
                persistent = Some(handler);
            }

            let send_result = connection.send_reply(reply).await;
            self.watchdog.enable_automatic_termination();
            if let Err(err) = send_result {
                // Nothing to report to the peer once sending fails; log
                // with the taxonomy code and give the connection up.
                warn!(
                    pid = credentials.pid,
                    code = error_codes::TRANSPORT_FAILURE,
                    error = %err,
                    "reply send failed"
                );
                break;
            }
        }

        if persistent.is_some() {
            debug!(pid = credentials.pid, "persistent connection invalidated");
        }
        self.watchdog.enable_automatic_termination();
    }

    /// Run one message through authentication and its handler. `Err` means
    /// the handler never ran.
    async fn process(
        &self,
        frame: &RequestFrame,
        credentials: CallerCredentials,
        persistent: Option<&Arc<dyn PersistentHandler>>,
    ) -> Result<CommandReply, DispatchError> {
        let body = frame.envelope.body.clone().map(wire::decode);

        if let Some(handler) = persistent {
            let mut reply = CommandReply::new();
            let result = handler.handle_message(body.as_ref(), &mut reply).await;
            fold_handler_result(&mut reply, result);
            return Ok(reply);
        }

        let name = frame
            .envelope
            .command
            .as_deref()
            .ok_or_else(|| DispatchError::MalformedEnvelope {
                reason: "missing command name".into(),
            })?;
        if !command_name_within_limit(name) {
            return Err(DispatchError::MalformedEnvelope {
                reason: "command name exceeds length limit".into(),
            });
        }

        let spec = self
            .registry
            .lookup(name)
            .map_err(|err| DispatchError::UnknownCommand { name: err.name })?;

        let token = match &frame.envelope.authorization {
            Some(bytes) if bytes.len() > MAX_EXTERNAL_TOKEN_LEN => {
                return Err(DispatchError::MalformedEnvelope {
                    reason: format!("authorization token of {} bytes", bytes.len()),
                });
            }
            Some(bytes) => Some(AuthorizationToken::new(bytes.clone())),
            None => None,
        };

        // Identity before rights: a peer that cannot prove who it is never
        // reaches the broker, and never triggers an authentication dialog.
        if let Some(requirement) = &spec.identity_requirement {
            self.identity
                .verify(&credentials, requirement)
                .map_err(|err| {
                    debug!(pid = credentials.pid, command = %spec.name, error = %err, "identity check failed");
                    DispatchError::IdentityCheckFailed {
                        command: spec.name.clone(),
                    }
                })?;
        }

        if let Some(right) = &spec.right_name {
            let token = token.as_ref().ok_or_else(|| DispatchError::MalformedEnvelope {
                reason: "missing authorization token".into(),
            })?;
            let session = self.broker.internalize(token)?;
            let prompt = spec
                .prompt_key
                .as_deref()
                .map(|key| self.config.prompt_for_key(key));
            self.broker
                .copy_rights(&session, &[right.as_str()], prompt.as_deref(), true)
                .await
                .map_err(|source| DispatchError::AuthorizationDenied {
                    right: right.clone(),
                    source,
                })?;
        }

        let request = CommandRequest {
            credentials,
            authorization: token.as_ref(),
            body: body.as_ref(),
        };
        let mut reply = CommandReply::new();
        let result = spec.handler.handle(request, &mut reply).await;
        fold_handler_result(&mut reply, result);
        Ok(reply)
    }

    /// Turn a processing outcome into the wire reply, deciding which
    /// handles and persistent upgrade (if any) survive.
    fn assemble(
        &self,
        request_id: Uuid,
        outcome: Result<CommandReply, DispatchError>,
        was_persistent: bool,
    ) -> (ReplyEnvelope, Option<Arc<dyn PersistentHandler>>) {
        let mut reply = ReplyEnvelope::for_request(request_id);
        reply.can_accept_further_input = was_persistent;

        let command_reply = match outcome {
            Err(err) => {
                warn!(error = %err, "request rejected before its handler");
                reply.error = Some(wire::encode(StructuredValue::Error(err.into_envelope())));
                return (reply, None);
            }
            Ok(command_reply) => command_reply,
        };

        let (response, handles, error, upgrade) = command_reply.into_parts();

        if let Some(envelope) = error {
            debug!(domain = %envelope.domain, code = envelope.code, "command failed");
            // Handles attached before the failure are dropped (closed)
            // here; a failed command never leaks descriptors or upgrades
            // the connection.
            reply.error = Some(wire::encode(StructuredValue::Error(envelope)));
            return (reply, None);
        }

        if handles.len() > MAX_HANDLES_PER_MESSAGE {
            warn!(count = handles.len(), "handler attached too many handles");
            let envelope =
                ErrorEnvelope::new(GATEHOUSE_ERROR_DOMAIN, error_codes::TRANSPORT_FAILURE)
                    .with_description("reply exceeds the per-message handle limit");
            reply.error = Some(wire::encode(StructuredValue::Error(envelope)));
            return (reply, None);
        }

        reply.response = Some(wire::encode(StructuredValue::Map(response)));
        reply.handles = handles;
        reply.can_accept_further_input = was_persistent || upgrade.is_some();
        (reply, upgrade)
    }
}

/// Explicit errors on the reply win over the handler's returned `Err`.
fn fold_handler_result(reply: &mut CommandReply, result: Result<(), ErrorEnvelope>) {
    if let Err(envelope) = result {
        if reply.error().is_none() {
            reply.fail(envelope);
        }
    }
}
