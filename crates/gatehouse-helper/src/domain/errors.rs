//! # Dispatch Failures
//!
//! Every way a request can fail before or inside its handler, and the
//! mapping from each failure to the error envelope the client sees.
//!
//! Broker denials keep the broker's own domain and status code so clients
//! can distinguish "user cancelled" from "policy refused". Everything else
//! maps into the helper's domain with a stable code.

use gatehouse_protocol::{
    error_codes, ErrorEnvelope, StructuredValue, GATEHOUSE_ERROR_DOMAIN,
};
use thiserror::Error;

use crate::ports::broker::BrokerError;

/// Why a request never produced a successful handler result.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The request named a command the registry does not know.
    #[error("unknown command: {name}")]
    UnknownCommand {
        /// The requested name.
        name: String,
    },

    /// The request envelope was missing a field or exceeded a limit.
    #[error("malformed request: {reason}")]
    MalformedEnvelope {
        /// What was wrong with it.
        reason: String,
    },

    /// The peer's code identity did not satisfy the command's requirement.
    #[error("peer identity does not satisfy requirement for {command}")]
    IdentityCheckFailed {
        /// The command whose requirement was not met.
        command: String,
    },

    /// The privilege broker refused the command's right.
    #[error("authorization denied for right {right}")]
    AuthorizationDenied {
        /// The right that was refused.
        right: String,
        /// The broker's failure, carried through verbatim.
        #[source]
        source: BrokerError,
    },

    /// The handler failed and supplied its own envelope.
    #[error("handler reported {0}")]
    Handler(ErrorEnvelope),

    /// The broker failed for a reason other than refusing a right, for
    /// example a malformed external token.
    #[error("privilege broker failure")]
    Broker(#[from] BrokerError),
}

impl DispatchError {
    /// The envelope reported to the client for this failure.
    #[must_use]
    pub fn into_envelope(self) -> ErrorEnvelope {
        match self {
            Self::UnknownCommand { name } => {
                ErrorEnvelope::new(GATEHOUSE_ERROR_DOMAIN, error_codes::UNKNOWN_COMMAND)
                    .with_info("command", StructuredValue::String(name))
            }
            Self::MalformedEnvelope { reason } => {
                ErrorEnvelope::new(GATEHOUSE_ERROR_DOMAIN, error_codes::MALFORMED_ENVELOPE)
                    .with_description(reason)
            }
            Self::IdentityCheckFailed { command } => {
                ErrorEnvelope::new(GATEHOUSE_ERROR_DOMAIN, error_codes::IDENTITY_CHECK_FAILED)
                    .with_info("command", StructuredValue::String(command))
            }
            Self::AuthorizationDenied { right, source } => source
                .into_envelope()
                .with_info("right", StructuredValue::String(right)),
            Self::Handler(envelope) => envelope,
            Self::Broker(source) => source.into_envelope(),
        }
    }
}
