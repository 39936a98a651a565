//! # Privilege Broker Port
//!
//! The helper's view of the OS authority that issues and validates
//! authorization rights. The helper never creates authorizations itself; it
//! internalizes the token a client externalized and asks the broker whether
//! that token holds (or can acquire) a named right.

use async_trait::async_trait;
use gatehouse_protocol::{AuthorizationToken, ErrorEnvelope};
use thiserror::Error;
use uuid::Uuid;

/// Error domain carried by broker failures when they cross the boundary.
pub const BROKER_ERROR_DOMAIN: &str = "com.gatehouse.broker";

/// The broker's conventional status for "the user or policy said no".
pub const BROKER_DENIED_CODE: i64 = -60005;

/// A broker failure: the broker's own status code plus a message.
///
/// The code is surfaced verbatim in the client-visible envelope so callers
/// can distinguish denial from, say, a malformed token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("broker status {code}: {message}")]
pub struct BrokerError {
    /// Broker-defined status code.
    pub code: i64,
    /// Human-readable diagnostic.
    pub message: String,
}

impl BrokerError {
    /// A failure with an arbitrary broker status code.
    #[must_use]
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// The right was refused.
    #[must_use]
    pub fn denied() -> Self {
        Self::new(BROKER_DENIED_CODE, "authorization denied")
    }

    /// The externalized token could not be internalized.
    #[must_use]
    pub fn invalid_token(reason: impl Into<String>) -> Self {
        Self::new(
            -60008,
            format!("invalid external token: {}", reason.into()),
        )
    }

    /// The client-visible envelope for this failure.
    #[must_use]
    pub fn into_envelope(self) -> ErrorEnvelope {
        ErrorEnvelope::new(BROKER_ERROR_DOMAIN, self.code).with_description(self.message)
    }
}

/// An internalized authorization, valid for the request that carried it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrokerSession {
    id: Uuid,
}

impl BrokerSession {
    /// A fresh session handle. Adapters mint one per internalized token.
    #[must_use]
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }

    /// The session's identifier, for logging.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Default for BrokerSession {
    fn default() -> Self {
        Self::new()
    }
}

/// The OS privilege broker, as the helper uses it.
///
/// `internalize` is synchronous and cheap; `copy_rights` may block on user
/// interaction when `allow_interaction` is true, so it is async and must be
/// awaited without holding any lock beyond the connection's own serial
/// processing.
#[async_trait]
pub trait PrivilegeBroker: Send + Sync {
    /// Turn a client's externalized token into a usable session. Callers
    /// must have validated the blob's size against
    /// [`gatehouse_protocol::MAX_EXTERNAL_TOKEN_LEN`] already; adapters may
    /// re-check.
    fn internalize(&self, external: &AuthorizationToken) -> Result<BrokerSession, BrokerError>;

    /// Ask the broker to confirm the session holds the named rights,
    /// prompting the user if `allow_interaction` permits. `prompt` is the
    /// text shown in that dialog.
    async fn copy_rights(
        &self,
        session: &BrokerSession,
        rights: &[&str],
        prompt: Option<&str>,
        allow_interaction: bool,
    ) -> Result<(), BrokerError>;
}
