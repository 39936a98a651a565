//! # Identity Verifier Port
//!
//! Checks a connecting peer's code identity against a command's requirement
//! expression. Only consulted for commands that declare a requirement;
//! absence of one means the command is unconditionally reachable or its
//! handler self-authorizes.

use gatehouse_protocol::CallerCredentials;
use thiserror::Error;

/// Why a peer failed an identity check.
///
/// Deliberately coarse: the dispatcher reports the failure to the client
/// without detailing which part of the requirement was unmet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// The peer's code identity could not be resolved from its process id.
    #[error("could not resolve code identity of pid {pid}")]
    Unresolvable {
        /// The peer's process id.
        pid: i32,
    },

    /// The resolved identity does not satisfy the requirement.
    #[error("code identity does not satisfy requirement")]
    RequirementNotMet,

    /// The requirement expression itself could not be parsed.
    #[error("invalid requirement expression: {0}")]
    InvalidRequirement(String),
}

/// Resolves and checks a peer's code identity.
pub trait IdentityVerifier: Send + Sync {
    /// Verify that the process behind `peer` satisfies `requirement`.
    fn verify(&self, peer: &CallerCredentials, requirement: &str) -> Result<(), IdentityError>;
}
