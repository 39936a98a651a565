//! Caller identity and authorization token types.

use serde::{Deserialize, Serialize};

/// Identity of the process on the far side of a connection, as reported by
/// the transport. The transport is the sole source of truth for these
/// fields; request payloads never carry identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerCredentials {
    /// Process id of the peer.
    pub pid: i32,
    /// Effective user id of the peer.
    pub uid: u32,
    /// Effective group id of the peer.
    pub gid: u32,
    /// Login session the peer belongs to, or 0 when unknown.
    pub session_id: i32,
}

impl CallerCredentials {
    /// Credentials for an unidentified peer. Adapters that cannot resolve a
    /// peer should refuse the connection instead of reporting these.
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            pid: 0,
            uid: u32::MAX,
            gid: u32::MAX,
            session_id: 0,
        }
    }
}

/// An internalized authorization token: the broker-defined capability a
/// caller holds. Opaque to everything except the broker that minted it.
///
/// Tokens cross the IPC boundary in externalized form (a bounded byte blob,
/// see [`crate::envelope::MAX_EXTERNAL_TOKEN_LEN`]); the receiving side
/// validates the blob's size before asking its broker to internalize it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationToken(Vec<u8>);

impl AuthorizationToken {
    /// Wrap broker-defined token material.
    #[must_use]
    pub fn new(material: Vec<u8>) -> Self {
        Self(material)
    }

    /// The broker-defined token material.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}
