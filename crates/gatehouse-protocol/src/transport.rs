//! Transport failures shared by helper and client endpoints.

use thiserror::Error;

use crate::envelope::MAX_FRAME_BYTES;

/// Why a frame could not be carried across the IPC boundary.
///
/// Transport failures are reported to the local caller and never forwarded
/// to the remote peer as an [`crate::ErrorEnvelope`]; by the time one
/// occurs there may be no usable channel to forward it on.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer closed the connection.
    #[error("connection closed by peer")]
    Closed,

    /// The underlying OS transport failed.
    #[error("transport io failure")]
    Io(#[from] std::io::Error),

    /// A frame exceeded [`MAX_FRAME_BYTES`].
    #[error("frame of {len} bytes exceeds the {MAX_FRAME_BYTES} byte limit")]
    FrameTooLarge {
        /// Size of the offending frame.
        len: usize,
    },

    /// A frame could not be serialized or deserialized.
    #[error("frame encoding failure: {0}")]
    Encoding(String),

    /// The peer violated the framing protocol.
    #[error("protocol violation: {0}")]
    Protocol(String),
}

impl TransportError {
    /// True when the failure means the connection is gone and retrying on
    /// it is pointless.
    #[must_use]
    pub fn is_disconnect(&self) -> bool {
        match self {
            Self::Closed => true,
            Self::Io(err) => matches!(
                err.kind(),
                std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}
