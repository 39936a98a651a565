//! Out-of-band OS handles attached to replies.
//!
//! A command handler may return file descriptors alongside its response.
//! Ownership is strict: a handle lives in exactly one place at a time
//! (handler output, then either the outgoing reply or nowhere), and dropping
//! an unattached handle closes it. That drop-closes rule is what keeps the
//! dispatcher's failure path descriptor-leak-free.

#[cfg(unix)]
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
#[cfg(feature = "test-utils")]
use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(feature = "test-utils")]
use std::sync::Arc;

/// An owned OS handle destined for (or received from) a reply.
#[derive(Debug)]
pub struct OutHandle {
    repr: HandleRepr,
}

#[derive(Debug)]
enum HandleRepr {
    #[cfg(unix)]
    Fd(OwnedFd),
    #[cfg(feature = "test-utils")]
    Probe(DropProbe),
}

impl OutHandle {
    /// Wrap an owned file descriptor.
    #[cfg(unix)]
    #[must_use]
    pub fn from_fd(fd: OwnedFd) -> Self {
        Self {
            repr: HandleRepr::Fd(fd),
        }
    }

    /// The raw descriptor number, when this handle wraps a descriptor.
    #[cfg(unix)]
    #[must_use]
    pub fn raw_fd(&self) -> Option<RawFd> {
        match &self.repr {
            HandleRepr::Fd(fd) => Some(fd.as_raw_fd()),
            #[cfg(feature = "test-utils")]
            HandleRepr::Probe(_) => None,
        }
    }

    /// Take the descriptor out, consuming the handle without closing it.
    /// Returns `None` for non-descriptor handles (test probes).
    #[cfg(unix)]
    #[must_use]
    pub fn into_fd(self) -> Option<OwnedFd> {
        match self.repr {
            HandleRepr::Fd(fd) => Some(fd),
            #[cfg(feature = "test-utils")]
            HandleRepr::Probe(_) => None,
        }
    }

    /// A handle whose closure is observable from the paired [`HandleProbe`].
    /// Used by tests asserting that failure paths close what they produced.
    #[cfg(feature = "test-utils")]
    #[must_use]
    pub fn probe() -> (Self, HandleProbe) {
        let flag = Arc::new(AtomicBool::new(false));
        let handle = Self {
            repr: HandleRepr::Probe(DropProbe {
                closed: Arc::clone(&flag),
            }),
        };
        (handle, HandleProbe { closed: flag })
    }
}

/// Observer half of [`OutHandle::probe`].
#[cfg(feature = "test-utils")]
#[derive(Debug, Clone)]
pub struct HandleProbe {
    closed: Arc<AtomicBool>,
}

#[cfg(feature = "test-utils")]
impl HandleProbe {
    /// True once the paired handle has been dropped (closed).
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[cfg(feature = "test-utils")]
#[derive(Debug)]
struct DropProbe {
    closed: Arc<AtomicBool>,
}

#[cfg(feature = "test-utils")]
impl Drop for DropProbe {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
