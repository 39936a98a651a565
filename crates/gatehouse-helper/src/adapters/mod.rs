//! Transport and collaborator adapters. `local` is always available;
//! `seqpacket` needs the `unix-socket` feature; `memory` holds the test
//! fakes behind `test-utils`.

pub mod local;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
#[cfg(all(unix, feature = "unix-socket"))]
pub mod seqpacket;
