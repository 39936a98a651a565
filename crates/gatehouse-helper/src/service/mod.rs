//! Orchestration: startup rights synchronization, the per-connection
//! dispatcher, and the [`HelperService`] entry point hosts drive from
//! `main`.

pub mod dispatcher;
pub mod helper;
pub mod rights_sync;

pub use dispatcher::Dispatcher;
pub use helper::{HelperService, StartError, GET_VERSION_COMMAND, VERSION_RESPONSE_KEY};
pub use rights_sync::{synchronize, PolicySyncError, SyncReport};
