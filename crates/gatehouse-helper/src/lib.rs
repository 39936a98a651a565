//! # Gatehouse Helper
//!
//! Runtime for a privileged helper process: register commands, reconcile
//! their authorization rights with the OS policy store, then serve
//! connections that are authenticated message by message against the OS
//! privilege broker.
//!
//! ## Layout
//!
//! - `domain`: command registry, canonical rule documents, dispatch error
//!   taxonomy, idle watchdog.
//! - `ports`: traits for the OS collaborators: privilege broker, policy
//!   store, identity verifier, transport, and the command handler SPI.
//! - `service`: startup rights synchronization, the per-connection
//!   dispatcher, and the [`HelperService`] entry point.
//! - `adapters`: in-process transport, Unix seqpacket transport with
//!   descriptor passing (feature `unix-socket`), in-memory fakes (feature
//!   `test-utils`).
//!
//! ## Sketch
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use gatehouse_helper::adapters::local::local_listener;
//! # use gatehouse_helper::config::HelperConfig;
//! # use gatehouse_helper::domain::registry::CommandRegistry;
//! # use gatehouse_helper::service::HelperService;
//! # async fn run(
//! #     broker: Arc<dyn gatehouse_helper::ports::broker::PrivilegeBroker>,
//! #     store: Box<dyn gatehouse_helper::ports::policy::PolicyStore>,
//! #     identity: Arc<dyn gatehouse_helper::ports::identity::IdentityVerifier>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! gatehouse_helper::telemetry::init_logging();
//! let registry = CommandRegistry::new();
//! let config = HelperConfig::new("com.example.helper", "1.0");
//! let service = HelperService::start(registry, config, broker, store.as_ref(), identity)?;
//! let (listener, _connector) = local_listener();
//! service.serve(Box::new(listener)).await?;
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod service;
pub mod telemetry;

pub use config::HelperConfig;
pub use domain::{
    CommandRegistry, CommandSpec, DispatchError, IdleWatchdog, RegistryError, RuleRef,
};
pub use service::{
    Dispatcher, HelperService, PolicySyncError, StartError, SyncReport, GET_VERSION_COMMAND,
    VERSION_RESPONSE_KEY,
};
