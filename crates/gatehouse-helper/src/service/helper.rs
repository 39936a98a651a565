//! # Helper Service
//!
//! The entry point a host process drives from `main`: build a registry,
//! call [`HelperService::start`], then hand it a listener with
//! [`HelperService::serve`]. Startup registers the built-in version command,
//! reconciles rights against the policy store, and arms the idle watchdog;
//! serving accepts connections and runs each on its own task.

use std::sync::Arc;

use async_trait::async_trait;
use gatehouse_protocol::{ErrorEnvelope, TransportError};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::HelperConfig;
use crate::domain::registry::{CommandRegistry, CommandSpec, RegistryError};
use crate::domain::watchdog::IdleWatchdog;
use crate::ports::broker::PrivilegeBroker;
use crate::ports::handler::{CommandHandler, CommandReply, CommandRequest};
use crate::ports::identity::IdentityVerifier;
use crate::ports::policy::PolicyStore;
use crate::ports::transport::HelperListener;
use crate::service::dispatcher::Dispatcher;
use crate::service::rights_sync::{synchronize, PolicySyncError};

/// Name of the built-in version command every helper serves.
pub const GET_VERSION_COMMAND: &str = "GetVersion";

/// Response key under which the version string is reported.
pub const VERSION_RESPONSE_KEY: &str = "Version";

/// Why the helper refused to start.
#[derive(Debug, Error)]
pub enum StartError {
    /// A command spec was invalid or collided with another.
    #[error("command registration failed")]
    Registry(#[from] RegistryError),

    /// Rights could not be reconciled with the policy store.
    #[error("rights synchronization failed")]
    PolicySync(#[from] PolicySyncError),
}

struct VersionHandler {
    version: String,
}

#[async_trait]
impl CommandHandler for VersionHandler {
    async fn handle(
        &self,
        _request: CommandRequest<'_>,
        reply: &mut CommandReply,
    ) -> Result<(), ErrorEnvelope> {
        reply.set(VERSION_RESPONSE_KEY, self.version.clone());
        Ok(())
    }
}

/// A started helper runtime: registry sealed, rights synchronized, watchdog
/// running.
pub struct HelperService {
    dispatcher: Arc<Dispatcher>,
    watchdog: Arc<IdleWatchdog>,
    helper_id: String,
}

impl HelperService {
    /// Start the runtime with a watchdog built from the configured idle
    /// timeout. Fails if registration or rights synchronization fails; a
    /// helper must not serve commands whose access control is undefined.
    pub fn start(
        registry: CommandRegistry,
        config: HelperConfig,
        broker: Arc<dyn PrivilegeBroker>,
        store: &dyn PolicyStore,
        identity: Arc<dyn IdentityVerifier>,
    ) -> Result<Self, StartError> {
        let watchdog = IdleWatchdog::new(config.idle_timeout_seconds);
        Self::start_with_watchdog(registry, config, broker, store, identity, watchdog)
    }

    /// Like [`HelperService::start`] with a caller-supplied watchdog. Tests
    /// use this to observe idle expiry instead of exiting.
    pub fn start_with_watchdog(
        mut registry: CommandRegistry,
        config: HelperConfig,
        broker: Arc<dyn PrivilegeBroker>,
        store: &dyn PolicyStore,
        identity: Arc<dyn IdentityVerifier>,
        watchdog: Arc<IdleWatchdog>,
    ) -> Result<Self, StartError> {
        // A host may register its own version command; the built-in fills
        // the gap otherwise.
        if !registry.contains(GET_VERSION_COMMAND) {
            registry.register(CommandSpec::unrestricted(
                GET_VERSION_COMMAND,
                Arc::new(VersionHandler {
                    version: config.version.clone(),
                }),
            ))?;
        }

        let report = synchronize(&registry, store, &config)?;
        info!(
            helper = %config.helper_id,
            version = %config.version,
            commands = registry.len(),
            rights_examined = report.examined,
            rights_written = report.written,
            "helper started"
        );

        let helper_id = config.helper_id.clone();
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::new(registry),
            Arc::new(config),
            broker,
            identity,
            Arc::clone(&watchdog),
        ));

        Ok(Self {
            dispatcher,
            watchdog,
            helper_id,
        })
    }

    /// Accept connections until the listener shuts down, serving each on
    /// its own task. On-demand hosts call this from `main` and rely on the
    /// watchdog to exit the process once idle.
    pub async fn serve(&self, mut listener: Box<dyn HelperListener>) -> Result<(), TransportError> {
        while let Some(connection) = listener.accept().await? {
            let dispatcher = Arc::clone(&self.dispatcher);
            tokio::spawn(async move {
                dispatcher.serve_connection(connection).await;
            });
        }
        info!(helper = %self.helper_id, "listener shut down");
        Ok(())
    }

    /// The dispatcher, for hosts that manage connections themselves.
    #[must_use]
    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.dispatcher)
    }

    /// The process-wide watchdog.
    #[must_use]
    pub fn watchdog(&self) -> Arc<IdleWatchdog> {
        Arc::clone(&self.watchdog)
    }

    /// Advisory notice from the host environment that the process is about
    /// to be terminated. Logged and otherwise ignored; in-flight requests
    /// run to completion or are lost with the process.
    pub fn termination_imminent(&self) {
        warn!(helper = %self.helper_id, "termination imminent");
    }
}
