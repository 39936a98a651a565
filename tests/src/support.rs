//! # Test Harness
//!
//! A started helper service wired to in-memory fakes and the in-process
//! transport, plus the command handlers the scenarios share.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use gatehouse_client::{ClientAuthorization, HelperClient};
use gatehouse_helper::adapters::local::{local_listener, LocalClientChannel, LocalConnector};
use gatehouse_helper::adapters::memory::{MemoryBroker, MemoryPolicyStore, StaticIdentityVerifier};
use gatehouse_helper::config::HelperConfig;
use gatehouse_helper::domain::registry::{CommandRegistry, CommandSpec};
use gatehouse_helper::domain::watchdog::IdleWatchdog;
use gatehouse_helper::ports::broker::PrivilegeBroker;
use gatehouse_helper::ports::handler::{
    CommandHandler, CommandReply, CommandRequest, PersistentHandler,
};
use gatehouse_helper::service::HelperService;
use gatehouse_protocol::{
    CallerCredentials, ErrorEnvelope, HandleProbe, OutHandle, StructuredValue,
};

pub const HELPER_ID: &str = "com.gatehouse.tests";
pub const HELPER_VERSION: &str = "3";

/// A running helper with its scripted collaborators.
pub struct Harness {
    pub broker: Arc<MemoryBroker>,
    pub service: Arc<HelperService>,
    connector: LocalConnector,
}

impl Harness {
    /// Start with the default config and a fresh policy store.
    pub fn start(registry: CommandRegistry) -> Self {
        Self::start_with(
            registry,
            HelperConfig::new(HELPER_ID, HELPER_VERSION),
            None,
        )
    }

    /// Start with full control over config and watchdog.
    pub fn start_with(
        registry: CommandRegistry,
        config: HelperConfig,
        watchdog: Option<Arc<IdleWatchdog>>,
    ) -> Self {
        let broker = Arc::new(MemoryBroker::new());
        let store = MemoryPolicyStore::new();
        let identity = Arc::new(StaticIdentityVerifier::accepting());

        let service = match watchdog {
            Some(watchdog) => HelperService::start_with_watchdog(
                registry,
                config,
                Arc::clone(&broker) as Arc<dyn PrivilegeBroker>,
                &store,
                identity,
                watchdog,
            ),
            None => HelperService::start(
                registry,
                config,
                Arc::clone(&broker) as Arc<dyn PrivilegeBroker>,
                &store,
                identity,
            ),
        }
        .expect("helper start");
        let service = Arc::new(service);

        let (listener, connector) = local_listener();
        let serving = Arc::clone(&service);
        tokio::spawn(async move {
            let _ = serving.serve(Box::new(listener)).await;
        });

        Self {
            broker,
            service,
            connector,
        }
    }

    /// Open a client connection backed by the harness broker.
    pub async fn client(&self) -> HelperClient<LocalClientChannel> {
        let channel = self
            .connector
            .connect(CallerCredentials::unknown())
            .await
            .expect("connect");
        HelperClient::new(channel, Arc::clone(&self.broker) as Arc<dyn ClientAuthorization>)
    }
}

/// Echoes the request body back under `Echo`.
pub struct EchoHandler;

#[async_trait]
impl CommandHandler for EchoHandler {
    async fn handle(
        &self,
        request: CommandRequest<'_>,
        reply: &mut CommandReply,
    ) -> Result<(), ErrorEnvelope> {
        if let Some(body) = request.body {
            reply.set("Echo", body.clone());
        }
        Ok(())
    }
}

/// Upgrades the connection to a persistent echo session.
pub struct OpenSessionHandler;

#[async_trait]
impl CommandHandler for OpenSessionHandler {
    async fn handle(
        &self,
        _request: CommandRequest<'_>,
        reply: &mut CommandReply,
    ) -> Result<(), ErrorEnvelope> {
        reply.set("SessionOpen", true);
        reply.upgrade_to_persistent(Arc::new(SessionEcho));
        Ok(())
    }
}

/// Persistent handler echoing each follow-up payload.
pub struct SessionEcho;

#[async_trait]
impl PersistentHandler for SessionEcho {
    async fn handle_message(
        &self,
        body: Option<&StructuredValue>,
        reply: &mut CommandReply,
    ) -> Result<(), ErrorEnvelope> {
        if let Some(body) = body {
            reply.set("Echo", body.clone());
        }
        Ok(())
    }
}

/// Attaches probe handles, then succeeds or fails on request. The probes
/// stay observable so tests can assert what the dispatcher closed.
#[derive(Default)]
pub struct HandleProducingHandler {
    pub probes: Mutex<Vec<HandleProbe>>,
}

#[async_trait]
impl CommandHandler for HandleProducingHandler {
    async fn handle(
        &self,
        request: CommandRequest<'_>,
        reply: &mut CommandReply,
    ) -> Result<(), ErrorEnvelope> {
        let fail = request
            .body
            .and_then(|body| body.as_map())
            .and_then(|map| map.get("Fail"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        for _ in 0..2 {
            let (handle, probe) = OutHandle::probe();
            reply.attach_handle(handle);
            if let Ok(mut probes) = self.probes.lock() {
                probes.push(probe);
            }
        }

        if fail {
            Err(ErrorEnvelope::new("com.gatehouse.tests", 500))
        } else {
            Ok(())
        }
    }
}

/// Registry with the scenario commands installed.
pub fn scenario_registry() -> CommandRegistry {
    let mut registry = CommandRegistry::new();
    registry
        .register(CommandSpec::unrestricted("Echo", Arc::new(EchoHandler)))
        .expect("register Echo");
    registry
        .register(CommandSpec::unrestricted(
            "OpenSession",
            Arc::new(OpenSessionHandler),
        ))
        .expect("register OpenSession");
    registry
}
