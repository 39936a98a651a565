//! # Client Failure Planes
//!
//! A caller must be able to tell "the transport failed" from "the helper
//! said no". These scenarios pin the two planes apart.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use gatehouse_client::{ClientError, HelperClient};
    use gatehouse_helper::adapters::local::local_channel;
    use gatehouse_helper::adapters::memory::MemoryBroker;
    use gatehouse_protocol::{CallerCredentials, TransportError};

    use crate::support::{scenario_registry, Harness};

    #[tokio::test]
    async fn command_failure_carries_an_envelope() {
        let harness = Harness::start(scenario_registry());
        let mut client = harness.client().await;

        match client.execute("NotThere", None).await {
            Err(ClientError::Command(envelope)) => {
                assert!(!envelope.domain.is_empty());
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn dead_helper_is_a_transport_failure() {
        let broker = Arc::new(MemoryBroker::new());
        let (server, channel) = local_channel(CallerCredentials::unknown());
        drop(server);
        let mut client = HelperClient::new(channel, broker);

        match client.execute("Anything", None).await {
            Err(ClientError::Transport(TransportError::Closed)) => {}
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn command_errors_do_not_poison_the_transport() {
        let harness = Harness::start(scenario_registry());
        let mut client = harness.client().await;

        assert!(matches!(
            client.execute("NotThere", None).await,
            Err(ClientError::Command(_))
        ));
        assert!(client.execute("Echo", None).await.is_ok());
    }
}
