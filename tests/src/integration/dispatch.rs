//! # Dispatch Scenarios
//!
//! The per-message state machine, driven end to end: built-in version
//! command, unknown-command probing, broker denial, malformed envelopes,
//! persistent upgrade, and the descriptor-accounting rules on both the
//! success and failure paths.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use gatehouse_client::ClientError;
    use gatehouse_helper::domain::registry::{CommandRegistry, CommandSpec};
    use gatehouse_helper::domain::rules::RuleRef;
    use gatehouse_helper::ports::handler::CommandHandler;
    use gatehouse_helper::service::{GET_VERSION_COMMAND, VERSION_RESPONSE_KEY};
    use gatehouse_protocol::{
        error_codes, StructuredMap, StructuredValue, GATEHOUSE_ERROR_DOMAIN,
    };

    use crate::support::{
        scenario_registry, EchoHandler, HandleProducingHandler, Harness, HELPER_VERSION,
    };

    #[tokio::test]
    async fn get_version_answers_with_the_configured_version() {
        let harness = Harness::start(CommandRegistry::new());
        let mut client = harness.client().await;

        let response = client
            .execute(GET_VERSION_COMMAND, None)
            .await
            .expect("GetVersion");
        assert_eq!(
            response
                .body
                .as_map()
                .and_then(|m| m.get(VERSION_RESPONSE_KEY))
                .and_then(|v| v.as_str()),
            Some(HELPER_VERSION)
        );
        assert!(!response.persistent);

        // The connection holds the watchdog open; a served message must not
        // change the resting busy count.
        let resting = harness.service.watchdog().busy_count();
        client.execute(GET_VERSION_COMMAND, None).await.expect("again");
        assert_eq!(harness.service.watchdog().busy_count(), resting);
    }

    #[tokio::test]
    async fn a_hundred_unknown_commands_never_break_the_connection() {
        let harness = Harness::start(scenario_registry());
        let mut client = harness.client().await;

        for i in 0..100 {
            let err = client
                .execute(&format!("NoSuchCommand{i}"), None)
                .await
                .expect_err("unknown command");
            match err {
                ClientError::Command(envelope) => {
                    assert_eq!(envelope.domain, GATEHOUSE_ERROR_DOMAIN);
                    assert_eq!(envelope.code, error_codes::UNKNOWN_COMMAND);
                }
                other => panic!("probe {i}: unexpected {other:?}"),
            }
        }

        // Still usable afterwards.
        let response = client
            .execute("Echo", Some(StructuredValue::Int64(7)))
            .await
            .expect("echo after probing");
        assert_eq!(
            response
                .body
                .as_map()
                .and_then(|m| m.get("Echo"))
                .and_then(|v| v.as_i64()),
            Some(7)
        );
    }

    #[tokio::test]
    async fn denied_right_reports_the_broker_status() {
        let mut registry = CommandRegistry::new();
        let mut spec = CommandSpec::unrestricted("DoPrivileged", Arc::new(EchoHandler));
        spec.right_name = Some("com.gatehouse.tests.privileged".into());
        spec.default_rule = Some(RuleRef::AuthenticateAdmin);
        registry.register(spec).expect("register");

        let harness = Harness::start(registry);
        harness.broker.deny();
        let mut client = harness.client().await;

        match client.execute("DoPrivileged", None).await {
            Err(ClientError::Command(envelope)) => {
                assert_eq!(envelope.code, -60005);
                assert_eq!(
                    envelope.user_info.get("right").and_then(|v| v.as_str()),
                    Some("com.gatehouse.tests.privileged")
                );
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        // Granting again makes the same connection succeed.
        harness.broker.allow();
        assert!(client.execute("DoPrivileged", None).await.is_ok());
    }

    #[tokio::test]
    async fn oversized_token_is_rejected_before_the_broker() {
        let mut registry = CommandRegistry::new();
        let mut spec = CommandSpec::unrestricted("DoPrivileged", Arc::new(EchoHandler));
        spec.right_name = Some("com.gatehouse.tests.privileged".into());
        spec.default_rule = Some(RuleRef::AuthenticateAdmin);
        registry.register(spec).expect("register");

        let harness = Harness::start(registry);
        harness.broker.set_token_len(64);
        let mut client = harness.client().await;

        match client.execute("DoPrivileged", None).await {
            Err(ClientError::Command(envelope)) => {
                assert_eq!(envelope.domain, GATEHOUSE_ERROR_DOMAIN);
                assert_eq!(envelope.code, error_codes::MALFORMED_ENVELOPE);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(harness.broker.copied_rights().is_empty());
    }

    #[tokio::test]
    async fn persistent_upgrade_routes_followups_to_the_session() {
        let harness = Harness::start(scenario_registry());
        let mut client = harness.client().await;

        let response = client.execute("OpenSession", None).await.expect("upgrade");
        assert!(response.persistent);
        assert!(client.is_persistent());
        let rights_after_upgrade = harness.broker.copied_rights().len();

        for i in 0..3i64 {
            let reply = client
                .send(Some(StructuredValue::Int64(i)))
                .await
                .expect("follow-up");
            assert!(reply.persistent);
            assert_eq!(
                reply
                    .body
                    .as_map()
                    .and_then(|m| m.get("Echo"))
                    .and_then(|v| v.as_i64()),
                Some(i)
            );
        }

        // Follow-ups never re-authorize.
        assert_eq!(harness.broker.copied_rights().len(), rights_after_upgrade);
    }

    #[tokio::test]
    async fn failed_handler_closes_its_handles() {
        let handler = Arc::new(HandleProducingHandler::default());
        let mut registry = CommandRegistry::new();
        registry
            .register(CommandSpec::unrestricted(
                "ProduceHandles",
                Arc::clone(&handler) as Arc<dyn CommandHandler>,
            ))
            .expect("register");

        let harness = Harness::start(registry);
        let mut client = harness.client().await;

        let mut body = StructuredMap::new();
        body.insert("Fail".into(), true.into());
        let err = client
            .execute("ProduceHandles", Some(StructuredValue::Map(body)))
            .await
            .expect_err("handler fails");
        assert!(matches!(err, ClientError::Command(_)));

        let probes = handler.probes.lock().expect("probes");
        assert_eq!(probes.len(), 2);
        assert!(probes.iter().all(|p| p.is_closed()));
    }

    #[tokio::test]
    async fn successful_handler_delivers_its_handles() {
        let handler = Arc::new(HandleProducingHandler::default());
        let mut registry = CommandRegistry::new();
        registry
            .register(CommandSpec::unrestricted(
                "ProduceHandles",
                Arc::clone(&handler) as Arc<dyn CommandHandler>,
            ))
            .expect("register");

        let harness = Harness::start(registry);
        let mut client = harness.client().await;

        let response = client
            .execute("ProduceHandles", None)
            .await
            .expect("success");
        assert_eq!(response.handles.len(), 2);

        {
            let probes = handler.probes.lock().expect("probes");
            assert!(probes.iter().all(|p| !p.is_closed()));
        }

        // The client owns them now; dropping the response closes them.
        drop(response);
        tokio::time::sleep(Duration::from_millis(5)).await;
        let probes = handler.probes.lock().expect("probes");
        assert!(probes.iter().all(|p| p.is_closed()));
    }
}
