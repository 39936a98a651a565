//! # Rights Synchronization Scenarios
//!
//! Startup reconciliation against a shared policy store across helper
//! restarts: idempotence, self-healing of drifted rules, and the fatal
//! refusal to start when the store cannot be written.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use gatehouse_helper::adapters::memory::{
        MemoryBroker, MemoryPolicyStore, StaticIdentityVerifier,
    };
    use gatehouse_helper::config::HelperConfig;
    use gatehouse_helper::domain::registry::{CommandRegistry, CommandSpec};
    use gatehouse_helper::domain::rules::{keys, RuleDocument, RuleRef};
    use gatehouse_helper::ports::PolicyStore;
    use gatehouse_helper::service::{HelperService, StartError};
    use gatehouse_protocol::StructuredMap;

    use crate::support::EchoHandler;

    const RIGHT: &str = "com.gatehouse.tests.install";

    fn gated_registry() -> CommandRegistry {
        let mut registry = CommandRegistry::new();
        let mut spec = CommandSpec::unrestricted("Install", Arc::new(EchoHandler));
        spec.right_name = Some(RIGHT.into());
        spec.default_rule = Some(RuleRef::AuthenticateAdmin);
        spec.right_timeout_seconds = 300;
        registry.register(spec).expect("register");
        registry
    }

    fn start(store: &MemoryPolicyStore) -> Result<HelperService, StartError> {
        HelperService::start(
            gated_registry(),
            HelperConfig::new("com.gatehouse.tests", "1"),
            Arc::new(MemoryBroker::new()),
            store,
            Arc::new(StaticIdentityVerifier::accepting()),
        )
    }

    #[tokio::test]
    async fn restart_with_unchanged_registry_writes_nothing() {
        let store = MemoryPolicyStore::new();

        start(&store).expect("first start");
        assert_eq!(store.write_count(), 1);

        start(&store).expect("second start");
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn drifted_rule_is_healed_on_restart() {
        let store = MemoryPolicyStore::new();
        start(&store).expect("first start");

        // An administrator (or an older helper) replaces the rule.
        let mut drifted = StructuredMap::new();
        drifted.insert(keys::CLASS.to_owned(), "allow".into());
        store
            .set_rule(RIGHT, &RuleDocument::from_entries(drifted))
            .expect("drift");
        let writes_after_drift = store.write_count();

        start(&store).expect("restart");
        assert_eq!(store.write_count(), writes_after_drift + 1);

        let healed = store.get_rule(RIGHT).expect("get").expect("present");
        assert_eq!(
            healed.entries().get(keys::CLASS).and_then(|v| v.as_str()),
            Some("user")
        );
    }

    #[tokio::test]
    async fn unwritable_store_refuses_startup() {
        let store = MemoryPolicyStore::new();
        store.fail_writes();

        match start(&store) {
            Err(StartError::PolicySync(err)) => assert_eq!(err.right, RIGHT),
            other => panic!("unexpected outcome: {:?}", other.map(|_| ())),
        }
    }
}
