//! # Idle-Exit Scenarios
//!
//! The watchdog observed through whole connections: arming once the last
//! connection goes away, suppression while a persistent session is open,
//! and expiry after it ends.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use gatehouse_helper::config::HelperConfig;
    use gatehouse_helper::domain::watchdog::IdleWatchdog;

    use crate::support::{scenario_registry, Harness, HELPER_ID, HELPER_VERSION};

    fn observable_watchdog(
        timeout: Duration,
    ) -> (Arc<IdleWatchdog>, Arc<AtomicBool>) {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        let watchdog = IdleWatchdog::with_exit_hook(timeout, move || {
            flag.store(true, Ordering::SeqCst);
        });
        (watchdog, fired)
    }

    fn harness_with_timeout(timeout: Duration) -> (Harness, Arc<AtomicBool>) {
        let (watchdog, fired) = observable_watchdog(timeout);
        let harness = Harness::start_with(
            scenario_registry(),
            HelperConfig::new(HELPER_ID, HELPER_VERSION),
            Some(watchdog),
        );
        (harness, fired)
    }

    #[tokio::test]
    async fn open_connection_suppresses_idle_exit() {
        let (harness, fired) = harness_with_timeout(Duration::from_millis(30));
        let mut client = harness.client().await;
        client.execute("Echo", None).await.expect("echo");

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!fired.load(Ordering::SeqCst));

        drop(client);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn quiet_persistent_session_is_not_killed() {
        let (harness, fired) = harness_with_timeout(Duration::from_millis(30));
        let mut client = harness.client().await;
        client.execute("OpenSession", None).await.expect("upgrade");
        assert!(client.is_persistent());

        // Well past the idle timeout with no traffic at all.
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!fired.load(Ordering::SeqCst));

        // The session still answers.
        client.send(None).await.expect("follow-up");

        // Invalidation releases the hold and the process may now exit.
        drop(client);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn concurrent_connections_share_one_busy_count() {
        let (harness, fired) = harness_with_timeout(Duration::from_millis(30));

        let mut clients = Vec::new();
        for _ in 0..8 {
            clients.push(harness.client().await);
        }
        for client in &mut clients {
            client.execute("Echo", None).await.expect("echo");
        }

        // Drop all but one; the survivor keeps the process alive.
        let mut survivor = clients.pop().expect("survivor");
        drop(clients);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!fired.load(Ordering::SeqCst));
        survivor.execute("Echo", None).await.expect("still serving");

        drop(survivor);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(fired.load(Ordering::SeqCst));
    }
}
