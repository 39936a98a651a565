//! # Idle Watchdog
//!
//! Reference-counted busy/idle tracking with a single-shot exit timer. The
//! helper is launched on demand; once nothing has been busy for the
//! configured timeout it terminates. There is no state to flush, so
//! termination is a plain `exit`.
//!
//! Both operations run under one mutex, so interleaved calls from
//! concurrent connections are linearized. Cancelling the timer aborts its
//! task, and a fire that races a late `disable` re-checks the busy count
//! under the lock before exiting.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

/// Process-wide busy/idle tracker. Initialized once at startup; every
/// accepted connection and every in-flight message brackets itself with
/// exactly one `disable`/`enable` pair.
pub struct IdleWatchdog {
    timeout: Duration,
    state: Mutex<WatchdogState>,
    exit: Box<dyn Fn() + Send + Sync>,
}

#[derive(Default)]
struct WatchdogState {
    busy: u32,
    timer: Option<JoinHandle<()>>,
}

impl IdleWatchdog {
    /// Watchdog that terminates the process after `timeout_seconds` of
    /// idleness. Zero disables automatic termination.
    #[must_use]
    pub fn new(timeout_seconds: u64) -> Arc<Self> {
        Self::with_exit_hook(Duration::from_secs(timeout_seconds), || {
            std::process::exit(0)
        })
    }

    /// Watchdog with a custom action on idle expiry. Tests use this to
    /// observe expiry instead of exiting.
    #[must_use]
    pub fn with_exit_hook(
        timeout: Duration,
        exit: impl Fn() + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            timeout,
            state: Mutex::new(WatchdogState::default()),
            exit: Box::new(exit),
        })
    }

    /// Mark the process busy: cancel any pending idle timer and increment
    /// the busy count.
    pub fn disable_automatic_termination(self: &Arc<Self>) {
        let mut state = self.lock();
        cancel_timer(&mut state);
        state.busy += 1;
    }

    /// Mark one unit of work done: cancel any pending idle timer, decrement
    /// the busy count (floored at zero), and arm a fresh one-shot timer if
    /// the process is now idle.
    pub fn enable_automatic_termination(self: &Arc<Self>) {
        let mut state = self.lock();
        cancel_timer(&mut state);
        state.busy = state.busy.saturating_sub(1);
        if state.busy == 0 && !self.timeout.is_zero() {
            self.arm(&mut state);
        }
    }

    /// Current busy count. Exposed for tests and diagnostics.
    #[must_use]
    pub fn busy_count(&self) -> u32 {
        self.lock().busy
    }

    /// True while an idle timer is pending. Exposed for tests.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.lock()
            .timer
            .as_ref()
            .map(|t| !t.is_finished())
            .unwrap_or(false)
    }

    fn arm(self: &Arc<Self>, state: &mut WatchdogState) {
        debug!(timeout = ?self.timeout, "idle; arming termination timer");
        let watchdog = Arc::clone(self);
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(watchdog.timeout).await;
            // A message may have slipped in between the sleep elapsing and
            // this check; only the locked count decides.
            let still_idle = watchdog.lock().busy == 0;
            if still_idle {
                debug!("idle timeout elapsed; terminating");
                (watchdog.exit)();
            }
        }));
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, WatchdogState> {
        match self.state.lock() {
            Ok(guard) => guard,
            // A panic while holding the lock leaves only a counter behind;
            // the state is still coherent.
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn cancel_timer(state: &mut WatchdogState) {
    if let Some(timer) = state.timer.take() {
        timer.abort();
    }
}
