//! Debounced auto-sync trigger.
//!
//! Each `schedule` call restarts the quiet period; only the last call in a
//! burst survives to bump the trigger counter. The pending task is owned by
//! the trigger and aborted on `cancel` or drop.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Cancellable, restartable delayed trigger with a firing counter
pub struct DebouncedTrigger {
    delay: Duration,
    counter: Arc<watch::Sender<u64>>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl DebouncedTrigger {
    pub fn new(delay: Duration) -> Self {
        let (counter, _) = watch::channel(0);
        Self {
            delay,
            counter: Arc::new(counter),
            pending: Mutex::new(None),
        }
    }

    /// (Re)start the quiet period.
    ///
    /// Needs a Tokio runtime; outside one the call is logged and ignored, and
    /// the caller is left to trigger sync manually.
    pub fn schedule(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No Tokio runtime; auto-sync timer not started");
            return;
        };

        let counter = Arc::clone(&self.counter);
        let delay = self.delay;
        let task = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            counter.send_modify(|fired| *fired += 1);
            tracing::debug!(fired = *counter.borrow(), "Auto-sync trigger fired");
        });

        if let Some(previous) = self.lock_pending().replace(task) {
            previous.abort();
        }
    }

    /// Stop a pending timer without firing it. Returns whether one was pending.
    pub fn cancel(&self) -> bool {
        match self.lock_pending().take() {
            Some(task) => {
                let was_pending = !task.is_finished();
                task.abort();
                was_pending
            }
            None => false,
        }
    }

    /// Whether a timer is waiting to fire
    pub fn is_scheduled(&self) -> bool {
        self.lock_pending()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Number of times the trigger fired
    pub fn fired(&self) -> u64 {
        *self.counter.borrow()
    }

    /// Watch the firing counter
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.counter.subscribe()
    }

    pub const fn delay(&self) -> Duration {
        self.delay
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Drop for DebouncedTrigger {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    const DELAY: Duration = Duration::from_millis(2000);

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_quiet_period() {
        let trigger = DebouncedTrigger::new(DELAY);
        trigger.schedule();

        sleep(Duration::from_millis(1999)).await;
        assert_eq!(trigger.fired(), 0);
        assert!(trigger.is_scheduled());

        sleep(Duration::from_millis(2)).await;
        assert_eq!(trigger.fired(), 1);
        assert!(!trigger.is_scheduled());
    }

    #[tokio::test(start_paused = true)]
    async fn burst_collapses_into_one_firing() {
        let trigger = DebouncedTrigger::new(DELAY);

        for _ in 0..5 {
            trigger.schedule();
            sleep(Duration::from_millis(500)).await;
        }
        assert_eq!(trigger.fired(), 0);

        sleep(Duration::from_millis(1600)).await;
        assert_eq!(trigger.fired(), 1);

        sleep(Duration::from_millis(5000)).await;
        assert_eq!(trigger.fired(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_firing() {
        let trigger = DebouncedTrigger::new(DELAY);
        trigger.schedule();

        assert!(trigger.cancel());
        sleep(Duration::from_millis(3000)).await;

        assert_eq!(trigger.fired(), 0);
        assert!(!trigger.cancel());
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_observe_firings() {
        let trigger = DebouncedTrigger::new(DELAY);
        let mut rx = trigger.subscribe();
        trigger.schedule();

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), 1);
    }

    #[test]
    fn schedule_outside_runtime_is_ignored() {
        let trigger = DebouncedTrigger::new(DELAY);
        trigger.schedule();
        assert!(!trigger.is_scheduled());
        assert_eq!(trigger.fired(), 0);
    }
}
