//! Keepalive supervisor
//!
//! Runs one periodic task per connection. Each period it sleeps first and then
//! calls the tick callback; the callback returns `false` to end the loop. The
//! callback is expected to re-check connection state itself, since `stop` can
//! race with a tick that has already woken up.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Owns the periodic keepalive task
#[derive(Debug, Default)]
pub struct KeepaliveSupervisor {
    task: Option<JoinHandle<()>>,
    interval: Option<Duration>,
}

impl KeepaliveSupervisor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start ticking every `interval`, replacing any running task
    ///
    /// The first tick fires one full `interval` after this call. Must be
    /// called from within a tokio runtime.
    pub fn start<F>(&mut self, interval: Duration, mut tick: F)
    where
        F: FnMut() -> bool + Send + 'static,
    {
        self.stop();

        // Deadline is fixed here, not when the task is first polled
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.task = Some(tokio::spawn(async move {
            loop {
                ticker.tick().await;
                if !tick() {
                    tracing::trace!("Keepalive loop finished");
                    break;
                }
            }
        }));
        self.interval = Some(interval);

        tracing::debug!(interval_ms = interval.as_millis(), "Keepalive started");
    }

    /// Cancel the running task, if any
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!("Keepalive stopped");
        }
        self.interval = None;
    }

    /// Check if the periodic task is still alive
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Interval of the running task
    #[must_use]
    pub const fn interval(&self) -> Option<Duration> {
        self.interval
    }
}

impl Drop for KeepaliveSupervisor {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const INTERVAL: Duration = Duration::from_secs(120);

    fn counting() -> (Arc<AtomicUsize>, impl FnMut() -> bool + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let ticks = Arc::clone(&count);
        (count, move || {
            ticks.fetch_add(1, Ordering::SeqCst);
            true
        })
    }

    async fn advance(duration: Duration) {
        tokio::time::advance(duration).await;
        tokio::task::yield_now().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_after_full_interval() {
        let (count, tick) = counting();
        let mut keepalive = KeepaliveSupervisor::new();
        keepalive.start(INTERVAL, tick);
        assert!(keepalive.is_running());
        assert_eq!(keepalive.interval(), Some(INTERVAL));

        advance(INTERVAL - Duration::from_millis(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        advance(Duration::from_millis(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        advance(INTERVAL).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_prevents_further_ticks() {
        let (count, tick) = counting();
        let mut keepalive = KeepaliveSupervisor::new();
        keepalive.start(INTERVAL, tick);

        advance(INTERVAL).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        keepalive.stop();
        assert!(!keepalive.is_running());
        assert_eq!(keepalive.interval(), None);

        advance(INTERVAL * 3).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_task() {
        let (first, tick) = counting();
        let (second, tick2) = counting();
        let mut keepalive = KeepaliveSupervisor::new();

        keepalive.start(INTERVAL, tick);
        advance(INTERVAL / 2).await;
        keepalive.start(INTERVAL, tick2);

        advance(INTERVAL).await;
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_returning_false_ends_loop() {
        let count = Arc::new(AtomicUsize::new(0));
        let ticks = Arc::clone(&count);
        let mut keepalive = KeepaliveSupervisor::new();
        keepalive.start(INTERVAL, move || {
            ticks.fetch_add(1, Ordering::SeqCst);
            false
        });

        advance(INTERVAL).await;
        advance(INTERVAL).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!keepalive.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_aborts_task() {
        let (count, tick) = counting();
        let mut keepalive = KeepaliveSupervisor::new();
        keepalive.start(INTERVAL, tick);
        drop(keepalive);

        advance(INTERVAL * 2).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
