//! Cancellable repeating task driving the screen-time timers.
//!
//! A [`Ticker`] owns its spawned task. [`Ticker::stop`] signals the loop and
//! waits for it to finish, so once it returns no further tick can run. Dropping
//! a ticker without stopping it aborts the task, so no exit path leaves a loop
//! running.

use std::future::Future;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

pub struct Ticker {
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Run `on_tick` every `period`, first one `period` after starting.
    ///
    /// Ticks never overlap: the next tick is only awaited once the previous
    /// callback has completed. The loop ends on its own once a tick returns
    /// `false`.
    pub fn start<F, Fut>(period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    _ = interval.tick() => {
                        if !on_tick().await {
                            debug!("Ticker finished by its callback");
                            break;
                        }
                    }
                }
            }
            debug!("Ticker loop finished");
        });

        Self {
            stop_tx: Some(stop_tx),
            task: Some(task),
        }
    }

    /// Whether the loop is still scheduled
    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop ticking and wait for any in-flight tick to complete
    pub async fn stop(mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    fn counting_ticker(period: Duration) -> (Ticker, Arc<AtomicU64>) {
        let count = Arc::new(AtomicU64::new(0));
        let ticks = count.clone();
        let ticker = Ticker::start(period, move || {
            let ticks = ticks.clone();
            async move {
                ticks.fetch_add(1, Ordering::SeqCst);
                true
            }
        });
        (ticker, count)
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_once_per_period() {
        let (ticker, count) = counting_ticker(Duration::from_secs(1));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(ticker.is_active());

        ticker.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_ticks() {
        let (ticker, count) = counting_ticker(Duration::from_secs(1));

        tokio::time::sleep(Duration::from_millis(2500)).await;
        ticker.stop().await;
        let stopped_at = count.load(Ordering::SeqCst);
        assert_eq!(stopped_at, 2);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), stopped_at);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_aborts_ticks() {
        let (ticker, count) = counting_ticker(Duration::from_secs(1));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        drop(ticker);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_callback_can_end_the_loop() {
        let count = Arc::new(AtomicU64::new(0));
        let ticks = count.clone();
        let ticker = Ticker::start(Duration::from_secs(1), move || {
            let ticks = ticks.clone();
            async move { ticks.fetch_add(1, Ordering::SeqCst) + 1 < 3 }
        });

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(!ticker.is_active());

        ticker.stop().await;
    }
}
