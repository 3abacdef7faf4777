//! The heartbeat: a fixed-interval ticker driving the somatic loop.
//!
//! Exactly one heartbeat task runs the tick handler serially; two ticks
//! never overlap. The handler receives the measured wall-clock delta since
//! the previous tick, not the nominal interval.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const MIN_INTERVAL: Duration = Duration::from_millis(50);

#[async_trait]
pub trait TickHandler: Send + Sync {
    async fn tick(&self, dt: Duration);
}

/// Handle to a running heartbeat. Dropping it does not stop the task; call
/// [`Heartbeat::stop`] for a deterministic halt.
pub struct Heartbeat {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Heartbeat {
    /// Spawn the ticker. Intervals below the floor are clamped up.
    pub fn spawn(interval: Duration, handler: Arc<dyn TickHandler>) -> Self {
        let interval = interval.max(MIN_INTERVAL);
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut last_tick = Instant::now();

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let now = Instant::now();
                        let dt = now.duration_since(last_tick);
                        last_tick = now;
                        handler.tick(dt).await;
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            tracing::debug!("heartbeat stopped");
                            return;
                        }
                    }
                }
            }
        });

        Self { stop_tx, handle }
    }

    /// Signal the ticker to halt and wait for the task to finish. No tick
    /// starts after this returns.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct Counter {
        ticks: AtomicU64,
        last_dt_ms: AtomicU64,
    }

    #[async_trait]
    impl TickHandler for Counter {
        async fn tick(&self, dt: Duration) {
            self.ticks.fetch_add(1, Ordering::SeqCst);
            self.last_dt_ms.store(dt.as_millis() as u64, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_ticks_and_stops() {
        let counter = Arc::new(Counter {
            ticks: AtomicU64::new(0),
            last_dt_ms: AtomicU64::new(0),
        });
        let hb = Heartbeat::spawn(Duration::from_millis(50), counter.clone());
        tokio::time::sleep(Duration::from_millis(260)).await;
        hb.stop().await;

        let seen = counter.ticks.load(Ordering::SeqCst);
        assert!(seen >= 3, "expected a few ticks, got {seen}");

        // No tick after stop.
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(counter.ticks.load(Ordering::SeqCst), seen);
    }

    #[tokio::test]
    async fn test_interval_floor() {
        let counter = Arc::new(Counter {
            ticks: AtomicU64::new(0),
            last_dt_ms: AtomicU64::new(0),
        });
        // A 1 ms request is clamped to the 50 ms floor.
        let hb = Heartbeat::spawn(Duration::from_millis(1), counter.clone());
        tokio::time::sleep(Duration::from_millis(120)).await;
        hb.stop().await;
        assert!(counter.ticks.load(Ordering::SeqCst) <= 4);
    }
}
