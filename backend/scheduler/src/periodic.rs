//! Fixed-interval job loop with cooperative shutdown.
use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

/// Run `tick` every `period` until `shutdown` flips to `true` or its sender is dropped.
///
/// The first pass runs one full period after start. A pass in progress is
/// never interrupted; shutdown is observed between passes.
pub async fn run_periodic<F, Fut>(
    job: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut tick: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    if *shutdown.borrow() {
        return;
    }

    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    interval.tick().await;
    info!(job, period_secs = period.as_secs(), "Periodic job started");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                debug!(job, "Periodic job tick");
                tick().await;
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!(job, "Periodic job stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_ticks_each_period_until_shutdown() {
        let (tx, rx) = watch::channel(false);
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();

        let handle = tokio::spawn(async move {
            run_periodic("test", Duration::from_secs(10), rx, move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            })
            .await;
        });

        time::sleep(Duration::from_secs(35)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);

        tx.send(true).unwrap();
        handle.await.unwrap();
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_sender_stops_loop() {
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(run_periodic("test", Duration::from_secs(10), rx, || async {}));
        drop(tx);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_already_shut_down_returns_immediately() {
        let (_tx, rx) = watch::channel(true);
        run_periodic("test", Duration::from_secs(3600), rx, || async {
            panic!("must not tick");
        })
        .await;
    }
}
