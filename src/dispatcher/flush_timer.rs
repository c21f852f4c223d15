use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::time::interval_at;
use tokio::time::Instant;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use super::DispatchEvent;

/// Periodic flush, independent of the threshold trigger. The first fire is
/// immediate when the queue already exceeds the flush threshold at startup,
/// otherwise delayed by one full interval.
pub(crate) async fn run_flush_timer(
    interval: Duration,
    fire_immediately: bool,
    tx: mpsc::UnboundedSender<DispatchEvent>,
    mut shutdown_signal: watch::Receiver<()>,
) {
    let first_tick = if fire_immediately {
        Instant::now()
    } else {
        Instant::now() + interval
    };
    let mut ticker = interval_at(first_tick, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown_signal.changed() => {
                debug!("[FlushTimer] shutdown signal received.");
                return;
            }
            _ = ticker.tick() => {
                if tx.send(DispatchEvent::Flush).is_err() {
                    return;
                }
            }
        }
    }
}
