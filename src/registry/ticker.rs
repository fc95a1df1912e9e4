use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::simulation::SimulatorInstance;

/// Handle to one running meter's periodic tick task
#[derive(Debug)]
pub struct Ticker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Ticker {
    /// Spawn the tick loop; the first tick fires one `period` after now
    pub fn spawn(instance: Arc<SimulatorInstance>, period: Duration) -> Self {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_ticks(instance, period, cancel.clone()));
        Self { cancel, handle }
    }

    /// Cancel the loop and wait until it has exited
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            warn!(error = %e, "tick task ended abnormally");
        }
    }
}

async fn run_ticks(instance: Arc<SimulatorInstance>, period: Duration, cancel: CancellationToken) {
    let period = period.max(Duration::from_millis(1));
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    debug!(id = %instance.id(), period_ms = period.as_millis() as u64, "tick task started");
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            now = interval.tick() => {
                instance.tick(now);
            }
        }
    }
    debug!(id = %instance.id(), "tick task stopped");
}
