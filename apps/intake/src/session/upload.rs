//! Synthetic upload progress for files that are not extracted.

use std::time::Duration;

use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::debug;

use crate::session::machine::FileJob;
use crate::session::SharedSession;

/// Percentages reported by the synthetic upload: `step, 2*step, ...` with the
/// last value clamped so 100 appears exactly once.
#[derive(Debug, Clone)]
pub struct ProgressSteps {
    next: Option<u8>,
    step: u8,
}

impl ProgressSteps {
    pub fn new(step: u8) -> Self {
        let step = step.clamp(1, 100);
        Self {
            next: Some(step),
            step,
        }
    }
}

impl Iterator for ProgressSteps {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        let current = self.next?;
        self.next = if current >= 100 {
            None
        } else {
            Some(current.saturating_add(self.step).min(100))
        };
        Some(current)
    }
}

/// Ticks progress into the session every `tick`, then completes the upload
/// after `complete_delay`. Stops quietly once the job is cancelled or stale.
pub async fn run_upload(
    session: SharedSession,
    job: FileJob,
    step: u8,
    tick: Duration,
    complete_delay: Duration,
) {
    let mut ticker = interval_at(Instant::now() + tick, tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    for percent in ProgressSteps::new(step) {
        tokio::select! {
            biased;
            _ = job.token.cancelled() => return,
            _ = ticker.tick() => {}
        }
        if !session.lock().await.record_progress(job.ticket, percent) {
            return;
        }
    }

    tokio::select! {
        biased;
        _ = job.token.cancelled() => return,
        _ = sleep(complete_delay) => {}
    }
    if !session.lock().await.complete_upload(job.ticket) {
        debug!("synthetic upload finished for a replaced file");
    }
}
