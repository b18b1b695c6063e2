//! Time-based progress estimation.
//!
//! The scanning tool reports no progress, so while it runs the job's progress
//! is advanced on a fixed schedule up to a ceiling below the parsing stage.

use crate::job::{lock_job, SharedJob};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use viewkey_core::JobsConfig;

/// Schedule of the estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSettings {
    /// Interval between increments
    pub tick: Duration,
    /// First estimate
    pub start: u8,
    /// Increment per tick
    pub step: u8,
    /// The estimator stops once it reaches this value
    pub ceiling: u8,
}

impl Default for ProgressSettings {
    fn default() -> Self {
        Self::from(&JobsConfig::default())
    }
}

impl From<&JobsConfig> for ProgressSettings {
    fn from(config: &JobsConfig) -> Self {
        Self {
            tick: config.progress_tick(),
            start: config.progress_start,
            step: config.progress_step,
            ceiling: config.progress_ceiling,
        }
    }
}

/// Advance a job's progress until the ceiling, a terminal status, or `stop`.
///
/// Progress is only ever raised, so the worker setting a higher value wins.
pub async fn run_estimator(job: SharedJob, settings: ProgressSettings, stop: CancellationToken) {
    let mut estimate = settings.start;

    while estimate < settings.ceiling {
        {
            let mut job = lock_job(&job);
            if job.status.is_terminal() {
                break;
            }
            job.raise_progress(estimate);
        }

        tokio::select! {
            biased;
            () = stop.cancelled() => break,
            () = tokio::time::sleep(settings.tick) => {}
        }

        estimate = estimate.saturating_add(settings.step.max(1));
    }
}
