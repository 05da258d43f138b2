use crate::encoder::Encoder;
use crate::prune::prune;
use crate::store::SnapshotStore;
use crate::{Result, SnapshotID, take_snapshot};
use std::path::Path;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior, interval, sleep_until};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct JobOptions {
    /// Time between the starts of consecutive snapshots.
    pub interval: Duration,
    /// No snapshot is started once this much time has passed.
    pub duration: Duration,
    /// Prune down to this many records after each snapshot.
    pub keep_last: Option<usize>,
    pub stop_on_error: bool,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            duration: Duration::from_secs(3600),
            keep_last: None,
            stop_on_error: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct JobReport {
    pub taken: Vec<SnapshotID>,
    pub failed: usize,
}

/// Takes a snapshot of `source` every `interval` until `duration` has
/// elapsed.
///
/// Snapshots run strictly one after another: a tick that comes due while a
/// snapshot is still running is skipped rather than queued. A snapshot
/// started before the deadline always runs to completion.
pub async fn run_job(
    store: &SnapshotStore,
    encoder: &Encoder,
    source: &Path,
    options: &JobOptions,
) -> Result<JobReport> {
    let start = Instant::now();
    let deadline = start + options.duration;
    let mut ticker = interval(options.interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut report = JobReport::default();

    info!(
        "Starting job for {}: every {:?} for {:?}",
        source.display(),
        options.interval,
        options.duration
    );

    loop {
        tokio::select! {
            biased;
            _ = sleep_until(deadline) => break,
            _ = ticker.tick() => {}
        }
        if Instant::now() >= deadline {
            break;
        }

        match take_snapshot(store, encoder, source).await {
            Ok(id) => {
                info!("Job snapshot {} taken", id);
                report.taken.push(id);
            }
            Err(e) if !options.stop_on_error => {
                warn!("Job snapshot of {} failed: {}", source.display(), e);
                report.failed += 1;
                continue;
            }
            Err(e) => return Err(e),
        }

        if let Some(keep) = options.keep_last {
            prune(store, keep).await?;
        }
    }

    info!(
        "Job finished after {:?}: {} snapshots, {} failures",
        start.elapsed(),
        report.taken.len(),
        report.failed
    );
    Ok(report)
}
