pub mod encoder;
pub mod error;
pub mod hasher;
pub mod job;
pub mod prune;
pub mod restore;
pub mod snapshot;
pub mod store;
pub mod types;

pub use encoder::{EncodeOptions, Encoder};
pub use error::{Error, Result};
pub use job::{JobOptions, JobReport, run_job};
pub use prune::{PruneReport, plan_prune, prune};
pub use restore::{RestoreReport, restore};
pub use snapshot::SnapshotRecord;
pub use store::{SnapshotStore, SnapshotSummary};
pub use types::*;

use std::path::Path;
use tracing::info;

/// Captures `source` and persists the record in `store`.
///
/// The store directory is never captured, even when it lives inside
/// `source`.
pub async fn take_snapshot(store: &SnapshotStore, encoder: &Encoder, source: &Path) -> Result<SnapshotID> {
    let encoder = encoder.clone().exclude(store.path());
    let record = encoder.encode(source).await?;
    let id = store.save(&record).await?;
    info!("Snapshot of {} saved as {}", source.display(), id);
    Ok(id)
}
