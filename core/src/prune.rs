use crate::store::SnapshotStore;
use crate::{Result, SnapshotID};
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub removed: Vec<SnapshotID>,
    pub kept: Vec<SnapshotID>,
}

impl PruneReport {
    pub fn is_noop(&self) -> bool {
        self.removed.is_empty()
    }
}

/// Splits chronologically sorted `ids` into the records to remove (the
/// oldest) and the `keep` most recent ones.
pub fn plan_prune(ids: &[SnapshotID], keep: usize) -> PruneReport {
    let excess = ids.len().saturating_sub(keep);
    PruneReport {
        removed: ids[..excess].to_vec(),
        kept: ids[excess..].to_vec(),
    }
}

/// Deletes the oldest records until at most `keep` remain.
///
/// Deletion goes oldest first and stops at the first failure, so the store
/// never loses a newer record while an older one survives.
pub async fn prune(store: &SnapshotStore, keep: usize) -> Result<PruneReport> {
    let ids = store.list().await?;
    let plan = plan_prune(&ids, keep);

    if plan.is_noop() {
        info!(
            "Number of snapshots ({}) is within the limit of {}, nothing to prune",
            ids.len(),
            keep
        );
        return Ok(plan);
    }

    for id in &plan.removed {
        store.delete(id).await?;
        info!("Removed snapshot: {}", id);
    }

    info!("Pruned to the most recent {} snapshots", plan.kept.len());
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SnapshotRecord;
    use chrono::{TimeZone, Utc};

    fn ids(n: usize) -> Vec<SnapshotID> {
        (0..n).map(|i| format!("snapshot_{:02}.json", i)).collect()
    }

    #[test]
    fn test_plan_boundaries() {
        let all = ids(5);

        let plan = plan_prune(&all, 2);
        assert_eq!(plan.removed, all[..3].to_vec());
        assert_eq!(plan.kept, all[3..].to_vec());

        assert!(plan_prune(&all, 5).is_noop());
        assert!(plan_prune(&all, 50).is_noop());
        assert_eq!(plan_prune(&all, 50).kept.len(), 5);

        let everything = plan_prune(&all, 0);
        assert_eq!(everything.removed, all);
        assert!(everything.kept.is_empty());

        assert!(plan_prune(&[], 0).is_noop());
    }

    async fn populated_store(n: i64) -> (tempfile::TempDir, SnapshotStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::open(dir.path()).await.unwrap();
        // Newest first, so the store cannot rely on write order.
        for i in (0..n).rev() {
            let record = SnapshotRecord::new(Utc.timestamp_opt(1_600_000_000 + i * 60, 0).unwrap());
            store.save(&record).await.unwrap();
        }
        (dir, store)
    }

    #[tokio::test]
    async fn test_prune_keeps_most_recent() {
        let (_dir, store) = populated_store(6).await;
        let before = store.list().await.unwrap();

        let report = prune(&store, 2).await.unwrap();

        assert_eq!(report.removed, before[..4].to_vec());
        assert_eq!(store.list().await.unwrap(), before[4..].to_vec());
    }

    #[tokio::test]
    async fn test_prune_within_limit_is_noop() {
        let (_dir, store) = populated_store(3).await;

        let report = prune(&store, 3).await.unwrap();
        assert!(report.is_noop());
        assert_eq!(store.list().await.unwrap().len(), 3);

        prune(&store, 10).await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_prune_to_zero() {
        let (_dir, store) = populated_store(4).await;
        let report = prune(&store, 0).await.unwrap();
        assert_eq!(report.removed.len(), 4);
        assert!(store.list().await.unwrap().is_empty());
    }
}
