use crate::snapshot::relative_path;
use crate::store::{SnapshotStore, normalize_id};
use crate::{Error, Result, SnapshotID};
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub id: SnapshotID,
    pub files_restored: usize,
    pub bytes_written: u64,
}

/// Rebuilds the tree captured in snapshot `id` under `target`.
///
/// The record and the target layout are fully checked before anything is
/// written: a missing record, one that fails validation, or a target where a
/// file sits in place of a needed directory (or the reverse) leaves `target`
/// untouched. Existing files at restored paths are overwritten; other files
/// in `target` are left alone.
pub async fn restore(store: &SnapshotStore, id: &str, target: &Path) -> Result<RestoreReport> {
    let record = store.load(id).await?;
    record.validate(id, true)?;

    let mut plan: Vec<(PathBuf, &[u8])> = Vec::with_capacity(record.files.len());
    for (key, fingerprint) in &record.files {
        let relative = relative_path(key)
            .ok_or_else(|| Error::corrupt(id, format!("unsafe path {:?}", key)))?;
        let blob = record
            .blob(fingerprint)
            .ok_or_else(|| Error::corrupt(id, format!("content for {} is missing", key)))?;
        plan.push((target.join(relative), blob.as_bytes()));
    }

    check_target(target, &plan).await?;

    info!("Restoring {} files from {} to {}", plan.len(), id, target.display());
    fs::create_dir_all(target).await.map_err(|e| Error::io_at(target, e))?;

    let mut report = RestoreReport {
        id: normalize_id(id),
        ..Default::default()
    };

    for (path, data) in plan {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Error::io_at(parent, e))?;
        }
        fs::write(&path, data).await.map_err(|e| Error::io_at(&path, e))?;

        debug!("Restored: {} ({} bytes)", path.display(), data.len());
        report.files_restored += 1;
        report.bytes_written += data.len() as u64;
    }

    info!("Restored {} files ({} bytes)", report.files_restored, report.bytes_written);
    Ok(report)
}

/// Fails on the first restored path that could not be written as planned.
async fn check_target(target: &Path, plan: &[(PathBuf, &[u8])]) -> Result<()> {
    let mut checked: HashSet<&Path> = HashSet::new();

    for (path, _) in plan {
        for dir in path.ancestors().skip(1) {
            if !checked.insert(dir) {
                break;
            }
            match fs::metadata(dir).await {
                Ok(meta) if meta.is_dir() => {}
                Ok(_) => {
                    return Err(conflict(dir, ErrorKind::NotADirectory, "file in place of a directory"));
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(Error::io_at(dir, e)),
            }
            if dir == target {
                break;
            }
        }

        match fs::metadata(path).await {
            Ok(meta) if meta.is_dir() => {
                return Err(conflict(path, ErrorKind::IsADirectory, "directory in place of a file"));
            }
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(Error::io_at(path, e)),
        }
    }

    Ok(())
}

fn conflict(path: &Path, kind: ErrorKind, message: &str) -> Error {
    Error::io_at(path, std::io::Error::new(kind, message.to_string()))
}
