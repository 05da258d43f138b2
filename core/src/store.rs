use crate::snapshot::{RECORD_EXTENSION, RECORD_PREFIX, SnapshotRecord};
use crate::{Error, Result, SnapshotID};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::{debug, info, warn};

/// Same-instant captures get a suffix; sorts after the bare name.
const MAX_COLLISIONS: u32 = 999;

const TEMP_PREFIX: &str = ".snapshot-";
const TEMP_SUFFIX: &str = ".tmp";

/// Temp files older than this are leftovers of a writer that died.
const STALE_TEMP_AGE: Duration = Duration::from_secs(60 * 60);

/// Directory of persisted snapshot records, one JSON file per snapshot.
///
/// # Layout
///
/// ```text
/// store/
/// ├── snapshot_2024-05-01T10-00-00.000000Z.json
/// ├── snapshot_2024-05-01T10-00-00.000000Z_001.json   # same-instant capture
/// └── .snapshot-XXXXXX.tmp                            # write in progress, never listed
/// ```
///
/// Record names embed a fixed-width UTC timestamp, so sorting the names as
/// plain strings yields capture order.
///
/// Temp files left behind by a crashed writer are removed by [`open`] once
/// they are older than an hour; younger ones may belong to a live writer.
///
/// [`open`]: SnapshotStore::open
///
/// # Examples
///
/// ```no_run
/// use snapkeep_core::SnapshotStore;
///
/// #[tokio::main]
/// async fn main() -> snapkeep_core::Result<()> {
///     let store = SnapshotStore::open("./snapshots").await?;
///     for id in store.list().await? {
///         println!("{}", id);
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

/// Per-record metrics reported by `list`.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotSummary {
    pub id: SnapshotID,
    pub timestamp: String,
    pub directory_size: u64,
    pub snapshot_size: u64,
    pub file_count: usize,
    pub blob_count: usize,
    pub record_size: u64,
}

impl SnapshotStore {
    /// Opens the store at `path`, creating the directory if needed and
    /// sweeping stale temp files.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        fs::create_dir_all(&path).await.map_err(|e| Error::io_at(&path, e))?;
        let store = Self { path };
        store.remove_stale_temp_files().await?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Identifiers of all fully written records, oldest first.
    pub async fn list(&self) -> Result<Vec<SnapshotID>> {
        let mut entries = fs::read_dir(&self.path).await.map_err(|e| Error::io_at(&self.path, e))?;
        let mut ids = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(|e| Error::io_at(&self.path, e))? {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !is_record_name(&name) {
                continue;
            }
            let file_type = entry.file_type().await.map_err(|e| Error::io_at(entry.path(), e))?;
            if file_type.is_file() {
                ids.push(name);
            }
        }

        ids.sort();
        Ok(ids)
    }

    pub async fn exists(&self, id: &str) -> Result<bool> {
        let path = self.record_path(id)?;
        fs::try_exists(&path).await.map_err(|e| Error::io_at(&path, e))
    }

    pub async fn load(&self, id: &str) -> Result<SnapshotRecord> {
        let path = self.record_path(id)?;
        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::SnapshotNotFound { id: id.to_string() });
            }
            Err(e) => return Err(Error::io_at(&path, e)),
        };

        serde_json::from_slice(&data)
            .map_err(|e| Error::corrupt(id, format!("unreadable record: {}", e)))
    }

    /// Persists `record` and returns its identifier.
    ///
    /// The record is written to a temporary file inside the store, synced,
    /// and renamed into place without clobbering, so a reader only ever sees
    /// complete records.
    pub async fn save(&self, record: &SnapshotRecord) -> Result<SnapshotID> {
        let data = serde_json::to_vec_pretty(record)?;
        let dir = self.path.clone();
        let base = record.file_name();

        let id = tokio::task::spawn_blocking(move || persist_record(&dir, &base, &data))
            .await
            .map_err(|e| Error::Other(format!("Snapshot writer panicked: {}", e)))??;

        info!("Saved snapshot {}", id);
        Ok(id)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let path = self.record_path(id)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Deleted {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::SnapshotNotFound { id: id.to_string() })
            }
            Err(e) => Err(Error::io_at(&path, e)),
        }
    }

    /// On-disk size of a record file.
    pub async fn record_size(&self, id: &str) -> Result<u64> {
        let path = self.record_path(id)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::SnapshotNotFound { id: id.to_string() })
            }
            Err(e) => Err(Error::io_at(&path, e)),
        }
    }

    pub async fn summary(&self, id: &str) -> Result<SnapshotSummary> {
        let record = self.load(id).await?;
        let record_size = self.record_size(id).await?;
        Ok(SnapshotSummary {
            id: normalize_id(id),
            timestamp: record.timestamp.clone(),
            directory_size: record.directory_size,
            snapshot_size: record.snapshot_size,
            file_count: record.file_count(),
            blob_count: record.blob_count(),
            record_size,
        })
    }

    /// Summaries of every record, oldest first.
    pub async fn summaries(&self) -> Result<Vec<SnapshotSummary>> {
        let mut summaries = Vec::new();
        for id in self.list().await? {
            summaries.push(self.summary(&id).await?);
        }
        Ok(summaries)
    }

    /// Loads a record and checks every invariant, including blob hashes.
    pub async fn verify(&self, id: &str) -> Result<SnapshotRecord> {
        let record = self.load(id).await?;
        record.validate(id, true)?;
        Ok(record)
    }

    async fn remove_stale_temp_files(&self) -> Result<()> {
        let mut entries = fs::read_dir(&self.path).await.map_err(|e| Error::io_at(&self.path, e))?;
        let now = SystemTime::now();

        while let Some(entry) = entries.next_entry().await.map_err(|e| Error::io_at(&self.path, e))? {
            let name = entry.file_name();
            if !name.to_str().is_some_and(is_temp_name) {
                continue;
            }
            let Ok(modified) = entry.metadata().await.and_then(|meta| meta.modified()) else {
                continue;
            };
            if now.duration_since(modified).unwrap_or_default() < STALE_TEMP_AGE {
                continue;
            }

            let path = entry.path();
            match fs::remove_file(&path).await {
                Ok(()) => debug!("Removed stale temp file {}", path.display()),
                Err(e) => warn!("Could not remove stale temp file {}: {}", path.display(), e),
            }
        }

        Ok(())
    }

    fn record_path(&self, id: &str) -> Result<PathBuf> {
        validate_id(id)?;
        Ok(self.path.join(normalize_id(id)))
    }
}

/// Accepts ids with or without the `.json` suffix.
pub fn normalize_id(id: &str) -> SnapshotID {
    if id.ends_with(RECORD_EXTENSION) {
        id.to_string()
    } else {
        format!("{}{}", id, RECORD_EXTENSION)
    }
}

fn validate_id(id: &str) -> Result<()> {
    let invalid = id.is_empty()
        || id.contains('/')
        || id.contains('\\')
        || id.contains("..")
        || id.starts_with('.');

    if invalid {
        return Err(Error::InvalidSnapshotId { id: id.to_string() });
    }
    Ok(())
}

fn is_record_name(name: &str) -> bool {
    name.starts_with(RECORD_PREFIX) && name.ends_with(RECORD_EXTENSION)
}

fn is_temp_name(name: &str) -> bool {
    name.starts_with(TEMP_PREFIX) && name.ends_with(TEMP_SUFFIX)
}

fn persist_record(dir: &Path, base: &str, data: &[u8]) -> Result<SnapshotID> {
    let mut tmp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(TEMP_SUFFIX)
        .tempfile_in(dir)
        .map_err(|e| Error::io_at(dir, e))?;

    tmp.write_all(data).map_err(|e| Error::io_at(tmp.path(), e))?;
    tmp.as_file().sync_all().map_err(|e| Error::io_at(tmp.path(), e))?;

    let stem = base.strip_suffix(RECORD_EXTENSION).unwrap_or(base);
    let mut attempt = 0;
    loop {
        let name = if attempt == 0 {
            base.to_string()
        } else {
            format!("{}_{:03}{}", stem, attempt, RECORD_EXTENSION)
        };
        let target = dir.join(&name);

        match tmp.persist_noclobber(&target) {
            Ok(_) => return Ok(name),
            Err(err) if err.error.kind() == std::io::ErrorKind::AlreadyExists && attempt < MAX_COLLISIONS => {
                tmp = err.file;
                attempt += 1;
            }
            Err(err) => return Err(Error::io_at(&target, err.error)),
        }
    }
}
