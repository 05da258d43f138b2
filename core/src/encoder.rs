use crate::hasher::fingerprint_file;
use crate::snapshot::{SnapshotRecord, path_key};
use crate::{Blob, Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeOptions {
    /// Capture the targets of symlinks. Loops abort the snapshot.
    pub follow_symlinks: bool,
    /// Subtrees left out of the capture. The store directory is always excluded.
    pub exclude: Vec<PathBuf>,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            follow_symlinks: true,
            exclude: Vec::new(),
        }
    }
}

/// Builds [`SnapshotRecord`]s from a live directory tree.
#[derive(Debug, Clone, Default)]
pub struct Encoder {
    options: EncodeOptions,
}

impl Encoder {
    pub fn new(options: EncodeOptions) -> Self {
        Self { options }
    }

    /// Adds a subtree to skip, typically the store itself.
    pub fn exclude(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.exclude.push(path.into());
        self
    }

    pub async fn encode(&self, source: &Path) -> Result<SnapshotRecord> {
        self.encode_at(source, Utc::now()).await
    }

    /// Captures `source` into a record stamped with `captured_at`.
    ///
    /// Any unreadable entry aborts the capture; nothing is written anywhere.
    pub async fn encode_at(&self, source: &Path, captured_at: DateTime<Utc>) -> Result<SnapshotRecord> {
        let metadata = fs::metadata(source).await.map_err(|e| Error::io_at(source, e))?;
        if !metadata.is_dir() {
            return Err(Error::io_at(
                source,
                std::io::Error::new(std::io::ErrorKind::NotADirectory, "not a directory"),
            ));
        }

        let excluded = self.resolve_excludes().await;
        let mut record = SnapshotRecord::new(captured_at);

        info!("Capturing {}", source.display());

        let walker = WalkDir::new(source)
            .follow_links(self.options.follow_symlinks)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_excluded(entry.path(), &excluded));

        for entry in walker {
            let entry = entry?;
            let file_type = entry.file_type();

            if file_type.is_dir() {
                continue;
            }
            if file_type.is_symlink() {
                // Only reachable when links are not followed.
                warn!("Skipping symlink: {}", entry.path().display());
                continue;
            }
            if !file_type.is_file() {
                warn!("Skipping special file: {}", entry.path().display());
                continue;
            }

            let file_path = entry.path();
            let relative = file_path.strip_prefix(source).map_err(|_| Error::InvalidPath {
                path: file_path.display().to_string(),
            })?;
            let key = path_key(relative)?;

            self.add_file(&mut record, key, file_path).await?;
        }

        info!(
            "Captured {} files ({} unique, {} bytes, {} saved by dedup)",
            record.file_count(),
            record.blob_count(),
            record.directory_size,
            record.dedup_savings()
        );

        Ok(record)
    }

    async fn add_file(&self, record: &mut SnapshotRecord, key: String, file_path: &Path) -> Result<()> {
        let (mut fingerprint, size) = fingerprint_file(file_path).await?;
        record.directory_size += size;

        if record.has_blob(&fingerprint) {
            debug!("Duplicate content {}: {}", fingerprint.short_string(), key);
        } else {
            let data = fs::read(file_path).await.map_err(|e| Error::io_at(file_path, e))?;
            let blob = Blob::new(data);
            let stored = blob.fingerprint();

            if stored != fingerprint {
                warn!("File changed while capturing, keeping the content read last: {}", key);
                record.directory_size = record.directory_size - size + blob.len() as u64;
                fingerprint = stored;
            }

            if !record.has_blob(&fingerprint) {
                debug!("Storing {} ({} bytes): {}", fingerprint.short_string(), blob.len(), key);
                record.snapshot_size += blob.len() as u64;
                record.file_contents.insert(fingerprint, blob);
            }
        }

        record.files.insert(key, fingerprint);
        Ok(())
    }

    async fn resolve_excludes(&self) -> Vec<PathBuf> {
        let mut resolved = Vec::with_capacity(self.options.exclude.len() * 2);
        for path in &self.options.exclude {
            resolved.push(path.clone());
            if let Ok(canonical) = fs::canonicalize(path).await {
                resolved.push(canonical);
            }
        }
        resolved
    }
}

fn is_excluded(path: &Path, excluded: &[PathBuf]) -> bool {
    if excluded.is_empty() {
        return false;
    }
    if excluded.iter().any(|ex| path.starts_with(ex)) {
        return true;
    }
    match std::fs::canonicalize(path) {
        Ok(canonical) => excluded.iter().any(|ex| canonical.starts_with(ex)),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Fingerprint;

    async fn write(root: &Path, rel: &str, data: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        fs::write(path, data).await.unwrap();
    }

    #[tokio::test]
    async fn test_dedups_identical_content() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.txt", b"X").await;
        write(dir.path(), "b/c.txt", b"X").await;
        write(dir.path(), "b/d.txt", b"Y").await;

        let record = Encoder::default().encode(dir.path()).await.unwrap();

        assert_eq!(record.file_count(), 3);
        assert_eq!(record.blob_count(), 2);
        assert_eq!(record.directory_size, 3);
        assert_eq!(record.snapshot_size, 2);
        assert_eq!(record.files["a.txt"], record.files["b/c.txt"]);
        assert_eq!(record.files["b/d.txt"], Fingerprint::of(b"Y"));
        record.validate("test", true).unwrap();
    }

    #[tokio::test]
    async fn test_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("only/dirs")).await.unwrap();

        let record = Encoder::default().encode(dir.path()).await.unwrap();
        assert_eq!(record.file_count(), 0);
        assert_eq!(record.directory_size, 0);
        assert_eq!(record.snapshot_size, 0);
    }

    #[tokio::test]
    async fn test_missing_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = Encoder::default().encode(&dir.path().join("missing")).await.unwrap_err();
        assert!(matches!(err, Error::PathIo { .. }));
    }

    #[tokio::test]
    async fn test_excluded_subtree_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "keep.txt", b"keep").await;
        write(dir.path(), "snapshots/old.json", b"{}").await;

        let record = Encoder::default()
            .exclude(dir.path().join("snapshots"))
            .encode(dir.path())
            .await
            .unwrap();

        assert_eq!(record.files.keys().collect::<Vec<_>>(), vec!["keep.txt"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_policy() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        write(outside.path(), "target.txt", b"linked").await;
        write(dir.path(), "plain.txt", b"plain").await;
        std::os::unix::fs::symlink(outside.path().join("target.txt"), dir.path().join("link.txt")).unwrap();

        let followed = Encoder::default().encode(dir.path()).await.unwrap();
        assert_eq!(followed.files["link.txt"], Fingerprint::of(b"linked"));

        let skipped = Encoder::new(EncodeOptions {
            follow_symlinks: false,
            ..Default::default()
        })
        .encode(dir.path())
        .await
        .unwrap();
        assert!(!skipped.files.contains_key("link.txt"));
        assert!(skipped.files.contains_key("plain.txt"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_loop_aborts() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).await.unwrap();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("sub/loop")).unwrap();

        let err = Encoder::default().encode(dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("loop"));
    }
}
