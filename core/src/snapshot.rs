use crate::{Blob, Error, Fingerprint, Result, SnapshotID};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};

pub const RECORD_PREFIX: &str = "snapshot_";
pub const RECORD_EXTENSION: &str = ".json";

/// Fixed width and UTC, so timestamps sort the same as strings and as instants.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S%.6fZ";

/// One persisted capture of a directory tree.
///
/// `files` maps each path (relative to the captured root, `/`-separated) to
/// the fingerprint of its content; `file_contents` holds each distinct
/// content exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub timestamp: String,
    pub files: BTreeMap<String, Fingerprint>,
    pub file_contents: BTreeMap<Fingerprint, Blob>,
    pub directory_size: u64,
    pub snapshot_size: u64,
}

impl SnapshotRecord {
    pub fn new(captured_at: DateTime<Utc>) -> Self {
        Self {
            timestamp: format_timestamp(captured_at),
            files: BTreeMap::new(),
            file_contents: BTreeMap::new(),
            directory_size: 0,
            snapshot_size: 0,
        }
    }

    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.timestamp)
    }

    /// Name the record is persisted under, before any collision suffix.
    pub fn file_name(&self) -> SnapshotID {
        format!("{}{}{}", RECORD_PREFIX, self.timestamp, RECORD_EXTENSION)
    }

    pub fn has_blob(&self, fingerprint: &Fingerprint) -> bool {
        self.file_contents.contains_key(fingerprint)
    }

    pub fn blob(&self, fingerprint: &Fingerprint) -> Option<&Blob> {
        self.file_contents.get(fingerprint)
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn blob_count(&self) -> usize {
        self.file_contents.len()
    }

    /// Bytes saved by storing duplicate contents once.
    pub fn dedup_savings(&self) -> u64 {
        self.directory_size.saturating_sub(self.snapshot_size)
    }

    /// Checks the structural invariants a restore relies on: every path is a
    /// safe relative path and every referenced blob exists. With
    /// `check_contents`, every blob must also hash to its key and none may be
    /// unreferenced.
    pub fn validate(&self, id: &str, check_contents: bool) -> Result<()> {
        for (path, fingerprint) in &self.files {
            relative_path(path).ok_or_else(|| {
                Error::corrupt(id, format!("unsafe path {:?} in file index", path))
            })?;

            if !self.has_blob(fingerprint) {
                return Err(Error::corrupt(
                    id,
                    format!("content {} for {} is missing", fingerprint.short_string(), path),
                ));
            }
        }

        if check_contents {
            let referenced: BTreeSet<&Fingerprint> = self.files.values().collect();
            for (fingerprint, blob) in &self.file_contents {
                if !referenced.contains(fingerprint) {
                    return Err(Error::corrupt(
                        id,
                        format!("content {} is not referenced by any file", fingerprint.short_string()),
                    ));
                }
                if blob.fingerprint() != *fingerprint {
                    return Err(Error::corrupt(
                        id,
                        format!("content {} does not match its hash", fingerprint.short_string()),
                    ));
                }
            }
        }

        Ok(())
    }
}

pub fn format_timestamp(time: DateTime<Utc>) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(timestamp: &str) -> Option<DateTime<Utc>> {
    let naive = timestamp.strip_suffix('Z')?;
    NaiveDateTime::parse_from_str(naive, "%Y-%m-%dT%H-%M-%S%.f")
        .ok()
        .map(|dt| dt.and_utc())
}

/// Converts a stored `/`-separated key into a relative path, or `None` if it
/// is empty, absolute or climbs out of its root.
pub fn relative_path(key: &str) -> Option<PathBuf> {
    if key.is_empty() || key.starts_with('/') || key.contains('\\') {
        return None;
    }

    let mut path = PathBuf::new();
    for part in key.split('/') {
        match part {
            "" | "." => continue,
            ".." => return None,
            _ => path.push(part),
        }
    }

    // Catches prefixes like `C:` that only mean something on Windows.
    if path.as_os_str().is_empty() || !path.components().all(|c| matches!(c, Component::Normal(_))) {
        return None;
    }

    Some(path)
}

/// Inverse of [`relative_path`]: joins the components of `path` with `/`.
pub fn path_key(path: &Path) -> Result<String> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => {
                let part = part.to_str().ok_or_else(|| Error::InvalidPath {
                    path: path.display().to_string(),
                })?;
                parts.push(part);
            }
            Component::CurDir => {}
            _ => {
                return Err(Error::InvalidPath {
                    path: path.display().to_string(),
                });
            }
        }
    }

    if parts.is_empty() {
        return Err(Error::InvalidPath {
            path: path.display().to_string(),
        });
    }

    Ok(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record_with(files: &[(&str, &str)]) -> SnapshotRecord {
        let mut record = SnapshotRecord::new(Utc::now());
        for (path, data) in files {
            let blob = Blob::new(data.as_bytes().to_vec());
            let fp = blob.fingerprint();
            record.files.insert(path.to_string(), fp);
            record.file_contents.entry(fp).or_insert(blob);
        }
        record
    }

    #[test]
    fn test_timestamp_round_trip_and_ordering() {
        let early = Utc.with_ymd_and_hms(2024, 1, 9, 23, 59, 59).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();

        let a = format_timestamp(early);
        let b = format_timestamp(late);
        assert_eq!(a, "2024-01-09T23-59-59.000000Z");
        assert!(a < b);
        assert_eq!(parse_timestamp(&a), Some(early));
        assert_eq!(parse_timestamp("garbage"), None);
    }

    #[test]
    fn test_file_name() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let record = SnapshotRecord::new(at);
        assert_eq!(record.file_name(), "snapshot_2024-05-01T10-00-00.000000Z.json");
    }

    #[test]
    fn test_relative_path_rejects_escapes() {
        assert_eq!(relative_path("a/b/c.txt"), Some(PathBuf::from("a").join("b").join("c.txt")));
        assert_eq!(relative_path("./a.txt"), Some(PathBuf::from("a.txt")));
        assert_eq!(relative_path("../etc/passwd"), None);
        assert_eq!(relative_path("a/../../b"), None);
        assert_eq!(relative_path("/etc/passwd"), None);
        assert_eq!(relative_path(""), None);
        assert_eq!(relative_path("."), None);
    }

    #[test]
    fn test_path_key() {
        let path = Path::new("b").join("c").join("d.txt");
        assert_eq!(path_key(&path).unwrap(), "b/c/d.txt");
        assert!(path_key(Path::new("")).is_err());
        assert!(path_key(Path::new("../x")).is_err());
    }

    #[test]
    fn test_validate_detects_missing_blob() {
        let mut record = record_with(&[("a.txt", "X")]);
        record.files.insert("b.txt".into(), Fingerprint::of(b"missing"));

        let err = record.validate("snap", false).unwrap_err();
        assert!(err.is_corrupt());
    }

    #[test]
    fn test_validate_detects_orphans_and_bad_content() {
        let mut record = record_with(&[("a.txt", "X")]);
        record.validate("snap", true).unwrap();

        let orphan = Blob::new(b"orphan".to_vec());
        record.file_contents.insert(orphan.fingerprint(), orphan);
        assert!(record.validate("snap", false).is_ok());
        assert!(record.validate("snap", true).unwrap_err().is_corrupt());

        let mut tampered = record_with(&[("a.txt", "X")]);
        let fp = Fingerprint::of(b"X");
        tampered.file_contents.insert(fp, Blob::new(b"Z".to_vec()));
        assert!(tampered.validate("snap", true).unwrap_err().is_corrupt());
    }

    #[test]
    fn test_json_field_names() {
        let record = record_with(&[("a.txt", "X")]);
        let value = serde_json::to_value(&record).unwrap();
        for key in ["timestamp", "files", "file_contents", "directory_size", "snapshot_size"] {
            assert!(value.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(value["file_contents"][Fingerprint::of(b"X").to_hex()], "WA==");
    }
}
