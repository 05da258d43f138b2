use snapkeep_core::{Encoder, Fingerprint, SnapshotStore, prune, restore, take_snapshot};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use walkdir::WalkDir;

async fn write(root: &Path, rel: &str, data: &[u8]) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).await.unwrap();
    fs::write(path, data).await.unwrap();
}

fn tree(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    WalkDir::new(root)
        .into_iter()
        .map(|e| e.unwrap())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e.path().strip_prefix(root).unwrap().to_path_buf();
            (rel, std::fs::read(e.path()).unwrap())
        })
        .collect()
}

#[tokio::test]
async fn concrete_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source");
    write(&source, "a.txt", b"X").await;
    write(&source, "b/c.txt", b"X").await;
    write(&source, "b/d.txt", b"Y").await;
    let store = SnapshotStore::open(dir.path().join("store")).await.unwrap();

    let id = take_snapshot(&store, &Encoder::default(), &source).await.unwrap();
    let record = store.load(&id).await.unwrap();

    assert_eq!(record.files.len(), 3);
    assert_eq!(record.file_contents.len(), 2);
    assert_eq!(record.snapshot_size, 2);
    assert_eq!(record.directory_size, 3);
    assert!(record.snapshot_size < record.directory_size);

    let target = dir.path().join("restored");
    restore(&store, &id, &target).await.unwrap();

    assert_eq!(fs::read(target.join("a.txt")).await.unwrap(), b"X");
    assert_eq!(fs::read(target.join("b/c.txt")).await.unwrap(), b"X");
    assert_eq!(fs::read(target.join("b/d.txt")).await.unwrap(), b"Y");
    assert_eq!(tree(&target).len(), 3);
}

#[tokio::test]
async fn deep_tree_round_trips_byte_for_byte() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source");

    let binary: Vec<u8> = (0..20_000u32).map(|i| (i * 31 % 256) as u8).collect();
    write(&source, "README", b"top").await;
    write(&source, "one/README", b"level one").await;
    write(&source, "one/two/README", b"level two").await;
    write(&source, "one/two/three/four/five/leaf.bin", &binary).await;
    write(&source, "other/two/README", b"level two").await;
    write(&source, "empty.txt", b"").await;
    write(&source, "unicode/h\u{e9}llo w\u{f6}rld.txt", "caf\u{e9}".as_bytes()).await;

    let store = SnapshotStore::open(dir.path().join("store")).await.unwrap();
    let id = take_snapshot(&store, &Encoder::default(), &source).await.unwrap();

    let target = dir.path().join("restored");
    restore(&store, &id, &target).await.unwrap();

    assert_eq!(tree(&target), tree(&source));
}

#[tokio::test]
async fn every_encoded_record_is_referentially_complete() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source");
    for i in 0..20 {
        let content = format!("content {}", i % 4);
        write(&source, &format!("d{}/f{}.txt", i % 3, i), content.as_bytes()).await;
    }
    let store = SnapshotStore::open(dir.path().join("store")).await.unwrap();

    let id = take_snapshot(&store, &Encoder::default(), &source).await.unwrap();
    let record = store.verify(&id).await.unwrap();

    for fp in record.files.values() {
        assert!(record.file_contents.contains_key(fp));
    }
    for (fp, blob) in &record.file_contents {
        assert!(record.files.values().any(|v| v == fp));
        assert_eq!(Fingerprint::of(blob.as_bytes()), *fp);
    }
    assert_eq!(record.file_contents.len(), 4);
}

#[tokio::test]
async fn store_inside_source_is_not_captured() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "data.txt", b"payload").await;
    let store = SnapshotStore::open(dir.path().join("snapshots")).await.unwrap();

    take_snapshot(&store, &Encoder::default(), dir.path()).await.unwrap();
    let id = take_snapshot(&store, &Encoder::default(), dir.path()).await.unwrap();
    let record = store.load(&id).await.unwrap();

    assert_eq!(record.files.keys().collect::<Vec<_>>(), vec!["data.txt"]);
}

#[tokio::test]
async fn prune_keeps_the_most_recent_snapshots() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source");
    let store = SnapshotStore::open(dir.path().join("store")).await.unwrap();

    let mut taken = Vec::new();
    for i in 0..5 {
        write(&source, "state.txt", format!("version {}", i).as_bytes()).await;
        taken.push(take_snapshot(&store, &Encoder::default(), &source).await.unwrap());
    }
    assert_eq!(store.list().await.unwrap(), taken);

    prune(&store, 2).await.unwrap();
    assert_eq!(store.list().await.unwrap(), taken[3..].to_vec());

    let target = dir.path().join("restored");
    restore(&store, &taken[4], &target).await.unwrap();
    assert_eq!(fs::read(target.join("state.txt")).await.unwrap(), b"version 4");

    let err = restore(&store, &taken[0], &dir.path().join("gone")).await.unwrap_err();
    assert!(err.is_not_found());
}

#[cfg(unix)]
#[tokio::test]
async fn failed_capture_leaves_store_empty() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source");
    write(&source, "a.txt", b"good").await;
    std::os::unix::fs::symlink(dir.path().join("nowhere"), source.join("z-dangling")).unwrap();
    let store = SnapshotStore::open(dir.path().join("store")).await.unwrap();

    let err = take_snapshot(&store, &Encoder::default(), &source).await.unwrap_err();
    assert!(err.to_string().contains("z-dangling"));

    assert!(store.list().await.unwrap().is_empty());
    let leftovers: Vec<_> = std::fs::read_dir(store.path()).unwrap().collect();
    assert!(leftovers.is_empty(), "store has leftovers: {:?}", leftovers);
}
