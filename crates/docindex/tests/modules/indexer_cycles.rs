//! Incremental re-indexing of a watched directory.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use docindex::{DocumentStore, IncrementalIndexer, IndexConfig};
use filetime::{FileTime, set_file_mtime};
use tempfile::TempDir;
use tokio::time::{sleep, timeout};

use crate::support::{HashingEmbedder, init_tracing};

fn indexer(root: &Path) -> IncrementalIndexer<HashingEmbedder> {
    let config = IndexConfig::default();
    let indexer_config = config.indexer.clone();
    let store = DocumentStore::new(HashingEmbedder::new(), config).unwrap();
    IncrementalIndexer::new(Arc::new(store), root, indexer_config)
}

#[tokio::test]
async fn test_modified_file_is_reingested() {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("journal.md");
    fs::write(&path, "monday we planted tomatoes").unwrap();
    set_file_mtime(&path, FileTime::from_unix_time(1_700_000_000, 0)).unwrap();

    let mut indexer = indexer(temp_dir.path());
    let first = indexer.run_cycle().await.unwrap();
    assert_eq!(first.ingested, 1);

    let untouched = indexer.run_cycle().await.unwrap();
    assert_eq!(untouched.ingested, 0);

    fs::write(&path, "tuesday the rain flooded everything").unwrap();
    set_file_mtime(&path, FileTime::from_unix_time(1_700_000_600, 0)).unwrap();

    let second = indexer.run_cycle().await.unwrap();
    assert_eq!(second.ingested, 1);
    assert_eq!(second.accepted_chunks, 1);
    assert_eq!(indexer.store().len().await, 2);
}

#[tokio::test]
async fn test_older_mtime_is_not_reingested() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("notes.txt");
    fs::write(&path, "original wording of notes").unwrap();
    set_file_mtime(&path, FileTime::from_unix_time(1_700_000_000, 0)).unwrap();

    let mut indexer = indexer(temp_dir.path());
    indexer.run_cycle().await.unwrap();

    set_file_mtime(&path, FileTime::from_unix_time(1_600_000_000, 0)).unwrap();
    let report = indexer.run_cycle().await.unwrap();
    assert_eq!(report.ingested, 0);
    assert_eq!(
        indexer.tracked_modified(&path),
        Some(SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_background_indexer_ingests_then_stops() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("a.md"), "alpha file about gardening").unwrap();
    fs::write(temp_dir.path().join("b.txt"), "beta file about sailing").unwrap();

    let indexer = indexer(temp_dir.path());
    let store = Arc::clone(indexer.store());
    let handle = indexer.spawn();

    timeout(Duration::from_secs(10), async {
        while store.len().await < 2 {
            sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();

    let stopped = timeout(Duration::from_secs(10), handle.stop())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stopped.tracked_count(), 2);
}
