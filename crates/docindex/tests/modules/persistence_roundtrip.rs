//! Flushing a store to disk and reopening it.

use std::fs;
use std::path::Path;

use docindex::persistence::{CHUNKS_FILE, INDEX_FILE};
use docindex::{DocumentStore, FlushOutcome, IndexConfig, Metadata, SearchOptions};
use serde_json::json;
use tempfile::TempDir;
use tokio_test::block_on;

use crate::support::{DIMENSION, HashingEmbedder};

fn persistent_config(directory: &Path) -> IndexConfig {
    let mut config = IndexConfig::default();
    config.persistence.directory = Some(directory.to_path_buf());
    config
}

#[test]
fn test_reopened_store_answers_like_the_original() {
    let temp_dir = TempDir::new().unwrap();
    let config = persistent_config(temp_dir.path());

    let before = block_on(async {
        let store = DocumentStore::open(HashingEmbedder::new(), config.clone())
            .await
            .unwrap();
        store.add("lighthouse keepers log the storms", Metadata::new()).await;
        store.add("bakers knead dough before dawn", Metadata::new()).await;
        assert_eq!(
            store.flush().await.unwrap(),
            FlushOutcome::Saved { chunks: 2 }
        );
        store
            .search("storms lighthouse", &SearchOptions::new(2).with_min_similarity(0.3))
            .await
            .unwrap()
    });
    assert!(temp_dir.path().join(CHUNKS_FILE).exists());
    assert!(temp_dir.path().join(INDEX_FILE).exists());

    let after = block_on(async {
        let store = DocumentStore::open(HashingEmbedder::new(), config)
            .await
            .unwrap();
        assert_eq!(store.len().await, 2);
        store
            .search("storms lighthouse", &SearchOptions::new(2).with_min_similarity(0.3))
            .await
            .unwrap()
    });

    assert_eq!(before.len(), 1);
    assert_eq!(after.len(), 1);
    assert_eq!(before[0].id, after[0].id);
    assert!((before[0].similarity - after[0].similarity).abs() < 1e-5);
}

#[tokio::test]
async fn test_reopened_chunks_keep_every_field() {
    let temp_dir = TempDir::new().unwrap();
    let config = persistent_config(temp_dir.path());

    let mut tagged = Metadata::new();
    tagged.insert("source".to_owned(), json!("harbour.md"));
    tagged.insert("tags".to_owned(), json!(["sea", "night"]));

    let store = DocumentStore::new(HashingEmbedder::new(), config.clone()).unwrap();
    let mut ids = store
        .add("lighthouse keepers log the storms", tagged)
        .await
        .accepted;
    ids.extend(store.add("bakers knead dough before dawn", Metadata::new()).await.accepted);
    assert_eq!(ids.len(), 2);

    let mut originals = Vec::new();
    for id in &ids {
        originals.push(store.get(id).await.unwrap());
    }
    store.flush().await.unwrap();
    let statistics = store.statistics().await;
    drop(store);

    let reopened = DocumentStore::open(HashingEmbedder::new(), config).await.unwrap();
    let restored_statistics = reopened.statistics().await;
    assert_eq!(restored_statistics.chunk_count, 2);
    assert_eq!(restored_statistics.indexed_count, statistics.indexed_count);
    assert_eq!(restored_statistics.dimension, Some(DIMENSION));

    for original in &originals {
        let restored = reopened.get(original.id()).await.unwrap();
        assert_eq!(restored.text(), original.text());
        assert_eq!(restored.metadata(), original.metadata());
        assert_eq!(restored.fingerprint(), original.fingerprint());
        assert_eq!(restored.created_at(), original.created_at());
        assert!(restored.embedding().is_some());
    }
}

#[tokio::test]
async fn test_corrupt_index_keeps_chunk_records() {
    let temp_dir = TempDir::new().unwrap();
    let config = persistent_config(temp_dir.path());

    let store = DocumentStore::new(HashingEmbedder::new(), config.clone()).unwrap();
    store.add("records survive a broken index", Metadata::new()).await;
    store.flush().await.unwrap();
    drop(store);

    fs::write(temp_dir.path().join(INDEX_FILE), b"not an index").unwrap();

    let reopened = DocumentStore::open(HashingEmbedder::new(), config).await.unwrap();
    let statistics = reopened.statistics().await;
    assert_eq!(statistics.chunk_count, 1);
    assert_eq!(statistics.indexed_count, 0);
    assert_eq!(statistics.dimension, None);
}

#[tokio::test]
async fn test_empty_directory_opens_empty_store() {
    let temp_dir = TempDir::new().unwrap();
    let store = DocumentStore::open(
        HashingEmbedder::new(),
        persistent_config(&temp_dir.path().join("fresh")),
    )
    .await
    .unwrap();

    assert!(store.is_empty().await);
    assert_eq!(
        store.flush().await.unwrap(),
        FlushOutcome::Saved { chunks: 0 }
    );
    assert_eq!(store.flush().await.unwrap(), FlushOutcome::UpToDate);
}
