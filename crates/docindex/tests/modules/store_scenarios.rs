//! End-to-end ingestion, deduplication, search and eviction.

use std::sync::Arc;
use std::time::Duration;

use docindex::index::{UninitializedIndex, UnitVector};
use docindex::{ChunkId, DocumentStore, Error, IndexConfig, Metadata, SearchOptions, SimilarityIndex};
use serde_json::Value;
use tokio::time::sleep;
use tokio_test::{assert_err, assert_ok};

use crate::support::{HashingEmbedder, init_tracing};

fn store(embedder: HashingEmbedder) -> DocumentStore<HashingEmbedder> {
    DocumentStore::new(embedder, IndexConfig::default()).unwrap()
}

#[tokio::test]
async fn test_rephrased_duplicate_adds_nothing() {
    init_tracing();
    let store = store(HashingEmbedder::new());

    let first = store.add("Kup mleko!", Metadata::new()).await;
    let second = store.add("kup mleko", Metadata::new()).await;

    assert_eq!(first.accepted.len(), 1);
    assert!(second.accepted.is_empty());
    assert_eq!(store.len().await, 1);
}

#[test]
fn test_index_rejects_second_dimension() {
    let mut index = SimilarityIndex::default();
    let vectors: [[f32; 4]; 3] = [
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
    ];
    for (position, vector) in vectors.iter().enumerate() {
        assert_ok!(index.add(ChunkId::from(format!("chunk-{position}")), vector));
    }

    let result = index.add(ChunkId::from("chunk-3"), &[0.0, 0.0, 0.0, 1.0, 0.0]);
    assert!(matches!(
        result,
        Err(Error::DimensionMismatch {
            expected: 4,
            actual: 5
        })
    ));
    assert_eq!(index.len(), 3);
    assert_eq!(index.dimension(), Some(4));
}

#[test]
fn test_typed_index_fixes_dimension_on_first_insert() {
    let first = UnitVector::new(&[3.0, 4.0]).unwrap();
    let mut index = UninitializedIndex.insert(ChunkId::from("first"), first);
    assert_eq!(index.dimension(), 2);

    assert_err!(index.add(
        ChunkId::from("second"),
        UnitVector::new(&[1.0, 1.0, 1.0]).unwrap()
    ));
    assert_eq!(index.len(), 1);
}

#[tokio::test]
async fn test_weak_best_match_yields_empty_result() {
    let embedder = HashingEmbedder::new()
        .with("dokument o kotach", vec![1.0, 0.0, 0.0])
        .with("zapytanie", vec![0.7, 0.714_142_8, 0.0]);
    let store = store(embedder);
    store.add("dokument o kotach", Metadata::new()).await;

    let hits = store
        .search("zapytanie", &SearchOptions::new(2).with_min_similarity(0.99))
        .await
        .unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn test_search_finds_word_overlap() {
    let store = store(HashingEmbedder::new());
    let mut tagged = Metadata::new();
    tagged.insert("topic".to_owned(), Value::from("pets"));

    store.add("cats purr softly at night", tagged.clone()).await;
    store.add("quarterly revenue grew strongly", Metadata::new()).await;
    store.add("rust compilers check lifetimes", Metadata::new()).await;

    let hits = store
        .search(
            "cats purr softly",
            &SearchOptions::new(3).with_min_similarity(0.3),
        )
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].text, "cats purr softly at night");
    assert_eq!(hits[0].metadata["topic"], Value::from("pets"));

    let mut other_topic = Metadata::new();
    other_topic.insert("topic".to_owned(), Value::from("finance"));
    let filtered = store
        .search(
            "cats purr softly",
            &SearchOptions::new(3)
                .with_min_similarity(0.3)
                .with_filter(other_topic),
        )
        .await
        .unwrap();
    assert!(filtered.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_ingestion_keeps_ids_unique() {
    let store = Arc::new(store(HashingEmbedder::new()));

    let tasks: Vec<_> = (0..16)
        .map(|task| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .add(&format!("unique{task} document{task} body{task}"), Metadata::new())
                    .await
            })
        })
        .collect();

    let mut ids = Vec::new();
    for task in tasks {
        ids.extend(task.await.unwrap().accepted);
    }
    ids.sort_by(|first, second| first.as_str().cmp(second.as_str()));
    ids.dedup();

    assert_eq!(ids.len(), 16);
    let statistics = store.statistics().await;
    assert_eq!(statistics.chunk_count, 16);
    assert_eq!(statistics.indexed_count, 16);
}

#[tokio::test]
async fn test_flush_evicts_least_recently_used() {
    let mut config = IndexConfig::default();
    config.store.max_chunks = 4;
    config.store.cleanup_fraction = 0.5;
    config.store.save_after_changes = 1000;
    let store = DocumentStore::new(HashingEmbedder::new(), config).unwrap();

    let mut ids = Vec::new();
    for text in ["first note", "second memo", "third letter", "fourth entry"] {
        ids.extend(store.add(text, Metadata::new()).await.accepted);
    }
    sleep(Duration::from_millis(5)).await;
    store.get(&ids[0]).await.unwrap();
    store.get(&ids[2]).await.unwrap();

    assert_ok!(store.flush().await);

    assert_eq!(store.len().await, 2);
    assert!(store.get(&ids[0]).await.is_some());
    assert!(store.get(&ids[2]).await.is_some());
    assert!(store.get(&ids[1]).await.is_none());
    assert_eq!(store.statistics().await.removed_by_maintenance, 2);
}

#[tokio::test]
async fn test_cleanup_removes_only_old_chunks() {
    let store = store(HashingEmbedder::new());
    store.add("stale content here", Metadata::new()).await;
    sleep(Duration::from_millis(200)).await;
    let fresh = store.add("fresh content arrives", Metadata::new()).await;

    let removed = store.cleanup(Duration::from_millis(100)).await;

    assert_eq!(removed, 1);
    assert_eq!(store.len().await, 1);
    assert!(store.get(&fresh.accepted[0]).await.is_some());
}
