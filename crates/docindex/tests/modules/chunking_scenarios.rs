//! Document splitting as seen through the public API.

use docindex::chunking::{END_POS_KEY, START_POS_KEY, split};
use docindex::{AddOptions, DocumentStore, IndexConfig, Metadata};
use serde_json::Value;

use crate::support::HashingEmbedder;

fn report_paragraph(number: usize) -> String {
    format!(
        "Raport {number}. Sprzedaż w regionie {number} wzrosła o {number} procent. \
         Zespół numer {number} zakończył wdrożenie modułu {number} przed terminem.\n\n"
    )
}

#[test]
fn test_long_document_yields_three_ordered_windows() {
    let text = "a".repeat(2500);
    let candidates = split(&text, &Metadata::new(), 1000, 200);

    assert_eq!(candidates.len(), 3);
    for pair in candidates.windows(2) {
        assert!(pair[1].span.start >= pair[0].span.start);
        assert!(pair[0].span.end.saturating_sub(pair[1].span.start) <= 200);
    }
}

#[tokio::test]
async fn test_stored_chunks_carry_offsets() {
    let store = DocumentStore::new(HashingEmbedder::new(), IndexConfig::default()).unwrap();
    let document: String = (0..30).map(report_paragraph).collect();

    let report = store
        .add_with_options(&document, Metadata::new(), AddOptions { auto_embed: false })
        .await;
    assert!(report.accepted.len() > 1);

    let mut previous_start = 0;
    for id in &report.accepted {
        let chunk = store.get(id).await.unwrap();
        let start = chunk.metadata()[START_POS_KEY].as_u64().unwrap();
        let end = chunk.metadata()[END_POS_KEY].as_u64().unwrap();

        assert!(start as usize >= previous_start);
        assert!(end > start);
        assert!(document[start as usize..end as usize].contains(chunk.text()));
        previous_start = start as usize;
    }
    assert_eq!(
        store.get(&report.accepted[0]).await.unwrap().metadata()[START_POS_KEY],
        Value::from(0)
    );
}
