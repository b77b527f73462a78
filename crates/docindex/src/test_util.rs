//! Deterministic embedding providers for unit tests.

use std::collections::{HashMap, HashSet};
use std::hash::{DefaultHasher, Hash as _, Hasher as _};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use docindex_core::{Error, Result};

use crate::embedding::{Embedding, EmbeddingProvider};

/// Dimension of fallback pseudo-random embeddings
pub const FALLBACK_DIMENSION: usize = 64;

/// Embedder returning fixed vectors for known texts and hash-seeded vectors otherwise.
///
/// Fallback vectors have zero-mean components, so unrelated texts land close
/// to orthogonal and never trip the duplicate threshold by accident.
#[derive(Default)]
pub struct StubEmbedder {
    table: Mutex<HashMap<String, Embedding>>,
    failing: Mutex<HashSet<String>>,
    calls: AtomicUsize,
}

impl StubEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `embedding` whenever `text` is embedded
    pub fn with(self, text: &str, embedding: Vec<f32>) -> Self {
        self.table
            .lock()
            .expect("stub table poisoned")
            .insert(text.to_owned(), embedding);
        self
    }

    /// Fail whenever `text` is embedded
    pub fn failing_on(self, text: &str) -> Self {
        self.failing
            .lock()
            .expect("stub failures poisoned")
            .insert(text.to_owned());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EmbeddingProvider for StubEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self
            .failing
            .lock()
            .expect("stub failures poisoned")
            .contains(text)
        {
            return Err(Error::EmbeddingFailure(format!("refusing to embed '{text}'")));
        }

        if let Some(embedding) = self.table.lock().expect("stub table poisoned").get(text) {
            return Ok(embedding.clone());
        }

        Ok(pseudo_random_embedding(text, FALLBACK_DIMENSION))
    }
}

/// Zero-mean deterministic vector seeded by the text hash
pub fn pseudo_random_embedding(text: &str, dimension: usize) -> Embedding {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    let mut state = hasher.finish();

    (0..dimension)
        .map(|_| {
            // splitmix64
            state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
            let mut mixed = state;
            mixed = (mixed ^ (mixed >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
            mixed = (mixed ^ (mixed >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
            mixed ^= mixed >> 31;
            (mixed >> 11) as f32 / (1u64 << 53) as f32 * 2.0 - 1.0
        })
        .collect()
}
