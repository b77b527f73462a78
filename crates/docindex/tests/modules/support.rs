//! Shared helpers: a feature-hashing embedder and log setup.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash as _, Hasher as _};
use std::sync::Once;

use docindex::{Embedding, EmbeddingProvider, Error, Result};
use tracing_subscriber::fmt;
use tracing_subscriber::{
    EnvFilter, layer::SubscriberExt as _, registry, util::SubscriberInitExt as _,
};

/// Dimension of hashed embeddings
pub const DIMENSION: usize = 256;

/// Bag-of-words embedder: each lowercase word adds +1 or -1 to one bucket.
///
/// Texts sharing no words come out close to orthogonal. Fixed vectors can be
/// registered for exact texts.
#[derive(Default)]
pub struct HashingEmbedder {
    fixed: HashMap<String, Embedding>,
}

impl HashingEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `text` with `embedding`
    pub fn with(mut self, text: &str, embedding: Vec<f32>) -> Self {
        self.fixed.insert(text.to_owned(), embedding);
        self
    }
}

impl EmbeddingProvider for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        if let Some(embedding) = self.fixed.get(text) {
            return Ok(embedding.clone());
        }

        let mut embedding = vec![0.0; DIMENSION];
        for word in text.split_whitespace() {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            let hash = hasher.finish();
            let bucket = (hash % DIMENSION as u64) as usize;
            embedding[bucket] += if hash & (1 << 40) == 0 { 1.0 } else { -1.0 };
        }

        if embedding.iter().all(|component| *component == 0.0) {
            return Err(Error::EmbeddingFailure(format!("no words in '{text}'")));
        }
        Ok(embedding)
    }
}

/// Route test logs through the `RUST_LOG` filter once per process
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        drop(
            registry()
                .with(fmt::layer().with_test_writer().with_target(false))
                .with(EnvFilter::from_default_env())
                .try_init(),
        );
    });
}
