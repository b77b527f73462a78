//! Embedding gateway: turns text into fixed-length vectors.

mod ollama;

pub use ollama::OllamaEmbeddingClient;

use docindex_core::Result;
use std::future::Future;

/// A single embedding vector
pub type Embedding = Vec<f32>;

/// Trait for generating embeddings from text
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embedding for text
    ///
    /// # Errors
    /// Returns [`docindex_core::Error::EmbeddingFailure`] if the gateway cannot
    /// produce a vector
    fn embed(&self, text: &str) -> impl Future<Output = Result<Embedding>> + Send;
}
