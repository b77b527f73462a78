//! Embedding gateway backed by a local Ollama server.

use docindex_core::{EmbeddingConfig, Error, Result};
use ollama_rs::Ollama;
use ollama_rs::generation::embeddings::request::GenerateEmbeddingsRequest;
use tracing::debug;

use super::{Embedding, EmbeddingProvider};

/// Ollama embedding client
pub struct OllamaEmbeddingClient {
    ollama: Ollama,
    model: String,
}

impl OllamaEmbeddingClient {
    /// Client for the configured host, port and model
    pub fn new(config: &EmbeddingConfig) -> Self {
        Self {
            ollama: Ollama::new(config.host.clone(), config.port),
            model: config.model.clone(),
        }
    }

    /// Model used for every request
    pub fn model(&self) -> &str {
        &self.model
    }
}

impl Default for OllamaEmbeddingClient {
    fn default() -> Self {
        Self::new(&EmbeddingConfig::default().with_env_overrides())
    }
}

impl EmbeddingProvider for OllamaEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        let request = GenerateEmbeddingsRequest::new(self.model.clone(), text.to_owned().into());

        let response = self
            .ollama
            .generate_embeddings(request)
            .await
            .map_err(|error| {
                let error_str = format!("{error:?}");
                if error_str.contains("model") && error_str.contains("not found") {
                    Error::EmbeddingFailure(format!(
                        "Embedding model '{}' not found. Run: ollama pull {}",
                        self.model, self.model
                    ))
                } else {
                    Error::EmbeddingFailure(format!("Embedding generation failed: {error}"))
                }
            })?;

        // Ollama returns one vector per input
        let embedding = response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| Error::EmbeddingFailure("No embeddings returned".to_owned()))?;

        if embedding.is_empty() {
            return Err(Error::EmbeddingFailure(
                "Gateway returned an empty embedding".to_owned(),
            ));
        }

        debug!(model = %self.model, dimension = embedding.len(), "embedded text");
        Ok(embedding)
    }
}
