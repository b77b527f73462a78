//! Configuration types for chunking, deduplication, search, storage and background indexing.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use toml::{from_str, to_string_pretty};
use tracing::debug;

/// Complete index configuration.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Chunk boundary selection
    pub chunking: ChunkingConfig,
    /// Near-duplicate detection
    pub dedup: DedupConfig,
    /// Query defaults
    pub search: SearchConfig,
    /// Capacity, eviction and flush policy
    pub store: StoreConfig,
    /// On-disk location of persisted state
    pub persistence: PersistenceConfig,
    /// Background directory re-indexing
    pub indexer: IndexerConfig,
    /// Embedding gateway connection
    pub embedding: EmbeddingConfig,
}

/// Chunk boundary selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window size in bytes
    pub target_size: usize,
    /// Bytes shared between consecutive windows
    pub overlap: usize,
    /// Boundary markers in priority order (paragraph, line, sentence, clause, whitespace)
    pub separators: Vec<String>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_size: 1000,
            overlap: 200,
            separators: ["\n\n", "\n", ". ", "! ", "? ", "; ", ":", " - ", "\t", "  ", " "]
                .into_iter()
                .map(str::to_owned)
                .collect(),
        }
    }
}

/// Near-duplicate detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Cosine similarity above which two embedded chunks are duplicates
    pub similarity_threshold: f32,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.8,
        }
    }
}

/// Query defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Number of results when the caller does not specify one
    pub default_k: usize,
    /// Results scoring below this similarity are dropped
    pub min_similarity: f32,
    /// Neighbors requested from the index per requested result
    pub overfetch_factor: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_k: 5,
            min_similarity: 0.65,
            overfetch_factor: 3,
        }
    }
}

/// Capacity, eviction and flush policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Soft capacity of the chunk store
    pub max_chunks: usize,
    /// Fraction of `max_chunks` above which maintenance runs before a flush
    pub cleanup_fraction: f32,
    /// Age (seconds since last access) after which automatic cleanup removes a chunk
    pub max_age_secs: u64,
    /// Capacity of the chunk lookup cache
    pub lookup_cache_capacity: usize,
    /// Unsaved changes that trigger a flush
    pub save_after_changes: usize,
    /// Concurrent embedding requests during batch ingestion
    pub embed_concurrency: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_chunks: 10_000,
            cleanup_fraction: 0.8,
            max_age_secs: 7 * 24 * 60 * 60,
            lookup_cache_capacity: 1000,
            save_after_changes: 50,
            embed_concurrency: 5,
        }
    }
}

impl StoreConfig {
    /// Chunk count above which maintenance (cleanup, then LRU eviction) runs.
    pub fn cleanup_threshold(&self) -> usize {
        (self.max_chunks as f64 * f64::from(self.cleanup_fraction)).floor() as usize
    }

    /// Maximum age as a [`Duration`].
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }
}

/// On-disk location of persisted state.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Directory holding the chunk records and index artifacts (`None` keeps the index in memory)
    pub directory: Option<PathBuf>,
}

/// Background directory re-indexing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Seconds between directory scans
    pub poll_interval_secs: u64,
    /// Seconds to wait after a failed cycle
    pub error_backoff_secs: u64,
    /// File extensions (without dot, case-insensitive) that are ingested
    pub extensions: Vec<String>,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 300,
            error_backoff_secs: 60,
            extensions: ["txt", "md", "csv", "json", "html", "xml", "py", "js"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
        }
    }
}

impl IndexerConfig {
    /// Poll interval as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Error backoff as a [`Duration`].
    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_secs)
    }
}

/// Embedding gateway connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Ollama host URL without port
    pub host: String,
    /// Ollama port
    pub port: u16,
    /// Embedding model name
    pub model: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost".to_owned(),
            port: 11434,
            model: "nomic-embed-text".to_owned(),
        }
    }
}

impl EmbeddingConfig {
    /// Apply `OLLAMA_HOST`, `OLLAMA_PORT` and `EMBEDDING_MODEL` overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(host) = env::var("OLLAMA_HOST") {
            self.host = host;
        }
        if let Some(port) = env::var("OLLAMA_PORT")
            .ok()
            .and_then(|value| value.parse().ok())
        {
            self.port = port;
        }
        if let Ok(model) = env::var("EMBEDDING_MODEL") {
            self.model = model;
        }
        self
    }
}

impl IndexConfig {
    /// Load config from a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or fails validation
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = from_str(&contents)?;
        config.validate()?;
        debug!(path = %path.display(), "loaded index config");
        Ok(config)
    }

    /// Load config from `path` if it exists, otherwise fall back to defaults
    ///
    /// # Errors
    /// Returns an error if an existing file cannot be read, parsed or fails validation
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to a specific file, creating parent directories
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created or the file cannot be written
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = to_string_pretty(self)
            .map_err(|error| Error::Config(format!("Failed to serialize config: {error}")))?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Check that every setting is within its accepted range
    ///
    /// # Errors
    /// Returns [`Error::Config`] naming the first offending setting
    pub fn validate(&self) -> Result<()> {
        if self.chunking.target_size == 0 {
            return Err(Error::Config("chunking.target_size must be positive".to_owned()));
        }
        if !(-1.0..=1.0).contains(&self.dedup.similarity_threshold) {
            return Err(Error::Config(
                "dedup.similarity_threshold must be within [-1, 1]".to_owned(),
            ));
        }
        if !(-1.0..=1.0).contains(&self.search.min_similarity) {
            return Err(Error::Config(
                "search.min_similarity must be within [-1, 1]".to_owned(),
            ));
        }
        if self.search.overfetch_factor == 0 {
            return Err(Error::Config(
                "search.overfetch_factor must be positive".to_owned(),
            ));
        }
        if self.store.cleanup_fraction <= 0.0 || self.store.cleanup_fraction > 1.0 {
            return Err(Error::Config(
                "store.cleanup_fraction must be within (0, 1]".to_owned(),
            ));
        }
        if self.store.embed_concurrency == 0 {
            return Err(Error::Config(
                "store.embed_concurrency must be positive".to_owned(),
            ));
        }
        if self.indexer.extensions.is_empty() {
            return Err(Error::Config(
                "indexer.extensions must list at least one extension".to_owned(),
            ));
        }
        Ok(())
    }
}
