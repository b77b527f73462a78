//! Core types shared across the document index workspace.
//!
//! This crate provides the error taxonomy and the configuration layer used by
//! the indexing engine.
#![cfg_attr(
    test,
    allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::assertions_on_result_states,
        clippy::panic,
        clippy::shadow_unrelated,
        clippy::missing_panics_doc,
        clippy::missing_errors_doc,
        reason = "Test allows"
    )
)]

/// Configuration for chunking, deduplication, search, storage and indexing.
pub mod config;
/// Error types and result definitions.
pub mod error;

pub use config::{
    ChunkingConfig, DedupConfig, EmbeddingConfig, IndexConfig, IndexerConfig, PersistenceConfig,
    SearchConfig, StoreConfig,
};
pub use error::{Error, Result};
