//! Background re-indexing of a directory tree.
//!
//! Each cycle enumerates eligible files, ingests those that are new or whose
//! modification time moved forward, forgets files that disappeared, and
//! flushes the store if anything was ingested. Deleted files only leave the
//! tracking table; their chunks stay in the store until cleanup or eviction
//! removes them.

mod scanner;

pub use scanner::{ScannedFile, collect_files, has_allowed_extension};

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::fs as async_fs;
use tokio::sync::watch;
use tokio::task::{JoinHandle, spawn, spawn_blocking};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use docindex_core::{Error, IndexerConfig, Result};

use crate::chunk::{ChunkSource, Metadata};
use crate::embedding::EmbeddingProvider;
use crate::store::DocumentStore;

/// Outcome of one indexing cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Eligible files found
    pub discovered: usize,
    /// Files (re-)ingested
    pub ingested: usize,
    /// Files that could not be read
    pub failed: usize,
    /// Previously tracked files that no longer exist
    pub forgotten: usize,
    /// Chunks accepted across all ingested files
    pub accepted_chunks: usize,
    /// Whether a stop request cut the cycle short
    pub interrupted: bool,
}

/// Polls a directory and feeds changed files into a [`DocumentStore`]
pub struct IncrementalIndexer<E: EmbeddingProvider> {
    store: Arc<DocumentStore<E>>,
    root: PathBuf,
    config: IndexerConfig,
    tracked: HashMap<PathBuf, SystemTime>,
}

impl<E: EmbeddingProvider + 'static> IncrementalIndexer<E> {
    /// Indexer for `root` with nothing tracked yet
    pub fn new(store: Arc<DocumentStore<E>>, root: impl Into<PathBuf>, config: IndexerConfig) -> Self {
        Self {
            store,
            root: root.into(),
            config,
            tracked: HashMap::new(),
        }
    }

    /// Directory being watched
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store receiving the documents
    pub const fn store(&self) -> &Arc<DocumentStore<E>> {
        &self.store
    }

    /// Last ingested modification time of `path`, if tracked
    pub fn tracked_modified(&self, path: &Path) -> Option<SystemTime> {
        self.tracked.get(path).copied()
    }

    /// Number of tracked files
    pub fn tracked_count(&self) -> usize {
        self.tracked.len()
    }

    /// Run one full cycle
    ///
    /// # Errors
    /// Returns an error if the root cannot be inspected or the scan task fails
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let (_keep_open, stop) = watch::channel(false);
        self.run_cycle_until(&stop).await
    }

    async fn run_cycle_until(&mut self, stop: &watch::Receiver<bool>) -> Result<CycleReport> {
        let root_metadata = async_fs::metadata(&self.root).await?;
        if !root_metadata.is_dir() {
            return Err(Error::InvalidSource(format!(
                "{} is not a directory",
                self.root.display()
            )));
        }

        let root = self.root.clone();
        let extensions = self.config.extensions.clone();
        let files = spawn_blocking(move || collect_files(&root, &extensions))
            .await
            .map_err(|error| Error::Other(format!("Task join error: {error}")))?;

        let mut report = CycleReport {
            discovered: files.len(),
            ..CycleReport::default()
        };

        let present: HashSet<&PathBuf> = files.iter().map(|file| &file.path).collect();
        let before = self.tracked.len();
        self.tracked.retain(|path, _| present.contains(path));
        report.forgotten = before - self.tracked.len();

        for file in &files {
            if *stop.borrow() {
                info!("stop requested, ending indexing cycle early");
                report.interrupted = true;
                break;
            }

            let changed = self
                .tracked
                .get(&file.path)
                .is_none_or(|previous| *previous < file.modified);
            if !changed {
                continue;
            }

            match self.ingest_file(file).await {
                Ok(accepted) => {
                    self.tracked.insert(file.path.clone(), file.modified);
                    report.ingested += 1;
                    report.accepted_chunks += accepted;
                }
                Err(ingest_error) => {
                    warn!(path = %file.path.display(), error = %ingest_error, "failed to ingest file");
                    report.failed += 1;
                }
            }
        }

        if report.ingested > 0 {
            self.store.flush().await?;
        }

        info!(
            discovered = report.discovered,
            ingested = report.ingested,
            failed = report.failed,
            forgotten = report.forgotten,
            accepted_chunks = report.accepted_chunks,
            "indexing cycle finished"
        );
        Ok(report)
    }

    async fn ingest_file(&self, file: &ScannedFile) -> Result<usize> {
        let bytes = async_fs::read(&file.path).await?;
        let text = String::from_utf8_lossy(&bytes);
        let source = ChunkSource::file(file.path.clone(), Some(DateTime::<Utc>::from(file.modified)))?;

        let report = self
            .store
            .add_from_source(&text, &source, Metadata::new())
            .await;
        debug!(
            path = %file.path.display(),
            accepted = report.accepted.len(),
            deduplicated = report.deduplicated,
            "ingested file"
        );
        Ok(report.accepted.len())
    }

    /// Start polling in a background task
    pub fn spawn(self) -> IndexerHandle<E> {
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = spawn(self.run(stop_rx));
        IndexerHandle { stop_tx, task }
    }

    async fn run(mut self, mut stop: watch::Receiver<bool>) -> Self {
        info!(root = %self.root.display(), "incremental indexer started");

        loop {
            if *stop.borrow() {
                break;
            }

            let wait = match self.run_cycle_until(&stop).await {
                Ok(_) => self.config.poll_interval(),
                Err(cycle_error) => {
                    error!(error = %cycle_error, "indexing cycle failed, backing off");
                    self.config.error_backoff()
                }
            };

            if !wait_or_stop(&mut stop, wait).await {
                break;
            }
        }

        info!(root = %self.root.display(), "incremental indexer stopped");
        self
    }
}

/// Sleep for `wait`; returns false if a stop was requested first
async fn wait_or_stop(stop: &mut watch::Receiver<bool>, wait: Duration) -> bool {
    tokio::select! {
        () = sleep(wait) => true,
        changed = stop.changed() => {
            changed.is_ok() && !*stop.borrow()
        }
    }
}

/// Control handle of a running [`IncrementalIndexer`]
pub struct IndexerHandle<E: EmbeddingProvider> {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<IncrementalIndexer<E>>,
}

impl<E: EmbeddingProvider> IndexerHandle<E> {
    /// Ask the indexer to stop and wait for it; the file in progress finishes first
    ///
    /// # Errors
    /// Returns [`Error::Other`] if the background task panicked
    pub async fn stop(self) -> Result<IncrementalIndexer<E>> {
        self.stop_tx.send_replace(true);
        self.task
            .await
            .map_err(|error| Error::Other(format!("Indexer task failed: {error}")))
    }

    /// Whether the background task has ended
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
