//! Durable storage of chunk records and the similarity index.
//!
//! A persisted store is a directory holding two artifacts: `chunks.json`, a JSON
//! array of [`ChunkRecord`]s, and `index.bin`, a bincode-encoded
//! [`IndexSnapshot`]. Each artifact is written to a temporary file in the same
//! directory and renamed over the previous one, so a crash leaves either the old
//! or the new version of each file. The index is written first; on load, index
//! entries without a matching chunk record are dropped.

mod records;

pub use records::ChunkRecord;

use bincode::config::standard as bincode_config;
use bincode::{decode_from_slice, encode_to_vec};
use serde_json::{Value, from_slice, from_value, to_vec};
use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::fs;
use std::io::{ErrorKind, Write as _};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::fs as async_fs;
use tokio::task::spawn_blocking;
use tracing::{info, warn};

use docindex_core::{Error, Result};

use crate::chunk::{Chunk, ChunkId};
use crate::index::{IndexSnapshot, SimilarityIndex};

/// File name of the chunk record list
pub const CHUNKS_FILE: &str = "chunks.json";
/// File name of the index artifact
pub const INDEX_FILE: &str = "index.bin";

/// Everything needed to write the store to disk
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSnapshot {
    /// Chunk records in store order
    pub records: Vec<ChunkRecord>,
    /// Flattened similarity index
    pub index: IndexSnapshot,
}

/// State recovered from disk
#[derive(Debug, Default)]
pub struct LoadedState {
    /// Recovered chunks, embeddings reattached from the index
    pub chunks: Vec<Chunk>,
    /// Recovered index, or an empty one when it was missing or discarded
    pub index: SimilarityIndex,
    /// What happened during recovery
    pub report: LoadReport,
}

/// Recovery summary
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    /// Chunk records recovered
    pub recovered: usize,
    /// Chunk records skipped as malformed or duplicated
    pub skipped: usize,
    /// Whether the persisted index was restored
    pub index_restored: bool,
}

/// Reads and writes persisted store state in one directory
#[derive(Debug, Clone)]
pub struct PersistenceManager {
    directory: PathBuf,
}

impl PersistenceManager {
    /// Manager for `directory`; nothing touches the disk until save or load
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Directory holding the artifacts
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Write both artifacts, returning the number of chunk records written
    ///
    /// # Errors
    /// Returns [`Error::PersistenceIo`] if the directory cannot be created or an
    /// artifact cannot be written; files already on disk stay intact
    pub async fn save(&self, snapshot: StoreSnapshot) -> Result<usize> {
        let directory = self.directory.clone();
        let count = snapshot.records.len();

        spawn_blocking(move || write_snapshot(&directory, &snapshot))
            .await
            .map_err(|error| Error::PersistenceIo(format!("Task join error: {error}")))??;

        info!(
            chunks = count,
            directory = %self.directory.display(),
            "persisted document index"
        );
        Ok(count)
    }

    /// Load persisted state; a missing directory or chunk file yields an empty state
    ///
    /// Malformed chunk records are skipped, and if any were skipped the index is
    /// discarded. A missing or unreadable index leaves the index empty.
    ///
    /// # Errors
    /// Returns [`Error::PersistenceIo`] if an existing artifact cannot be read,
    /// or [`Error::MalformedPersistedState`] if the chunk file is not a JSON array
    pub async fn load(&self) -> Result<LoadedState> {
        let Some(chunk_bytes) = read_optional(&self.directory.join(CHUNKS_FILE)).await? else {
            info!(
                directory = %self.directory.display(),
                "no persisted chunks, starting empty"
            );
            return Ok(LoadedState::default());
        };
        let index_bytes = match read_optional(&self.directory.join(INDEX_FILE)).await {
            Ok(bytes) => bytes,
            Err(error) => {
                warn!(%error, "persisted index unreadable, starting with an empty index");
                None
            }
        };

        let loaded = spawn_blocking(move || decode_state(&chunk_bytes, index_bytes.as_deref()))
            .await
            .map_err(|error| Error::PersistenceIo(format!("Task join error: {error}")))??;

        info!(
            recovered = loaded.report.recovered,
            skipped = loaded.report.skipped,
            index_restored = loaded.report.index_restored,
            "loaded persisted document index"
        );
        Ok(loaded)
    }
}

async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match async_fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
        Err(error) => Err(Error::PersistenceIo(format!(
            "Failed to read {}: {error}",
            path.display()
        ))),
    }
}

fn write_snapshot(directory: &Path, snapshot: &StoreSnapshot) -> Result<()> {
    fs::create_dir_all(directory).map_err(|error| {
        Error::PersistenceIo(format!(
            "Failed to create {}: {error}",
            directory.display()
        ))
    })?;

    let index_bytes = encode_to_vec(&snapshot.index, bincode_config())
        .map_err(|error| Error::PersistenceIo(format!("Failed to serialize index: {error}")))?;
    let chunk_bytes = to_vec(&snapshot.records)?;

    write_atomic(directory, INDEX_FILE, &index_bytes)?;
    write_atomic(directory, CHUNKS_FILE, &chunk_bytes)
}

fn write_atomic(directory: &Path, file_name: &str, bytes: &[u8]) -> Result<()> {
    let target = directory.join(file_name);

    let mut file =
        NamedTempFile::new_in(directory).map_err(|error| write_failed(&target, error))?;
    file.write_all(bytes)
        .map_err(|error| write_failed(&target, error))?;
    file.as_file()
        .sync_all()
        .map_err(|error| write_failed(&target, error))?;
    file.persist(&target)
        .map_err(|persist_error| write_failed(&target, persist_error.error))?;
    Ok(())
}

fn write_failed(target: &Path, error: impl Display) -> Error {
    Error::PersistenceIo(format!("Failed to write {}: {error}", target.display()))
}

fn decode_state(chunk_bytes: &[u8], index_bytes: Option<&[u8]>) -> Result<LoadedState> {
    let values: Vec<Value> = from_slice(chunk_bytes).map_err(|error| {
        Error::MalformedPersistedState(format!("{CHUNKS_FILE} is not a JSON array: {error}"))
    })?;

    let mut seen = HashSet::with_capacity(values.len());
    let mut chunks = Vec::with_capacity(values.len());
    let mut skipped = 0;

    for (position, value) in values.into_iter().enumerate() {
        match from_value::<ChunkRecord>(value) {
            Ok(record) if seen.insert(record.chunk_id.clone()) => chunks.push(record.into_chunk()),
            Ok(record) => {
                skipped += 1;
                warn!(position, chunk_id = %record.chunk_id, "skipping duplicate chunk record");
            }
            Err(error) => {
                skipped += 1;
                warn!(position, %error, "skipping malformed chunk record");
            }
        }
    }

    let mut index = SimilarityIndex::default();
    let mut index_restored = false;

    if skipped > 0 {
        warn!(skipped, "discarding persisted index after skipping chunk records");
    } else if let Some(bytes) = index_bytes {
        match decode_index(bytes) {
            Ok(mut restored) => {
                let orphans = restored.retain(|label| seen.contains(label));
                if orphans > 0 {
                    warn!(orphans, "dropped index entries without a chunk record");
                }
                attach_embeddings(&mut chunks, &restored);
                index = restored;
                index_restored = true;
            }
            Err(error) => warn!(%error, "persisted index unreadable, starting with an empty index"),
        }
    }

    Ok(LoadedState {
        report: LoadReport {
            recovered: chunks.len(),
            skipped,
            index_restored,
        },
        chunks,
        index,
    })
}

fn decode_index(bytes: &[u8]) -> Result<SimilarityIndex> {
    let (snapshot, _): (IndexSnapshot, usize) = decode_from_slice(bytes, bincode_config())
        .map_err(|error| {
            Error::MalformedPersistedState(format!("Failed to deserialize index: {error}"))
        })?;
    SimilarityIndex::from_snapshot(snapshot)
}

fn attach_embeddings(chunks: &mut [Chunk], index: &SimilarityIndex) {
    let vectors: HashMap<&ChunkId, Vec<f32>> = index
        .entries()
        .into_iter()
        .map(|(label, vector)| (label, vector.as_slice().to_vec()))
        .collect();

    for chunk in chunks {
        if let Some(vector) = vectors.get(chunk.id()) {
            chunk.set_embedding(Some(vector.clone()));
        }
    }
}
