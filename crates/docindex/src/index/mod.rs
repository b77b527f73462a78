//! Nearest-neighbor similarity index over chunk embeddings.

mod flat;
mod vector;

pub use flat::{InitializedIndex, Neighbor, UninitializedIndex};
pub use vector::{UnitVector, cosine_similarity, similarity_from_distance};

use bincode::{Decode, Encode};
use docindex_core::{Error, Result};

use crate::chunk::ChunkId;

/// Similarity index whose dimension is fixed by the first vector it receives
#[derive(Debug, Clone, PartialEq)]
pub enum SimilarityIndex {
    /// No vector seen yet
    Uninitialized(UninitializedIndex),
    /// Dimension fixed
    Initialized(InitializedIndex),
}

impl Default for SimilarityIndex {
    fn default() -> Self {
        Self::Uninitialized(UninitializedIndex)
    }
}

impl SimilarityIndex {
    /// Normalize and insert a labelled embedding
    ///
    /// # Errors
    /// Returns [`Error::DegenerateVector`] if the embedding cannot be normalized
    /// or [`Error::DimensionMismatch`] if its length differs from the fixed
    /// dimension. The index is unchanged on error.
    pub fn add(&mut self, label: ChunkId, embedding: &[f32]) -> Result<()> {
        let vector = UnitVector::new(embedding)?;
        match self {
            Self::Uninitialized(empty) => {
                let initialized = empty.insert(label, vector);
                *self = Self::Initialized(initialized);
                Ok(())
            }
            Self::Initialized(index) => index.add(label, vector),
        }
    }

    /// Up to `k` nearest neighbors of `query`; empty when uninitialized
    ///
    /// # Errors
    /// Returns [`Error::DegenerateVector`] for an unnormalizable query or
    /// [`Error::DimensionMismatch`] when its length differs from the index
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        match self {
            Self::Uninitialized(_) => Ok(Vec::new()),
            Self::Initialized(index) => index.search(&UnitVector::new(query)?, k),
        }
    }

    /// Fixed dimension, once known
    pub const fn dimension(&self) -> Option<usize> {
        match self {
            Self::Uninitialized(_) => None,
            Self::Initialized(index) => Some(index.dimension()),
        }
    }

    /// Number of indexed vectors
    pub fn len(&self) -> usize {
        match self {
            Self::Uninitialized(_) => 0,
            Self::Initialized(index) => index.len(),
        }
    }

    /// Whether nothing is indexed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop entries whose label fails `keep`; the dimension stays fixed
    pub fn retain(&mut self, keep: impl FnMut(&ChunkId) -> bool) -> usize {
        match self {
            Self::Uninitialized(_) => 0,
            Self::Initialized(index) => index.retain(keep),
        }
    }

    /// Forget every vector and the dimension
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Labelled unit vectors in insertion order
    pub fn entries(&self) -> Vec<(&ChunkId, &UnitVector)> {
        match self {
            Self::Uninitialized(_) => Vec::new(),
            Self::Initialized(index) => index.entries().collect(),
        }
    }

    /// Flatten into a serializable snapshot
    pub fn snapshot(&self) -> IndexSnapshot {
        let entries = self.entries();
        IndexSnapshot {
            version: IndexSnapshot::VERSION,
            dimension: self.dimension(),
            labels: entries
                .iter()
                .map(|(label, _)| label.as_str().to_owned())
                .collect(),
            vectors: entries
                .iter()
                .flat_map(|(_, vector)| vector.as_slice().iter().copied())
                .collect(),
        }
    }

    /// Rebuild an index from a snapshot
    ///
    /// # Errors
    /// Returns [`Error::MalformedPersistedState`] if the snapshot version is
    /// unknown, its shape is inconsistent, or a stored vector is degenerate
    pub fn from_snapshot(snapshot: IndexSnapshot) -> Result<Self> {
        if !snapshot.is_valid() {
            return Err(Error::MalformedPersistedState(format!(
                "unsupported index snapshot version {}",
                snapshot.version
            )));
        }

        let Some(dimension) = snapshot.dimension else {
            if snapshot.labels.is_empty() && snapshot.vectors.is_empty() {
                return Ok(Self::default());
            }
            return Err(Error::MalformedPersistedState(
                "index snapshot has vectors but no dimension".to_owned(),
            ));
        };

        if dimension == 0 || snapshot.vectors.len() != snapshot.labels.len() * dimension {
            return Err(Error::MalformedPersistedState(format!(
                "index snapshot holds {} values for {} labels of dimension {dimension}",
                snapshot.vectors.len(),
                snapshot.labels.len()
            )));
        }

        let mut index = InitializedIndex::with_dimension(dimension);
        for (label, row) in snapshot
            .labels
            .into_iter()
            .zip(snapshot.vectors.chunks_exact(dimension))
        {
            let vector = UnitVector::new(row).map_err(|error| {
                Error::MalformedPersistedState(format!("index vector for {label}: {error}"))
            })?;
            index.add(ChunkId::from(label), vector)?;
        }

        Ok(Self::Initialized(index))
    }
}

/// Serializable form of [`SimilarityIndex`]
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct IndexSnapshot {
    /// Format version
    pub version: u32,
    /// Fixed dimension, `None` when the index never received a vector
    pub dimension: Option<usize>,
    /// Labels in insertion order
    pub labels: Vec<String>,
    /// Row-major unit vectors, `labels.len() * dimension` values
    pub vectors: Vec<f32>,
}

impl IndexSnapshot {
    /// Current format version
    pub const VERSION: u32 = 1;

    /// Check if the snapshot version is supported
    pub const fn is_valid(&self) -> bool {
        self.version == Self::VERSION
    }
}
