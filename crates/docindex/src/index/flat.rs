//! Exact nearest-neighbor index over unit vectors, split into
//! uninitialized and initialized states so the dimension is fixed exactly once.

use std::cmp::Ordering;

use docindex_core::{Error, Result};

use super::vector::UnitVector;
use crate::chunk::ChunkId;

/// A labelled search result from the index
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    /// Label the vector was inserted under
    pub label: ChunkId,
    /// Squared L2 distance from the query
    pub distance: f32,
}

/// Index that has never received a vector
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UninitializedIndex;

impl UninitializedIndex {
    /// Accept the first vector, fixing the dimension to its length
    pub fn insert(self, label: ChunkId, vector: UnitVector) -> InitializedIndex {
        InitializedIndex {
            dimension: vector.len(),
            labels: vec![label],
            vectors: vec![vector],
        }
    }
}

/// Index with a fixed dimension
#[derive(Debug, Clone, PartialEq)]
pub struct InitializedIndex {
    dimension: usize,
    labels: Vec<ChunkId>,
    vectors: Vec<UnitVector>,
}

impl InitializedIndex {
    /// Empty index with a known dimension
    pub(super) const fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension,
            labels: Vec::new(),
            vectors: Vec::new(),
        }
    }

    /// Fixed vector length
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored vectors
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether no vectors are stored
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Append a labelled vector
    ///
    /// # Errors
    /// Returns [`Error::DimensionMismatch`] if the vector length differs from
    /// the index dimension; the index is left unchanged
    pub fn add(&mut self, label: ChunkId, vector: UnitVector) -> Result<()> {
        self.check_dimension(vector.len())?;
        self.labels.push(label);
        self.vectors.push(vector);
        Ok(())
    }

    /// Up to `k` nearest neighbors by ascending squared L2 distance.
    ///
    /// Equal distances keep insertion order.
    ///
    /// # Errors
    /// Returns [`Error::DimensionMismatch`] if the query length differs from the
    /// index dimension
    pub fn search(&self, query: &UnitVector, k: usize) -> Result<Vec<Neighbor>> {
        self.check_dimension(query.len())?;

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(position, vector)| (position, query.squared_distance(vector)))
            .collect();
        scored.sort_by(|first, second| first.1.partial_cmp(&second.1).unwrap_or(Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(position, distance)| Neighbor {
                label: self.labels[position].clone(),
                distance,
            })
            .collect())
    }

    /// Keep only entries whose label passes `keep`; returns how many were removed
    pub fn retain(&mut self, mut keep: impl FnMut(&ChunkId) -> bool) -> usize {
        let before = self.labels.len();
        let mut kept_labels = Vec::with_capacity(before);
        let mut kept_vectors = Vec::with_capacity(before);

        for (label, vector) in self.labels.drain(..).zip(self.vectors.drain(..)) {
            if keep(&label) {
                kept_labels.push(label);
                kept_vectors.push(vector);
            }
        }

        self.labels = kept_labels;
        self.vectors = kept_vectors;
        before - self.labels.len()
    }

    /// Labelled vectors in insertion order
    pub fn entries(&self) -> impl Iterator<Item = (&ChunkId, &UnitVector)> {
        self.labels.iter().zip(&self.vectors)
    }

    fn check_dimension(&self, actual: usize) -> Result<()> {
        if actual == self.dimension {
            Ok(())
        } else {
            Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual,
            })
        }
    }
}
