//! Unit-length vectors and the similarity arithmetic built on them.

use docindex_core::{Error, Result};

/// A finite, non-empty vector scaled to unit L2 norm.
///
/// For unit vectors the squared L2 distance `d` and cosine similarity `s`
/// satisfy `s = 1 - d / 2`, so the index can rank by distance and report
/// cosine similarity.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitVector(Vec<f32>);

impl UnitVector {
    /// Normalize `raw` to unit length
    ///
    /// # Errors
    /// Returns [`Error::DegenerateVector`] if `raw` is empty, has a non-finite
    /// component or has zero norm
    pub fn new(raw: &[f32]) -> Result<Self> {
        if raw.is_empty() {
            return Err(Error::DegenerateVector("vector is empty".to_owned()));
        }
        if raw.iter().any(|component| !component.is_finite()) {
            return Err(Error::DegenerateVector(
                "vector has a non-finite component".to_owned(),
            ));
        }

        let norm = raw.iter().map(|component| component * component).sum::<f32>().sqrt();
        if norm == 0.0 || !norm.is_finite() {
            return Err(Error::DegenerateVector(format!(
                "vector norm {norm} cannot be normalized"
            )));
        }

        Ok(Self(raw.iter().map(|component| component / norm).collect()))
    }

    /// Components
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Dimension
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the vector has no components
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Squared L2 distance to `other` (0 for identical, 4 for opposite)
    pub fn squared_distance(&self, other: &Self) -> f32 {
        self.0
            .iter()
            .zip(&other.0)
            .map(|(left, right)| (left - right) * (left - right))
            .sum()
    }
}

/// Cosine similarity for a squared L2 distance between unit vectors
pub fn similarity_from_distance(distance: f32) -> f32 {
    (1.0 - distance / 2.0).clamp(-1.0, 1.0)
}

/// Calculate cosine similarity between two vectors
///
/// Returns 0 when lengths differ or either vector has zero magnitude.
pub fn cosine_similarity(vector_a: &[f32], vector_b: &[f32]) -> f32 {
    if vector_a.len() != vector_b.len() {
        return 0.0;
    }

    let dot_product: f32 = vector_a
        .iter()
        .zip(vector_b.iter())
        .map(|(left, right)| left * right)
        .sum();
    let magnitude_a = vector_a.iter().map(|value| value * value).sum::<f32>().sqrt();
    let magnitude_b = vector_b.iter().map(|value| value * value).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}
