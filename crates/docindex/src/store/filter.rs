//! Metadata filter matching.

use serde_json::Value;

use crate::chunk::Metadata;

/// Check `metadata` against every `(key, expected)` pair in `filter`.
///
/// A missing key fails. An array `expected` matches when it contains the
/// actual value; anything else must be equal.
pub fn matches_filter(metadata: &Metadata, filter: &Metadata) -> bool {
    filter.iter().all(|(key, expected)| {
        metadata.get(key).is_some_and(|actual| match expected {
            Value::Array(allowed) => allowed.contains(actual),
            other => actual == other,
        })
    })
}
