//! Serialization utilities: bincode for record/graph state, JSON for manifests.

use crate::distance::DistanceMetric;
use crate::error::{EmbedDbError, Result};
use crate::record::EmbeddingRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Human-readable description of a persisted index artifact. Enough to
/// reconstruct the index: dimensionality, build metric, record count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexManifest {
    pub kind: String,
    pub dimension: Option<usize>,
    pub metric: DistanceMetric,
    pub count: usize,
}

/// Serializable representation of the full store state.
#[derive(Debug, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub spaces: HashMap<String, Vec<EmbeddingRecord>>,
    pub next_id: u128,
}

/// Encode data to bincode bytes.
pub fn to_bincode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| EmbedDbError::Persistence(e.to_string()))
}

/// Decode data from bincode bytes.
pub fn from_bincode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| EmbedDbError::Persistence(e.to_string()))
}

/// Encode data to JSON bytes.
pub fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(value).map_err(|e| EmbedDbError::Persistence(e.to_string()))
}

/// Decode data from JSON bytes.
pub fn from_json<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| EmbedDbError::Persistence(e.to_string()))
}
