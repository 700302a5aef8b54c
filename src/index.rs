//! SimilarityIndex trait for pluggable nearest-neighbor backends

use crate::distance::DistanceMetric;
use crate::error::Result;
use crate::filter::WhereFilter;
use crate::record::{EmbeddingRecord, RecordId};
use crate::vector::Vector;
use std::path::Path;

/// A similarity index built from a stream of embedding records.
///
/// The index is a derived, rebuildable artifact; the embedding store is
/// the source of truth. Implementations may be exact (brute-force) or
/// approximate (graph-based).
pub trait SimilarityIndex {
    /// Incorporate a batch of records. Safe to call incrementally; a fresh
    /// index treats the first call as its initial build.
    fn run(&mut self, batch: &[EmbeddingRecord]) -> Result<()>;

    /// Up to `n_results` records ordered by ascending distance, ties
    /// broken by identifier ascending. If a filter is given, only matching
    /// records are eligible; implementations must not silently return
    /// fewer than `n_results` matches when more exist.
    fn fetch(
        &self,
        query: &Vector,
        n_results: usize,
        metric: DistanceMetric,
        filter: Option<&WhereFilter>,
    ) -> Result<Vec<(RecordId, f32)>>;

    /// Remove records from the index. Subsequent queries must never
    /// reference a deleted identifier.
    fn delete_batch(&mut self, ids: &[RecordId]) -> Result<()>;

    /// Serialize index state into the given directory. The artifact is
    /// self-describing: dimensionality, build metric, and the full
    /// (identifier, vector) set.
    fn persist(&self, dir: &Path) -> Result<()>;

    /// Replace this index's state from a persisted artifact. After
    /// `load()` of a prior `persist()`, queries return identical results.
    fn load(&mut self, dir: &Path) -> Result<()>;

    /// The metric the index was built under.
    fn metric(&self) -> DistanceMetric;

    /// The dimensionality established by the first incorporated record.
    fn dimension(&self) -> Option<usize>;

    /// The number of live records in the index.
    fn len(&self) -> usize;

    /// Whether the index holds no records.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
