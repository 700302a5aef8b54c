//! Brute-force similarity index — exact O(n) scan per query.

use crate::distance::DistanceMetric;
use crate::error::{EmbedDbError, Result};
use crate::filter::{Metadata, WhereFilter};
use crate::index::SimilarityIndex;
use crate::persistence::serialization::IndexManifest;
use crate::persistence::snapshot::{load_index_artifact, save_index_artifact};
use crate::record::{EmbeddingRecord, RecordId};
use crate::vector::Vector;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;

const ARTIFACT_KIND: &str = "flat";

#[derive(Debug, Clone)]
struct Entry {
    vector: Vector,
    metadata: Metadata,
}

/// An exact index that computes the distance to every eligible record.
/// Filters are applied before scoring, so filtered queries never come up
/// short while matches remain. Distance computation runs in parallel.
#[derive(Debug)]
pub struct BruteForceIndex {
    entries: BTreeMap<RecordId, Entry>,
    metric: DistanceMetric,
    dimension: Option<usize>,
}

impl BruteForceIndex {
    /// Create an empty index. The metric is the build default recorded in
    /// persisted artifacts; `fetch` accepts any metric per call.
    pub fn new(metric: DistanceMetric) -> Self {
        Self {
            entries: BTreeMap::new(),
            metric,
            dimension: None,
        }
    }

    fn check_dimension(&self, actual: usize) -> Result<()> {
        match self.dimension {
            Some(expected) if expected != actual => {
                Err(EmbedDbError::Dimensionality { expected, actual })
            }
            _ => Ok(()),
        }
    }
}

impl SimilarityIndex for BruteForceIndex {
    fn run(&mut self, batch: &[EmbeddingRecord]) -> Result<()> {
        for record in batch {
            let dim = record.vector.dimension();
            self.check_dimension(dim)?;
            self.dimension = Some(dim);
            self.entries.insert(
                record.id,
                Entry {
                    vector: record.vector.clone(),
                    metadata: record.metadata.clone(),
                },
            );
        }
        Ok(())
    }

    fn fetch(
        &self,
        query: &Vector,
        n_results: usize,
        metric: DistanceMetric,
        filter: Option<&WhereFilter>,
    ) -> Result<Vec<(RecordId, f32)>> {
        if self.entries.is_empty() {
            return Ok(vec![]);
        }
        self.check_dimension(query.dimension())?;

        let eligible: Vec<(&RecordId, &Entry)> = self
            .entries
            .iter()
            .filter(|(_, entry)| filter.map_or(true, |f| f.matches(&entry.metadata)))
            .collect();

        let mut scored: Vec<(RecordId, f32)> = eligible
            .into_par_iter()
            .map(|(id, entry)| metric.distance(query, &entry.vector).map(|d| (*id, d)))
            .collect::<Result<Vec<_>>>()?;

        // Ascending distance, identifier tie-break for determinism
        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(n_results);
        Ok(scored)
    }

    fn delete_batch(&mut self, ids: &[RecordId]) -> Result<()> {
        for id in ids {
            self.entries.remove(id);
        }
        Ok(())
    }

    fn persist(&self, dir: &Path) -> Result<()> {
        let manifest = IndexManifest {
            kind: ARTIFACT_KIND.to_string(),
            dimension: self.dimension,
            metric: self.metric,
            count: self.entries.len(),
        };
        let rows: Vec<(RecordId, &Vector)> = self
            .entries
            .iter()
            .map(|(id, entry)| (*id, &entry.vector))
            .collect();
        let sidecar: Vec<(RecordId, Metadata)> = self
            .entries
            .iter()
            .map(|(id, entry)| (*id, entry.metadata.clone()))
            .collect();
        save_index_artifact(dir, &manifest, &rows, &sidecar)
    }

    fn load(&mut self, dir: &Path) -> Result<()> {
        let (manifest, rows, sidecar): (_, _, Vec<(RecordId, Metadata)>) =
            load_index_artifact(dir)?;
        if manifest.kind != ARTIFACT_KIND {
            return Err(EmbedDbError::Persistence(format!(
                "Expected a {} artifact, found {}",
                ARTIFACT_KIND, manifest.kind
            )));
        }

        let mut metadata: BTreeMap<RecordId, Metadata> = sidecar.into_iter().collect();
        let mut entries = BTreeMap::new();
        for (id, vector) in rows {
            let meta = metadata.remove(&id).unwrap_or_default();
            entries.insert(
                id,
                Entry {
                    vector,
                    metadata: meta,
                },
            );
        }

        self.entries = entries;
        self.metric = manifest.metric;
        self.dimension = manifest.dimension;
        Ok(())
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::NewEmbedding;
    use tempfile::TempDir;

    fn record(n: u128, data: Vec<f32>) -> EmbeddingRecord {
        NewEmbedding::new(Vector::new(data), format!("uri-{}", n))
            .into_record(RecordId::encode(n))
    }

    fn record_with_category(n: u128, data: Vec<f32>, category: &str) -> EmbeddingRecord {
        NewEmbedding::new(Vector::new(data), format!("uri-{}", n))
            .with_category(category)
            .into_record(RecordId::encode(n))
    }

    #[test]
    fn test_basic_search() {
        let mut index = BruteForceIndex::new(DistanceMetric::L2);
        index
            .run(&[
                record(0, vec![1.0, 0.0, 0.0]),
                record(1, vec![0.0, 1.0, 0.0]),
                record(2, vec![1.0, 1.0, 0.0]),
            ])
            .unwrap();

        let results = index
            .fetch(
                &Vector::new(vec![1.0, 0.0, 0.0]),
                2,
                DistanceMetric::L2,
                None,
            )
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, RecordId::encode(0));
        assert!(results[0].1 < 1e-6);
    }

    #[test]
    fn test_tie_break_by_id() {
        let mut index = BruteForceIndex::new(DistanceMetric::L2);
        // Two records equidistant from the query
        index
            .run(&[record(5, vec![2.0, 0.0]), record(3, vec![0.0, 2.0])])
            .unwrap();

        let results = index
            .fetch(&Vector::new(vec![1.0, 1.0]), 2, DistanceMetric::L2, None)
            .unwrap();
        assert_eq!(results[0].0, RecordId::encode(3));
        assert_eq!(results[1].0, RecordId::encode(5));
    }

    #[test]
    fn test_filter_does_not_starve_results() {
        let mut index = BruteForceIndex::new(DistanceMetric::L2);
        // The nearest records do not match the filter
        index
            .run(&[
                record_with_category(0, vec![0.1, 0.0], "near"),
                record_with_category(1, vec![0.2, 0.0], "near"),
                record_with_category(2, vec![5.0, 0.0], "far"),
                record_with_category(3, vec![6.0, 0.0], "far"),
            ])
            .unwrap();

        let filter = WhereFilter::new().with("category", "far");
        let results = index
            .fetch(
                &Vector::new(vec![0.0, 0.0]),
                2,
                DistanceMetric::L2,
                Some(&filter),
            )
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, RecordId::encode(2));
        assert_eq!(results[1].0, RecordId::encode(3));
    }

    #[test]
    fn test_delete_batch() {
        let mut index = BruteForceIndex::new(DistanceMetric::L2);
        index
            .run(&[record(0, vec![1.0, 0.0]), record(1, vec![0.0, 1.0])])
            .unwrap();
        index.delete_batch(&[RecordId::encode(0)]).unwrap();
        assert_eq!(index.len(), 1);

        let results = index
            .fetch(&Vector::new(vec![1.0, 0.0]), 5, DistanceMetric::L2, None)
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, RecordId::encode(1));
    }

    #[test]
    fn test_query_dimension_mismatch() {
        let mut index = BruteForceIndex::new(DistanceMetric::L2);
        index.run(&[record(0, vec![1.0, 2.0, 3.0])]).unwrap();

        let result = index.fetch(&Vector::new(vec![1.0]), 1, DistanceMetric::L2, None);
        assert!(matches!(
            result,
            Err(EmbedDbError::Dimensionality { .. })
        ));
    }

    #[test]
    fn test_persist_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let artifact = dir.path().join("flat");

        let mut index = BruteForceIndex::new(DistanceMetric::Cosine);
        index
            .run(&[
                record_with_category(0, vec![1.0, 0.0], "a"),
                record_with_category(1, vec![0.0, 1.0], "b"),
                record_with_category(2, vec![0.7, 0.7], "a"),
            ])
            .unwrap();
        index.persist(&artifact).unwrap();

        let query = Vector::new(vec![0.9, 0.1]);
        let before = index
            .fetch(&query, 3, DistanceMetric::Cosine, None)
            .unwrap();

        let mut fresh = BruteForceIndex::new(DistanceMetric::L2);
        fresh.load(&artifact).unwrap();
        assert_eq!(fresh.metric(), DistanceMetric::Cosine);
        assert_eq!(fresh.dimension(), Some(2));

        let after = fresh
            .fetch(&query, 3, DistanceMetric::Cosine, None)
            .unwrap();
        assert_eq!(before, after);

        // Metadata survives the round-trip for filtered queries
        let filter = WhereFilter::new().with("category", "a");
        let filtered = fresh
            .fetch(&query, 3, DistanceMetric::Cosine, Some(&filter))
            .unwrap();
        assert_eq!(filtered.len(), 2);
    }
}
