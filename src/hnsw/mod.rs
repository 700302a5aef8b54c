//! HNSW-based approximate similarity index.

pub mod graph;
pub mod neighbor_queue;

pub use graph::{GraphSnapshot, HnswGraph, HnswParams};

use crate::distance::DistanceMetric;
use crate::error::{EmbedDbError, Result};
use crate::filter::{Metadata, WhereFilter};
use crate::index::SimilarityIndex;
use crate::persistence::serialization::IndexManifest;
use crate::persistence::snapshot::{load_index_artifact, save_index_artifact};
use crate::record::{EmbeddingRecord, RecordId};
use crate::vector::Vector;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

const ARTIFACT_KIND: &str = "hnsw";

/// Graph structure and id mapping stored next to the vector segment.
#[derive(Debug, Serialize, Deserialize)]
struct HnswSidecar {
    graph: GraphSnapshot,
    slot_to_id: Vec<Option<RecordId>>,
    metadata: Vec<(RecordId, Metadata)>,
}

/// An approximate nearest-neighbor index over an HNSW graph.
///
/// Record identifiers map to dense graph slots; deleted slots are
/// tombstoned and never reused. Metadata filters compose with the
/// approximate search by over-fetching with an escalating candidate
/// budget, falling back to an exact scan once the budget covers every
/// live record, so a filtered query never comes up short while matches
/// remain.
#[derive(Debug)]
pub struct HnswIndex {
    graph: HnswGraph,
    id_to_slot: HashMap<RecordId, usize>,
    slot_to_id: Vec<Option<RecordId>>,
    metadata: HashMap<RecordId, Metadata>,
    dimension: Option<usize>,
}

impl HnswIndex {
    /// Create an empty index with default graph parameters.
    pub fn new(metric: DistanceMetric) -> Self {
        Self::with_params(metric, HnswParams::default())
    }

    /// Create an empty index with custom graph parameters.
    pub fn with_params(metric: DistanceMetric, params: HnswParams) -> Self {
        Self {
            graph: HnswGraph::new(metric, params),
            id_to_slot: HashMap::new(),
            slot_to_id: Vec::new(),
            metadata: HashMap::new(),
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

    fn matches(&self, id: &RecordId, filter: Option<&WhereFilter>) -> bool {
        match filter {
            None => true,
            Some(f) => self
                .metadata
                .get(id)
                .map_or(f.is_empty(), |m| f.matches(m)),
        }
    }

    /// Exact scan over every live record; the terminal escalation step.
    fn exact_scan(
        &self,
        query: &Vector,
        n_results: usize,
        filter: Option<&WhereFilter>,
    ) -> Result<Vec<(RecordId, f32)>> {
        let metric = self.graph.metric();
        let mut scored = Vec::new();
        for (slot, id) in self.slot_to_id.iter().enumerate() {
            let Some(id) = id else { continue };
            if !self.matches(id, filter) {
                continue;
            }
            let Some(vector) = self.graph.get_vector(slot) else {
                continue;
            };
            scored.push((*id, metric.distance(query, vector)?));
        }
        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(n_results);
        Ok(scored)
    }
}

impl SimilarityIndex for HnswIndex {
    fn run(&mut self, batch: &[EmbeddingRecord]) -> Result<()> {
        for record in batch {
            let dim = record.vector.dimension();
            self.check_dimension(dim)?;
            self.dimension = Some(dim);

            // Re-running an id replaces it: tombstone the old slot first
            if let Some(old_slot) = self.id_to_slot.remove(&record.id) {
                self.graph.remove(old_slot)?;
                self.slot_to_id[old_slot] = None;
            }

            let slot = self.slot_to_id.len();
            self.graph.insert(slot, record.vector.clone())?;
            self.slot_to_id.push(Some(record.id));
            self.id_to_slot.insert(record.id, slot);
            self.metadata.insert(record.id, record.metadata.clone());
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
        if metric != self.graph.metric() {
            return Err(EmbedDbError::Validation {
                reason: format!(
                    "Index was built with metric {}, queried with {}",
                    self.graph.metric(),
                    metric
                ),
            });
        }
        if self.graph.is_empty() {
            return Ok(vec![]);
        }
        self.check_dimension(query.dimension())?;

        let total = self.graph.len();
        let mut ef = self.graph.params().ef_search.max(n_results);

        loop {
            if ef >= total {
                return self.exact_scan(query, n_results, filter);
            }

            let candidates = self.graph.search_knn(query, ef, ef)?;
            let mut matched: Vec<(RecordId, f32)> = candidates
                .into_iter()
                .filter_map(|n| {
                    self.slot_to_id
                        .get(n.slot)
                        .copied()
                        .flatten()
                        .map(|id| (id, n.distance))
                })
                .filter(|(id, _)| self.matches(id, filter))
                .collect();

            if matched.len() >= n_results || filter.is_none() {
                matched.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
                matched.truncate(n_results);
                return Ok(matched);
            }

            ef *= 2;
        }
    }

    fn delete_batch(&mut self, ids: &[RecordId]) -> Result<()> {
        for id in ids {
            if let Some(slot) = self.id_to_slot.remove(id) {
                self.graph.remove(slot)?;
                self.slot_to_id[slot] = None;
                self.metadata.remove(id);
            }
        }
        Ok(())
    }

    fn persist(&self, dir: &Path) -> Result<()> {
        let manifest = IndexManifest {
            kind: ARTIFACT_KIND.to_string(),
            dimension: self.dimension,
            metric: self.graph.metric(),
            count: self.graph.len(),
        };

        let mut rows: Vec<(RecordId, &Vector)> = Vec::with_capacity(self.graph.len());
        for (slot, id) in self.slot_to_id.iter().enumerate() {
            if let (Some(id), Some(vector)) = (id, self.graph.get_vector(slot)) {
                rows.push((*id, vector));
            }
        }

        let sidecar = HnswSidecar {
            graph: self.graph.snapshot(),
            slot_to_id: self.slot_to_id.clone(),
            metadata: self
                .metadata
                .iter()
                .map(|(id, m)| (*id, m.clone()))
                .collect(),
        };

        save_index_artifact(dir, &manifest, &rows, &sidecar)
    }

    fn load(&mut self, dir: &Path) -> Result<()> {
        let (manifest, rows, sidecar): (_, _, HnswSidecar) = load_index_artifact(dir)?;
        if manifest.kind != ARTIFACT_KIND {
            return Err(EmbedDbError::Persistence(format!(
                "Expected a {} artifact, found {}",
                ARTIFACT_KIND, manifest.kind
            )));
        }

        let mut by_id: HashMap<RecordId, Vector> = rows.into_iter().collect();
        let vectors: Vec<Option<Vector>> = sidecar
            .slot_to_id
            .iter()
            .map(|id| id.and_then(|id| by_id.remove(&id)))
            .collect();

        let graph = HnswGraph::from_snapshot(manifest.metric, sidecar.graph, vectors)?;

        self.id_to_slot = sidecar
            .slot_to_id
            .iter()
            .enumerate()
            .filter_map(|(slot, id)| id.map(|id| (id, slot)))
            .collect();
        self.slot_to_id = sidecar.slot_to_id;
        self.metadata = sidecar.metadata.into_iter().collect();
        self.dimension = manifest.dimension;
        self.graph = graph;
        Ok(())
    }

    fn metric(&self) -> DistanceMetric {
        self.graph.metric()
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    fn len(&self) -> usize {
        self.graph.len()
    }
}
