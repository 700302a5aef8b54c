//! Shared-access front door: serializes mutations across the store and
//! the per-space similarity indexes behind one lock.

use crate::distance::DistanceMetric;
use crate::error::{EmbedDbError, Result};
use crate::filter::{Metadata, WhereFilter};
use crate::flat_index::BruteForceIndex;
use crate::hnsw::{HnswIndex, HnswParams};
use crate::index::SimilarityIndex;
use crate::record::{EmbeddingRecord, NewEmbedding, RecordId};
use crate::store::EmbeddingStore;
use crate::vector::Vector;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Which index backend a coordinator builds for each space.
#[derive(Debug, Clone)]
pub enum IndexKind {
    /// Exact brute-force scan.
    Flat,
    /// Approximate HNSW graph with the given parameters.
    Hnsw(HnswParams),
}

impl IndexKind {
    fn build(&self, metric: DistanceMetric) -> Box<dyn SimilarityIndex + Send + Sync> {
        match self {
            IndexKind::Flat => Box::new(BruteForceIndex::new(metric)),
            IndexKind::Hnsw(params) => Box::new(HnswIndex::with_params(metric, params.clone())),
        }
    }
}

impl FromStr for IndexKind {
    type Err = EmbedDbError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "flat" => Ok(IndexKind::Flat),
            "hnsw" => Ok(IndexKind::Hnsw(HnswParams::default())),
            other => Err(EmbedDbError::Validation {
                reason: format!("Unknown index kind '{}', expected 'flat' or 'hnsw'", other),
            }),
        }
    }
}

/// One nearest-neighbor result, metadata included.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QueryMatch {
    pub id: RecordId,
    pub distance: f32,
    pub metadata: Metadata,
}

struct Inner<S> {
    store: S,
    indexes: HashMap<String, Box<dyn SimilarityIndex + Send + Sync>>,
}

/// Coordinates concurrent access to an embedding store and its indexes.
///
/// All mutations take the write lock, so a batch is fully applied to both
/// the store and the space's index before any reader observes it. Reads
/// share the read lock and wait out in-flight writes.
///
/// Each coordinator owns its own lock; two coordinators over different
/// stores never contend with each other.
pub struct AccessCoordinator<S: EmbeddingStore> {
    inner: RwLock<Inner<S>>,
    index_kind: IndexKind,
    metric: DistanceMetric,
    allowed_spaces: Option<HashSet<String>>,
}

impl<S: EmbeddingStore> AccessCoordinator<S> {
    pub fn new(store: S, index_kind: IndexKind, metric: DistanceMetric) -> Self {
        Self {
            inner: RwLock::new(Inner {
                store,
                indexes: HashMap::new(),
            }),
            index_kind,
            metric,
            allowed_spaces: None,
        }
    }

    /// Restrict the coordinator to a fixed set of space keys. Requests
    /// naming any other space fail with `Unauthorized`.
    pub fn with_allowed_spaces(mut self, spaces: impl IntoIterator<Item = String>) -> Self {
        self.allowed_spaces = Some(spaces.into_iter().collect());
        self
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    fn authorize(&self, space_key: &str) -> Result<()> {
        match &self.allowed_spaces {
            Some(allowed) if !allowed.contains(space_key) => Err(EmbedDbError::Unauthorized {
                space: space_key.to_string(),
            }),
            _ => Ok(()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner<S>>> {
        self.inner
            .read()
            .map_err(|_| EmbedDbError::Index("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner<S>>> {
        self.inner
            .write()
            .map_err(|_| EmbedDbError::Index("lock poisoned".to_string()))
    }

    /// Add a batch of embeddings to a space, indexing them before the
    /// write lock is released. If the index rejects the batch the store
    /// insert is rolled back, so store and index never disagree.
    pub fn add(&self, space_key: &str, items: Vec<NewEmbedding>) -> Result<Vec<RecordId>> {
        self.authorize(space_key)?;
        let mut guard = self.write()?;
        let inner = &mut *guard;

        let ids = inner.store.add_batch(space_key, items)?;
        let records: Vec<EmbeddingRecord> = inner
            .store
            .get_by_ids(space_key, &ids)
            .into_iter()
            .flatten()
            .collect();

        let kind = &self.index_kind;
        let metric = self.metric;
        let index = inner
            .indexes
            .entry(space_key.to_string())
            .or_insert_with(|| kind.build(metric));
        if let Err(e) = index.run(&records) {
            inner.store.delete_batch(space_key, &ids)?;
            return Err(e);
        }

        Ok(ids)
    }

    /// Single-record lookup. Unlike `get_by_ids`, a missing identifier is
    /// an error rather than a `None` slot.
    pub fn get(&self, space_key: &str, id: RecordId) -> Result<EmbeddingRecord> {
        self.authorize(space_key)?;
        let inner = self.read()?;
        inner
            .store
            .get_by_ids(space_key, &[id])
            .pop()
            .flatten()
            .ok_or_else(|| EmbedDbError::NotFound { id: id.to_string() })
    }

    /// Nearest-neighbor query against a space's index.
    pub fn query(
        &self,
        space_key: &str,
        query: &Vector,
        n_results: usize,
        filter: Option<&WhereFilter>,
    ) -> Result<Vec<QueryMatch>> {
        self.authorize(space_key)?;
        let inner = self.read()?;

        let Some(index) = inner.indexes.get(space_key) else {
            return Ok(vec![]);
        };
        let scored = index.fetch(query, n_results, self.metric, filter)?;

        let ids: Vec<RecordId> = scored.iter().map(|(id, _)| *id).collect();
        let records = inner.store.get_by_ids(space_key, &ids);

        Ok(scored
            .into_iter()
            .zip(records)
            .map(|((id, distance), record)| QueryMatch {
                id,
                distance,
                metadata: record.map(|r| r.metadata).unwrap_or_default(),
            })
            .collect())
    }

    /// Metadata-filtered scan, no vector math involved.
    pub fn fetch(
        &self,
        space_key: &str,
        filter: &WhereFilter,
        sort_key: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<EmbeddingRecord>> {
        self.authorize(space_key)?;
        let inner = self.read()?;
        inner.store.fetch(space_key, filter, sort_key, limit)
    }

    pub fn get_by_ids(
        &self,
        space_key: &str,
        ids: &[RecordId],
    ) -> Result<Vec<Option<EmbeddingRecord>>> {
        self.authorize(space_key)?;
        let inner = self.read()?;
        Ok(inner.store.get_by_ids(space_key, ids))
    }

    pub fn count(&self, space_key: Option<&str>) -> Result<usize> {
        if let Some(space) = space_key {
            self.authorize(space)?;
        }
        let inner = self.read()?;
        Ok(inner.store.count(space_key))
    }

    pub fn dimension(&self, space_key: &str) -> Result<Option<usize>> {
        self.authorize(space_key)?;
        let inner = self.read()?;
        Ok(inner.store.dimension(space_key))
    }

    pub fn spaces(&self) -> Result<Vec<String>> {
        let inner = self.read()?;
        Ok(inner.store.spaces())
    }

    /// Remove records from the store and the space's index. Missing ids
    /// are skipped; the return value counts records actually removed.
    pub fn delete(&self, space_key: &str, ids: &[RecordId]) -> Result<usize> {
        self.authorize(space_key)?;
        let mut inner = self.write()?;

        let removed = inner.store.delete_batch(space_key, ids)?;
        if let Some(index) = inner.indexes.get_mut(space_key) {
            index.delete_batch(ids)?;
        }
        Ok(removed)
    }

    /// Drop every record and index in every space.
    pub fn reset(&self) -> Result<()> {
        let mut inner = self.write()?;
        inner.store.reset()?;
        inner.indexes.clear();
        Ok(())
    }

    /// Write a space's index artifact to `dir`. Takes the write lock so
    /// the artifact never captures a half-applied mutation.
    pub fn persist_index(&self, space_key: &str, dir: &Path) -> Result<()> {
        self.authorize(space_key)?;
        let inner = self.write()?;
        let index = inner
            .indexes
            .get(space_key)
            .ok_or_else(|| EmbedDbError::Validation {
                reason: format!("Space '{}' has no index to persist", space_key),
            })?;
        index.persist(dir)
    }

    /// Replace a space's index with one loaded from `dir`.
    pub fn load_index(&self, space_key: &str, dir: &Path) -> Result<()> {
        self.authorize(space_key)?;
        let mut inner = self.write()?;
        let mut index = self.index_kind.build(self.metric);
        index.load(dir)?;
        inner.indexes.insert(space_key.to_string(), index);
        Ok(())
    }
}
