//! Embedding storage: the durable record of embeddings plus metadata.
//!
//! The store is the source of truth; similarity indexes are derived,
//! rebuildable artifacts fed from it.

use crate::error::{EmbedDbError, Result};
use crate::filter::WhereFilter;
use crate::record::{EmbeddingRecord, IdCounter, NewEmbedding, RecordId};
use std::collections::{BTreeMap, HashMap};

/// Capability interface for embedding storage backends.
///
/// Records are immutable once inserted; identifiers come from a monotonic
/// per-store counter and are never reused after deletion or reset.
pub trait EmbeddingStore {
    /// Insert a batch of embeddings into a space, assigning fresh
    /// identifiers in input order. Validates that every vector matches the
    /// space's established dimensionality (establishing it on the first
    /// insert) and rejects the whole batch atomically on any mismatch.
    fn add_batch(&mut self, space_key: &str, items: Vec<NewEmbedding>) -> Result<Vec<RecordId>>;

    /// Number of live records, scoped to a space if given, else global.
    fn count(&self, space_key: Option<&str>) -> usize;

    /// Records whose metadata satisfies all filter predicates, ordered by
    /// identifier ascending, or by `sort_key` (a metadata field) with
    /// identifier tie-break. `limit` truncates, never errors.
    fn fetch(
        &self,
        space_key: &str,
        filter: &WhereFilter,
        sort_key: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<EmbeddingRecord>>;

    /// Positional lookup: unresolvable identifiers yield `None` at their
    /// position rather than failing the whole call.
    fn get_by_ids(&self, space_key: &str, ids: &[RecordId]) -> Vec<Option<EmbeddingRecord>>;

    /// Remove records by identifier. Missing identifiers are skipped;
    /// returns the number actually removed. Identifiers of removed records
    /// are tombstoned, never reassigned.
    fn delete_batch(&mut self, space_key: &str, ids: &[RecordId]) -> Result<usize>;

    /// The established dimensionality of a space, if any records were
    /// ever inserted into it.
    fn dimension(&self, space_key: &str) -> Option<usize>;

    /// All space keys with live records.
    fn spaces(&self) -> Vec<String>;

    /// Destroy all records across all spaces. Idempotent. The identifier
    /// counter is not rewound.
    fn reset(&mut self) -> Result<()>;
}

/// One space's records, keyed by identifier so scans run in id order.
#[derive(Debug, Default)]
struct SpaceRecords {
    dimension: Option<usize>,
    records: BTreeMap<RecordId, EmbeddingRecord>,
}

/// In-memory embedding store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    spaces: HashMap<String, SpaceRecords>,
    counter: IdCounter,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The counter's next value; persisted by durable wrappers.
    pub fn counter_watermark(&self) -> u128 {
        self.counter.peek()
    }

    /// Advance the counter to at least the given watermark. Used by
    /// durable wrappers restoring a persisted high-water mark, so reset
    /// followed by recovery never reassigns an old identifier.
    pub(crate) fn advance_counter(&mut self, watermark: u128) {
        self.counter.advance_to(watermark);
    }

    /// Re-insert a record under its original identifier during recovery.
    /// Advances the counter past the identifier and establishes the space
    /// dimensionality if needed.
    pub(crate) fn restore(&mut self, space_key: &str, record: EmbeddingRecord) -> Result<()> {
        let space = self.spaces.entry(space_key.to_string()).or_default();
        let dim = record.vector.dimension();
        match space.dimension {
            Some(expected) if expected != dim => {
                return Err(EmbedDbError::Dimensionality {
                    expected,
                    actual: dim,
                })
            }
            Some(_) => {}
            None => space.dimension = Some(dim),
        }
        self.counter.observe(record.id);
        space.records.insert(record.id, record);
        Ok(())
    }
}

impl EmbeddingStore for MemoryStore {
    fn add_batch(&mut self, space_key: &str, items: Vec<NewEmbedding>) -> Result<Vec<RecordId>> {
        if items.is_empty() {
            return Err(EmbedDbError::Validation {
                reason: "add_batch requires at least one embedding".to_string(),
            });
        }

        // Validate the entire batch before touching any state, so a failed
        // batch persists nothing and a fresh space is not even created.
        let expected = self
            .spaces
            .get(space_key)
            .and_then(|s| s.dimension)
            .unwrap_or_else(|| items[0].vector.dimension());
        for item in &items {
            let dim = item.vector.dimension();
            if dim != expected {
                return Err(EmbedDbError::Dimensionality {
                    expected,
                    actual: dim,
                });
            }
        }

        let space = self.spaces.entry(space_key.to_string()).or_default();
        space.dimension = Some(expected);

        let mut ids = Vec::with_capacity(items.len());
        for item in items {
            let id = self.counter.next_id();
            space.records.insert(id, item.into_record(id));
            ids.push(id);
        }
        Ok(ids)
    }

    fn count(&self, space_key: Option<&str>) -> usize {
        match space_key {
            Some(key) => self
                .spaces
                .get(key)
                .map(|s| s.records.len())
                .unwrap_or(0),
            None => self.spaces.values().map(|s| s.records.len()).sum(),
        }
    }

    fn fetch(
        &self,
        space_key: &str,
        filter: &WhereFilter,
        sort_key: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<EmbeddingRecord>> {
        let Some(space) = self.spaces.get(space_key) else {
            return Ok(vec![]);
        };

        // BTreeMap iteration is id-ascending, the default ordering.
        let mut results: Vec<EmbeddingRecord> = space
            .records
            .values()
            .filter(|r| filter.matches(&r.metadata))
            .cloned()
            .collect();

        if let Some(key) = sort_key {
            // Stable sort keeps the id-ascending tie-break; records
            // missing the sort field go last.
            results.sort_by(|a, b| match (a.metadata.get(key), b.metadata.get(key)) {
                (Some(va), Some(vb)) => va.total_cmp(vb),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            });
        }

        if let Some(limit) = limit {
            results.truncate(limit);
        }
        Ok(results)
    }

    fn get_by_ids(&self, space_key: &str, ids: &[RecordId]) -> Vec<Option<EmbeddingRecord>> {
        let space = self.spaces.get(space_key);
        ids.iter()
            .map(|id| space.and_then(|s| s.records.get(id).cloned()))
            .collect()
    }

    fn delete_batch(&mut self, space_key: &str, ids: &[RecordId]) -> Result<usize> {
        let Some(space) = self.spaces.get_mut(space_key) else {
            return Ok(0);
        };
        let mut removed = 0;
        for id in ids {
            if space.records.remove(id).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn dimension(&self, space_key: &str) -> Option<usize> {
        self.spaces.get(space_key).and_then(|s| s.dimension)
    }

    fn spaces(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.spaces.keys().cloned().collect();
        keys.sort();
        keys
    }

    fn reset(&mut self) -> Result<()> {
        self.spaces.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::Vector;

    fn item(data: Vec<f32>, uri: &str) -> NewEmbedding {
        NewEmbedding::new(Vector::new(data), uri)
    }

    #[test]
    fn test_batch_insert_assigns_increasing_ids() {
        let mut store = MemoryStore::new();
        let ids = store
            .add_batch(
                "default",
                vec![
                    item(vec![1.0, 2.0], "a"),
                    item(vec![3.0, 4.0], "b"),
                    item(vec![5.0, 6.0], "c"),
                ],
            )
            .unwrap();

        assert_eq!(ids.len(), 3);
        assert!(ids[0] < ids[1] && ids[1] < ids[2]);
        assert_eq!(store.count(Some("default")), 3);
        assert_eq!(store.count(None), 3);
    }

    #[test]
    fn test_dimension_established_then_enforced() {
        let mut store = MemoryStore::new();
        store
            .add_batch("default", vec![item(vec![1.0, 2.0, 3.0], "a")])
            .unwrap();
        assert_eq!(store.dimension("default"), Some(3));

        let result = store.add_batch("default", vec![item(vec![1.0, 2.0], "b")]);
        assert!(matches!(
            result,
            Err(EmbedDbError::Dimensionality {
                expected: 3,
                actual: 2
            })
        ));
        assert_eq!(store.count(Some("default")), 1);
    }

    #[test]
    fn test_failed_batch_is_atomic() {
        let mut store = MemoryStore::new();
        let result = store.add_batch(
            "default",
            vec![item(vec![1.0, 2.0], "a"), item(vec![1.0], "b")],
        );
        assert!(result.is_err());
        assert_eq!(store.count(None), 0);

        // The counter did not advance for the failed batch
        let ids = store
            .add_batch("default", vec![item(vec![1.0, 2.0], "a")])
            .unwrap();
        assert_eq!(ids[0].value(), 0);
    }

    #[test]
    fn test_failed_first_batch_creates_no_space() {
        let mut store = MemoryStore::new();
        let result = store.add_batch(
            "fresh",
            vec![item(vec![1.0, 2.0], "a"), item(vec![1.0], "b")],
        );
        assert!(result.is_err());
        assert!(store.spaces().is_empty());
        assert_eq!(store.dimension("fresh"), None);
    }

    #[test]
    fn test_spaces_are_independent() {
        let mut store = MemoryStore::new();
        store
            .add_batch("words", vec![item(vec![1.0, 2.0], "a")])
            .unwrap();
        store
            .add_batch("images", vec![item(vec![1.0, 2.0, 3.0], "b")])
            .unwrap();

        assert_eq!(store.dimension("words"), Some(2));
        assert_eq!(store.dimension("images"), Some(3));
        assert_eq!(store.count(None), 2);
        assert_eq!(store.spaces(), vec!["images", "words"]);
    }

    #[test]
    fn test_fetch_with_filter() {
        let mut store = MemoryStore::new();
        store
            .add_batch(
                "default",
                vec![
                    item(vec![1.0], "a").with_category("cat"),
                    item(vec![2.0], "b").with_category("dog"),
                    item(vec![3.0], "c").with_category("cat"),
                ],
            )
            .unwrap();

        let filter = WhereFilter::new().with("category", "cat");
        let results = store.fetch("default", &filter, None, None).unwrap();
        assert_eq!(results.len(), 2);
        // id-ascending by default
        assert!(results[0].id < results[1].id);
    }

    #[test]
    fn test_fetch_sort_key_and_limit() {
        let mut store = MemoryStore::new();
        store
            .add_batch(
                "default",
                vec![
                    item(vec![1.0], "c"),
                    item(vec![2.0], "a"),
                    item(vec![3.0], "b"),
                ],
            )
            .unwrap();

        let results = store
            .fetch("default", &WhereFilter::new(), Some("input_uri"), Some(2))
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(
            results[0].metadata.get("input_uri"),
            Some(&crate::filter::MetadataValue::from("a"))
        );
    }

    #[test]
    fn test_get_by_ids_positional() {
        let mut store = MemoryStore::new();
        let ids = store
            .add_batch(
                "default",
                vec![item(vec![1.0], "a"), item(vec![2.0], "b")],
            )
            .unwrap();

        let missing = RecordId::encode(999);
        let results = store.get_by_ids("default", &[ids[1], missing, ids[0]]);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().id, ids[1]);
        assert!(results[1].is_none());
        assert_eq!(results[2].as_ref().unwrap().id, ids[0]);
    }

    #[test]
    fn test_delete_batch_skips_missing() {
        let mut store = MemoryStore::new();
        let ids = store
            .add_batch(
                "default",
                vec![item(vec![1.0], "a"), item(vec![2.0], "b")],
            )
            .unwrap();

        let removed = store
            .delete_batch("default", &[ids[0], RecordId::encode(999)])
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.count(Some("default")), 1);
    }

    #[test]
    fn test_ids_not_reused_after_delete() {
        let mut store = MemoryStore::new();
        let ids = store
            .add_batch("default", vec![item(vec![1.0], "a")])
            .unwrap();
        store.delete_batch("default", &ids).unwrap();

        let new_ids = store
            .add_batch("default", vec![item(vec![2.0], "b")])
            .unwrap();
        assert!(new_ids[0] > ids[0]);
    }

    #[test]
    fn test_reset_idempotent_counter_kept() {
        let mut store = MemoryStore::new();
        store
            .add_batch("default", vec![item(vec![1.0], "a")])
            .unwrap();
        store.reset().unwrap();
        store.reset().unwrap();
        assert_eq!(store.count(None), 0);
        assert!(store
            .fetch("default", &WhereFilter::new(), None, None)
            .unwrap()
            .is_empty());

        // Counter survives reset: identifiers stay unique for the store's
        // lifetime.
        let ids = store
            .add_batch("default", vec![item(vec![1.0], "a")])
            .unwrap();
        assert_eq!(ids[0].value(), 1);
    }
}
