//! Durable embedding store: WAL + snapshots for crash-safe persistence.

use crate::error::Result;
use crate::filter::WhereFilter;
use crate::persistence::serialization::StoreSnapshot;
use crate::persistence::snapshot::SnapshotManager;
use crate::persistence::wal::{WalEntry, WriteAheadLog};
use crate::record::{EmbeddingRecord, NewEmbedding, RecordId};
use crate::store::{EmbeddingStore, MemoryStore};
use std::collections::HashMap;
use std::path::Path;

/// Configuration for the durable store.
pub struct DurableConfig {
    /// Checkpoint after this many WAL entries.
    pub checkpoint_interval: usize,
}

impl Default for DurableConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval: 1000,
        }
    }
}

/// An `EmbeddingStore` persisted through a write-ahead log with periodic
/// snapshot checkpoints. Recovery loads the latest snapshot, then replays
/// the WAL on top of it.
pub struct DurableStore {
    inner: MemoryStore,
    wal: WriteAheadLog,
    snapshots: SnapshotManager,
    wal_count: usize,
    config: DurableConfig,
}

impl DurableStore {
    /// Open or create a persistent store at the given directory.
    pub fn open(data_dir: impl AsRef<Path>, config: DurableConfig) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir)?;

        let snapshots = SnapshotManager::new(data_dir)?;
        let wal = WriteAheadLog::open(data_dir.join("wal.log"))?;
        let mut inner = MemoryStore::new();

        if let Some(snapshot) = snapshots.load()? {
            for (space, records) in snapshot.spaces {
                for record in records {
                    inner.restore(&space, record)?;
                }
            }
            inner.advance_counter(snapshot.next_id);
        }

        let entries = wal.replay()?;
        for entry in &entries {
            Self::apply_wal_entry(&mut inner, entry)?;
        }
        let wal_count = entries.len();

        Ok(Self {
            inner,
            wal,
            snapshots,
            wal_count,
            config,
        })
    }

    fn apply_wal_entry(inner: &mut MemoryStore, entry: &WalEntry) -> Result<()> {
        match entry {
            WalEntry::AddBatch { space, records } => {
                for record in records {
                    inner.restore(space, record.clone())?;
                }
            }
            WalEntry::DeleteBatch { space, ids } => {
                inner.delete_batch(space, ids)?;
            }
            WalEntry::Reset => {
                inner.reset()?;
            }
            WalEntry::Checkpoint => {}
        }
        Ok(())
    }

    /// Force a checkpoint: snapshot the full state and truncate the WAL.
    pub fn checkpoint(&mut self) -> Result<()> {
        let snapshot = self.build_snapshot()?;
        self.snapshots.save(&snapshot)?;

        self.wal.append(&WalEntry::Checkpoint)?;
        self.wal.truncate()?;
        self.wal_count = 0;

        Ok(())
    }

    /// Checkpoint on the configured cadence. The triggering operation is
    /// already committed to the WAL, so a checkpoint failure must not fail
    /// it; `wal_count` stays elevated and the next operation retries.
    fn maybe_checkpoint(&mut self) {
        if self.wal_count >= self.config.checkpoint_interval {
            if let Err(e) = self.checkpoint() {
                eprintln!("Checkpoint failed, will retry on next write: {}", e);
            }
        }
    }

    fn build_snapshot(&self) -> Result<StoreSnapshot> {
        let mut spaces = HashMap::new();
        for space in self.inner.spaces() {
            let records = self
                .inner
                .fetch(&space, &WhereFilter::new(), None, None)?;
            spaces.insert(space, records);
        }
        Ok(StoreSnapshot {
            spaces,
            next_id: self.inner.counter_watermark(),
        })
    }
}

impl EmbeddingStore for DurableStore {
    fn add_batch(&mut self, space_key: &str, items: Vec<NewEmbedding>) -> Result<Vec<RecordId>> {
        // Validation and id assignment happen in memory first; the WAL
        // entry then carries the fully-materialized records. A WAL failure
        // rolls the in-memory insert back so no partial mutation survives.
        let ids = self.inner.add_batch(space_key, items)?;
        let records: Vec<EmbeddingRecord> = self
            .inner
            .get_by_ids(space_key, &ids)
            .into_iter()
            .flatten()
            .collect();

        if let Err(e) = self.wal.append(&WalEntry::AddBatch {
            space: space_key.to_string(),
            records,
        }) {
            self.inner.delete_batch(space_key, &ids)?;
            return Err(e);
        }

        self.wal_count += 1;
        self.maybe_checkpoint();
        Ok(ids)
    }

    fn count(&self, space_key: Option<&str>) -> usize {
        self.inner.count(space_key)
    }

    fn fetch(
        &self,
        space_key: &str,
        filter: &WhereFilter,
        sort_key: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<EmbeddingRecord>> {
        self.inner.fetch(space_key, filter, sort_key, limit)
    }

    fn get_by_ids(&self, space_key: &str, ids: &[RecordId]) -> Vec<Option<EmbeddingRecord>> {
        self.inner.get_by_ids(space_key, ids)
    }

    fn delete_batch(&mut self, space_key: &str, ids: &[RecordId]) -> Result<usize> {
        self.wal.append(&WalEntry::DeleteBatch {
            space: space_key.to_string(),
            ids: ids.to_vec(),
        })?;

        let removed = self.inner.delete_batch(space_key, ids)?;
        self.wal_count += 1;
        self.maybe_checkpoint();
        Ok(removed)
    }

    fn dimension(&self, space_key: &str) -> Option<usize> {
        self.inner.dimension(space_key)
    }

    fn spaces(&self) -> Vec<String> {
        self.inner.spaces()
    }

    fn reset(&mut self) -> Result<()> {
        self.wal.append(&WalEntry::Reset)?;
        self.inner.reset()?;
        self.wal_count += 1;
        self.maybe_checkpoint();
        Ok(())
    }
}
