//! Snapshots and index artifacts: full state saved to and restored from disk.

use crate::error::{EmbedDbError, Result};
use crate::persistence::segment::VectorSegment;
use crate::persistence::serialization::{self, IndexManifest, StoreSnapshot};
use crate::record::RecordId;
use crate::vector::Vector;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Manages saving and loading store snapshots.
pub struct SnapshotManager {
    dir: PathBuf,
}

impl SnapshotManager {
    /// Create a snapshot manager for the given directory.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn snapshot_path(&self) -> PathBuf {
        self.dir.join("snapshot.bin")
    }

    fn manifest_path(&self) -> PathBuf {
        self.dir.join("manifest.json")
    }

    /// Save a store snapshot to disk.
    pub fn save(&self, snapshot: &StoreSnapshot) -> Result<()> {
        let data = serialization::to_bincode(snapshot)?;
        fs::write(self.snapshot_path(), &data)?;

        // Human-readable manifest alongside the binary snapshot
        let record_count: usize = snapshot.spaces.values().map(|r| r.len()).sum();
        let manifest = serde_json::json!({
            "spaces": snapshot.spaces.len(),
            "record_count": record_count,
            "next_id": snapshot.next_id.to_string(),
        });
        fs::write(self.manifest_path(), serialization::to_json(&manifest)?)?;

        Ok(())
    }

    /// Load a store snapshot from disk, or None if no snapshot exists.
    pub fn load(&self) -> Result<Option<StoreSnapshot>> {
        let path = self.snapshot_path();
        if !path.exists() {
            return Ok(None);
        }

        let data = fs::read(&path)?;
        let snapshot: StoreSnapshot = serialization::from_bincode(&data)?;
        Ok(Some(snapshot))
    }

    /// Check if a snapshot exists.
    pub fn exists(&self) -> bool {
        self.snapshot_path().exists()
    }
}

// --- Index artifacts ---
//
// Layout inside the artifact directory:
//   manifest.json  — kind, dimensionality, build metric, count
//   vectors.seg    — fixed-width (identifier, vector) rows
//   meta.bin       — bincode sidecar: per-record metadata and any
//                    index-specific state (e.g. graph structure)

const MANIFEST_FILE: &str = "manifest.json";
const SEGMENT_FILE: &str = "vectors.seg";
const SIDECAR_FILE: &str = "meta.bin";

/// Write an index artifact to `dir`, replacing any previous artifact.
pub fn save_index_artifact<M: Serialize>(
    dir: &Path,
    manifest: &IndexManifest,
    rows: &[(RecordId, &Vector)],
    sidecar: &M,
) -> Result<()> {
    fs::create_dir_all(dir)?;

    fs::write(dir.join(MANIFEST_FILE), serialization::to_json(manifest)?)?;

    let dimension = manifest.dimension.unwrap_or(0);
    let mut segment = VectorSegment::create(dir.join(SEGMENT_FILE), dimension)?;
    for (id, vector) in rows {
        segment.append(*id, vector)?;
    }

    fs::write(dir.join(SIDECAR_FILE), serialization::to_bincode(sidecar)?)?;

    Ok(())
}

/// Read an index artifact back: manifest, all (id, vector) rows, sidecar.
pub fn load_index_artifact<M: DeserializeOwned>(
    dir: &Path,
) -> Result<(IndexManifest, Vec<(RecordId, Vector)>, M)> {
    let manifest_path = dir.join(MANIFEST_FILE);
    if !manifest_path.exists() {
        return Err(EmbedDbError::Persistence(format!(
            "No index artifact at {}",
            dir.display()
        )));
    }

    let manifest: IndexManifest = serialization::from_json(&fs::read(manifest_path)?)?;

    let segment = VectorSegment::open(dir.join(SEGMENT_FILE))?;
    let rows = segment.read_all()?;
    if rows.len() != manifest.count {
        return Err(EmbedDbError::Persistence(format!(
            "Artifact manifest says {} rows, segment holds {}",
            manifest.count,
            rows.len()
        )));
    }

    let sidecar: M = serialization::from_bincode(&fs::read(dir.join(SIDECAR_FILE))?)?;

    Ok((manifest, rows, sidecar))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::DistanceMetric;
    use crate::record::NewEmbedding;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_store_snapshot_save_and_load() {
        let dir = TempDir::new().unwrap();
        let mgr = SnapshotManager::new(dir.path().join("db")).unwrap();

        let record = NewEmbedding::new(Vector::new(vec![1.0, 2.0, 3.0]), "a")
            .into_record(RecordId::encode(0));
        let mut spaces = HashMap::new();
        spaces.insert("default".to_string(), vec![record]);

        mgr.save(&StoreSnapshot { spaces, next_id: 1 }).unwrap();
        assert!(mgr.exists());

        let loaded = mgr.load().unwrap().unwrap();
        assert_eq!(loaded.next_id, 1);
        assert_eq!(loaded.spaces["default"].len(), 1);
        assert_eq!(
            loaded.spaces["default"][0].vector.as_slice(),
            &[1.0, 2.0, 3.0]
        );
    }

    #[test]
    fn test_load_nonexistent_snapshot() {
        let dir = TempDir::new().unwrap();
        let mgr = SnapshotManager::new(dir.path().join("empty")).unwrap();
        assert!(!mgr.exists());
        assert!(mgr.load().unwrap().is_none());
    }

    #[test]
    fn test_index_artifact_roundtrip() {
        let dir = TempDir::new().unwrap();
        let artifact_dir = dir.path().join("index");

        let v1 = Vector::new(vec![1.0, 2.0]);
        let v2 = Vector::new(vec![3.0, 4.0]);
        let rows = vec![(RecordId::encode(0), &v1), (RecordId::encode(1), &v2)];
        let manifest = IndexManifest {
            kind: "flat".to_string(),
            dimension: Some(2),
            metric: DistanceMetric::L2,
            count: 2,
        };
        let sidecar: Vec<u32> = vec![10, 20];

        save_index_artifact(&artifact_dir, &manifest, &rows, &sidecar).unwrap();

        let (loaded_manifest, loaded_rows, loaded_sidecar): (_, _, Vec<u32>) =
            load_index_artifact(&artifact_dir).unwrap();
        assert_eq!(loaded_manifest.kind, "flat");
        assert_eq!(loaded_rows.len(), 2);
        assert_eq!(loaded_rows[1].1.as_slice(), &[3.0, 4.0]);
        assert_eq!(loaded_sidecar, vec![10, 20]);
    }

    #[test]
    fn test_missing_artifact() {
        let dir = TempDir::new().unwrap();
        let result: Result<(_, _, Vec<u8>)> = load_index_artifact(&dir.path().join("nope"));
        assert!(matches!(result, Err(EmbedDbError::Persistence(_))));
    }
}
