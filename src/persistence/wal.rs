//! Write-Ahead Log (WAL) for crash recovery.
//!
//! Each entry is written as: [length: u32][crc32: u32][payload: bincode(WalEntry)]
//! The WAL is append-only and fsynced after each write.

use crate::error::{EmbedDbError, Result};
use crate::persistence::serialization;
use crate::record::{EmbeddingRecord, RecordId};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

/// A single WAL entry. Batches are logged whole so replay reproduces the
/// same atomicity the live operation had.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum WalEntry {
    AddBatch {
        space: String,
        records: Vec<EmbeddingRecord>,
    },
    DeleteBatch {
        space: String,
        ids: Vec<RecordId>,
    },
    Reset,
    Checkpoint,
}

/// Write-Ahead Log file manager.
pub struct WriteAheadLog {
    path: PathBuf,
    file: File,
}

impl WriteAheadLog {
    /// Open (or create) a WAL file at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file })
    }

    /// Append an entry to the WAL and fsync.
    pub fn append(&mut self, entry: &WalEntry) -> Result<()> {
        let payload = serialization::to_bincode(entry)?;
        let crc = crc32fast::hash(&payload);
        let len = payload.len() as u32;

        self.file.write_all(&len.to_le_bytes())?;
        self.file.write_all(&crc.to_le_bytes())?;
        self.file.write_all(&payload)?;
        self.sync()?;

        Ok(())
    }

    /// Fsync the WAL file.
    pub fn sync(&self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Replay all valid entries from the WAL.
    /// Stops at the first corrupted or incomplete entry (crash tolerance).
    pub fn replay(&self) -> Result<Vec<WalEntry>> {
        let file = File::open(&self.path)?;
        let mut reader = BufReader::new(file);
        let mut entries = Vec::new();

        loop {
            let mut len_buf = [0u8; 4];
            match reader.read_exact(&mut len_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(EmbedDbError::Io(e)),
            }
            let len = u32::from_le_bytes(len_buf) as usize;

            let mut crc_buf = [0u8; 4];
            match reader.read_exact(&mut crc_buf) {
                Ok(()) => {}
                Err(_) => break, // Truncated — stop
            }
            let expected_crc = u32::from_le_bytes(crc_buf);

            let mut payload = vec![0u8; len];
            match reader.read_exact(&mut payload) {
                Ok(()) => {}
                Err(_) => break, // Truncated — stop
            }

            let actual_crc = crc32fast::hash(&payload);
            if actual_crc != expected_crc {
                break; // Corrupted — stop
            }

            match serialization::from_bincode::<WalEntry>(&payload) {
                Ok(entry) => entries.push(entry),
                Err(_) => break, // Corrupted — stop
            }
        }

        Ok(entries)
    }

    /// Truncate the WAL file (after a successful checkpoint).
    pub fn truncate(&mut self) -> Result<()> {
        self.file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::NewEmbedding;
    use crate::vector::Vector;
    use tempfile::TempDir;

    fn record(n: u128, data: Vec<f32>) -> EmbeddingRecord {
        NewEmbedding::new(Vector::new(data), format!("uri-{}", n))
            .into_record(RecordId::encode(n))
    }

    #[test]
    fn test_wal_write_and_replay() {
        let dir = TempDir::new().unwrap();
        let wal_path = dir.path().join("test.wal");

        {
            let mut wal = WriteAheadLog::open(&wal_path).unwrap();
            wal.append(&WalEntry::AddBatch {
                space: "default".to_string(),
                records: vec![record(0, vec![1.0, 2.0]), record(1, vec![3.0, 4.0])],
            })
            .unwrap();
            wal.append(&WalEntry::DeleteBatch {
                space: "default".to_string(),
                ids: vec![RecordId::encode(0)],
            })
            .unwrap();
        }

        let wal = WriteAheadLog::open(&wal_path).unwrap();
        let entries = wal.replay().unwrap();
        assert_eq!(entries.len(), 2);

        assert!(
            matches!(&entries[0], WalEntry::AddBatch { space, records } if space == "default" && records.len() == 2)
        );
        assert!(
            matches!(&entries[1], WalEntry::DeleteBatch { ids, .. } if ids == &[RecordId::encode(0)])
        );
    }

    #[test]
    fn test_wal_truncated_entry() {
        let dir = TempDir::new().unwrap();
        let wal_path = dir.path().join("test.wal");

        {
            let mut wal = WriteAheadLog::open(&wal_path).unwrap();
            wal.append(&WalEntry::AddBatch {
                space: "default".to_string(),
                records: vec![record(0, vec![1.0])],
            })
            .unwrap();
        }

        // Append garbage (simulates a crash mid-write)
        {
            let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
            file.write_all(&[0xFF, 0xFF, 0xFF]).unwrap();
        }

        let wal = WriteAheadLog::open(&wal_path).unwrap();
        let entries = wal.replay().unwrap();
        assert_eq!(entries.len(), 1); // Only the valid entry
    }

    #[test]
    fn test_wal_truncate() {
        let dir = TempDir::new().unwrap();
        let wal_path = dir.path().join("test.wal");

        let mut wal = WriteAheadLog::open(&wal_path).unwrap();
        wal.append(&WalEntry::Checkpoint).unwrap();
        assert_eq!(wal.replay().unwrap().len(), 1);

        wal.truncate().unwrap();
        let wal = WriteAheadLog::open(&wal_path).unwrap();
        assert_eq!(wal.replay().unwrap().len(), 0);
    }
}
