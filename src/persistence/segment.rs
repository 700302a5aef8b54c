//! Fixed-width vector segment files.
//!
//! Each row is a 24-byte record identifier followed by the vector's f32
//! components in little-endian order, so rows are addressable by offset
//! and readable through a memory map without parsing.

use crate::error::{EmbedDbError, Result};
use crate::record::{RecordId, RECORD_ID_LEN};
use crate::vector::Vector;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Header written at the start of the file: [dimension: u32][count: u32]
const HEADER_SIZE: usize = 8;

/// A segment file of (identifier, vector) rows with one fixed dimension.
pub struct VectorSegment {
    path: PathBuf,
    dimension: usize,
    count: usize,
}

impl VectorSegment {
    /// Create a new segment file, truncating any existing one.
    pub fn create(path: impl AsRef<Path>, dimension: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;

        let header = Self::encode_header(dimension, 0);
        file.write_all(&header)?;
        file.sync_all()?;

        Ok(Self {
            path,
            dimension,
            count: 0,
        })
    }

    /// Open an existing segment file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path)?;

        let mut header = [0u8; HEADER_SIZE];
        file.read_exact(&mut header).map_err(|_| {
            EmbedDbError::Persistence("Segment file too small for header".to_string())
        })?;

        let (dimension, count) = Self::decode_header(&header);

        Ok(Self {
            path,
            dimension,
            count,
        })
    }

    fn row_size(&self) -> usize {
        RECORD_ID_LEN + self.dimension * 4
    }

    /// Append a row, returning its index.
    pub fn append(&mut self, id: RecordId, vector: &Vector) -> Result<usize> {
        if vector.dimension() != self.dimension {
            return Err(EmbedDbError::Dimensionality {
                expected: self.dimension,
                actual: vector.dimension(),
            });
        }

        let mut file = OpenOptions::new().read(true).write(true).open(&self.path)?;

        let offset = (HEADER_SIZE + self.count * self.row_size()) as u64;
        file.seek(SeekFrom::Start(offset))?;

        file.write_all(id.as_bytes())?;
        for &val in vector.as_slice() {
            file.write_all(&val.to_le_bytes())?;
        }

        self.count += 1;
        let header = Self::encode_header(self.dimension, self.count);
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&header)?;

        file.sync_all()?;

        Ok(self.count - 1)
    }

    /// Read a row by index through regular file I/O.
    pub fn get(&self, index: usize) -> Result<(RecordId, Vector)> {
        if index >= self.count {
            return Err(EmbedDbError::Persistence(format!(
                "Row {} out of range (count={})",
                index, self.count
            )));
        }

        let mut file = File::open(&self.path)?;
        let offset = (HEADER_SIZE + index * self.row_size()) as u64;
        file.seek(SeekFrom::Start(offset))?;

        let mut id_buf = [0u8; RECORD_ID_LEN];
        file.read_exact(&mut id_buf)?;
        let id = RecordId::decode(&id_buf)?;

        let mut data = Vec::with_capacity(self.dimension);
        for _ in 0..self.dimension {
            let mut buf = [0u8; 4];
            file.read_exact(&mut buf)?;
            data.push(f32::from_le_bytes(buf));
        }

        Ok((id, Vector::new(data)))
    }

    /// Read all rows through a memory map (best-effort). Falls back to
    /// regular file I/O if mmap is unavailable.
    pub fn read_all(&self) -> Result<Vec<(RecordId, Vector)>> {
        let file = File::open(&self.path)?;
        match unsafe { memmap2::Mmap::map(&file) } {
            Ok(mmap) => {
                let row_size = self.row_size();
                let mut rows = Vec::with_capacity(self.count);
                for index in 0..self.count {
                    let offset = HEADER_SIZE + index * row_size;
                    let id = RecordId::decode(&mmap[offset..offset + RECORD_ID_LEN])?;

                    let mut data = Vec::with_capacity(self.dimension);
                    for i in 0..self.dimension {
                        let byte_offset = offset + RECORD_ID_LEN + i * 4;
                        let bytes: [u8; 4] = mmap[byte_offset..byte_offset + 4]
                            .try_into()
                            .map_err(|_| {
                                EmbedDbError::Persistence("Truncated segment row".to_string())
                            })?;
                        data.push(f32::from_le_bytes(bytes));
                    }
                    rows.push((id, Vector::new(data)));
                }
                Ok(rows)
            }
            Err(_) => (0..self.count).map(|i| self.get(i)).collect(),
        }
    }

    /// Number of stored rows.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Vector dimension of every row.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn encode_header(dimension: usize, count: usize) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&(dimension as u32).to_le_bytes());
        buf[4..8].copy_from_slice(&(count as u32).to_le_bytes());
        buf
    }

    fn decode_header(data: &[u8]) -> (usize, usize) {
        let dimension = u32::from_le_bytes(data[0..4].try_into().unwrap()) as usize;
        let count = u32::from_le_bytes(data[4..8].try_into().unwrap()) as usize;
        (dimension, count)
    }
}
