//! Record identifiers and the stored embedding record type

use crate::error::{EmbedDbError, Result};
use crate::filter::{Metadata, MetadataValue};
use crate::vector::Vector;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Width of an encoded record identifier in bytes.
pub const RECORD_ID_LEN: usize = 24;

/// Number of leading pad bytes above the 16-byte counter value.
const PAD_LEN: usize = RECORD_ID_LEN - 16;

/// A fixed-width, totally-ordered record identifier.
///
/// Encodes a non-negative counter as 24 big-endian bytes, so that integer
/// order and byte-lexicographic order coincide. That lets the identifier
/// double as a sort key in an ordered byte-keyed store without decoding.
/// Identifiers are assigned from a monotonic counter and never reused,
/// even after deletion (tombstone semantics).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId([u8; RECORD_ID_LEN]);

impl RecordId {
    /// Encode a counter value as a 24-byte big-endian identifier.
    pub fn encode(n: u128) -> Self {
        let mut bytes = [0u8; RECORD_ID_LEN];
        bytes[PAD_LEN..].copy_from_slice(&n.to_be_bytes());
        Self(bytes)
    }

    /// Decode an identifier from raw bytes. Fails unless the input is
    /// exactly 24 bytes with the pad bytes zero (values beyond the
    /// representable counter range are rejected).
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != RECORD_ID_LEN {
            return Err(EmbedDbError::Validation {
                reason: format!(
                    "Record identifier must be {} bytes, got {}",
                    RECORD_ID_LEN,
                    bytes.len()
                ),
            });
        }
        if bytes[..PAD_LEN].iter().any(|&b| b != 0) {
            return Err(EmbedDbError::Validation {
                reason: "Record identifier exceeds representable range".to_string(),
            });
        }
        let mut buf = [0u8; RECORD_ID_LEN];
        buf.copy_from_slice(bytes);
        Ok(Self(buf))
    }

    /// The counter value this identifier encodes.
    pub fn value(&self) -> u128 {
        let mut buf = [0u8; 16];
        buf.copy_from_slice(&self.0[PAD_LEN..]);
        u128::from_be_bytes(buf)
    }

    /// The raw 24-byte encoding.
    pub fn as_bytes(&self) -> &[u8; RECORD_ID_LEN] {
        &self.0
    }

    /// Parse the lowercase-hex form produced by `Display`.
    pub fn from_hex(s: &str) -> Result<Self> {
        if s.len() != RECORD_ID_LEN * 2 {
            return Err(EmbedDbError::Validation {
                reason: format!("Record identifier hex must be {} chars", RECORD_ID_LEN * 2),
            });
        }
        let mut bytes = [0u8; RECORD_ID_LEN];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let hex = std::str::from_utf8(chunk).map_err(|_| EmbedDbError::Validation {
                reason: "Record identifier is not valid hex".to_string(),
            })?;
            bytes[i] = u8::from_str_radix(hex, 16).map_err(|_| EmbedDbError::Validation {
                reason: "Record identifier is not valid hex".to_string(),
            })?;
        }
        RecordId::decode(&bytes)
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl Serialize for RecordId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        RecordId::from_hex(&s).map_err(D::Error::custom)
    }
}

/// Monotonic identifier counter. One per store instance; mutated only
/// under the same exclusion as the record set so concurrent inserts can
/// never observe or allocate duplicate identifiers.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct IdCounter {
    next: u128,
}

impl IdCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from a previously persisted high-water mark.
    pub fn resume(next: u128) -> Self {
        Self { next }
    }

    /// The next counter value that would be assigned.
    pub fn peek(&self) -> u128 {
        self.next
    }

    /// Allocate the next identifier.
    pub fn next_id(&mut self) -> RecordId {
        let id = RecordId::encode(self.next);
        self.next += 1;
        id
    }

    /// Advance past an identifier observed during recovery.
    pub fn observe(&mut self, id: RecordId) {
        if id.value() >= self.next {
            self.next = id.value() + 1;
        }
    }

    /// Advance to at least the given watermark (next value to assign).
    pub fn advance_to(&mut self, watermark: u128) {
        if watermark > self.next {
            self.next = watermark;
        }
    }
}

/// A new embedding to be inserted, before an identifier is assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEmbedding {
    pub vector: Vector,
    pub input_uri: String,
    pub dataset: Option<String>,
    pub category: Option<String>,
}

impl NewEmbedding {
    pub fn new(vector: Vector, input_uri: impl Into<String>) -> Self {
        Self {
            vector,
            input_uri: input_uri.into(),
            dataset: None,
            category: None,
        }
    }

    pub fn with_dataset(mut self, dataset: impl Into<String>) -> Self {
        self.dataset = Some(dataset.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Materialize the stored record under an assigned identifier.
    pub fn into_record(self, id: RecordId) -> EmbeddingRecord {
        let mut metadata = Metadata::new();
        metadata.insert("input_uri".to_string(), MetadataValue::Str(self.input_uri));
        if let Some(category) = self.category {
            metadata.insert("category".to_string(), MetadataValue::Str(category));
        }
        if let Some(dataset) = &self.dataset {
            metadata.insert("dataset".to_string(), MetadataValue::Str(dataset.clone()));
        }
        EmbeddingRecord {
            id,
            vector: self.vector,
            metadata,
            dataset: self.dataset,
        }
    }
}

/// A stored embedding record. Immutable after insert: an update is modeled
/// as delete-then-insert so identifier ordering stays intact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub id: RecordId,
    pub vector: Vector,
    pub metadata: Metadata,
    pub dataset: Option<String>,
}
