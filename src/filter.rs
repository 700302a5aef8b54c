//! Metadata values and equality filters

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// A scalar metadata value attached to an embedding record.
///
/// Untagged on the JSON wire: booleans, integers, floats, and strings map
/// directly, and nested objects or arrays are rejected at deserialization,
/// which is how unsupported filter operators surface as validation errors.
/// Binary formats cannot sniff value types the way JSON can, so persisted
/// state (WAL entries, snapshots, index sidecars) carries the tagged form
/// instead; the serde impls pick per `is_human_readable`.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// Tagged twin of `MetadataValue` for non-self-describing formats.
#[derive(Serialize, Deserialize)]
enum TaggedValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Serialize for MetadataValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            match self {
                MetadataValue::Bool(v) => serializer.serialize_bool(*v),
                MetadataValue::Int(v) => serializer.serialize_i64(*v),
                MetadataValue::Float(v) => serializer.serialize_f64(*v),
                MetadataValue::Str(v) => serializer.serialize_str(v),
            }
        } else {
            let tagged = match self {
                MetadataValue::Bool(v) => TaggedValue::Bool(*v),
                MetadataValue::Int(v) => TaggedValue::Int(*v),
                MetadataValue::Float(v) => TaggedValue::Float(*v),
                MetadataValue::Str(v) => TaggedValue::Str(v.clone()),
            };
            tagged.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for MetadataValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            deserializer.deserialize_any(ScalarVisitor)
        } else {
            Ok(match TaggedValue::deserialize(deserializer)? {
                TaggedValue::Bool(v) => MetadataValue::Bool(v),
                TaggedValue::Int(v) => MetadataValue::Int(v),
                TaggedValue::Float(v) => MetadataValue::Float(v),
                TaggedValue::Str(v) => MetadataValue::Str(v),
            })
        }
    }
}

struct ScalarVisitor;

impl<'de> Visitor<'de> for ScalarVisitor {
    type Value = MetadataValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a boolean, integer, float, or string")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<MetadataValue, E> {
        Ok(MetadataValue::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<MetadataValue, E> {
        Ok(MetadataValue::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<MetadataValue, E> {
        i64::try_from(v)
            .map(MetadataValue::Int)
            .map_err(|_| E::custom(format!("integer {} does not fit a metadata value", v)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<MetadataValue, E> {
        Ok(MetadataValue::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<MetadataValue, E> {
        Ok(MetadataValue::Str(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<MetadataValue, E> {
        Ok(MetadataValue::Str(v))
    }
}

impl MetadataValue {
    /// Total ordering across values, used for `sort_key` scans.
    /// Values of different types order by type rank; floats use total_cmp.
    pub fn total_cmp(&self, other: &MetadataValue) -> Ordering {
        use MetadataValue::*;
        match (self, other) {
            (Bool(a), Bool(b)) => a.cmp(b),
            (Int(a), Int(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (Int(a), Float(b)) => (*a as f64).total_cmp(b),
            (Float(a), Int(b)) => a.total_cmp(&(*b as f64)),
            (Str(a), Str(b)) => a.cmp(b),
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            MetadataValue::Bool(_) => 0,
            MetadataValue::Int(_) | MetadataValue::Float(_) => 1,
            MetadataValue::Str(_) => 2,
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        MetadataValue::Str(s.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        MetadataValue::Str(s)
    }
}

impl From<i64> for MetadataValue {
    fn from(n: i64) -> Self {
        MetadataValue::Int(n)
    }
}

impl From<f64> for MetadataValue {
    fn from(n: f64) -> Self {
        MetadataValue::Float(n)
    }
}

/// Metadata attached to a record: string keys to scalar values.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Equality predicates over record metadata. A record matches when every
/// (key, value) pair is present and equal in its metadata. The empty filter
/// matches everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WhereFilter {
    predicates: BTreeMap<String, MetadataValue>,
}

impl WhereFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality predicate.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.predicates.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Whether the given metadata satisfies all predicates.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.predicates
            .iter()
            .all(|(key, expected)| metadata.get(key) == Some(expected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_metadata() -> Metadata {
        let mut m = Metadata::new();
        m.insert("category".to_string(), MetadataValue::from("animal"));
        m.insert("quality".to_string(), MetadataValue::Float(0.9));
        m.insert("reviewed".to_string(), MetadataValue::Bool(true));
        m
    }

    #[test]
    fn test_empty_filter_matches_all() {
        assert!(WhereFilter::new().matches(&sample_metadata()));
        assert!(WhereFilter::new().matches(&Metadata::new()));
    }

    #[test]
    fn test_equality_match() {
        let filter = WhereFilter::new().with("category", "animal");
        assert!(filter.matches(&sample_metadata()));

        let filter = WhereFilter::new().with("category", "vehicle");
        assert!(!filter.matches(&sample_metadata()));
    }

    #[test]
    fn test_all_predicates_required() {
        let filter = WhereFilter::new()
            .with("category", "animal")
            .with("missing_key", "x");
        assert!(!filter.matches(&sample_metadata()));
    }

    #[test]
    fn test_untagged_json() {
        let filter: WhereFilter =
            serde_json::from_str(r#"{"category": "animal", "quality": 0.9}"#).unwrap();
        assert!(filter.matches(&sample_metadata()));
    }

    #[test]
    fn test_nested_operator_rejected() {
        // Operator-style filters are not supported; the value must be scalar
        let result: std::result::Result<WhereFilter, _> =
            serde_json::from_str(r#"{"quality": {"$gt": 0.5}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_bincode_roundtrip_all_variants() {
        let values = [
            MetadataValue::Bool(true),
            MetadataValue::Int(-3),
            MetadataValue::Float(0.25),
            MetadataValue::from("cat"),
        ];
        for value in &values {
            let bytes = bincode::serialize(value).unwrap();
            let decoded: MetadataValue = bincode::deserialize(&bytes).unwrap();
            assert_eq!(&decoded, value);
        }

        // The full map, as it rides inside WAL entries and index sidecars
        let metadata = sample_metadata();
        let bytes = bincode::serialize(&metadata).unwrap();
        let decoded: Metadata = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, metadata);
    }

    #[test]
    fn test_total_cmp_mixed_numbers() {
        assert_eq!(
            MetadataValue::Int(1).total_cmp(&MetadataValue::Float(1.5)),
            Ordering::Less
        );
        assert_eq!(
            MetadataValue::Float(2.0).total_cmp(&MetadataValue::Int(2)),
            Ordering::Equal
        );
    }
}
