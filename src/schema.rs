//! Validated request schemas consumed by external callers (HTTP, CLI, SDK).
//!
//! Boundary shapes mirror the wire format, where batch mode is signaled by
//! list-typed fields. `validate()` resolves each request into an explicit
//! tagged form before the core ever sees it, so nothing downstream inspects
//! runtime shapes.

use crate::error::{EmbedDbError, Result};
use crate::filter::WhereFilter;
use crate::record::NewEmbedding;
use crate::vector::Vector;
use serde::{Deserialize, Serialize};

/// A field that may hold one value or a list of values on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn is_many(&self) -> bool {
        matches!(self, OneOrMany::Many(_))
    }
}

fn validation(reason: impl Into<String>) -> EmbedDbError {
    EmbedDbError::Validation {
        reason: reason.into(),
    }
}

// --- Fetch ---

/// Metadata-filtered scan request; no vector comparison involved.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchEmbeddingsRequest {
    #[serde(default)]
    pub where_filter: WhereFilter,
    #[serde(default)]
    pub sort_key: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl FetchEmbeddingsRequest {
    pub fn validate(self) -> Result<Self> {
        if let Some(key) = &self.sort_key {
            if key.is_empty() {
                return Err(validation("sort_key must not be empty"));
            }
        }
        Ok(self)
    }
}

// --- Add ---

/// Wire shape for inserts. Scalar fields mean a single record; list fields
/// mean a batch. `validate()` decides which and hands back the tagged form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddEmbeddingRequest {
    pub embedding_data: OneOrMany<Vec<f32>>,
    pub input_uri: OneOrMany<String>,
    #[serde(default)]
    pub dataset: Option<OneOrMany<String>>,
    #[serde(default)]
    pub category_labels: Option<OneOrMany<String>>,
}

/// A validated insert, explicitly single or batch.
#[derive(Debug, Clone)]
pub enum AddEmbedding {
    Single(NewEmbedding),
    Batch(Vec<NewEmbedding>),
}

impl AddEmbedding {
    /// The records to insert, in request order.
    pub fn into_items(self) -> Vec<NewEmbedding> {
        match self {
            AddEmbedding::Single(item) => vec![item],
            AddEmbedding::Batch(items) => items,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            AddEmbedding::Single(_) => 1,
            AddEmbedding::Batch(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Expand an optional scalar-or-list field against the batch length:
/// absent stays absent, a scalar broadcasts, a list must match exactly.
fn broadcast(
    field: Option<OneOrMany<String>>,
    name: &str,
    len: usize,
) -> Result<Vec<Option<String>>> {
    match field {
        None => Ok(vec![None; len]),
        Some(OneOrMany::One(value)) => Ok(vec![Some(value); len]),
        Some(OneOrMany::Many(values)) => {
            if values.len() != len {
                return Err(validation(format!(
                    "{} has {} entries but embedding_data has {}",
                    name,
                    values.len(),
                    len
                )));
            }
            Ok(values.into_iter().map(Some).collect())
        }
    }
}

impl AddEmbeddingRequest {
    pub fn validate(self) -> Result<AddEmbedding> {
        match self.embedding_data {
            OneOrMany::One(data) => {
                if self.input_uri.is_many() {
                    return Err(validation(
                        "input_uri is a list but embedding_data is a single vector",
                    ));
                }
                let OneOrMany::One(uri) = self.input_uri else {
                    unreachable!()
                };
                let dataset = match self.dataset {
                    None => None,
                    Some(OneOrMany::One(d)) => Some(d),
                    Some(OneOrMany::Many(_)) => {
                        return Err(validation(
                            "dataset is a list but embedding_data is a single vector",
                        ))
                    }
                };
                let category = match self.category_labels {
                    None => None,
                    Some(OneOrMany::One(c)) => Some(c),
                    Some(OneOrMany::Many(_)) => {
                        return Err(validation(
                            "category_labels is a list but embedding_data is a single vector",
                        ))
                    }
                };
                let mut item = NewEmbedding::new(Vector::new(data), uri);
                item.dataset = dataset;
                item.category = category;
                Ok(AddEmbedding::Single(item))
            }
            OneOrMany::Many(vectors) => {
                if vectors.is_empty() {
                    return Err(validation("embedding_data must not be empty"));
                }
                let len = vectors.len();
                let uris = match self.input_uri {
                    OneOrMany::Many(uris) => {
                        if uris.len() != len {
                            return Err(validation(format!(
                                "input_uri has {} entries but embedding_data has {}",
                                uris.len(),
                                len
                            )));
                        }
                        uris
                    }
                    OneOrMany::One(_) => {
                        return Err(validation(
                            "embedding_data is a batch but input_uri is a single value",
                        ))
                    }
                };
                let datasets = broadcast(self.dataset, "dataset", len)?;
                let categories = broadcast(self.category_labels, "category_labels", len)?;

                let items = vectors
                    .into_iter()
                    .zip(uris)
                    .zip(datasets)
                    .zip(categories)
                    .map(|(((data, uri), dataset), category)| {
                        let mut item = NewEmbedding::new(Vector::new(data), uri);
                        item.dataset = dataset;
                        item.category = category;
                        item
                    })
                    .collect();
                Ok(AddEmbedding::Batch(items))
            }
        }
    }
}

// --- Query ---

fn default_n_results() -> usize {
    10
}

/// Nearest-neighbor query request, optionally pre-filtered by metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NNQueryRequest {
    pub query_embedding_vector: Vector,
    #[serde(default = "default_n_results")]
    pub n_results: usize,
    #[serde(default)]
    pub where_filter: Option<WhereFilter>,
}

impl NNQueryRequest {
    pub fn new(query: Vector) -> Self {
        Self {
            query_embedding_vector: query,
            n_results: default_n_results(),
            where_filter: None,
        }
    }

    pub fn validate(self) -> Result<Self> {
        if self.n_results == 0 {
            return Err(validation("n_results must be at least 1"));
        }
        if self.query_embedding_vector.dimension() == 0 {
            return Err(validation("query_embedding_vector must not be empty"));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_add_from_json() {
        let req: AddEmbeddingRequest = serde_json::from_str(
            r#"{"embedding_data": [1.0, 2.0], "input_uri": "file:///a.png"}"#,
        )
        .unwrap();
        let add = req.validate().unwrap();
        assert!(matches!(add, AddEmbedding::Single(_)));
        let items = add.into_items();
        assert_eq!(items[0].vector.as_slice(), &[1.0, 2.0]);
        assert_eq!(items[0].input_uri, "file:///a.png");
    }

    #[test]
    fn test_batch_add_from_json() {
        let req: AddEmbeddingRequest = serde_json::from_str(
            r#"{
                "embedding_data": [[1.0, 2.0], [3.0, 4.0]],
                "input_uri": ["a", "b"],
                "dataset": "train",
                "category_labels": ["cat", "dog"]
            }"#,
        )
        .unwrap();
        let add = req.validate().unwrap();
        assert_eq!(add.len(), 2);
        let items = add.into_items();
        assert_eq!(items[0].dataset.as_deref(), Some("train"));
        assert_eq!(items[1].dataset.as_deref(), Some("train"));
        assert_eq!(items[1].category.as_deref(), Some("dog"));
    }

    #[test]
    fn test_mismatched_batch_lengths() {
        let req: AddEmbeddingRequest = serde_json::from_str(
            r#"{"embedding_data": [[1.0], [2.0]], "input_uri": ["a"]}"#,
        )
        .unwrap();
        assert!(matches!(
            req.validate(),
            Err(EmbedDbError::Validation { .. })
        ));
    }

    #[test]
    fn test_mixed_single_and_list_rejected() {
        let req: AddEmbeddingRequest = serde_json::from_str(
            r#"{"embedding_data": [1.0, 2.0], "input_uri": ["a", "b"]}"#,
        )
        .unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_empty_batch_rejected() {
        let req: AddEmbeddingRequest =
            serde_json::from_str(r#"{"embedding_data": [], "input_uri": []}"#).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_query_defaults() {
        let req: NNQueryRequest =
            serde_json::from_str(r#"{"query_embedding_vector": [1.0, 2.0]}"#).unwrap();
        assert_eq!(req.n_results, 10);
        assert!(req.where_filter.is_none());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_query_zero_results_rejected() {
        let req: NNQueryRequest = serde_json::from_str(
            r#"{"query_embedding_vector": [1.0], "n_results": 0}"#,
        )
        .unwrap();
        assert!(matches!(
            req.validate(),
            Err(EmbedDbError::Validation { .. })
        ));
    }

    #[test]
    fn test_fetch_defaults() {
        let req: FetchEmbeddingsRequest = serde_json::from_str(r#"{}"#).unwrap();
        assert!(req.where_filter.is_empty());
        assert!(req.sort_key.is_none());
        assert!(req.limit.is_none());
    }
}
