//! # EmbedDB
//!
//! A minimal embedding store with pluggable similarity search.
//!
//! This library provides:
//! - Batched embedding storage across named spaces
//! - Distance metrics (squared L2, cosine, inner product)
//! - Brute-force and HNSW-based nearest-neighbor indexes
//! - Metadata filtering composed with vector search
//! - Write-ahead logging and snapshot persistence
//!
//! ## Example
//!
//! ```rust
//! use embeddb::{
//!     AccessCoordinator, DistanceMetric, IndexKind, MemoryStore, NewEmbedding, Vector,
//! };
//!
//! let coordinator =
//!     AccessCoordinator::new(MemoryStore::new(), IndexKind::Flat, DistanceMetric::L2);
//!
//! // Add embeddings to a space
//! let items = vec![
//!     NewEmbedding::new(Vector::new(vec![1.0, 2.0, 3.0]), "file:///a.png"),
//!     NewEmbedding::new(Vector::new(vec![3.0, 2.0, 1.0]), "file:///b.png"),
//! ];
//! let ids = coordinator.add("default", items).unwrap();
//!
//! // Query for the nearest neighbors
//! let query = Vector::new(vec![1.1, 2.1, 3.1]);
//! let results = coordinator.query("default", &query, 5, None).unwrap();
//! assert_eq!(results[0].id, ids[0]);
//! ```

pub mod coordinator;
pub mod distance;
pub mod error;
pub mod filter;
pub mod flat_index;
pub mod hnsw;
pub mod index;
pub mod metrics;
pub mod persistence;
pub mod record;
pub mod schema;
pub mod server;
pub mod store;
pub mod vector;

pub use coordinator::{AccessCoordinator, IndexKind, QueryMatch};
pub use distance::DistanceMetric;
pub use error::{EmbedDbError, Result};
pub use filter::{Metadata, MetadataValue, WhereFilter};
pub use flat_index::BruteForceIndex;
pub use hnsw::{HnswIndex, HnswParams};
pub use index::SimilarityIndex;
pub use record::{EmbeddingRecord, NewEmbedding, RecordId};
pub use schema::{AddEmbedding, AddEmbeddingRequest, FetchEmbeddingsRequest, NNQueryRequest};
pub use store::{EmbeddingStore, MemoryStore};
pub use vector::Vector;
