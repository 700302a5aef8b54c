//! HTTP API server for the embedding service.

pub mod routes;

use crate::coordinator::{AccessCoordinator, IndexKind};
use crate::distance::DistanceMetric;
use crate::metrics::MetricsCollector;
use crate::store::EmbeddingStore;
use std::sync::{Arc, RwLock};

/// Shared application state for the HTTP server.
pub struct AppState<S: EmbeddingStore> {
    pub coordinator: AccessCoordinator<S>,
    pub metrics: RwLock<MetricsCollector>,
}

impl<S: EmbeddingStore> AppState<S> {
    pub fn new(coordinator: AccessCoordinator<S>) -> Self {
        Self {
            coordinator,
            metrics: RwLock::new(MetricsCollector::new()),
        }
    }
}

/// Start the HTTP server over the given store.
pub async fn start<S: EmbeddingStore + Send + Sync + 'static>(
    addr: &str,
    store: S,
    index_kind: IndexKind,
    metric: DistanceMetric,
) -> anyhow::Result<()> {
    let coordinator = AccessCoordinator::new(store, index_kind, metric);
    let state = Arc::new(AppState::new(coordinator));

    let app = routes::create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("Server listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
