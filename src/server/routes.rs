//! HTTP route handlers for the embedding service API.

use crate::error::EmbedDbError;
use crate::metrics::MetricsReport;
use crate::record::{EmbeddingRecord, RecordId};
use crate::schema::{AddEmbeddingRequest, FetchEmbeddingsRequest, NNQueryRequest};
use crate::server::AppState;
use crate::store::EmbeddingStore;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

// --- Response types ---

#[derive(Serialize)]
pub struct AddResponse {
    pub ids: Vec<RecordId>,
    pub count: usize,
}

#[derive(Serialize)]
pub struct QueryMatchResponse {
    pub id: RecordId,
    pub distance: f32,
    pub metadata: crate::filter::Metadata,
}

#[derive(Serialize)]
pub struct CountResponse {
    pub count: usize,
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub removed: usize,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub record_count: usize,
    pub spaces: Vec<String>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn into_api_error(e: EmbedDbError) -> ApiError {
    let status = match &e {
        EmbedDbError::Validation { .. } | EmbedDbError::Dimensionality { .. } => {
            StatusCode::BAD_REQUEST
        }
        EmbedDbError::NotFound { .. } => StatusCode::NOT_FOUND,
        EmbedDbError::Unauthorized { .. } => StatusCode::FORBIDDEN,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}

// --- Router ---

pub fn create_router<S: EmbeddingStore + Send + Sync + 'static>(
    state: Arc<AppState<S>>,
) -> Router {
    Router::new()
        .route("/spaces/:space/embeddings", post(add_embeddings::<S>))
        .route("/spaces/:space/records/:id", get(get_record::<S>))
        .route("/spaces/:space/query", post(query_embeddings::<S>))
        .route("/spaces/:space/fetch", post(fetch_embeddings::<S>))
        .route("/spaces/:space/count", get(count_embeddings::<S>))
        .route("/spaces/:space/delete", post(delete_embeddings::<S>))
        .route("/reset", post(reset::<S>))
        .route("/health", get(health::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .with_state(state)
}

// --- Handlers ---

async fn add_embeddings<S: EmbeddingStore + Send + Sync + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(space): Path<String>,
    Json(req): Json<AddEmbeddingRequest>,
) -> Result<(StatusCode, Json<AddResponse>), ApiError> {
    let items = req.validate().map_err(into_api_error)?.into_items();

    let ids = state
        .coordinator
        .add(&space, items)
        .map_err(into_api_error)?;

    let count = ids.len();
    if let Ok(mut metrics) = state.metrics.write() {
        metrics.record_add(count);
    }

    Ok((StatusCode::CREATED, Json(AddResponse { ids, count })))
}

async fn get_record<S: EmbeddingStore + Send + Sync + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((space, id)): Path<(String, String)>,
) -> Result<Json<EmbeddingRecord>, ApiError> {
    let id = RecordId::from_hex(&id).map_err(into_api_error)?;
    let record = state.coordinator.get(&space, id).map_err(into_api_error)?;
    Ok(Json(record))
}

async fn query_embeddings<S: EmbeddingStore + Send + Sync + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(space): Path<String>,
    Json(req): Json<NNQueryRequest>,
) -> Result<Json<Vec<QueryMatchResponse>>, ApiError> {
    let req = req.validate().map_err(into_api_error)?;

    let start = Instant::now();
    let matches = state
        .coordinator
        .query(
            &space,
            &req.query_embedding_vector,
            req.n_results,
            req.where_filter.as_ref(),
        )
        .map_err(into_api_error)?;
    let elapsed = start.elapsed();

    if let Ok(mut metrics) = state.metrics.write() {
        metrics.record_query(elapsed);
    }

    Ok(Json(
        matches
            .into_iter()
            .map(|m| QueryMatchResponse {
                id: m.id,
                distance: m.distance,
                metadata: m.metadata,
            })
            .collect(),
    ))
}

async fn fetch_embeddings<S: EmbeddingStore + Send + Sync + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(space): Path<String>,
    Json(req): Json<FetchEmbeddingsRequest>,
) -> Result<Json<Vec<EmbeddingRecord>>, ApiError> {
    let req = req.validate().map_err(into_api_error)?;

    let records = state
        .coordinator
        .fetch(
            &space,
            &req.where_filter,
            req.sort_key.as_deref(),
            req.limit,
        )
        .map_err(into_api_error)?;

    Ok(Json(records))
}

async fn count_embeddings<S: EmbeddingStore + Send + Sync + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(space): Path<String>,
) -> Result<Json<CountResponse>, ApiError> {
    let count = state
        .coordinator
        .count(Some(&space))
        .map_err(into_api_error)?;
    Ok(Json(CountResponse { count }))
}

async fn delete_embeddings<S: EmbeddingStore + Send + Sync + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(space): Path<String>,
    Json(ids): Json<Vec<RecordId>>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let removed = state
        .coordinator
        .delete(&space, &ids)
        .map_err(into_api_error)?;

    if let Ok(mut metrics) = state.metrics.write() {
        metrics.record_delete(removed);
    }

    Ok(Json(DeleteResponse { removed }))
}

async fn reset<S: EmbeddingStore + Send + Sync + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.coordinator.reset().map_err(into_api_error)?;
    Ok(Json(serde_json::json!({"status": "reset"})))
}

async fn health<S: EmbeddingStore + Send + Sync + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<HealthResponse> {
    let count = state.coordinator.count(None).unwrap_or(0);
    let spaces = state.coordinator.spaces().unwrap_or_default();

    Json(HealthResponse {
        status: "ok".to_string(),
        record_count: count,
        spaces,
    })
}

async fn get_metrics<S: EmbeddingStore + Send + Sync + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<MetricsReport>, ApiError> {
    let metrics = state.metrics.read().map_err(|_| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "Lock poisoned".to_string(),
            }),
        )
    })?;

    Ok(Json(metrics.report()))
}
