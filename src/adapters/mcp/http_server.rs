//! HTTP/JSON transport over the gateway.
//!
//! Mirrors the MCP tool surface as REST routes under `/api/v1`. Every
//! handler delegates to [`SemanticGateway`] and maps its typed errors to
//! HTTP status codes.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::domain::errors::GatewayError;
use crate::infrastructure::config::HttpSettings;
use crate::services::SemanticGateway;

/// Error payload returned on failures.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type HandlerError = (StatusCode, Json<ErrorResponse>);

fn to_http_error(e: GatewayError) -> HandlerError {
    let (status, code) = match &e {
        GatewayError::InvalidInput { .. } => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
        GatewayError::NoSuchCollection(_) => (StatusCode::NOT_FOUND, "NO_SUCH_COLLECTION"),
        GatewayError::PointNotFound { .. } => (StatusCode::NOT_FOUND, "POINT_NOT_FOUND"),
        GatewayError::ModelMismatch { .. } => (StatusCode::CONFLICT, "MODEL_MISMATCH"),
        GatewayError::EmbedderUnavailable { .. } => {
            (StatusCode::SERVICE_UNAVAILABLE, "EMBEDDER_UNAVAILABLE")
        }
        GatewayError::BackendUnavailable(_) => (StatusCode::BAD_GATEWAY, "BACKEND_UNAVAILABLE"),
        GatewayError::Cancelled => (StatusCode::REQUEST_TIMEOUT, "CANCELLED"),
        GatewayError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
    };
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
            code: code.to_string(),
        }),
    )
}

/// Request body for `POST /api/v1/collections/{collection}/store`.
#[derive(Debug, Deserialize)]
pub struct StoreRequest {
    pub information: String,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

/// Request body for `POST /api/v1/collections/{collection}/bulk-store`.
#[derive(Debug, Deserialize)]
pub struct BulkStoreRequest {
    pub documents: Vec<String>,
    #[serde(default)]
    pub metadata_list: Option<Vec<Map<String, Value>>>,
    #[serde(default)]
    pub batch_size: Option<usize>,
}

/// Request body for `POST /api/v1/collections/{collection}/find`.
#[derive(Debug, Deserialize)]
pub struct FindRequest {
    pub query: String,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub score_threshold: Option<f32>,
}

/// Request body for `POST /api/v1/collections/{collection}/points/update-payload`.
#[derive(Debug, Deserialize)]
pub struct UpdatePayloadRequest {
    pub point_ids: Vec<String>,
    pub payload: Map<String, Value>,
    #[serde(default)]
    pub key: Option<String>,
}

/// Request body for `POST /api/v1/collections/{collection}/points/delete`.
#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    pub point_ids: Vec<String>,
}

/// Query parameters for `GET .../points/{id}`.
#[derive(Debug, Deserialize)]
pub struct GetPointParams {
    #[serde(default)]
    pub with_vector: bool,
}

struct AppState {
    gateway: Arc<SemanticGateway>,
}

/// HTTP transport server.
pub struct HttpServer {
    settings: HttpSettings,
    gateway: Arc<SemanticGateway>,
}

impl HttpServer {
    /// Creates the server.
    pub fn new(gateway: Arc<SemanticGateway>, settings: HttpSettings) -> Self {
        Self { settings, gateway }
    }

    fn build_router(&self) -> Router {
        let state = Arc::new(AppState {
            gateway: Arc::clone(&self.gateway),
        });

        let app = Router::new()
            .route("/api/v1/collections", get(list_collections))
            .route("/api/v1/collections/{collection}", get(collection_info))
            .route("/api/v1/collections/{collection}/store", post(store))
            .route(
                "/api/v1/collections/{collection}/bulk-store",
                post(bulk_store),
            )
            .route("/api/v1/collections/{collection}/find", post(find))
            .route(
                "/api/v1/collections/{collection}/points/{id}",
                get(get_point),
            )
            .route(
                "/api/v1/collections/{collection}/points/update-payload",
                post(update_payload),
            )
            .route(
                "/api/v1/collections/{collection}/points/delete",
                post(delete_points),
            )
            .route("/api/v1/model-mappings", get(model_mappings))
            .route("/health", get(health_check))
            .with_state(state);

        if self.settings.enable_cors {
            app.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
            .layer(TraceLayer::new_for_http())
        } else {
            app.layer(TraceLayer::new_for_http())
        }
    }

    /// Binds and serves until the process exits.
    pub async fn serve(self) -> anyhow::Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.settings.host, self.settings.port).parse()?;
        let router = self.build_router();

        tracing::info!("vectorgate HTTP server listening on {}", addr);

        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;
        Ok(())
    }

    /// Serves with a graceful-shutdown signal.
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = format!("{}:{}", self.settings.host, self.settings.port).parse()?;
        let router = self.build_router();

        tracing::info!("vectorgate HTTP server listening on {}", addr);

        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

// Handler functions

async fn health_check() -> &'static str {
    "OK"
}

async fn store(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
    Json(req): Json<StoreRequest>,
) -> Result<(StatusCode, Json<Value>), HandlerError> {
    let result = state
        .gateway
        .store(&collection, &req.information, req.metadata)
        .await
        .map_err(to_http_error)?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::to_value(result).map_err(|e| to_http_error(e.into()))?),
    ))
}

async fn bulk_store(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
    Json(req): Json<BulkStoreRequest>,
) -> Result<(StatusCode, Json<Value>), HandlerError> {
    let result = state
        .gateway
        .bulk_store(&collection, req.documents, req.metadata_list, req.batch_size)
        .await
        .map_err(to_http_error)?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::to_value(result).map_err(|e| to_http_error(e.into()))?),
    ))
}

async fn find(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
    Json(req): Json<FindRequest>,
) -> Result<Json<Value>, HandlerError> {
    let result = state
        .gateway
        .find(&collection, &req.query, req.limit, req.score_threshold)
        .await
        .map_err(to_http_error)?;
    Ok(Json(
        serde_json::to_value(result).map_err(|e| to_http_error(e.into()))?,
    ))
}

async fn get_point(
    State(state): State<Arc<AppState>>,
    Path((collection, id)): Path<(String, String)>,
    Query(params): Query<GetPointParams>,
) -> Result<Json<Value>, HandlerError> {
    let result = state
        .gateway
        .get_point(&collection, &id, params.with_vector)
        .await
        .map_err(to_http_error)?;
    Ok(Json(
        serde_json::to_value(result).map_err(|e| to_http_error(e.into()))?,
    ))
}

async fn update_payload(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
    Json(req): Json<UpdatePayloadRequest>,
) -> Result<Json<Value>, HandlerError> {
    let result = state
        .gateway
        .update_payload(&collection, &req.point_ids, req.payload, req.key.as_deref())
        .await
        .map_err(to_http_error)?;
    Ok(Json(
        serde_json::to_value(result).map_err(|e| to_http_error(e.into()))?,
    ))
}

async fn delete_points(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
    Json(req): Json<DeleteRequest>,
) -> Result<Json<Value>, HandlerError> {
    let result = state
        .gateway
        .delete_points(&collection, &req.point_ids)
        .await
        .map_err(to_http_error)?;
    Ok(Json(
        serde_json::to_value(result).map_err(|e| to_http_error(e.into()))?,
    ))
}

async fn list_collections(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, HandlerError> {
    let result = state
        .gateway
        .list_collections()
        .await
        .map_err(to_http_error)?;
    Ok(Json(
        serde_json::to_value(result).map_err(|e| to_http_error(e.into()))?,
    ))
}

async fn collection_info(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
) -> Result<Json<Value>, HandlerError> {
    let result = state
        .gateway
        .collection_info(&collection)
        .await
        .map_err(to_http_error)?;
    Ok(Json(
        serde_json::to_value(result).map_err(|e| to_http_error(e.into()))?,
    ))
}

async fn model_mappings(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(serde_json::to_value(state.gateway.model_mappings()).unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        let (status, body) = to_http_error(GatewayError::NoSuchCollection("c".to_string()));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.0.code, "NO_SUCH_COLLECTION");

        let (status, _) = to_http_error(GatewayError::ModelMismatch {
            collection: "c".to_string(),
            existing: "a".to_string(),
            resolved: "b".to_string(),
        });
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = to_http_error(GatewayError::BackendUnavailable("down".to_string()));
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_store_request_deserialization() {
        let json = r#"{"information": "hello"}"#;
        let req: StoreRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.information, "hello");
        assert!(req.metadata.is_none());
    }

    #[test]
    fn test_find_request_defaults() {
        let json = r#"{"query": "file handles"}"#;
        let req: FindRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.query, "file handles");
        assert!(req.limit.is_none());
        assert!(req.score_threshold.is_none());
    }
}
