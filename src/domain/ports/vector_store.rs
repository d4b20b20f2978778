//! Vector database port.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::errors::GatewayResult;
use crate::domain::models::{CollectionStatus, Distance, Payload, PointRecord, VectorSpec};

/// Geometry and stats of an existing collection, as reported by the backend.
#[derive(Debug, Clone)]
pub struct CollectionInfo {
    /// Named vector slots: (vector_name, size, distance).
    pub vectors: Vec<(String, usize, Distance)>,
    /// Points stored.
    pub points_count: u64,
    /// Vectors with an index built, when reported.
    pub indexed_vectors_count: Option<u64>,
    /// Storage segments, when reported.
    pub segments_count: Option<u64>,
    /// Collection status.
    pub status: CollectionStatus,
    /// Optimizer status string, when reported.
    pub optimizer_status: Option<String>,
    /// HNSW ef_construct, when reported.
    pub hnsw_ef_construct: Option<usize>,
    /// HNSW m, when reported.
    pub hnsw_m: Option<usize>,
    /// Whether quantization is configured.
    pub quantization: bool,
}

/// Parameters of one vector search.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    /// Named vector slot to search.
    pub vector_name: String,
    /// Query vector.
    pub vector: Vec<f32>,
    /// Maximum hits.
    pub limit: usize,
    /// Minimum score.
    pub score_threshold: f32,
}

/// A raw point returned by search or retrieve.
#[derive(Debug, Clone)]
pub struct StoredPoint {
    /// Point id.
    pub id: String,
    /// Score, for search results; 0.0 on plain retrieval.
    pub score: f32,
    /// Payload, when requested.
    pub payload: Option<Payload>,
    /// Vector, when requested.
    pub vector: Option<Vec<f32>>,
}

/// Thin contract over the vector database.
///
/// Implementations map transport failures (network, timeout, 5xx) to
/// `GatewayError::BackendUnavailable` and unknown collections to
/// `GatewayError::NoSuchCollection`; they add no retries and no caching.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// True when the collection exists.
    async fn collection_exists(&self, collection: &str) -> GatewayResult<bool>;

    /// Creates a collection with the given vector geometry.
    ///
    /// Racing creates may surface as an "already exists" conflict; callers
    /// treat that as success and re-verify geometry.
    async fn create_collection(&self, collection: &str, spec: &VectorSpec) -> GatewayResult<()>;

    /// Geometry and stats of an existing collection.
    async fn get_collection(&self, collection: &str) -> GatewayResult<CollectionInfo>;

    /// Names of all collections.
    async fn list_collections(&self) -> GatewayResult<Vec<String>>;

    /// Upserts points under the collection's named vector slot. An id
    /// collision replaces the existing point, vector and payload both.
    async fn upsert_points(
        &self,
        collection: &str,
        vector_name: &str,
        points: Vec<PointRecord>,
    ) -> GatewayResult<()>;

    /// Vector search over the named slot.
    async fn search(&self, collection: &str, query: &SearchQuery)
        -> GatewayResult<Vec<StoredPoint>>;

    /// Fetches points by id. Missing ids are absent from the result, not
    /// an error.
    async fn retrieve_points(
        &self,
        collection: &str,
        ids: &[String],
        with_payload: bool,
        with_vector: bool,
    ) -> GatewayResult<Vec<StoredPoint>>;

    /// Merges `payload` into each point's payload. With `key`, the merge
    /// happens inside `payload[key]` instead of at the root; sibling
    /// fields are preserved either way. Vectors are untouched.
    async fn set_payload(
        &self,
        collection: &str,
        ids: &[String],
        payload: &serde_json::Map<String, Value>,
        key: Option<&str>,
    ) -> GatewayResult<()>;

    /// Deletes points by id. Absent ids are a no-op.
    async fn delete_points(&self, collection: &str, ids: &[String]) -> GatewayResult<()>;
}
