//! Result types returned by the gateway's public operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::model::ModelDescriptor;
use super::point::{Payload, SearchHit};

/// Result of storing a single document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreResult {
    /// Id of the freshly created point.
    pub point_id: String,
    /// Display name of the model that produced the vector.
    pub model_display_name: String,
    /// Vector dimensions.
    pub dimensions: usize,
}

/// First error observed in a failed bulk-store chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkError {
    /// Zero-based index of the chunk within the call.
    pub chunk_index: usize,
    /// Error message for the first failure in the chunk.
    pub error: String,
}

/// Result of a bulk store. Chunks that fail do not roll back earlier
/// chunks; `point_ids` lists stored points in input order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkStoreResult {
    /// Documents successfully stored.
    pub stored_count: usize,
    /// Documents whose chunk failed.
    pub failed_count: usize,
    /// Ids of stored points, positionally matching the surviving inputs.
    pub point_ids: Vec<String>,
    /// Display name of the model that produced the vectors.
    pub model_display_name: String,
    /// Per-chunk first errors, empty on full success.
    pub errors: Vec<ChunkError>,
}

/// Result of a semantic search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindResult {
    /// Echo of the query text.
    pub query: String,
    /// Echo of the collection searched.
    pub collection: String,
    /// Hits ordered by descending score, ties by ascending point id.
    pub results: Vec<SearchHit>,
    /// Number of hits returned.
    pub total_found: usize,
    /// Limit and score threshold the search ran with.
    pub search_params: SearchParams,
    /// Display name of the collection's model.
    pub vector_model: String,
    /// When the search completed.
    pub timestamp: DateTime<Utc>,
    /// True when the collection did not exist; `results` is empty then.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub no_such_collection: bool,
}

/// Effective parameters of a search after defaulting.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SearchParams {
    /// Maximum number of hits requested.
    pub limit: usize,
    /// Minimum score for a hit to be included.
    pub score_threshold: f32,
}

/// A single point as returned by `get_point`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointView {
    /// Point id.
    pub id: String,
    /// Full payload, conventional keys and strays alike.
    pub payload: Payload,
    /// The stored vector, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
}

/// Result of a payload update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateResult {
    /// Points whose payload was merged.
    pub updated_count: usize,
}

/// Result of a point deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResult {
    /// Requested ids that existed before the call.
    pub deleted_count: usize,
}

/// The resolver's configuration plus the registry, for introspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingsReport {
    /// Every model the registry knows.
    pub models: Vec<ModelDescriptor>,
    /// Explicit collection-name to model-id mappings.
    pub collection_model_map: Map<String, Value>,
    /// Ordered substring rules, first match wins.
    pub pattern_rules: Vec<PatternRule>,
    /// Model id used when nothing else matches.
    pub default_model_id: String,
    /// Execution providers active per instantiated embedder.
    pub active_embedders: Vec<EmbedderStatus>,
}

/// One substring rule of the resolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternRule {
    /// Substring matched against the collection name.
    pub pattern: String,
    /// Model id selected on match.
    pub model_id: String,
}

/// Observability record for an instantiated embedder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedderStatus {
    /// Model id of the pooled embedder.
    pub model_id: String,
    /// Execution providers negotiated at construction, in order.
    pub active_providers: Vec<String>,
}
