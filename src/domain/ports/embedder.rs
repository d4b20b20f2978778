//! Embedding runtime port.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::errors::GatewayResult;
use crate::domain::models::ModelDescriptor;

/// A ready embedding runtime for one model.
///
/// Instances are owned by the pool and shared across concurrent requests;
/// implementations must accept concurrent calls once constructed. If the
/// underlying runtime is not re-entrant, the implementation serializes
/// internally, never pool-wide.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    /// Model id this runtime was constructed for.
    fn model_id(&self) -> &str;

    /// Output vector dimensions.
    fn dimensions(&self) -> usize;

    /// Execution providers negotiated at construction, in priority order.
    fn active_providers(&self) -> &[String];

    /// Embeds a batch of documents for storage.
    ///
    /// An empty batch returns an empty result without touching the
    /// runtime. Output order matches input order.
    async fn embed_documents(&self, texts: &[String]) -> GatewayResult<Vec<Vec<f32>>>;

    /// Embeds a search query.
    ///
    /// Kept separate from [`Self::embed_documents`] because some models
    /// apply query-specific prefixes or normalization.
    async fn embed_query(&self, text: &str) -> GatewayResult<Vec<f32>>;
}

/// Constructs embedding runtimes on demand for the pool.
///
/// Construction may be slow (model download, GPU initialization); the pool
/// guarantees it runs at most once per model id.
#[async_trait]
pub trait EmbedderFactory: Send + Sync {
    /// Builds a runtime for `model`, negotiating execution providers.
    async fn create(&self, model: &ModelDescriptor) -> GatewayResult<Arc<dyn TextEmbedder>>;
}
