//! The query/store engine composing resolver, pool, manager, and backend.

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{GatewayError, GatewayResult};
use crate::domain::models::point::{document_payload, document_text, metadata_object};
use crate::domain::models::{
    BulkStoreResult, ChunkError, CollectionDetail, CollectionSummary, DeleteResult, FindResult,
    MappingsReport, PointRecord, PointView, ResolvedCollection, SearchHit, SearchParams,
    StoreResult, UpdateResult,
};
use crate::domain::ports::{SearchQuery, VectorStore};
use crate::infrastructure::config::Settings;
use crate::services::collection_manager::CollectionManager;
use crate::services::embedder_pool::EmbedderPool;
use crate::services::registry::ModelRegistry;

/// Longest accepted query after whitespace normalization.
const MAX_QUERY_CHARS: usize = 10_000;
/// Largest accepted metadata object, serialized.
const MAX_METADATA_BYTES: usize = 10_240;
/// Default bulk-store chunk size.
const DEFAULT_BATCH_SIZE: usize = 100;

/// The service interface offered to transports.
///
/// Owns the embedder pool and collection manager; every public operation
/// takes the collection name explicitly and relies on no ambient state.
pub struct SemanticGateway {
    store: Arc<dyn VectorStore>,
    registry: Arc<ModelRegistry>,
    pool: EmbedderPool,
    manager: CollectionManager,
    search_default_limit: usize,
    search_default_threshold: f32,
}

impl SemanticGateway {
    /// Wires the gateway from its collaborators.
    pub fn new(
        store: Arc<dyn VectorStore>,
        registry: Arc<ModelRegistry>,
        pool: EmbedderPool,
        settings: &Settings,
    ) -> Self {
        let manager = CollectionManager::new(Arc::clone(&store), Arc::clone(&registry), settings);
        Self {
            store,
            registry,
            pool,
            manager,
            search_default_limit: settings.search.default_limit,
            search_default_threshold: settings.search.default_threshold,
        }
    }

    /// Stores one document in `collection`.
    ///
    /// Resolves the collection's model, ensures the collection exists with
    /// matching geometry, embeds, and upserts under a fresh UUID.
    #[instrument(skip(self, information, metadata), err)]
    pub async fn store(
        &self,
        collection: &str,
        information: &str,
        metadata: Option<Map<String, Value>>,
    ) -> GatewayResult<StoreResult> {
        validate_collection_name(collection)?;
        let information = require_text("information", information)?;
        if let Some(meta) = &metadata {
            validate_metadata(meta)?;
        }

        let resolved = self.manager.ensure(collection).await?;
        let embedder = self.pool.get(&resolved.model).await?;
        let mut vectors = embedder.embed_documents(&[information.clone()]).await?;
        let vector = vectors.pop().ok_or_else(|| {
            GatewayError::Internal("embedder returned no vector for one document".to_string())
        })?;
        check_dimensions(&resolved, vector.len())?;

        let point = PointRecord {
            id: Uuid::new_v4().to_string(),
            vector,
            payload: document_payload(&information, metadata.as_ref()),
        };
        let point_id = point.id.clone();
        self.store
            .upsert_points(collection, &resolved.vector_name, vec![point])
            .await?;

        Ok(StoreResult {
            point_id,
            model_display_name: resolved.model.display_name.clone(),
            dimensions: resolved.model.dimensions,
        })
    }

    /// Stores many documents, chunked by `batch_size`.
    ///
    /// Chunks are embedded and upserted sequentially; a failed chunk is
    /// reported and does not roll back earlier chunks. Returned point ids
    /// correspond positionally to the stored inputs.
    #[instrument(skip(self, documents, metadata_list), fields(count = documents.len()), err)]
    pub async fn bulk_store(
        &self,
        collection: &str,
        documents: Vec<String>,
        metadata_list: Option<Vec<Map<String, Value>>>,
        batch_size: Option<usize>,
    ) -> GatewayResult<BulkStoreResult> {
        validate_collection_name(collection)?;
        if documents.is_empty() {
            return Err(GatewayError::invalid("documents", "must not be empty"));
        }
        let documents: Vec<String> = documents
            .iter()
            .map(|d| require_text("documents", d))
            .collect::<GatewayResult<_>>()?;
        if let Some(metas) = &metadata_list {
            if metas.len() != documents.len() {
                return Err(GatewayError::invalid(
                    "metadata_list",
                    format!(
                        "length {} does not match documents length {}",
                        metas.len(),
                        documents.len()
                    ),
                ));
            }
            for meta in metas {
                validate_metadata(meta)?;
            }
        }
        let batch_size = batch_size.unwrap_or(DEFAULT_BATCH_SIZE);
        if batch_size == 0 {
            return Err(GatewayError::invalid("batch_size", "must be positive"));
        }

        let resolved = self.manager.ensure(collection).await?;
        let embedder = self.pool.get(&resolved.model).await?;

        let mut point_ids = Vec::with_capacity(documents.len());
        let mut stored_count = 0;
        let mut failed_count = 0;
        let mut errors = Vec::new();

        for (chunk_index, chunk_start) in (0..documents.len()).step_by(batch_size).enumerate() {
            let chunk_end = (chunk_start + batch_size).min(documents.len());
            let chunk = &documents[chunk_start..chunk_end];

            let outcome = self
                .store_chunk(
                    &resolved,
                    embedder.as_ref(),
                    chunk,
                    metadata_list.as_deref(),
                    chunk_start,
                )
                .await;
            match outcome {
                Ok(ids) => {
                    stored_count += ids.len();
                    point_ids.extend(ids);
                }
                Err(e) => {
                    warn!(collection, chunk_index, error = %e, "bulk-store chunk failed");
                    failed_count += chunk.len();
                    errors.push(ChunkError {
                        chunk_index,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(BulkStoreResult {
            stored_count,
            failed_count,
            point_ids,
            model_display_name: resolved.model.display_name.clone(),
            errors,
        })
    }

    async fn store_chunk(
        &self,
        resolved: &ResolvedCollection,
        embedder: &dyn crate::domain::ports::TextEmbedder,
        chunk: &[String],
        metadata_list: Option<&[Map<String, Value>]>,
        offset: usize,
    ) -> GatewayResult<Vec<String>> {
        let vectors = embedder.embed_documents(chunk).await?;
        if vectors.len() != chunk.len() {
            return Err(GatewayError::Internal(format!(
                "embedder returned {} vectors for {} documents",
                vectors.len(),
                chunk.len()
            )));
        }

        let mut points = Vec::with_capacity(chunk.len());
        let mut ids = Vec::with_capacity(chunk.len());
        for (i, (document, vector)) in chunk.iter().zip(vectors).enumerate() {
            check_dimensions(resolved, vector.len())?;
            let metadata = metadata_list.map(|metas| &metas[offset + i]);
            let point = PointRecord {
                id: Uuid::new_v4().to_string(),
                vector,
                payload: document_payload(document, metadata),
            };
            ids.push(point.id.clone());
            points.push(point);
        }

        self.store
            .upsert_points(&resolved.name, &resolved.vector_name, points)
            .await?;
        Ok(ids)
    }

    /// Semantic search over `collection`.
    ///
    /// Never creates the collection: an absent collection yields an empty
    /// result set flagged `no_such_collection`. Results are ordered by
    /// descending score with ascending point id as tiebreak.
    #[instrument(skip(self, query), err)]
    pub async fn find(
        &self,
        collection: &str,
        query: &str,
        limit: Option<usize>,
        score_threshold: Option<f32>,
    ) -> GatewayResult<FindResult> {
        validate_collection_name(collection)?;
        let query = sanitize_query(query)?;
        let limit = limit.unwrap_or(self.search_default_limit);
        if limit == 0 {
            return Err(GatewayError::invalid("limit", "must be positive"));
        }
        let score_threshold = score_threshold.unwrap_or(self.search_default_threshold);
        if !(score_threshold >= 0.0) {
            return Err(GatewayError::invalid(
                "score_threshold",
                "must be a number >= 0",
            ));
        }
        let params = SearchParams {
            limit,
            score_threshold,
        };

        let Some(resolved) = self.manager.lookup(collection).await? else {
            return Ok(FindResult {
                query,
                collection: collection.to_string(),
                results: Vec::new(),
                total_found: 0,
                search_params: params,
                vector_model: String::new(),
                timestamp: Utc::now(),
                no_such_collection: true,
            });
        };

        let embedder = self.pool.get(&resolved.model).await?;
        let vector = embedder.embed_query(&query).await?;
        let hits = self
            .store
            .search(
                collection,
                &SearchQuery {
                    vector_name: resolved.vector_name.clone(),
                    vector,
                    limit,
                    score_threshold,
                },
            )
            .await?;

        let mut results: Vec<SearchHit> = hits
            .into_iter()
            .filter(|p| p.score >= score_threshold)
            .map(|p| {
                let payload = p.payload.unwrap_or_default();
                SearchHit {
                    point_id: p.id,
                    score: p.score,
                    content: document_text(&payload),
                    metadata: metadata_object(&payload),
                    vector_model: resolved.model.display_name.clone(),
                }
            })
            .collect();
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.point_id.cmp(&b.point_id))
        });
        results.truncate(limit);

        Ok(FindResult {
            query,
            collection: collection.to_string(),
            total_found: results.len(),
            results,
            search_params: params,
            vector_model: resolved.model.display_name.clone(),
            timestamp: Utc::now(),
            no_such_collection: false,
        })
    }

    /// Fetches one point with its payload, optionally its vector.
    #[instrument(skip(self), err)]
    pub async fn get_point(
        &self,
        collection: &str,
        point_id: &str,
        with_vector: bool,
    ) -> GatewayResult<PointView> {
        validate_collection_name(collection)?;
        let point_id = require_text("point_id", point_id)?;

        if self.manager.lookup(collection).await?.is_none() {
            return Err(GatewayError::NoSuchCollection(collection.to_string()));
        }

        let mut points = self
            .store
            .retrieve_points(collection, &[point_id.clone()], true, with_vector)
            .await?;
        let point = points.pop().ok_or_else(|| GatewayError::PointNotFound {
            collection: collection.to_string(),
            point_id: point_id.clone(),
        })?;

        Ok(PointView {
            id: point.id,
            payload: point.payload.unwrap_or_default(),
            vector: point.vector,
        })
    }

    /// Merges fields into the payloads of existing points.
    ///
    /// Without `key`, the merge happens at the payload root; with `key`
    /// (for example `"metadata"`), inside that object, preserving sibling
    /// fields. Vectors are never recomputed. The backend applies one
    /// set-payload call atomically, so all points update or none do.
    #[instrument(skip(self, point_ids, payload), fields(ids = point_ids.len()), err)]
    pub async fn update_payload(
        &self,
        collection: &str,
        point_ids: &[String],
        payload: Map<String, Value>,
        key: Option<&str>,
    ) -> GatewayResult<UpdateResult> {
        validate_collection_name(collection)?;
        if point_ids.is_empty() {
            return Err(GatewayError::invalid("point_ids", "must not be empty"));
        }
        if payload.is_empty() {
            return Err(GatewayError::invalid("payload", "must not be empty"));
        }

        if self.manager.lookup(collection).await?.is_none() {
            return Err(GatewayError::NoSuchCollection(collection.to_string()));
        }

        // Verify every id exists before mutating anything.
        let existing = self
            .store
            .retrieve_points(collection, point_ids, false, false)
            .await?;
        if existing.len() != point_ids.len() {
            let found: std::collections::HashSet<_> =
                existing.iter().map(|p| p.id.as_str()).collect();
            let missing = point_ids
                .iter()
                .find(|id| !found.contains(id.as_str()))
                .cloned()
                .unwrap_or_default();
            return Err(GatewayError::PointNotFound {
                collection: collection.to_string(),
                point_id: missing,
            });
        }

        self.store
            .set_payload(collection, point_ids, &payload, key)
            .await?;
        Ok(UpdateResult {
            updated_count: point_ids.len(),
        })
    }

    /// Deletes points by id. Idempotent: absent ids are a no-op success.
    ///
    /// `deleted_count` reports how many of the requested ids existed
    /// before the call.
    #[instrument(skip(self, point_ids), fields(ids = point_ids.len()), err)]
    pub async fn delete_points(
        &self,
        collection: &str,
        point_ids: &[String],
    ) -> GatewayResult<DeleteResult> {
        validate_collection_name(collection)?;
        if point_ids.is_empty() {
            return Err(GatewayError::invalid("point_ids", "must not be empty"));
        }

        if self.manager.lookup(collection).await?.is_none() {
            return Err(GatewayError::NoSuchCollection(collection.to_string()));
        }

        let existing = self
            .store
            .retrieve_points(collection, point_ids, false, false)
            .await?;
        self.store.delete_points(collection, point_ids).await?;

        Ok(DeleteResult {
            deleted_count: existing.len(),
        })
    }

    /// Summarizes every collection in the backend.
    #[instrument(skip(self), err)]
    pub async fn list_collections(&self) -> GatewayResult<Vec<CollectionSummary>> {
        let mut names = self.store.list_collections().await?;
        names.sort();

        let mut summaries = Vec::with_capacity(names.len());
        for name in names {
            let info = self.store.get_collection(&name).await?;
            let single = (info.vectors.len() == 1).then(|| info.vectors[0].clone());
            summaries.push(CollectionSummary {
                name,
                point_count: info.points_count,
                dimensions: single.as_ref().map(|(_, size, _)| *size),
                distance: single.as_ref().map(|(_, _, distance)| *distance),
                vector_name: single.map(|(vector_name, _, _)| vector_name),
                status: info.status,
                quantization: info.quantization,
            });
        }
        Ok(summaries)
    }

    /// Detailed view of one collection, including index tuning and the
    /// model its name resolves to.
    #[instrument(skip(self), err)]
    pub async fn collection_info(&self, collection: &str) -> GatewayResult<CollectionDetail> {
        validate_collection_name(collection)?;
        if !self.store.collection_exists(collection).await? {
            return Err(GatewayError::NoSuchCollection(collection.to_string()));
        }
        let info = self.store.get_collection(collection).await?;
        let single = (info.vectors.len() == 1).then(|| info.vectors[0].clone());

        Ok(CollectionDetail {
            summary: CollectionSummary {
                name: collection.to_string(),
                point_count: info.points_count,
                dimensions: single.as_ref().map(|(_, size, _)| *size),
                distance: single.as_ref().map(|(_, _, distance)| *distance),
                vector_name: single.map(|(vector_name, _, _)| vector_name),
                status: info.status,
                quantization: info.quantization,
            },
            indexed_vectors_count: info.indexed_vectors_count,
            segments_count: info.segments_count,
            optimizer_status: info.optimizer_status,
            hnsw_ef_construct: info.hnsw_ef_construct,
            hnsw_m: info.hnsw_m,
            resolved_model: self.registry.resolve(collection).clone(),
        })
    }

    /// The resolver's configuration, the registry, and pool observability.
    pub fn model_mappings(&self) -> MappingsReport {
        MappingsReport {
            models: self.registry.models(),
            collection_model_map: self
                .registry
                .exact_mappings()
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
            pattern_rules: self.registry.pattern_rules(),
            default_model_id: self.registry.default_model_id().to_string(),
            active_embedders: self.pool.statuses(),
        }
    }
}

fn require_text(field: &'static str, value: &str) -> GatewayResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(GatewayError::invalid(field, "must not be empty"));
    }
    Ok(trimmed.to_string())
}

/// Collection names must be non-empty, must not be dotfiles, and may use
/// only alphanumerics, `_`, and `-`.
fn validate_collection_name(name: &str) -> GatewayResult<()> {
    if name.trim().is_empty() {
        return Err(GatewayError::invalid("collection", "must not be empty"));
    }
    if name.starts_with('.') {
        return Err(GatewayError::invalid(
            "collection",
            "must not start with '.'",
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(GatewayError::invalid(
            "collection",
            "may contain only alphanumerics, '_' and '-'",
        ));
    }
    Ok(())
}

/// Collapses whitespace and caps the query length.
fn sanitize_query(query: &str) -> GatewayResult<String> {
    let mut sanitized = query.split_whitespace().collect::<Vec<_>>().join(" ");
    if sanitized.is_empty() {
        return Err(GatewayError::invalid("query", "must not be empty"));
    }
    if sanitized.chars().count() > MAX_QUERY_CHARS {
        warn!(
            length = sanitized.chars().count(),
            "query truncated to {MAX_QUERY_CHARS} characters"
        );
        sanitized = sanitized.chars().take(MAX_QUERY_CHARS).collect();
    }
    Ok(sanitized)
}

/// Metadata must stay under 10 KiB serialized.
fn validate_metadata(metadata: &Map<String, Value>) -> GatewayResult<()> {
    let serialized = serde_json::to_string(metadata)?;
    if serialized.len() > MAX_METADATA_BYTES {
        return Err(GatewayError::invalid(
            "metadata",
            format!(
                "serialized size {} exceeds {} bytes",
                serialized.len(),
                MAX_METADATA_BYTES
            ),
        ));
    }
    Ok(())
}

fn check_dimensions(resolved: &ResolvedCollection, got: usize) -> GatewayResult<()> {
    if got != resolved.model.dimensions {
        return Err(GatewayError::Internal(format!(
            "embedder for '{}' produced {} dims, collection '{}' expects {}",
            resolved.model.model_id, got, resolved.name, resolved.model.dimensions
        )));
    }
    Ok(())
}
