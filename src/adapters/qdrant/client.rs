//! Qdrant REST client implementing the [`VectorStore`] port.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use crate::domain::errors::{GatewayError, GatewayResult};
use crate::domain::models::{CollectionStatus, Distance, PointRecord, VectorSpec};
use crate::domain::ports::{CollectionInfo, SearchQuery, StoredPoint, VectorStore};

use super::types::{
    self, ApiResponse, CollectionDescription, CollectionsList, CreateCollection, DeletePoints,
    QueryPoints, QueryResult, RetrievePoints, ScoredPoint, SetPayload, UpsertPoints, WirePoint,
};

/// Connection settings for the Qdrant REST API.
#[derive(Debug, Clone)]
pub struct QdrantConfig {
    /// Base URL, e.g. `http://localhost:6333`.
    pub url: String,
    /// Optional credential sent as the `api-key` header.
    pub api_key: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

/// Thin REST adapter over Qdrant.
///
/// Maps transport failures to `BackendUnavailable` and 404s on collection
/// routes to `NoSuchCollection`. No retries, no caching; operations stay
/// idempotent so callers may retry.
pub struct QdrantHttpStore {
    config: QdrantConfig,
    client: Client,
}

impl QdrantHttpStore {
    /// Builds the adapter.
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` if the HTTP client cannot be built.
    pub fn new(config: QdrantConfig) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::BackendUnavailable(format!("http client: {e}")))?;
        Ok(Self { config, client })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.config.url.trim_end_matches('/'), path);
        let mut req = self.client.request(method, url);
        if let Some(key) = &self.config.api_key {
            req = req.header("api-key", key);
        }
        req
    }

    async fn send<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
        collection: Option<&str>,
    ) -> GatewayResult<T> {
        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::BackendUnavailable(format!("request timed out: {e}"))
            } else {
                GatewayError::BackendUnavailable(format!("request failed: {e}"))
            }
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            if let Some(name) = collection {
                return Err(GatewayError::NoSuchCollection(name.to_string()));
            }
        }
        if status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::BackendUnavailable(format!(
                "backend returned {status}: {body}"
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Internal(format!(
                "backend rejected request with {status}: {body}"
            )));
        }

        let envelope: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| GatewayError::BackendUnavailable(format!("invalid response body: {e}")))?;
        envelope
            .result
            .ok_or_else(|| GatewayError::BackendUnavailable("response without result".to_string()))
    }

    fn stored_point(point: ScoredPoint, vector_name: Option<&str>) -> StoredPoint {
        let vector = point
            .vector
            .as_ref()
            .and_then(|v| types::vector_for(v, vector_name.unwrap_or_default()));
        StoredPoint {
            id: types::id_to_string(&point.id),
            score: point.score,
            payload: point.payload,
            vector,
        }
    }
}

#[async_trait]
impl VectorStore for QdrantHttpStore {
    async fn collection_exists(&self, collection: &str) -> GatewayResult<bool> {
        let req = self.request(Method::GET, &format!("collections/{collection}/exists"));
        #[derive(serde::Deserialize)]
        struct Exists {
            exists: bool,
        }
        let result: Exists = self.send(req, None).await?;
        Ok(result.exists)
    }

    async fn create_collection(&self, collection: &str, spec: &VectorSpec) -> GatewayResult<()> {
        debug!(collection, vector_name = %spec.vector_name, "PUT collection");
        let req = self
            .request(Method::PUT, &format!("collections/{collection}"))
            .json(&CreateCollection::from_spec(spec));
        let _: bool = self.send(req, None).await?;
        Ok(())
    }

    async fn get_collection(&self, collection: &str) -> GatewayResult<CollectionInfo> {
        let req = self.request(Method::GET, &format!("collections/{collection}"));
        let description: CollectionDescription = self.send(req, Some(collection)).await?;

        let mut vectors = Vec::new();
        let mut hnsw_ef_construct = None;
        let mut hnsw_m = None;
        let mut quantization = false;
        if let Some(config) = &description.config {
            if let Some(named) = config
                .params
                .as_ref()
                .and_then(|p| p.vectors.as_ref())
                .and_then(Value::as_object)
            {
                for (name, params) in named {
                    let size = params.get("size").and_then(Value::as_u64);
                    let distance = params
                        .get("distance")
                        .and_then(Value::as_str)
                        .and_then(Distance::from_wire_name);
                    if let (Some(size), Some(distance)) = (size, distance) {
                        vectors.push((name.clone(), size as usize, distance));
                    }
                }
            }
            if let Some(hnsw) = &config.hnsw_config {
                hnsw_ef_construct = hnsw.ef_construct;
                hnsw_m = hnsw.m;
            }
            quantization = config
                .quantization_config
                .as_ref()
                .is_some_and(|q| !q.is_null());
        }

        Ok(CollectionInfo {
            vectors,
            points_count: description.points_count.unwrap_or(0),
            indexed_vectors_count: description.indexed_vectors_count,
            segments_count: description.segments_count,
            status: description
                .status
                .as_deref()
                .map_or(CollectionStatus::Unknown, CollectionStatus::parse),
            optimizer_status: description.optimizer_status.map(|v| match v {
                Value::String(s) => s,
                other => other.to_string(),
            }),
            hnsw_ef_construct,
            hnsw_m,
            quantization,
        })
    }

    async fn list_collections(&self) -> GatewayResult<Vec<String>> {
        let req = self.request(Method::GET, "collections");
        let list: CollectionsList = self.send(req, None).await?;
        Ok(list.collections.into_iter().map(|c| c.name).collect())
    }

    async fn upsert_points(
        &self,
        collection: &str,
        vector_name: &str,
        points: Vec<PointRecord>,
    ) -> GatewayResult<()> {
        let wire_points = points
            .into_iter()
            .map(|p| {
                let mut vector = BTreeMap::new();
                vector.insert(vector_name.to_string(), p.vector);
                WirePoint {
                    id: p.id,
                    vector,
                    payload: p.payload,
                }
            })
            .collect();
        let req = self
            .request(
                Method::PUT,
                &format!("collections/{collection}/points?wait=true"),
            )
            .json(&UpsertPoints {
                points: wire_points,
            });
        let _: Value = self.send(req, Some(collection)).await?;
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query: &SearchQuery,
    ) -> GatewayResult<Vec<StoredPoint>> {
        let req = self
            .request(
                Method::POST,
                &format!("collections/{collection}/points/query"),
            )
            .json(&QueryPoints {
                query: query.vector.clone(),
                using: query.vector_name.clone(),
                limit: query.limit,
                score_threshold: (query.score_threshold > 0.0).then_some(query.score_threshold),
                with_payload: true,
                with_vector: false,
            });
        let result: QueryResult = self.send(req, Some(collection)).await?;
        Ok(result
            .points
            .into_iter()
            .map(|p| Self::stored_point(p, None))
            .collect())
    }

    async fn retrieve_points(
        &self,
        collection: &str,
        ids: &[String],
        with_payload: bool,
        with_vector: bool,
    ) -> GatewayResult<Vec<StoredPoint>> {
        let req = self
            .request(Method::POST, &format!("collections/{collection}/points"))
            .json(&RetrievePoints {
                ids: ids.to_vec(),
                with_payload,
                with_vector,
            });
        let points: Vec<ScoredPoint> = self.send(req, Some(collection)).await?;
        Ok(points
            .into_iter()
            .map(|p| Self::stored_point(p, None))
            .collect())
    }

    async fn set_payload(
        &self,
        collection: &str,
        ids: &[String],
        payload: &Map<String, Value>,
        key: Option<&str>,
    ) -> GatewayResult<()> {
        let req = self
            .request(
                Method::POST,
                &format!("collections/{collection}/points/payload?wait=true"),
            )
            .json(&SetPayload {
                payload,
                points: ids.to_vec(),
                key,
            });
        let _: Value = self.send(req, Some(collection)).await?;
        Ok(())
    }

    async fn delete_points(&self, collection: &str, ids: &[String]) -> GatewayResult<()> {
        let req = self
            .request(
                Method::POST,
                &format!("collections/{collection}/points/delete?wait=true"),
            )
            .json(&DeletePoints {
                points: ids.to_vec(),
            });
        let _: Value = self.send(req, Some(collection)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> QdrantHttpStore {
        QdrantHttpStore::new(QdrantConfig {
            url: "http://localhost:6333/".to_string(),
            api_key: Some("secret".to_string()),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn test_request_strips_trailing_slash() {
        let store = store();
        let req = store.request(Method::GET, "collections").build().unwrap();
        assert_eq!(req.url().as_str(), "http://localhost:6333/collections");
    }

    #[test]
    fn test_request_carries_api_key() {
        let store = store();
        let req = store.request(Method::GET, "collections").build().unwrap();
        assert_eq!(req.headers().get("api-key").unwrap(), "secret");
    }
}
