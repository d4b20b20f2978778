//! Wire types for the Qdrant REST API.
//!
//! Only the fields this gateway reads or writes are modelled; everything
//! else passes through untouched. Every response body wraps its payload in
//! `{result, status, time}`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::domain::models::{Quantization, VectorSpec};

/// Generic response envelope.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub result: Option<T>,
    #[serde(default)]
    pub status: Value,
}

/// `GET /collections` result.
#[derive(Debug, Deserialize)]
pub struct CollectionsList {
    pub collections: Vec<CollectionName>,
}

#[derive(Debug, Deserialize)]
pub struct CollectionName {
    pub name: String,
}

/// `GET /collections/{name}` result.
#[derive(Debug, Deserialize)]
pub struct CollectionDescription {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub points_count: Option<u64>,
    #[serde(default)]
    pub indexed_vectors_count: Option<u64>,
    #[serde(default)]
    pub segments_count: Option<u64>,
    #[serde(default)]
    pub optimizer_status: Option<Value>,
    pub config: Option<CollectionConfig>,
}

#[derive(Debug, Deserialize)]
pub struct CollectionConfig {
    pub params: Option<CollectionParams>,
    #[serde(default)]
    pub hnsw_config: Option<HnswConfig>,
    #[serde(default)]
    pub quantization_config: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct CollectionParams {
    /// Named vectors; a legacy single unnamed vector deserializes as a
    /// bare params object instead and is treated as no named slots.
    #[serde(default)]
    pub vectors: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct HnswConfig {
    #[serde(default)]
    pub ef_construct: Option<usize>,
    #[serde(default)]
    pub m: Option<usize>,
}

/// Named vector declaration inside `PUT /collections/{name}`.
#[derive(Debug, Serialize)]
pub struct VectorParams {
    pub size: usize,
    pub distance: &'static str,
    pub hnsw_config: HnswDiff,
}

#[derive(Debug, Serialize)]
pub struct HnswDiff {
    pub ef_construct: usize,
    pub m: usize,
}

/// `PUT /collections/{name}` body.
#[derive(Debug, Serialize)]
pub struct CreateCollection {
    pub vectors: BTreeMap<String, VectorParams>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantization_config: Option<Value>,
    pub optimizers_config: OptimizersDiff,
}

#[derive(Debug, Serialize)]
pub struct OptimizersDiff {
    pub indexing_threshold: u64,
}

/// Indexing threshold applied to created collections. Lower than the
/// backend default so small collections become searchable quickly.
pub const INDEXING_THRESHOLD: u64 = 10_000;

impl CreateCollection {
    /// Builds the create body for a vector spec.
    pub fn from_spec(spec: &VectorSpec) -> Self {
        let mut vectors = BTreeMap::new();
        vectors.insert(
            spec.vector_name.clone(),
            VectorParams {
                size: spec.size,
                distance: spec.distance.wire_name(),
                hnsw_config: HnswDiff {
                    ef_construct: spec.ef_construct,
                    m: spec.m,
                },
            },
        );
        Self {
            vectors,
            quantization_config: spec.quantization.map(quantization_config),
            optimizers_config: OptimizersDiff {
                indexing_threshold: INDEXING_THRESHOLD,
            },
        }
    }
}

fn quantization_config(q: Quantization) -> Value {
    match q {
        Quantization::Binary => serde_json::json!({
            "binary": { "always_ram": true }
        }),
        Quantization::ScalarInt8 => serde_json::json!({
            "scalar": { "type": "int8", "always_ram": true }
        }),
    }
}

/// `PUT /collections/{name}/points` body.
#[derive(Debug, Serialize)]
pub struct UpsertPoints {
    pub points: Vec<WirePoint>,
}

#[derive(Debug, Serialize)]
pub struct WirePoint {
    pub id: String,
    pub vector: BTreeMap<String, Vec<f32>>,
    pub payload: Map<String, Value>,
}

/// `POST /collections/{name}/points/query` body.
#[derive(Debug, Serialize)]
pub struct QueryPoints {
    pub query: Vec<f32>,
    pub using: String,
    pub limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_threshold: Option<f32>,
    pub with_payload: bool,
    pub with_vector: bool,
}

/// `POST /collections/{name}/points/query` result.
#[derive(Debug, Deserialize)]
pub struct QueryResult {
    pub points: Vec<ScoredPoint>,
}

#[derive(Debug, Deserialize)]
pub struct ScoredPoint {
    pub id: Value,
    #[serde(default)]
    pub score: f32,
    #[serde(default)]
    pub payload: Option<Map<String, Value>>,
    #[serde(default)]
    pub vector: Option<Value>,
}

/// `POST /collections/{name}/points` (retrieve) body.
#[derive(Debug, Serialize)]
pub struct RetrievePoints {
    pub ids: Vec<String>,
    pub with_payload: bool,
    pub with_vector: bool,
}

/// `POST /collections/{name}/points/payload` body.
#[derive(Debug, Serialize)]
pub struct SetPayload<'a> {
    pub payload: &'a Map<String, Value>,
    pub points: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<&'a str>,
}

/// `POST /collections/{name}/points/delete` body.
#[derive(Debug, Serialize)]
pub struct DeletePoints {
    pub points: Vec<String>,
}

/// Renders a point id the backend may return as integer or string.
pub fn id_to_string(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Extracts a named vector from the `vector` field of a retrieved point,
/// which is either a bare array (unnamed) or `{name: [..]}`. When the
/// requested name is absent and the point carries exactly one named
/// vector, that one is returned.
pub fn vector_for(value: &Value, vector_name: &str) -> Option<Vec<f32>> {
    let array = match value {
        Value::Array(_) => value,
        Value::Object(map) => map
            .get(vector_name)
            .or_else(|| (map.len() == 1).then(|| map.values().next()).flatten())?,
        _ => return None,
    };
    array.as_array().map(|a| {
        a.iter()
            .filter_map(|v| v.as_f64().map(|f| f as f32))
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Distance;
    use serde_json::json;

    fn spec() -> VectorSpec {
        VectorSpec {
            vector_name: "bge-large-en-v1-5".to_string(),
            size: 1024,
            distance: Distance::Cosine,
            ef_construct: 200,
            m: 16,
            quantization: Some(Quantization::Binary),
        }
    }

    #[test]
    fn test_create_collection_body() {
        let body = serde_json::to_value(CreateCollection::from_spec(&spec())).unwrap();
        assert_eq!(
            body["vectors"]["bge-large-en-v1-5"]["size"],
            json!(1024)
        );
        assert_eq!(
            body["vectors"]["bge-large-en-v1-5"]["distance"],
            json!("Cosine")
        );
        assert_eq!(
            body["vectors"]["bge-large-en-v1-5"]["hnsw_config"]["ef_construct"],
            json!(200)
        );
        assert_eq!(body["quantization_config"]["binary"]["always_ram"], json!(true));
        assert_eq!(body["optimizers_config"]["indexing_threshold"], json!(10000));
    }

    #[test]
    fn test_scalar_quantization_body() {
        let mut s = spec();
        s.quantization = Some(Quantization::ScalarInt8);
        let body = serde_json::to_value(CreateCollection::from_spec(&s)).unwrap();
        assert_eq!(body["quantization_config"]["scalar"]["type"], json!("int8"));
    }

    #[test]
    fn test_no_quantization_omits_field() {
        let mut s = spec();
        s.quantization = None;
        let body = serde_json::to_value(CreateCollection::from_spec(&s)).unwrap();
        assert!(body.get("quantization_config").is_none());
    }

    #[test]
    fn test_id_to_string_handles_integers() {
        assert_eq!(id_to_string(&json!("abc")), "abc");
        assert_eq!(id_to_string(&json!(42)), "42");
    }

    #[test]
    fn test_vector_for_named_and_bare() {
        let named = json!({"slot": [0.5, 1.0]});
        assert_eq!(vector_for(&named, "slot"), Some(vec![0.5, 1.0]));
        // A sole named vector is returned even under another name.
        assert_eq!(vector_for(&named, "other"), Some(vec![0.5, 1.0]));
        let two = json!({"a": [0.1], "b": [0.2]});
        assert_eq!(vector_for(&two, "missing"), None);

        let bare = json!([0.25]);
        assert_eq!(vector_for(&bare, "anything"), Some(vec![0.25]));
    }

    #[test]
    fn test_response_envelope_deserializes() {
        let raw = json!({
            "result": {"collections": [{"name": "lessons"}]},
            "status": "ok",
            "time": 0.001
        });
        let parsed: ApiResponse<CollectionsList> = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.result.unwrap().collections[0].name, "lessons");
    }
}
