//! Points and payloads as stored in the backend.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Conventional payload key holding the original document text.
pub const DOCUMENT_KEY: &str = "document";
/// Conventional payload key holding caller-supplied metadata.
pub const METADATA_KEY: &str = "metadata";

/// A point's payload: an arbitrary JSON object.
///
/// The conventional schema is `{document: string, metadata: object}`, but
/// payloads written by older or external writers may deviate. Unknown
/// top-level keys must be preserved on update.
pub type Payload = Map<String, Value>;

/// Builds the conventional payload for a freshly stored document. Omitted
/// metadata is stored as an empty object so readers always find a map.
pub fn document_payload(document: &str, metadata: Option<&Map<String, Value>>) -> Payload {
    let mut payload = Map::new();
    payload.insert(DOCUMENT_KEY.to_string(), Value::String(document.to_string()));
    payload.insert(
        METADATA_KEY.to_string(),
        Value::Object(metadata.cloned().unwrap_or_default()),
    );
    payload
}

/// Extracts the document text from a payload, tolerating deviant shapes.
///
/// A string `document` is returned as-is; any other JSON value is
/// serialized so external writers' points still surface in search results.
pub fn document_text(payload: &Payload) -> String {
    match payload.get(DOCUMENT_KEY) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

/// Extracts the metadata object from a payload, if present.
pub fn metadata_object(payload: &Payload) -> Option<Map<String, Value>> {
    match payload.get(METADATA_KEY) {
        Some(Value::Object(m)) => Some(m.clone()),
        _ => None,
    }
}

/// A point as handed to the backend on upsert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointRecord {
    /// UUID-shaped identifier, unique within the collection.
    pub id: String,
    /// Dense vector; length equals the collection's dimensions.
    pub vector: Vec<f32>,
    /// JSON payload attached to the point.
    pub payload: Payload,
}

/// One hit returned by a vector search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    /// Identifier of the matched point.
    pub point_id: String,
    /// Backend-defined similarity score; higher is better for cosine/dot.
    pub score: f32,
    /// Document text projected from the payload.
    pub content: String,
    /// Metadata object projected from the payload.
    pub metadata: Option<Map<String, Value>>,
    /// Display name of the model that embedded the collection.
    pub vector_model: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_payload_shape() {
        let meta = json!({"case": "X-1"});
        let payload = document_payload("hello", meta.as_object());
        assert_eq!(payload[DOCUMENT_KEY], json!("hello"));
        assert_eq!(payload[METADATA_KEY], json!({"case": "X-1"}));
    }

    #[test]
    fn test_document_payload_without_metadata() {
        let payload = document_payload("hello", None);
        assert_eq!(payload[METADATA_KEY], json!({}));
    }

    #[test]
    fn test_document_text_tolerates_non_string() {
        let mut payload = Payload::new();
        payload.insert(DOCUMENT_KEY.to_string(), json!({"nested": true}));
        assert_eq!(document_text(&payload), r#"{"nested":true}"#);

        let empty = Payload::new();
        assert_eq!(document_text(&empty), "");
    }

    #[test]
    fn test_metadata_object_ignores_non_object() {
        let mut payload = Payload::new();
        payload.insert(METADATA_KEY.to_string(), json!("not an object"));
        assert!(metadata_object(&payload).is_none());

        payload.insert(METADATA_KEY.to_string(), json!({"k": 1}));
        assert_eq!(metadata_object(&payload).unwrap()["k"], json!(1));
    }
}
