//! MCP stdio server implementing JSON-RPC 2.0 over stdin/stdout.
//!
//! Exposes the gateway's operations as MCP tools. Protocol:
//! newline-delimited JSON-RPC 2.0 on stdin/stdout. Logging goes to stderr
//! (stdout is reserved for protocol messages).

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::domain::errors::GatewayError;
use crate::services::SemanticGateway;

/// JSON-RPC error code for malformed JSON.
const PARSE_ERROR: i64 = -32700;
/// JSON-RPC error code for an unknown method.
const METHOD_NOT_FOUND: i64 = -32601;
/// JSON-RPC error code for bad parameters.
const INVALID_PARAMS: i64 = -32602;
/// JSON-RPC error code for a failed tool call.
const INTERNAL_ERROR: i64 = -32603;

/// MCP stdio server exposing gateway operations as native tools.
pub struct StdioServer {
    gateway: Arc<SemanticGateway>,
    default_collection: Option<String>,
}

impl StdioServer {
    /// Creates a server over `gateway`. `default_collection` backs tools
    /// called without a collection argument.
    pub fn new(gateway: Arc<SemanticGateway>, default_collection: Option<String>) -> Self {
        Self {
            gateway,
            default_collection,
        }
    }

    /// Runs the stdio loop until stdin closes.
    pub async fn run(&self) -> anyhow::Result<()> {
        let stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let reader = BufReader::new(stdin);
        let mut lines = reader.lines();

        eprintln!("[vectorgate-mcp] stdio server started");

        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }

            let response = self.handle_message(&line).await;
            // Notifications produce no response; never write a blank line.
            if response.is_empty() {
                continue;
            }
            let mut bytes = response.into_bytes();
            bytes.push(b'\n');
            stdout.write_all(&bytes).await?;
            stdout.flush().await?;
        }

        eprintln!("[vectorgate-mcp] stdio server stopped");
        Ok(())
    }

    async fn handle_message(&self, line: &str) -> String {
        let request: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                return error_response(Value::Null, PARSE_ERROR, &format!("Parse error: {e}"))
            }
        };

        let id = request.get("id").cloned().unwrap_or(Value::Null);
        let method = request.get("method").and_then(|m| m.as_str()).unwrap_or("");
        let params = request.get("params").cloned().unwrap_or_else(|| json!({}));

        match method {
            "initialize" => self.handle_initialize(id),
            "notifications/initialized" => String::new(),
            "tools/list" => self.handle_tools_list(id),
            "tools/call" => self.handle_tools_call(id, params).await,
            "ping" => ok_response(id, json!({})),
            _ => error_response(id, METHOD_NOT_FOUND, &format!("Unknown method: {method}")),
        }
    }

    fn handle_initialize(&self, id: Value) -> String {
        ok_response(
            id,
            json!({
                "protocolVersion": "2024-11-05",
                "capabilities": { "tools": {} },
                "serverInfo": {
                    "name": "vectorgate",
                    "version": env!("CARGO_PKG_VERSION"),
                }
            }),
        )
    }

    fn handle_tools_list(&self, id: Value) -> String {
        ok_response(id, json!({ "tools": tool_definitions() }))
    }

    async fn handle_tools_call(&self, id: Value, params: Value) -> String {
        let Some(name) = params.get("name").and_then(|n| n.as_str()) else {
            return error_response(id, INVALID_PARAMS, "Missing tool name");
        };
        let args = params
            .get("arguments")
            .cloned()
            .unwrap_or_else(|| json!({}));

        match self.dispatch(name, &args).await {
            Ok(result) => ok_response(
                id,
                json!({
                    "content": [{
                        "type": "text",
                        "text": result.to_string(),
                    }],
                    "isError": false,
                }),
            ),
            Err(e) => error_response(id, error_code(&e), &e.to_string()),
        }
    }

    fn collection<'a>(&'a self, args: &'a Value) -> Result<&'a str, GatewayError> {
        args.get("collection")
            .and_then(|c| c.as_str())
            .or(self.default_collection.as_deref())
            .ok_or_else(|| GatewayError::invalid("collection", "missing and no default configured"))
    }

    async fn dispatch(&self, tool: &str, args: &Value) -> Result<Value, GatewayError> {
        match tool {
            "store" => {
                let collection = self.collection(args)?;
                let information = str_arg(args, "information")?;
                let metadata = object_arg(args, "metadata")?;
                let result = self.gateway.store(collection, information, metadata).await?;
                Ok(serde_json::to_value(result)?)
            }
            "bulk_store" => {
                let collection = self.collection(args)?;
                let documents = string_list_arg(args, "documents")?;
                let metadata_list = object_list_arg(args, "metadata_list")?;
                let batch_size = usize_arg(args, "batch_size")?;
                let result = self
                    .gateway
                    .bulk_store(collection, documents, metadata_list, batch_size)
                    .await?;
                Ok(serde_json::to_value(result)?)
            }
            "find" => {
                let collection = self.collection(args)?;
                let query = str_arg(args, "query")?;
                let limit = usize_arg(args, "limit")?;
                let threshold = f32_arg(args, "score_threshold")?;
                let result = self.gateway.find(collection, query, limit, threshold).await?;
                Ok(serde_json::to_value(result)?)
            }
            "get_point" => {
                let collection = self.collection(args)?;
                let point_id = str_arg(args, "point_id")?;
                let with_vector = args
                    .get("with_vector")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                let result = self
                    .gateway
                    .get_point(collection, point_id, with_vector)
                    .await?;
                Ok(serde_json::to_value(result)?)
            }
            "update_payload" => {
                let collection = self.collection(args)?;
                let point_ids = string_list_arg(args, "point_ids")?;
                let payload = object_arg(args, "payload")?
                    .ok_or_else(|| GatewayError::invalid("payload", "required"))?;
                let key = args.get("key").and_then(|k| k.as_str());
                let result = self
                    .gateway
                    .update_payload(collection, &point_ids, payload, key)
                    .await?;
                Ok(serde_json::to_value(result)?)
            }
            "delete_points" => {
                let collection = self.collection(args)?;
                let point_ids = string_list_arg(args, "point_ids")?;
                let result = self.gateway.delete_points(collection, &point_ids).await?;
                Ok(serde_json::to_value(result)?)
            }
            "list_collections" => {
                let result = self.gateway.list_collections().await?;
                Ok(serde_json::to_value(result)?)
            }
            "collection_info" => {
                let collection = self.collection(args)?;
                let result = self.gateway.collection_info(collection).await?;
                Ok(serde_json::to_value(result)?)
            }
            "model_mappings" => Ok(serde_json::to_value(self.gateway.model_mappings())?),
            other => Err(GatewayError::invalid("name", format!("unknown tool '{other}'"))),
        }
    }
}

fn str_arg<'a>(args: &'a Value, field: &'static str) -> Result<&'a str, GatewayError> {
    args.get(field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| GatewayError::invalid(field, "required string"))
}

fn usize_arg(args: &Value, field: &'static str) -> Result<Option<usize>, GatewayError> {
    match args.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(|n| Some(n as usize))
            .ok_or_else(|| GatewayError::invalid(field, "must be a non-negative integer")),
    }
}

fn f32_arg(args: &Value, field: &'static str) -> Result<Option<f32>, GatewayError> {
    match args.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_f64()
            .map(|n| Some(n as f32))
            .ok_or_else(|| GatewayError::invalid(field, "must be a number")),
    }
}

fn object_arg(args: &Value, field: &'static str) -> Result<Option<Map<String, Value>>, GatewayError> {
    match args.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map.clone())),
        Some(_) => Err(GatewayError::invalid(field, "must be an object")),
    }
}

fn string_list_arg(args: &Value, field: &'static str) -> Result<Vec<String>, GatewayError> {
    let list = args
        .get(field)
        .and_then(|v| v.as_array())
        .ok_or_else(|| GatewayError::invalid(field, "required array of strings"))?;
    list.iter()
        .map(|v| {
            v.as_str()
                .map(String::from)
                .ok_or_else(|| GatewayError::invalid(field, "must contain only strings"))
        })
        .collect()
}

fn object_list_arg(
    args: &Value,
    field: &'static str,
) -> Result<Option<Vec<Map<String, Value>>>, GatewayError> {
    match args.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(list)) => list
            .iter()
            .map(|v| match v {
                Value::Object(map) => Ok(map.clone()),
                _ => Err(GatewayError::invalid(field, "must contain only objects")),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        Some(_) => Err(GatewayError::invalid(field, "must be an array of objects")),
    }
}

fn error_code(e: &GatewayError) -> i64 {
    match e {
        GatewayError::InvalidInput { .. } => INVALID_PARAMS,
        _ => INTERNAL_ERROR,
    }
}

fn ok_response(id: Value, result: Value) -> String {
    json!({ "jsonrpc": "2.0", "id": id, "result": result }).to_string()
}

fn error_response(id: Value, code: i64, message: &str) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message }
    })
    .to_string()
}

fn collection_prop() -> Value {
    json!({ "type": "string", "description": "Target collection name" })
}

fn tool_definitions() -> Vec<Value> {
    vec![
        json!({
            "name": "store",
            "description": "Store a document with optional metadata; the collection's embedding model is selected by name",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "collection": collection_prop(),
                    "information": { "type": "string", "description": "Document text to store" },
                    "metadata": { "type": "object", "description": "Optional metadata object" }
                },
                "required": ["information"]
            }
        }),
        json!({
            "name": "bulk_store",
            "description": "Store many documents in batches",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "collection": collection_prop(),
                    "documents": { "type": "array", "items": { "type": "string" } },
                    "metadata_list": { "type": "array", "items": { "type": "object" } },
                    "batch_size": { "type": "integer", "minimum": 1 }
                },
                "required": ["documents"]
            }
        }),
        json!({
            "name": "find",
            "description": "Semantic search over a collection",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "collection": collection_prop(),
                    "query": { "type": "string" },
                    "limit": { "type": "integer", "minimum": 1 },
                    "score_threshold": { "type": "number", "minimum": 0 }
                },
                "required": ["query"]
            }
        }),
        json!({
            "name": "get_point",
            "description": "Fetch one point by id",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "collection": collection_prop(),
                    "point_id": { "type": "string" },
                    "with_vector": { "type": "boolean" }
                },
                "required": ["point_id"]
            }
        }),
        json!({
            "name": "update_payload",
            "description": "Merge fields into point payloads; with key='metadata' the merge happens inside payload.metadata",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "collection": collection_prop(),
                    "point_ids": { "type": "array", "items": { "type": "string" } },
                    "payload": { "type": "object" },
                    "key": { "type": "string" }
                },
                "required": ["point_ids", "payload"]
            }
        }),
        json!({
            "name": "delete_points",
            "description": "Delete points by id (idempotent)",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "collection": collection_prop(),
                    "point_ids": { "type": "array", "items": { "type": "string" } }
                },
                "required": ["point_ids"]
            }
        }),
        json!({
            "name": "list_collections",
            "description": "List every collection with point counts and geometry",
            "inputSchema": { "type": "object", "properties": {} }
        }),
        json!({
            "name": "collection_info",
            "description": "Detailed view of one collection including index tuning",
            "inputSchema": {
                "type": "object",
                "properties": { "collection": collection_prop() },
                "required": ["collection"]
            }
        }),
        json!({
            "name": "model_mappings",
            "description": "The registry, resolution rules, and active embedders",
            "inputSchema": { "type": "object", "properties": {} }
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_definitions_cover_service_interface() {
        let names: Vec<_> = tool_definitions()
            .into_iter()
            .map(|t| t["name"].as_str().unwrap().to_string())
            .collect();
        for expected in [
            "store",
            "bulk_store",
            "find",
            "get_point",
            "update_payload",
            "delete_points",
            "list_collections",
            "collection_info",
            "model_mappings",
        ] {
            assert!(names.contains(&expected.to_string()), "missing {expected}");
        }
    }

    #[test]
    fn test_error_response_shape() {
        let raw = error_response(json!(7), INVALID_PARAMS, "bad");
        let parsed: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["id"], json!(7));
        assert_eq!(parsed["error"]["code"], json!(INVALID_PARAMS));
    }

    #[test]
    fn test_string_list_arg_rejects_mixed_types() {
        let args = json!({ "point_ids": ["a", 2] });
        assert!(string_list_arg(&args, "point_ids").is_err());
    }

    #[test]
    fn test_optional_args_default_to_none() {
        let args = json!({});
        assert_eq!(usize_arg(&args, "limit").unwrap(), None);
        assert_eq!(f32_arg(&args, "score_threshold").unwrap(), None);
        assert!(object_arg(&args, "metadata").unwrap().is_none());
    }
}
