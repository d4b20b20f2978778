//! The immutable settings value constructed at startup.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::models::{Distance, ModelDescriptor};

/// Gateway configuration.
///
/// Built once at startup by [`super::ConfigLoader`] and passed by
/// reference; hot paths never read the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Location of the Qdrant server.
    pub backend_url: String,
    /// Optional credential forwarded as the `api-key` header.
    pub backend_api_key: Option<String>,
    /// Per-request backend timeout in seconds.
    pub backend_timeout_secs: u64,
    /// Collection used when a transport tool omits the argument.
    pub default_collection: Option<String>,
    /// Model id the resolver falls back to.
    pub default_model_id: String,
    /// Models available to the resolver, keyed by model id.
    pub models: Vec<ModelDescriptor>,
    /// Exact collection-name to model-id mappings.
    pub collection_model_map: BTreeMap<String, String>,
    /// Ordered substring rules; first match wins.
    pub collection_pattern_map: Vec<PatternMapping>,
    /// When false, `ensure` never creates and missing collections fail.
    pub auto_create_collections: bool,
    /// Apply quantization on collection create.
    pub enable_quantization: bool,
    /// HNSW index parameters for created collections.
    pub hnsw: HnswSettings,
    /// Attempt the CUDA execution provider before CPU.
    pub gpu_enabled: bool,
    /// Directory the embedding runtime caches model files in.
    pub model_cache_dir: Option<String>,
    /// Search defaults applied when callers omit parameters.
    pub search: SearchSettings,
    /// MCP HTTP transport bind address.
    pub http: HttpSettings,
}

/// One ordered substring rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternMapping {
    /// Substring matched against collection names.
    pub pattern: String,
    /// Model id selected on match.
    pub model_id: String,
}

/// HNSW build-time parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct HnswSettings {
    /// Breadth of the candidate list during index build.
    pub ef_construct: usize,
    /// Edges per node in the graph.
    pub m: usize,
}

impl Default for HnswSettings {
    fn default() -> Self {
        Self {
            ef_construct: 200,
            m: 16,
        }
    }
}

/// Defaults applied to `find` when the caller omits parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Default result limit.
    pub default_limit: usize,
    /// Default minimum score.
    pub default_threshold: f32,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_limit: 10,
            default_threshold: 0.0,
        }
    }
}

/// HTTP transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Host to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Whether to enable CORS.
    pub enable_cors: bool,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9300,
            enable_cors: true,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:6333".to_string(),
            backend_api_key: None,
            backend_timeout_secs: 30,
            default_collection: None,
            default_model_id: "all-minilm-l6-v2".to_string(),
            models: default_models(),
            collection_model_map: BTreeMap::new(),
            collection_pattern_map: default_patterns(),
            auto_create_collections: true,
            enable_quantization: true,
            hnsw: HnswSettings::default(),
            gpu_enabled: false,
            model_cache_dir: None,
            search: SearchSettings::default(),
            http: HttpSettings::default(),
        }
    }
}

/// The stock registry: one high-precision, one balanced, one fast model.
fn default_models() -> Vec<ModelDescriptor> {
    vec![
        ModelDescriptor {
            model_id: "bge-large-en-v1.5".to_string(),
            display_name: "BGE Large EN v1.5".to_string(),
            dimensions: 1024,
            distance: Distance::Cosine,
            description: "High-precision model for complex analysis".to_string(),
            runtime_model: "BAAI/bge-large-en-v1.5".to_string(),
        },
        ModelDescriptor {
            model_id: "bge-base-en-v1.5".to_string(),
            display_name: "BGE Base EN v1.5".to_string(),
            dimensions: 768,
            distance: Distance::Cosine,
            description: "Balanced model for knowledge-intensive content".to_string(),
            runtime_model: "BAAI/bge-base-en-v1.5".to_string(),
        },
        ModelDescriptor {
            model_id: "all-minilm-l6-v2".to_string(),
            display_name: "All MiniLM L6 v2".to_string(),
            dimensions: 384,
            distance: Distance::Cosine,
            description: "Fast model for technical and debug content".to_string(),
            runtime_model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
        },
    ]
}

fn default_patterns() -> Vec<PatternMapping> {
    let rule = |pattern: &str, model_id: &str| PatternMapping {
        pattern: pattern.to_string(),
        model_id: model_id.to_string(),
    };
    vec![
        rule("legal", "bge-large-en-v1.5"),
        rule("career", "bge-large-en-v1.5"),
        rule("lessons", "bge-base-en-v1.5"),
        rule("knowledge", "bge-base-en-v1.5"),
        rule("analysis", "bge-base-en-v1.5"),
        rule("documentation", "bge-base-en-v1.5"),
        rule("debug", "all-minilm-l6-v2"),
        rule("working", "all-minilm-l6-v2"),
        rule("solutions", "all-minilm-l6-v2"),
        rule("technical", "all-minilm-l6-v2"),
        rule("troubleshooting", "all-minilm-l6-v2"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_consistent() {
        let settings = Settings::default();
        assert!(settings
            .models
            .iter()
            .any(|m| m.model_id == settings.default_model_id));
        for rule in &settings.collection_pattern_map {
            assert!(
                settings.models.iter().any(|m| m.model_id == rule.model_id),
                "pattern '{}' references unknown model '{}'",
                rule.pattern,
                rule.model_id
            );
        }
    }

    #[test]
    fn test_default_model_dimensions() {
        let settings = Settings::default();
        let dims: Vec<usize> = settings.models.iter().map(|m| m.dimensions).collect();
        assert_eq!(dims, vec![1024, 768, 384]);
    }

    #[test]
    fn test_settings_round_trip_serde() {
        let settings = Settings::default();
        let yaml = serde_json::to_string(&settings).unwrap();
        let back: Settings = serde_json::from_str(&yaml).unwrap();
        assert_eq!(back.backend_url, settings.backend_url);
        assert_eq!(back.models.len(), settings.models.len());
    }
}
