//! Collection geometry and introspection views.

use serde::{Deserialize, Serialize};

use super::model::{Distance, ModelDescriptor};

/// The vector geometry a collection is created with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorSpec {
    /// Named vector slot encoding the model's display-name slug.
    pub vector_name: String,
    /// Vector dimensions.
    pub size: usize,
    /// Distance metric.
    pub distance: Distance,
    /// HNSW build-time breadth.
    pub ef_construct: usize,
    /// HNSW graph connectivity.
    pub m: usize,
    /// Quantization applied on create, if any.
    pub quantization: Option<Quantization>,
}

/// Backend-side vector compression, tiered by dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantization {
    /// 1-bit quantization, 32x compression. Applied at >= 1024 dims.
    Binary,
    /// int8 scalar quantization, 4x compression. Applied at >= 512 dims.
    ScalarInt8,
}

impl VectorSpec {
    /// Dimension threshold at or above which binary quantization is used.
    pub const BINARY_QUANTIZATION_DIMS: usize = 1024;
    /// Dimension threshold at or above which scalar quantization is used.
    pub const SCALAR_QUANTIZATION_DIMS: usize = 512;

    /// Builds the spec for a collection bound to `model`.
    ///
    /// Small vectors skip quantization to preserve accuracy; larger ones
    /// trade accuracy for memory with scalar or binary compression.
    pub fn for_model(
        model: &ModelDescriptor,
        ef_construct: usize,
        m: usize,
        enable_quantization: bool,
    ) -> Self {
        let quantization = if !enable_quantization {
            None
        } else if model.dimensions >= Self::BINARY_QUANTIZATION_DIMS {
            Some(Quantization::Binary)
        } else if model.dimensions >= Self::SCALAR_QUANTIZATION_DIMS {
            Some(Quantization::ScalarInt8)
        } else {
            None
        };

        Self {
            vector_name: model.vector_name(),
            size: model.dimensions,
            distance: model.distance,
            ef_construct,
            m,
            quantization,
        }
    }
}

/// A collection resolved and verified against its model. Returned by the
/// collection manager and memoized for the process lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedCollection {
    /// Collection name as addressed by callers.
    pub name: String,
    /// Named vector slot searches and upserts must use.
    pub vector_name: String,
    /// The model bound to this collection.
    pub model: ModelDescriptor,
}

/// Backend-reported collection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionStatus {
    /// All segments indexed and searchable.
    Green,
    /// Optimizers running; searchable but converging.
    Yellow,
    /// Backend reports a problem with the collection.
    Red,
    /// Status string the backend added after this crate was written.
    Unknown,
}

impl CollectionStatus {
    /// Parses the backend's status string, case-insensitively.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "green" => Self::Green,
            "yellow" => Self::Yellow,
            "red" => Self::Red,
            _ => Self::Unknown,
        }
    }
}

/// One row of `list_collections`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionSummary {
    /// Collection name.
    pub name: String,
    /// Number of points stored.
    pub point_count: u64,
    /// Vector dimensions, when the collection has a single named vector.
    pub dimensions: Option<usize>,
    /// Distance metric of the named vector.
    pub distance: Option<Distance>,
    /// Named vector slot.
    pub vector_name: Option<String>,
    /// Backend status.
    pub status: CollectionStatus,
    /// Whether quantization is configured.
    pub quantization: bool,
}

/// Detailed view returned by `collection_info`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionDetail {
    /// Summary fields.
    #[serde(flatten)]
    pub summary: CollectionSummary,
    /// Vectors with an HNSW index built.
    pub indexed_vectors_count: Option<u64>,
    /// Storage segments, when the backend exposes the figure.
    pub segments_count: Option<u64>,
    /// Optimizer status string as reported by the backend.
    pub optimizer_status: Option<String>,
    /// HNSW ef_construct the collection was created with.
    pub hnsw_ef_construct: Option<usize>,
    /// HNSW m the collection was created with.
    pub hnsw_m: Option<usize>,
    /// The model the resolver binds to this collection name.
    pub resolved_model: ModelDescriptor,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(dims: usize) -> ModelDescriptor {
        ModelDescriptor {
            model_id: "test-model".to_string(),
            display_name: "Test Model".to_string(),
            dimensions: dims,
            distance: Distance::Cosine,
            description: String::new(),
            runtime_model: "test".to_string(),
        }
    }

    #[test]
    fn test_quantization_tiers() {
        let spec = VectorSpec::for_model(&model(1024), 200, 16, true);
        assert_eq!(spec.quantization, Some(Quantization::Binary));

        let spec = VectorSpec::for_model(&model(768), 200, 16, true);
        assert_eq!(spec.quantization, Some(Quantization::ScalarInt8));

        let spec = VectorSpec::for_model(&model(384), 200, 16, true);
        assert_eq!(spec.quantization, None);
    }

    #[test]
    fn test_quantization_disabled() {
        let spec = VectorSpec::for_model(&model(1024), 200, 16, false);
        assert_eq!(spec.quantization, None);
    }

    #[test]
    fn test_spec_carries_model_geometry() {
        let m = model(768);
        let spec = VectorSpec::for_model(&m, 128, 8, true);
        assert_eq!(spec.vector_name, "test-model");
        assert_eq!(spec.size, 768);
        assert_eq!(spec.distance, Distance::Cosine);
        assert_eq!(spec.ef_construct, 128);
        assert_eq!(spec.m, 8);
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(CollectionStatus::parse("green"), CollectionStatus::Green);
        assert_eq!(CollectionStatus::parse("Yellow"), CollectionStatus::Yellow);
        assert_eq!(CollectionStatus::parse("RED"), CollectionStatus::Red);
        assert_eq!(CollectionStatus::parse("grey"), CollectionStatus::Unknown);
    }
}
