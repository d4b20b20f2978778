//! Embedding model descriptors.

use serde::{Deserialize, Serialize};

/// Distance metric of a model's vector space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Distance {
    /// Cosine similarity. Higher score is better.
    Cosine,
    /// Dot product. Higher score is better.
    Dot,
    /// Euclidean distance.
    Euclidean,
}

impl Default for Distance {
    fn default() -> Self {
        Self::Cosine
    }
}

impl Distance {
    /// Qdrant's wire name for this metric.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::Cosine => "Cosine",
            Self::Dot => "Dot",
            Self::Euclidean => "Euclid",
        }
    }

    /// Parses Qdrant's wire name back into a metric.
    pub fn from_wire_name(s: &str) -> Option<Self> {
        match s {
            "Cosine" => Some(Self::Cosine),
            "Dot" => Some(Self::Dot),
            "Euclid" => Some(Self::Euclidean),
            _ => None,
        }
    }
}

/// Immutable description of one embedding model known to the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Unique identifier used by mappings and the embedder pool.
    pub model_id: String,
    /// Human-readable name; its slug becomes the persisted vector name.
    pub display_name: String,
    /// Output vector dimensions.
    pub dimensions: usize,
    /// Distance metric of the vector space.
    #[serde(default)]
    pub distance: Distance,
    /// Short description of what the model is good at.
    #[serde(default)]
    pub description: String,
    /// Identifier handed to the embedding runtime (fastembed model name).
    pub runtime_model: String,
}

impl ModelDescriptor {
    /// The named-vector slot this model occupies in backend collections.
    ///
    /// Derived from the display name: lowercased, each run of
    /// non-alphanumeric characters collapsed to a single `-`, trimmed.
    /// The derivation is part of the persisted format; collections created
    /// under a given slug must keep searching under that slug.
    pub fn vector_name(&self) -> String {
        slugify(&self.display_name)
    }
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(display_name: &str) -> ModelDescriptor {
        ModelDescriptor {
            model_id: "m".to_string(),
            display_name: display_name.to_string(),
            dimensions: 384,
            distance: Distance::Cosine,
            description: String::new(),
            runtime_model: "m".to_string(),
        }
    }

    #[test]
    fn test_vector_name_lowercases_and_dashes() {
        assert_eq!(
            descriptor("BGE Large EN v1.5").vector_name(),
            "bge-large-en-v1-5"
        );
        assert_eq!(
            descriptor("All MiniLM L6 v2").vector_name(),
            "all-minilm-l6-v2"
        );
    }

    #[test]
    fn test_vector_name_collapses_runs_and_trims() {
        assert_eq!(descriptor("  a -- b  ").vector_name(), "a-b");
        assert_eq!(descriptor("...x...").vector_name(), "x");
    }

    #[test]
    fn test_distance_wire_names_round_trip() {
        for d in [Distance::Cosine, Distance::Dot, Distance::Euclidean] {
            assert_eq!(Distance::from_wire_name(d.wire_name()), Some(d));
        }
        assert_eq!(Distance::from_wire_name("Manhattan"), None);
    }
}
