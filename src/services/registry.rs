//! Embedding registry and collection-name resolver.

use std::collections::{BTreeMap, HashMap};

use crate::domain::models::{ModelDescriptor, PatternRule};
use crate::infrastructure::config::Settings;

/// The catalogue of known models plus the resolution rules mapping
/// collection names onto them.
///
/// Immutable after construction; resolution is pure and lock-free, so the
/// registry is shared freely across tasks. [`crate::ConfigLoader`] has
/// already verified that every referenced model id exists.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: HashMap<String, ModelDescriptor>,
    exact: BTreeMap<String, String>,
    patterns: Vec<(String, String)>,
    default_model_id: String,
}

impl ModelRegistry {
    /// Builds the registry from validated settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            models: settings
                .models
                .iter()
                .map(|m| (m.model_id.clone(), m.clone()))
                .collect(),
            exact: settings.collection_model_map.clone(),
            patterns: settings
                .collection_pattern_map
                .iter()
                .map(|r| (r.pattern.clone(), r.model_id.clone()))
                .collect(),
            default_model_id: settings.default_model_id.clone(),
        }
    }

    /// Resolves a collection name to its model.
    ///
    /// First match wins: exact mapping, then the ordered substring rules,
    /// then the default model. Pure; no I/O, no locks.
    pub fn resolve(&self, collection_name: &str) -> &ModelDescriptor {
        if let Some(model_id) = self.exact.get(collection_name) {
            return &self.models[model_id];
        }
        for (pattern, model_id) in &self.patterns {
            if collection_name.contains(pattern.as_str()) {
                return &self.models[model_id];
            }
        }
        &self.models[&self.default_model_id]
    }

    /// Looks up a model by id.
    pub fn model(&self, model_id: &str) -> Option<&ModelDescriptor> {
        self.models.get(model_id)
    }

    /// Every model in the catalogue, ordered by model id.
    pub fn models(&self) -> Vec<ModelDescriptor> {
        let mut all: Vec<_> = self.models.values().cloned().collect();
        all.sort_by(|a, b| a.model_id.cmp(&b.model_id));
        all
    }

    /// The configured exact mappings.
    pub fn exact_mappings(&self) -> &BTreeMap<String, String> {
        &self.exact
    }

    /// The configured substring rules, in match order.
    pub fn pattern_rules(&self) -> Vec<PatternRule> {
        self.patterns
            .iter()
            .map(|(pattern, model_id)| PatternRule {
                pattern: pattern.clone(),
                model_id: model_id.clone(),
            })
            .collect()
    }

    /// The fallback model id.
    pub fn default_model_id(&self) -> &str {
        &self.default_model_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ModelRegistry {
        let mut settings = Settings::default();
        settings
            .collection_model_map
            .insert("exact_notes".to_string(), "bge-base-en-v1.5".to_string());
        ModelRegistry::from_settings(&settings)
    }

    #[test]
    fn test_exact_mapping_wins_over_patterns() {
        let mut settings = Settings::default();
        // "legal" pattern would pick the 1024-dim model, but the exact
        // entry must take precedence.
        settings
            .collection_model_map
            .insert("legal_notes".to_string(), "all-minilm-l6-v2".to_string());
        let registry = ModelRegistry::from_settings(&settings);
        assert_eq!(registry.resolve("legal_notes").dimensions, 384);
    }

    #[test]
    fn test_pattern_routing() {
        let registry = registry();
        assert_eq!(registry.resolve("legal_notes").dimensions, 1024);
        assert_eq!(registry.resolve("lessons_learned").dimensions, 768);
        assert_eq!(registry.resolve("working_solutions").dimensions, 384);
    }

    #[test]
    fn test_first_pattern_wins() {
        let registry = registry();
        // Contains both "legal" and "solutions"; "legal" is listed first.
        assert_eq!(registry.resolve("legal_solutions").dimensions, 1024);
    }

    #[test]
    fn test_default_fallback() {
        let registry = registry();
        assert_eq!(registry.resolve("random_bucket").model_id, "all-minilm-l6-v2");
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let registry = registry();
        let a = registry.resolve("lessons_learned").model_id.clone();
        let b = registry.resolve("lessons_learned").model_id.clone();
        assert_eq!(a, b);
    }

    #[test]
    fn test_models_sorted_by_id() {
        let registry = registry();
        let ids: Vec<_> = registry.models().into_iter().map(|m| m.model_id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }
}
