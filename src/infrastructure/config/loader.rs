//! Configuration loader with hierarchical merging.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::collections::HashSet;
use thiserror::Error;

use super::settings::Settings;

/// Configuration validation errors. Any of these refuses startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("backend_url cannot be empty")]
    EmptyBackendUrl,

    #[error("registry is empty: at least one model must be configured")]
    EmptyRegistry,

    #[error("duplicate model_id in registry: {0}")]
    DuplicateModel(String),

    #[error("model '{model_id}' has invalid dimensions: {dimensions}")]
    InvalidDimensions { model_id: String, dimensions: usize },

    #[error("model '{0}' has an empty display_name")]
    EmptyDisplayName(String),

    #[error("{referrer} references unknown model '{model_id}'")]
    UnknownModel { referrer: String, model_id: String },

    #[error("hnsw ef_construct must be positive")]
    InvalidEfConstruct,

    #[error("hnsw m must be positive")]
    InvalidHnswM,

    #[error("search default_limit must be positive")]
    InvalidSearchLimit,

    #[error("search default_threshold must be >= 0, got {0}")]
    InvalidSearchThreshold(f32),

    #[error("backend_timeout_secs must be positive")]
    InvalidTimeout,
}

/// Loads and validates [`Settings`].
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults
    /// 2. `vectorgate.yaml` (project config)
    /// 3. `vectorgate.local.yaml` (local overrides, optional)
    /// 4. Environment variables (`VECTORGATE_*` prefix)
    pub fn load() -> Result<Settings> {
        let settings: Settings = Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Yaml::file("vectorgate.yaml"))
            .merge(Yaml::file("vectorgate.local.yaml"))
            .merge(Env::prefixed("VECTORGATE_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&settings)?;
        Ok(settings)
    }

    /// Load configuration from a specific file, for tests and one-offs.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Settings> {
        let settings: Settings = Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&settings)?;
        Ok(settings)
    }

    /// Validate settings after loading.
    ///
    /// Every model id referenced by the exact map, the pattern rules, or
    /// the default must exist in the registry; geometry and tuning values
    /// must be sane.
    pub fn validate(settings: &Settings) -> Result<(), ConfigError> {
        if settings.backend_url.trim().is_empty() {
            return Err(ConfigError::EmptyBackendUrl);
        }
        if settings.backend_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }

        if settings.models.is_empty() {
            return Err(ConfigError::EmptyRegistry);
        }

        let mut ids = HashSet::new();
        for model in &settings.models {
            if !ids.insert(model.model_id.as_str()) {
                return Err(ConfigError::DuplicateModel(model.model_id.clone()));
            }
            if model.dimensions == 0 {
                return Err(ConfigError::InvalidDimensions {
                    model_id: model.model_id.clone(),
                    dimensions: model.dimensions,
                });
            }
            if model.display_name.trim().is_empty() {
                return Err(ConfigError::EmptyDisplayName(model.model_id.clone()));
            }
        }

        if !ids.contains(settings.default_model_id.as_str()) {
            return Err(ConfigError::UnknownModel {
                referrer: "default_model_id".to_string(),
                model_id: settings.default_model_id.clone(),
            });
        }
        for (collection, model_id) in &settings.collection_model_map {
            if !ids.contains(model_id.as_str()) {
                return Err(ConfigError::UnknownModel {
                    referrer: format!("collection_model_map['{collection}']"),
                    model_id: model_id.clone(),
                });
            }
        }
        for rule in &settings.collection_pattern_map {
            if !ids.contains(rule.model_id.as_str()) {
                return Err(ConfigError::UnknownModel {
                    referrer: format!("collection_pattern_map['{}']", rule.pattern),
                    model_id: rule.model_id.clone(),
                });
            }
        }

        if settings.hnsw.ef_construct == 0 {
            return Err(ConfigError::InvalidEfConstruct);
        }
        if settings.hnsw.m == 0 {
            return Err(ConfigError::InvalidHnswM);
        }
        if settings.search.default_limit == 0 {
            return Err(ConfigError::InvalidSearchLimit);
        }
        if settings.search.default_threshold < 0.0 {
            return Err(ConfigError::InvalidSearchThreshold(
                settings.search.default_threshold,
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::settings::PatternMapping;

    #[test]
    fn test_default_settings_validate() {
        assert!(ConfigLoader::validate(&Settings::default()).is_ok());
    }

    #[test]
    fn test_unknown_default_model_rejected() {
        let settings = Settings {
            default_model_id: "no-such-model".to_string(),
            ..Settings::default()
        };
        let err = ConfigLoader::validate(&settings).unwrap_err();
        assert!(err.to_string().contains("no-such-model"));
    }

    #[test]
    fn test_unknown_pattern_model_rejected() {
        let mut settings = Settings::default();
        settings.collection_pattern_map.push(PatternMapping {
            pattern: "audit".to_string(),
            model_id: "missing".to_string(),
        });
        let err = ConfigLoader::validate(&settings).unwrap_err();
        assert!(err.to_string().contains("collection_pattern_map['audit']"));
    }

    #[test]
    fn test_duplicate_model_rejected() {
        let mut settings = Settings::default();
        let dup = settings.models[0].clone();
        settings.models.push(dup);
        assert!(matches!(
            ConfigLoader::validate(&settings),
            Err(ConfigError::DuplicateModel(_))
        ));
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let mut settings = Settings::default();
        settings.models[0].dimensions = 0;
        assert!(matches!(
            ConfigLoader::validate(&settings),
            Err(ConfigError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_load_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectorgate.yaml");
        std::fs::write(
            &path,
            "backend_url: http://qdrant.internal:6333\nhnsw:\n  ef_construct: 128\n",
        )
        .unwrap();

        let settings = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(settings.backend_url, "http://qdrant.internal:6333");
        assert_eq!(settings.hnsw.ef_construct, 128);
        // Untouched fields keep their defaults.
        assert_eq!(settings.hnsw.m, 16);
        assert_eq!(settings.models.len(), 3);
    }
}
