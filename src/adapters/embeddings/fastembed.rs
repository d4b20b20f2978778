//! ONNX embedding runtime via fastembed.
//!
//! Each embedder owns one `TextEmbedding` session. Construction negotiates
//! execution providers: with GPU enabled it tries CUDA with a CPU
//! fallback registered behind it; if that fails to build, it retries CPU
//! only. The negotiated list is recorded for observability.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};
use tracing::warn;

use crate::domain::errors::{GatewayError, GatewayResult};
use crate::domain::models::ModelDescriptor;
use crate::domain::ports::{EmbedderFactory, TextEmbedder};

/// Internal batch size handed to the ONNX session.
const RUNTIME_BATCH: usize = 256;

/// A loaded fastembed model implementing [`TextEmbedder`].
///
/// The ONNX session is not re-entrant, so calls serialize on a
/// per-embedder mutex; embedders for other models are unaffected. The
/// actual inference runs on the blocking thread pool.
pub struct FastembedEmbedder {
    model_id: String,
    dimensions: usize,
    active_providers: Vec<String>,
    session: Arc<Mutex<TextEmbedding>>,
}

impl FastembedEmbedder {
    fn embed_blocking(
        session: &Arc<Mutex<TextEmbedding>>,
        model_id: &str,
        texts: Vec<String>,
    ) -> GatewayResult<Vec<Vec<f32>>> {
        let mut session = session
            .lock()
            .map_err(|_| GatewayError::Internal("embedder session lock poisoned".to_string()))?;
        let count = texts.len();
        let embeddings = session.embed(texts, Some(RUNTIME_BATCH)).map_err(|e| {
            GatewayError::Internal(format!("embedding failed for model '{model_id}': {e}"))
        })?;
        if embeddings.len() != count {
            return Err(GatewayError::Internal(format!(
                "model '{model_id}' returned {} embeddings for {count} inputs",
                embeddings.len()
            )));
        }
        Ok(embeddings)
    }
}

#[async_trait]
impl TextEmbedder for FastembedEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn active_providers(&self) -> &[String] {
        &self.active_providers
    }

    async fn embed_documents(&self, texts: &[String]) -> GatewayResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let session = Arc::clone(&self.session);
        let model_id = self.model_id.clone();
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || Self::embed_blocking(&session, &model_id, texts))
            .await
            .map_err(|e| {
                if e.is_cancelled() {
                    GatewayError::Cancelled
                } else {
                    GatewayError::Internal(format!("embedding task panicked: {e}"))
                }
            })?
    }

    async fn embed_query(&self, text: &str) -> GatewayResult<Vec<f32>> {
        let mut vectors = self.embed_documents(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| GatewayError::Internal("empty embedding batch for query".to_string()))
    }
}

/// Builds [`FastembedEmbedder`]s with provider negotiation.
pub struct FastembedFactory {
    gpu_enabled: bool,
    cache_dir: Option<PathBuf>,
}

impl FastembedFactory {
    /// Creates a factory.
    ///
    /// `cache_dir` overrides where fastembed stores downloaded model
    /// files; `None` keeps the runtime's default.
    pub fn new(gpu_enabled: bool, cache_dir: Option<PathBuf>) -> Self {
        Self {
            gpu_enabled,
            cache_dir,
        }
    }

    fn runtime_model(model: &ModelDescriptor) -> GatewayResult<EmbeddingModel> {
        parse_runtime_model(&model.runtime_model).ok_or_else(|| GatewayError::EmbedderUnavailable {
            model_id: model.model_id.clone(),
            reason: format!("unsupported runtime model '{}'", model.runtime_model),
        })
    }

    fn init_options(&self, runtime_model: EmbeddingModel, with_cuda: bool) -> InitOptions {
        let mut providers = Vec::new();
        if with_cuda {
            providers.push(CUDAExecutionProvider::default().build());
        }
        providers.push(CPUExecutionProvider::default().build());

        let mut options = InitOptions::new(runtime_model)
            .with_execution_providers(providers)
            .with_show_download_progress(false);
        if let Some(dir) = &self.cache_dir {
            options = options.with_cache_dir(dir.clone());
        }
        options
    }

    fn build_blocking(
        &self,
        model: &ModelDescriptor,
    ) -> GatewayResult<(TextEmbedding, Vec<String>)> {
        let runtime_model = Self::runtime_model(model)?;

        if self.gpu_enabled {
            match TextEmbedding::try_new(self.init_options(runtime_model.clone(), true)) {
                Ok(session) => {
                    return Ok((
                        session,
                        vec![
                            "CUDAExecutionProvider".to_string(),
                            "CPUExecutionProvider".to_string(),
                        ],
                    ))
                }
                Err(e) => {
                    warn!(
                        model_id = %model.model_id,
                        error = %e,
                        "CUDA initialization failed, falling back to CPU"
                    );
                }
            }
        }

        let session = TextEmbedding::try_new(self.init_options(runtime_model, false)).map_err(
            |e| GatewayError::EmbedderUnavailable {
                model_id: model.model_id.clone(),
                reason: e.to_string(),
            },
        )?;
        Ok((session, vec!["CPUExecutionProvider".to_string()]))
    }
}

#[async_trait]
impl EmbedderFactory for FastembedFactory {
    async fn create(&self, model: &ModelDescriptor) -> GatewayResult<Arc<dyn TextEmbedder>> {
        let factory = Self {
            gpu_enabled: self.gpu_enabled,
            cache_dir: self.cache_dir.clone(),
        };
        let descriptor = model.clone();
        let (session, active_providers) =
            tokio::task::spawn_blocking(move || factory.build_blocking(&descriptor))
                .await
                .map_err(|e| {
                    GatewayError::Internal(format!("embedder construction panicked: {e}"))
                })??;

        Ok(Arc::new(FastembedEmbedder {
            model_id: model.model_id.clone(),
            dimensions: model.dimensions,
            active_providers,
            session: Arc::new(Mutex::new(session)),
        }))
    }
}

/// Maps a configured runtime-model identifier onto fastembed's model set.
///
/// Accepts the HuggingFace repo form (`BAAI/bge-large-en-v1.5`) and a few
/// bare aliases so configs can copy names straight from model cards.
fn parse_runtime_model(id: &str) -> Option<EmbeddingModel> {
    let bare = id.trim().rsplit('/').next()?.to_ascii_lowercase();
    match bare.as_str() {
        "all-minilm-l6-v2" => Some(EmbeddingModel::AllMiniLML6V2),
        "all-minilm-l12-v2" => Some(EmbeddingModel::AllMiniLML12V2),
        "bge-small-en-v1.5" | "bge-small-en-v1-5" => Some(EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" | "bge-base-en-v1-5" => Some(EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" | "bge-large-en-v1-5" => Some(EmbeddingModel::BGELargeENV15),
        "nomic-embed-text-v1.5" => Some(EmbeddingModel::NomicEmbedTextV15),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_runtime_model_accepts_repo_form() {
        assert_eq!(
            parse_runtime_model("BAAI/bge-large-en-v1.5"),
            Some(EmbeddingModel::BGELargeENV15)
        );
        assert_eq!(
            parse_runtime_model("sentence-transformers/all-MiniLM-L6-v2"),
            Some(EmbeddingModel::AllMiniLML6V2)
        );
    }

    #[test]
    fn test_parse_runtime_model_accepts_bare_alias() {
        assert_eq!(
            parse_runtime_model("bge-base-en-v1.5"),
            Some(EmbeddingModel::BGEBaseENV15)
        );
    }

    #[test]
    fn test_parse_runtime_model_rejects_unknown() {
        assert_eq!(parse_runtime_model("acme/imaginary-embedder"), None);
        assert_eq!(parse_runtime_model(""), None);
    }
}
