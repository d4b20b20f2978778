//! Lazy, thread-safe cache of embedding runtimes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::domain::errors::{GatewayError, GatewayResult};
use crate::domain::models::{EmbedderStatus, ModelDescriptor};
use crate::domain::ports::{EmbedderFactory, TextEmbedder};

/// Outcome of the one construction attempt for a model id.
#[derive(Clone)]
enum Slot {
    Ready(Arc<dyn TextEmbedder>),
    Failed(String),
}

/// One embedder instance per model id, constructed on first demand.
///
/// The map lock is held only to fetch the per-key cell, so requests for
/// different model ids never block each other; the cell serializes
/// construction for one model id and every concurrent caller receives the
/// same instance. A construction failure (after the adapter's CPU
/// fallback) is memoized: later calls fail fast instead of re-loading the
/// model on every request.
pub struct EmbedderPool {
    factory: Arc<dyn EmbedderFactory>,
    cells: Mutex<HashMap<String, Arc<OnceCell<Slot>>>>,
}

impl EmbedderPool {
    /// Creates an empty pool over `factory`.
    pub fn new(factory: Arc<dyn EmbedderFactory>) -> Self {
        Self {
            factory,
            cells: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the pool's embedder for `model`, constructing it on first
    /// call.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::EmbedderUnavailable`] when construction
    /// failed, now or on an earlier call.
    pub async fn get(&self, model: &ModelDescriptor) -> GatewayResult<Arc<dyn TextEmbedder>> {
        let cell = {
            let mut cells = self.cells.lock().map_err(|_| {
                GatewayError::Internal("embedder pool lock poisoned".to_string())
            })?;
            cells
                .entry(model.model_id.clone())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let slot = cell
            .get_or_init(|| async {
                info!(model_id = %model.model_id, "constructing embedder");
                match self.factory.create(model).await {
                    Ok(embedder) => {
                        info!(
                            model_id = %model.model_id,
                            providers = ?embedder.active_providers(),
                            "embedder ready"
                        );
                        Slot::Ready(embedder)
                    }
                    Err(e) => {
                        warn!(model_id = %model.model_id, error = %e, "embedder construction failed");
                        Slot::Failed(e.to_string())
                    }
                }
            })
            .await;

        match slot {
            Slot::Ready(embedder) => Ok(Arc::clone(embedder)),
            Slot::Failed(reason) => Err(GatewayError::EmbedderUnavailable {
                model_id: model.model_id.clone(),
                reason: reason.clone(),
            }),
        }
    }

    /// Execution providers of every embedder instantiated so far.
    pub fn statuses(&self) -> Vec<EmbedderStatus> {
        let cells = match self.cells.lock() {
            Ok(cells) => cells,
            Err(_) => return Vec::new(),
        };
        let mut statuses: Vec<_> = cells
            .iter()
            .filter_map(|(model_id, cell)| match cell.get() {
                Some(Slot::Ready(embedder)) => Some(EmbedderStatus {
                    model_id: model_id.clone(),
                    active_providers: embedder.active_providers().to_vec(),
                }),
                _ => None,
            })
            .collect();
        statuses.sort_by(|a, b| a.model_id.cmp(&b.model_id));
        statuses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubEmbedder {
        model_id: String,
        providers: Vec<String>,
    }

    #[async_trait]
    impl TextEmbedder for StubEmbedder {
        fn model_id(&self) -> &str {
            &self.model_id
        }

        fn dimensions(&self) -> usize {
            8
        }

        fn active_providers(&self) -> &[String] {
            &self.providers
        }

        async fn embed_documents(&self, texts: &[String]) -> GatewayResult<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.0; 8]).collect())
        }

        async fn embed_query(&self, _text: &str) -> GatewayResult<Vec<f32>> {
            Ok(vec![0.0; 8])
        }
    }

    struct CountingFactory {
        constructions: AtomicUsize,
        fail_model: Option<String>,
    }

    #[async_trait]
    impl EmbedderFactory for CountingFactory {
        async fn create(
            &self,
            model: &ModelDescriptor,
        ) -> GatewayResult<Arc<dyn TextEmbedder>> {
            self.constructions.fetch_add(1, Ordering::SeqCst);
            // Yield so racing get() calls overlap the construction window.
            tokio::task::yield_now().await;
            if self.fail_model.as_deref() == Some(model.model_id.as_str()) {
                return Err(GatewayError::EmbedderUnavailable {
                    model_id: model.model_id.clone(),
                    reason: "no providers".to_string(),
                });
            }
            Ok(Arc::new(StubEmbedder {
                model_id: model.model_id.clone(),
                providers: vec!["CPUExecutionProvider".to_string()],
            }))
        }
    }

    fn descriptor(model_id: &str) -> ModelDescriptor {
        ModelDescriptor {
            model_id: model_id.to_string(),
            display_name: model_id.to_string(),
            dimensions: 8,
            distance: Default::default(),
            description: String::new(),
            runtime_model: model_id.to_string(),
        }
    }

    #[tokio::test]
    async fn test_concurrent_get_constructs_once() {
        let factory = Arc::new(CountingFactory {
            constructions: AtomicUsize::new(0),
            fail_model: None,
        });
        let pool = Arc::new(EmbedderPool::new(factory.clone()));
        let model = descriptor("m1");

        let mut handles = Vec::new();
        for _ in 0..16 {
            let pool = Arc::clone(&pool);
            let model = model.clone();
            handles.push(tokio::spawn(async move { pool.get(&model).await }));
        }

        let mut instances = Vec::new();
        for handle in handles {
            instances.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(factory.constructions.load(Ordering::SeqCst), 1);
        // All callers observe the same instance.
        for pair in instances.windows(2) {
            assert!(Arc::ptr_eq(&pair[0], &pair[1]));
        }
    }

    #[tokio::test]
    async fn test_failure_is_memoized() {
        let factory = Arc::new(CountingFactory {
            constructions: AtomicUsize::new(0),
            fail_model: Some("bad".to_string()),
        });
        let pool = EmbedderPool::new(factory.clone());
        let model = descriptor("bad");

        for _ in 0..3 {
            let err = pool.get(&model).await.unwrap_err();
            assert!(matches!(err, GatewayError::EmbedderUnavailable { .. }));
        }
        // One attempt only; no thrashing.
        assert_eq!(factory.constructions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_distinct_models_get_distinct_instances() {
        let factory = Arc::new(CountingFactory {
            constructions: AtomicUsize::new(0),
            fail_model: None,
        });
        let pool = EmbedderPool::new(factory.clone());

        let a = pool.get(&descriptor("a")).await.unwrap();
        let b = pool.get(&descriptor("b")).await.unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(factory.constructions.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_statuses_report_ready_embedders() {
        let factory = Arc::new(CountingFactory {
            constructions: AtomicUsize::new(0),
            fail_model: Some("bad".to_string()),
        });
        let pool = EmbedderPool::new(factory);
        pool.get(&descriptor("a")).await.unwrap();
        let _ = pool.get(&descriptor("bad")).await;

        let statuses = pool.statuses();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].model_id, "a");
        assert_eq!(statuses[0].active_providers, vec!["CPUExecutionProvider"]);
    }
}
