//! Collection provisioning and geometry verification.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::domain::errors::{GatewayError, GatewayResult};
use crate::domain::models::{ModelDescriptor, ResolvedCollection, VectorSpec};
use crate::domain::ports::{CollectionInfo, VectorStore};
use crate::infrastructure::config::Settings;
use crate::services::registry::ModelRegistry;

/// Precision floor for collections whose name contains "legal".
const LEGAL_EF_CONSTRUCT_FLOOR: usize = 200;
/// Graph-connectivity floor for legal collections.
const LEGAL_M_FLOOR: usize = 16;
/// Speed cap for technical collections ("solutions", "patterns").
const TECHNICAL_EF_CONSTRUCT_CAP: usize = 100;
/// Graph-connectivity cap for technical collections.
const TECHNICAL_M_CAP: usize = 8;

/// HNSW parameters for a collection, adjusted by purpose.
///
/// Legal collections are held to a precision floor; solutions/patterns
/// collections are capped for speed. Matching is case-insensitive on the
/// collection name; everything else keeps the configured values.
fn hnsw_for_collection(collection: &str, ef_construct: usize, m: usize) -> (usize, usize) {
    let name = collection.to_ascii_lowercase();
    if name.contains("legal") {
        (
            ef_construct.max(LEGAL_EF_CONSTRUCT_FLOOR),
            m.max(LEGAL_M_FLOOR),
        )
    } else if name.contains("solutions") || name.contains("patterns") {
        (
            ef_construct.min(TECHNICAL_EF_CONSTRUCT_CAP),
            m.min(TECHNICAL_M_CAP),
        )
    } else {
        (ef_construct, m)
    }
}

/// Per-collection lifecycle within this process.
#[derive(Debug, Clone)]
enum CollectionState {
    Unknown,
    Ready(ResolvedCollection),
    /// Geometry conflict; terminal until an operator intervenes. Every
    /// later operation fails fast without calling the backend.
    Mismatched {
        existing: String,
        resolved: String,
    },
}

/// Makes backend collections ready for use under their resolved models.
///
/// `ensure` is serialized per collection name and memoized for the process
/// lifetime; concurrent calls for different collections proceed in
/// parallel. N racing requesters produce exactly one create attempt.
pub struct CollectionManager {
    store: Arc<dyn VectorStore>,
    registry: Arc<ModelRegistry>,
    auto_create: bool,
    enable_quantization: bool,
    hnsw_ef_construct: usize,
    hnsw_m: usize,
    states: Mutex<HashMap<String, Arc<tokio::sync::Mutex<CollectionState>>>>,
}

impl CollectionManager {
    /// Creates a manager over `store` using `registry` for resolution.
    pub fn new(store: Arc<dyn VectorStore>, registry: Arc<ModelRegistry>, settings: &Settings) -> Self {
        Self {
            store,
            registry,
            auto_create: settings.auto_create_collections,
            enable_quantization: settings.enable_quantization,
            hnsw_ef_construct: settings.hnsw.ef_construct,
            hnsw_m: settings.hnsw.m,
            states: Mutex::new(HashMap::new()),
        }
    }

    fn state_cell(&self, collection: &str) -> GatewayResult<Arc<tokio::sync::Mutex<CollectionState>>> {
        let mut states = self
            .states
            .lock()
            .map_err(|_| GatewayError::Internal("collection state lock poisoned".to_string()))?;
        Ok(states
            .entry(collection.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(CollectionState::Unknown)))
            .clone())
    }

    /// Ensures `collection` exists with geometry matching its resolved
    /// model, creating it when permitted.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::ModelMismatch`] when an existing collection's
    ///   named vector disagrees with the resolved model. No migration is
    ///   attempted.
    /// - [`GatewayError::NoSuchCollection`] when the collection is absent
    ///   and auto-create is disabled.
    pub async fn ensure(&self, collection: &str) -> GatewayResult<ResolvedCollection> {
        let cell = self.state_cell(collection)?;
        let mut state = cell.lock().await;

        match &*state {
            CollectionState::Ready(resolved) => return Ok(resolved.clone()),
            CollectionState::Mismatched { existing, resolved } => {
                return Err(GatewayError::ModelMismatch {
                    collection: collection.to_string(),
                    existing: existing.clone(),
                    resolved: resolved.clone(),
                })
            }
            CollectionState::Unknown => {}
        }

        let model = self.registry.resolve(collection).clone();
        let resolved = if self.store.collection_exists(collection).await? {
            let info = self.store.get_collection(collection).await?;
            self.verify_geometry(collection, &model, &info, &mut state)?
        } else if self.auto_create {
            self.create(collection, &model, &mut state).await?
        } else {
            return Err(GatewayError::NoSuchCollection(collection.to_string()));
        };

        Ok(resolved)
    }

    /// Verifies an existing collection without ever creating it.
    ///
    /// Returns `None` when the collection does not exist; read paths turn
    /// that into an empty result rather than an error.
    pub async fn lookup(&self, collection: &str) -> GatewayResult<Option<ResolvedCollection>> {
        let cell = self.state_cell(collection)?;
        let mut state = cell.lock().await;

        match &*state {
            CollectionState::Ready(resolved) => return Ok(Some(resolved.clone())),
            CollectionState::Mismatched { existing, resolved } => {
                return Err(GatewayError::ModelMismatch {
                    collection: collection.to_string(),
                    existing: existing.clone(),
                    resolved: resolved.clone(),
                })
            }
            CollectionState::Unknown => {}
        }

        if !self.store.collection_exists(collection).await? {
            return Ok(None);
        }
        let model = self.registry.resolve(collection).clone();
        let info = self.store.get_collection(collection).await?;
        let resolved = self.verify_geometry(collection, &model, &info, &mut state)?;
        Ok(Some(resolved))
    }

    async fn create(
        &self,
        collection: &str,
        model: &ModelDescriptor,
        state: &mut CollectionState,
    ) -> GatewayResult<ResolvedCollection> {
        let (ef_construct, m) =
            hnsw_for_collection(collection, self.hnsw_ef_construct, self.hnsw_m);
        let spec = VectorSpec::for_model(model, ef_construct, m, self.enable_quantization);
        info!(
            collection,
            vector_name = %spec.vector_name,
            size = spec.size,
            quantization = ?spec.quantization,
            "creating collection"
        );

        match self.store.create_collection(collection, &spec).await {
            Ok(()) => {}
            Err(e) => {
                // An external writer may have won the race; re-read and
                // verify instead of failing.
                if self.store.collection_exists(collection).await? {
                    debug!(collection, "create raced with another writer");
                } else {
                    return Err(e);
                }
            }
        }

        let info = self.store.get_collection(collection).await?;
        self.verify_geometry(collection, model, &info, state)
    }

    fn verify_geometry(
        &self,
        collection: &str,
        model: &ModelDescriptor,
        info: &CollectionInfo,
        state: &mut CollectionState,
    ) -> GatewayResult<ResolvedCollection> {
        let expected = model.vector_name();
        let matched = info
            .vectors
            .iter()
            .find(|(name, _, _)| *name == expected)
            .filter(|(_, size, distance)| *size == model.dimensions && *distance == model.distance);

        if let Some((vector_name, _, _)) = matched {
            let resolved = ResolvedCollection {
                name: collection.to_string(),
                vector_name: vector_name.clone(),
                model: model.clone(),
            };
            *state = CollectionState::Ready(resolved.clone());
            return Ok(resolved);
        }

        let existing = info
            .vectors
            .first()
            .map(|(name, size, _)| format!("{name} ({size} dims)"))
            .unwrap_or_else(|| "<no named vector>".to_string());
        warn!(
            collection,
            existing = %existing,
            resolved = %expected,
            "collection geometry disagrees with resolved model"
        );
        *state = CollectionState::Mismatched {
            existing: existing.clone(),
            resolved: expected.clone(),
        };
        Err(GatewayError::ModelMismatch {
            collection: collection.to_string(),
            existing,
            resolved: expected,
        })
    }
}
