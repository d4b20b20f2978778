//! Service layer: resolver, embedder pool, collection manager, gateway.

pub mod collection_manager;
pub mod embedder_pool;
pub mod gateway;
pub mod registry;

pub use collection_manager::CollectionManager;
pub use embedder_pool::EmbedderPool;
pub use gateway::SemanticGateway;
pub use registry::ModelRegistry;
