//! Vectorgate - collection-aware embedding and semantic-search gateway.
//!
//! Routes natural-language documents to per-collection embedding models,
//! provisions Qdrant collections with matching vector geometry, and exposes
//! store/search/update/delete operations over MCP stdio and HTTP transports.

pub mod adapters;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::{GatewayError, GatewayResult};
pub use infrastructure::config::{ConfigError, ConfigLoader, Settings};
pub use services::SemanticGateway;
