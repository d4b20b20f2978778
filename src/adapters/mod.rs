//! Adapters binding the gateway's ports to external systems.

pub mod embeddings;
pub mod mcp;
pub mod qdrant;
