//! Qdrant REST adapter.

pub mod client;
pub mod types;

pub use client::{QdrantConfig, QdrantHttpStore};
