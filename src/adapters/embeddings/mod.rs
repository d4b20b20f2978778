//! Embedding runtime adapters.

pub mod fastembed;

pub use fastembed::{FastembedEmbedder, FastembedFactory};
