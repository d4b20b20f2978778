//! Configuration loading and validation.

pub mod loader;
pub mod settings;

pub use loader::{ConfigError, ConfigLoader};
pub use settings::{HnswSettings, HttpSettings, PatternMapping, SearchSettings, Settings};
