//! Domain models for the gateway.

pub mod collection;
pub mod model;
pub mod point;
pub mod results;

pub use collection::{
    CollectionDetail, CollectionStatus, CollectionSummary, Quantization, ResolvedCollection,
    VectorSpec,
};
pub use model::{Distance, ModelDescriptor};
pub use point::{Payload, PointRecord, SearchHit};
pub use results::{
    BulkStoreResult, ChunkError, DeleteResult, EmbedderStatus, FindResult, MappingsReport,
    PatternRule, PointView, SearchParams, StoreResult, UpdateResult,
};
