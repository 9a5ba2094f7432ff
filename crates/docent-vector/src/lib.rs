#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod chroma;
pub mod memory;

mod config;
mod error;
mod metric;
mod store;

pub use config::{ChromaConfig, VectorStoreConfig};
pub use error::{VectorError, VectorResult};
pub use metric::DistanceMetric;
pub use store::{
    MetadataFilter, QueryMatch, StoredRecord, VectorRecord, VectorStore, VectorStoreBackend,
};

/// Tracing target for vector store operations.
pub const TRACING_TARGET: &str = "docent_vector";
