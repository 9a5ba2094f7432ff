//! Chroma vector store backend.
//!
//! Talks to a Chroma server over its v2 REST API. The collection is looked up
//! or created once at construction, with its `hnsw:space` set from the
//! configured [`DistanceMetric`](crate::DistanceMetric).

mod backend;
mod config;
mod wire;

pub use backend::ChromaBackend;
pub use config::ChromaConfig;
