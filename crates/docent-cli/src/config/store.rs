//! Vector store selection.

use clap::{Args, ValueEnum};
use docent_vector::{ChromaConfig, DistanceMetric, VectorStoreConfig};

use crate::TRACING_TARGET_CONFIG;

/// Vector store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    /// In-process store, emptied on exit.
    Memory,
    /// Chroma server.
    Chroma,
}

/// Vector store configuration.
#[derive(Debug, Clone, Args)]
pub struct StoreConfig {
    /// Vector store backend.
    #[arg(long = "vector-store", env = "VECTOR_STORE", value_enum, default_value_t = StoreKind::Memory)]
    pub vector_store: StoreKind,

    /// Chroma connection, used when the backend is `chroma`.
    #[clap(flatten)]
    pub chroma: ChromaConfig,
}

impl StoreConfig {
    /// Builds the backend configuration for a collection using `metric`.
    pub fn to_store_config(&self, metric: DistanceMetric) -> VectorStoreConfig {
        match self.vector_store {
            StoreKind::Memory => VectorStoreConfig::memory(metric),
            StoreKind::Chroma => VectorStoreConfig::Chroma(self.chroma.clone().with_metric(metric)),
        }
    }

    /// Logs store configuration.
    pub fn log(&self) {
        match self.vector_store {
            StoreKind::Memory => tracing::info!(
                target: TRACING_TARGET_CONFIG,
                backend = "memory",
                "Vector store configuration"
            ),
            StoreKind::Chroma => tracing::info!(
                target: TRACING_TARGET_CONFIG,
                backend = "chroma",
                url = %self.chroma.base_url,
                tenant = %self.chroma.tenant,
                database = %self.chroma.database,
                collection = %self.chroma.collection,
                "Vector store configuration"
            ),
        }
    }
}
