//! Vector store configuration types.

use serde::{Deserialize, Serialize};

pub use crate::chroma::ChromaConfig;
use crate::metric::DistanceMetric;

/// Vector store backend configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum VectorStoreConfig {
    /// In-process brute-force store.
    Memory {
        /// Distance metric of the collection.
        #[serde(default)]
        metric: DistanceMetric,
    },
    /// Chroma vector database.
    Chroma(ChromaConfig),
}

impl VectorStoreConfig {
    /// Creates an in-memory store configuration.
    pub fn memory(metric: DistanceMetric) -> Self {
        Self::Memory { metric }
    }

    /// Returns the backend name as a static string.
    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Memory { .. } => "memory",
            Self::Chroma(_) => "chroma",
        }
    }

    /// Returns the distance metric the collection is created with.
    pub fn metric(&self) -> DistanceMetric {
        match self {
            Self::Memory { metric } => *metric,
            Self::Chroma(cfg) => cfg.metric,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_name_and_metric() {
        let memory = VectorStoreConfig::memory(DistanceMetric::SquaredL2);
        assert_eq!(memory.backend_name(), "memory");
        assert_eq!(memory.metric(), DistanceMetric::SquaredL2);

        let chroma = VectorStoreConfig::Chroma(ChromaConfig::default());
        assert_eq!(chroma.backend_name(), "chroma");
        assert_eq!(chroma.metric(), DistanceMetric::Cosine);
    }

    #[test]
    fn deserialize_tagged() {
        let config: VectorStoreConfig =
            serde_json::from_str(r#"{ "type": "memory", "metric": "squared_l2" }"#).unwrap();
        assert_eq!(config, VectorStoreConfig::memory(DistanceMetric::SquaredL2));
    }
}
