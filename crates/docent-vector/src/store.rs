//! Vector store trait and the unified store handle.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::TRACING_TARGET;
use crate::chroma::ChromaBackend;
use crate::config::VectorStoreConfig;
use crate::error::VectorResult;
use crate::memory::MemoryBackend;
use crate::metric::DistanceMetric;

/// A record to be written to the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Unique identifier for the record.
    pub id: String,
    /// The embedding vector.
    pub vector: Vec<f32>,
    /// The stored text.
    pub document: String,
    /// Scalar metadata.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl VectorRecord {
    /// Creates a new record with an ID, embedding and text.
    pub fn new(id: impl Into<String>, vector: Vec<f32>, document: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            vector,
            document: document.into(),
            metadata: HashMap::new(),
        }
    }

    /// Replaces the record metadata.
    pub fn with_metadata(
        mut self,
        metadata: impl IntoIterator<Item = (impl Into<String>, serde_json::Value)>,
    ) -> Self {
        self.metadata = metadata.into_iter().map(|(k, v)| (k.into(), v)).collect();
        self
    }

    /// Adds a single metadata field.
    pub fn with_field(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// A stored record, without its vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Record ID.
    pub id: String,
    /// The stored text.
    pub document: String,
    /// Scalar metadata.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// A nearest-neighbour match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMatch {
    /// Record ID.
    pub id: String,
    /// The stored text.
    pub document: String,
    /// Scalar metadata.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// Raw distance under the store's metric (lower is closer).
    pub distance: f64,
}

/// Metadata predicate used for bulk deletion.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataFilter {
    /// Matches records whose `key` equals `value`.
    Eq {
        key: String,
        value: serde_json::Value,
    },
}

impl MetadataFilter {
    /// Creates an equality filter.
    pub fn eq(key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self::Eq {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Evaluates the filter against record metadata.
    pub fn matches(&self, metadata: &HashMap<String, serde_json::Value>) -> bool {
        match self {
            Self::Eq { key, value } => metadata.get(key) == Some(value),
        }
    }

    /// Renders the filter as a Chroma `where` clause.
    pub fn to_chroma_where(&self) -> serde_json::Value {
        match self {
            Self::Eq { key, value } => {
                let mut clause = serde_json::Map::new();
                clause.insert(key.clone(), serde_json::json!({ "$eq": value }));
                serde_json::Value::Object(clause)
            }
        }
    }
}

/// Trait for vector store backends.
///
/// A backend is bound to a single collection whose distance metric is fixed
/// at creation time. Implementations must be safe to share across tasks;
/// callers take no locks around them.
#[async_trait]
pub trait VectorStoreBackend: Send + Sync {
    /// Returns the distance metric of the collection.
    fn metric(&self) -> DistanceMetric;

    /// Inserts or replaces records by ID.
    async fn upsert(&self, records: Vec<VectorRecord>) -> VectorResult<()>;

    /// Returns up to `limit` records nearest to `vector`, nearest first.
    async fn query(&self, vector: &[f32], limit: usize) -> VectorResult<Vec<QueryMatch>>;

    /// Gets records by their IDs. Unknown IDs are skipped.
    async fn get(&self, ids: &[String]) -> VectorResult<Vec<StoredRecord>>;

    /// Returns stored records in insertion order, up to `limit` if given.
    async fn scan(&self, limit: Option<usize>) -> VectorResult<Vec<StoredRecord>>;

    /// Deletes records by their IDs and returns how many existed.
    async fn delete(&self, ids: &[String]) -> VectorResult<usize>;

    /// Deletes every record matching the filter and returns how many matched.
    async fn delete_where(&self, filter: &MetadataFilter) -> VectorResult<usize>;

    /// Returns the number of stored records.
    async fn count(&self) -> VectorResult<usize>;
}

/// Unified vector store that wraps a backend implementation.
///
/// Cheap to clone; clones share the same backend.
#[derive(Clone)]
pub struct VectorStore {
    backend: Arc<dyn VectorStoreBackend>,
    backend_name: &'static str,
}

impl VectorStore {
    /// Creates a new vector store from configuration.
    pub async fn new(config: VectorStoreConfig) -> VectorResult<Self> {
        let backend: Arc<dyn VectorStoreBackend> = match &config {
            VectorStoreConfig::Memory { metric } => Arc::new(MemoryBackend::new(*metric)),
            VectorStoreConfig::Chroma(cfg) => Arc::new(ChromaBackend::new(cfg).await?),
        };

        tracing::info!(
            target: TRACING_TARGET,
            backend = %config.backend_name(),
            metric = %backend.metric(),
            "Vector store initialized"
        );

        Ok(Self {
            backend,
            backend_name: config.backend_name(),
        })
    }

    /// Wraps an already constructed backend.
    pub fn from_backend(backend: impl VectorStoreBackend + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
            backend_name: "custom",
        }
    }

    /// Returns the backend name.
    pub fn backend_name(&self) -> &'static str {
        self.backend_name
    }

    /// Returns the distance metric of the collection.
    pub fn metric(&self) -> DistanceMetric {
        self.backend.metric()
    }

    /// Inserts or replaces records by ID.
    pub async fn upsert(&self, records: Vec<VectorRecord>) -> VectorResult<()> {
        tracing::debug!(
            target: TRACING_TARGET,
            count = %records.len(),
            "Upserting vectors"
        );
        self.backend.upsert(records).await
    }

    /// Returns up to `limit` records nearest to `vector`, nearest first.
    pub async fn query(&self, vector: &[f32], limit: usize) -> VectorResult<Vec<QueryMatch>> {
        tracing::debug!(
            target: TRACING_TARGET,
            limit = %limit,
            dimensions = %vector.len(),
            "Querying vectors"
        );
        self.backend.query(vector, limit).await
    }

    /// Gets records by their IDs.
    pub async fn get(&self, ids: &[String]) -> VectorResult<Vec<StoredRecord>> {
        self.backend.get(ids).await
    }

    /// Returns stored records, up to `limit` if given.
    pub async fn scan(&self, limit: Option<usize>) -> VectorResult<Vec<StoredRecord>> {
        self.backend.scan(limit).await
    }

    /// Deletes records by their IDs.
    pub async fn delete(&self, ids: &[String]) -> VectorResult<usize> {
        tracing::debug!(
            target: TRACING_TARGET,
            count = %ids.len(),
            "Deleting vectors"
        );
        self.backend.delete(ids).await
    }

    /// Deletes every record matching the filter.
    pub async fn delete_where(&self, filter: &MetadataFilter) -> VectorResult<usize> {
        tracing::debug!(
            target: TRACING_TARGET,
            filter = ?filter,
            "Deleting vectors by filter"
        );
        self.backend.delete_where(filter).await
    }

    /// Returns the number of stored records.
    pub async fn count(&self) -> VectorResult<usize> {
        self.backend.count().await
    }
}

impl std::fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("backend", &self.backend_name)
            .field("metric", &self.backend.metric())
            .finish()
    }
}
