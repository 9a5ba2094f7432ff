//! Chroma backend implementation.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::ChromaConfig;
use super::wire::{
    Collection, CreateCollection, Delete, Get, GetResponse, Metadata, Query, QueryResponse,
    Upsert, scalar_metadata,
};
use crate::TRACING_TARGET;
use crate::error::{VectorError, VectorResult};
use crate::metric::DistanceMetric;
use crate::store::{MetadataFilter, QueryMatch, StoredRecord, VectorRecord, VectorStoreBackend};

const QUERY_INCLUDE: &[&str] = &["documents", "metadatas", "distances"];
const GET_INCLUDE: &[&str] = &["documents", "metadatas"];

/// Chroma backend bound to a single collection.
pub struct ChromaBackend {
    http: Client,
    config: ChromaConfig,
    collection_id: String,
}

impl ChromaBackend {
    /// Connects to Chroma and gets or creates the configured collection.
    pub async fn new(config: &ChromaConfig) -> VectorResult<Self> {
        config.validate()?;

        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| VectorError::connection(e.to_string()))?;

        let mut backend = Self {
            http,
            config: config.clone(),
            collection_id: String::new(),
        };

        backend.heartbeat().await?;
        let collection = backend.get_or_create_collection().await?;

        tracing::debug!(
            target: TRACING_TARGET,
            url = %config.base_url,
            collection = %collection.name,
            collection_id = %collection.id,
            "Connected to Chroma"
        );

        backend.warn_on_metric_drift(&collection);
        backend.collection_id = collection.id;
        Ok(backend)
    }

    /// Checks that the server answers.
    pub async fn heartbeat(&self) -> VectorResult<()> {
        let url = self.config.endpoint("api/v2/heartbeat")?;
        let response = self.http.get(url).send().await?;
        Self::check(response).await.map(drop)
    }

    async fn get_or_create_collection(&self) -> VectorResult<Collection> {
        let mut metadata = Metadata::new();
        metadata.insert(
            "hnsw:space".to_string(),
            Value::from(self.config.metric.chroma_space()),
        );

        let body = CreateCollection {
            name: &self.config.collection,
            metadata,
            get_or_create: true,
        };

        let url = self.config.collections_endpoint()?;
        let response = self.http.post(url).json(&body).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// An existing collection keeps the metric it was created with.
    fn warn_on_metric_drift(&self, collection: &Collection) {
        let existing = collection
            .metadata
            .as_ref()
            .and_then(|m| m.get("hnsw:space"))
            .and_then(Value::as_str);

        if let Some(space) = existing
            && space != self.config.metric.chroma_space()
        {
            tracing::warn!(
                target: TRACING_TARGET,
                collection = %collection.name,
                existing = %space,
                configured = %self.config.metric.chroma_space(),
                "Collection metric differs from configuration"
            );
        }
    }

    async fn post<B, R>(&self, action: &str, body: &B) -> VectorResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.config.collection_endpoint(&self.collection_id, action)?;
        let response = self.http.post(url).json(body).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn post_unit<B>(&self, action: &str, body: &B) -> VectorResult<()>
    where
        B: Serialize + ?Sized,
    {
        let url = self.config.collection_endpoint(&self.collection_id, action)?;
        let response = self.http.post(url).json(body).send().await?;
        Self::check(response).await.map(drop)
    }

    async fn get_where(&self, body: Get<'_>) -> VectorResult<Vec<StoredRecord>> {
        let response: GetResponse = self.post("get", &body).await?;
        Ok(response.into_records())
    }

    async fn delete_ids(&self, ids: &[String]) -> VectorResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.post_unit("delete", &Delete { ids }).await
    }

    /// Maps non-success statuses to errors, keeping the response body.
    async fn check(response: Response) -> VectorResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::error!(
            target: TRACING_TARGET,
            status = %status,
            body = %body,
            "Chroma request failed"
        );

        let message = format!("Chroma returned {status}: {body}");
        Err(match status {
            StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE => {
                VectorError::connection(message)
            }
            StatusCode::NOT_FOUND => VectorError::not_found(message),
            StatusCode::GATEWAY_TIMEOUT | StatusCode::REQUEST_TIMEOUT => {
                VectorError::timeout(message)
            }
            _ => VectorError::backend(message),
        })
    }
}

#[async_trait]
impl VectorStoreBackend for ChromaBackend {
    fn metric(&self) -> DistanceMetric {
        self.config.metric
    }

    async fn upsert(&self, records: Vec<VectorRecord>) -> VectorResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let body = Upsert {
            ids: records.iter().map(|r| r.id.as_str()).collect(),
            embeddings: records.iter().map(|r| r.vector.as_slice()).collect(),
            documents: records.iter().map(|r| r.document.as_str()).collect(),
            metadatas: records.iter().map(|r| scalar_metadata(&r.metadata)).collect(),
        };

        self.post_unit("upsert", &body).await?;

        tracing::debug!(
            target: TRACING_TARGET,
            collection = %self.config.collection,
            count = %records.len(),
            "Upserted records into Chroma"
        );

        Ok(())
    }

    async fn query(&self, vector: &[f32], limit: usize) -> VectorResult<Vec<QueryMatch>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        // Chroma rejects n_results larger than the collection.
        let available = self.count().await?;
        if available == 0 {
            return Ok(Vec::new());
        }

        let body = Query {
            query_embeddings: [vector],
            n_results: limit.min(available),
            include: QUERY_INCLUDE,
        };
        let response: QueryResponse = self.post("query", &body).await?;

        Ok(response.into_matches())
    }

    async fn get(&self, ids: &[String]) -> VectorResult<Vec<StoredRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        self.get_where(Get {
            ids: Some(ids),
            include: GET_INCLUDE,
            ..Default::default()
        })
        .await
    }

    async fn scan(&self, limit: Option<usize>) -> VectorResult<Vec<StoredRecord>> {
        self.get_where(Get {
            limit,
            include: GET_INCLUDE,
            ..Default::default()
        })
        .await
    }

    async fn delete(&self, ids: &[String]) -> VectorResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let existing: Vec<String> = self
            .get_where(Get {
                ids: Some(ids),
                ..Default::default()
            })
            .await?
            .into_iter()
            .map(|r| r.id)
            .collect();

        self.delete_ids(&existing).await?;
        Ok(existing.len())
    }

    async fn delete_where(&self, filter: &MetadataFilter) -> VectorResult<usize> {
        let matching: Vec<String> = self
            .get_where(Get {
                filter: Some(filter.to_chroma_where()),
                ..Default::default()
            })
            .await?
            .into_iter()
            .map(|r| r.id)
            .collect();

        self.delete_ids(&matching).await?;
        Ok(matching.len())
    }

    async fn count(&self) -> VectorResult<usize> {
        let url = self.config.collection_endpoint(&self.collection_id, "count")?;
        let response = self.http.get(url).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }
}

impl std::fmt::Debug for ChromaBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromaBackend")
            .field("url", &self.config.base_url.as_str())
            .field("collection", &self.config.collection)
            .field("collection_id", &self.collection_id)
            .finish()
    }
}
