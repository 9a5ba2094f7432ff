//! Ollama embedding provider.

use std::sync::Arc;

use async_trait::async_trait;
use rig::client::Nothing;
use rig::embeddings::{EmbeddingError, EmbeddingModel};
use rig::providers::ollama;

use super::Embedder;
use crate::{Error, Result, TRACING_TARGET_PROVIDER as TRACING_TARGET};

/// Embedding provider backed by an Ollama server.
///
/// This is a cheaply cloneable wrapper around an `Arc`.
#[derive(Clone)]
pub struct EmbeddingProvider(Arc<EmbeddingService>);

struct EmbeddingService {
    model: ollama::EmbeddingModel<reqwest::Client>,
    model_name: String,
    ndims: usize,
}

impl EmbeddingProvider {
    /// Creates a new Ollama embedding provider.
    pub fn ollama(base_url: &str, model: &str, ndims: usize) -> Result<Self> {
        if ndims == 0 {
            return Err(Error::config("embedding dimensions must be greater than 0"));
        }

        let client = ollama::Client::builder()
            .api_key(Nothing)
            .base_url(base_url)
            .build()
            .map_err(|e| Error::config(format!("invalid Ollama client: {e}")))?;

        Ok(Self(Arc::new(EmbeddingService {
            model: ollama::EmbeddingModel::new(client, model, ndims),
            model_name: model.to_string(),
            ndims,
        })))
    }

    /// Returns the model name.
    pub fn model_name(&self) -> &str {
        &self.0.model_name
    }
}

/// Transport failures mean the service is unreachable; everything else is
/// reported against the input.
fn map_embedding_error(err: EmbeddingError) -> Error {
    match err {
        EmbeddingError::HttpError(_) => Error::upstream("embedder", err),
        other => Error::embedding(other),
    }
}

#[async_trait]
impl Embedder for EmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embedding = self
            .0
            .model
            .embed_text(text)
            .await
            .map_err(map_embedding_error)?;

        if embedding.vec.len() != self.0.ndims {
            return Err(Error::embedding(format!(
                "expected {} dimensions, got {}",
                self.0.ndims,
                embedding.vec.len()
            )));
        }

        tracing::trace!(
            target: TRACING_TARGET,
            model = %self.0.model_name,
            characters = %text.len(),
            "Embedded text"
        );

        Ok(embedding.vec.into_iter().map(|v| v as f32).collect())
    }

    fn dimensions(&self) -> usize {
        self.0.ndims
    }
}

impl std::fmt::Debug for EmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingProvider::Ollama")
            .field("model", &self.0.model_name)
            .field("ndims", &self.0.ndims)
            .finish()
    }
}
