//! Embedding and language-model provider configuration.

use std::sync::Arc;

use anyhow::Context;
use clap::{Args, ValueEnum};
use docent_rig::provider::{CompletionProvider, Embedder, EmbeddingProvider, LanguageModel};

use crate::TRACING_TARGET_CONFIG;

/// Completion backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AiProvider {
    /// Local Ollama server.
    Ollama,
    /// Google Gemini API.
    Gemini,
}

/// Provider configuration.
///
/// Embeddings always come from Ollama; completions come from the selected
/// [`AiProvider`].
#[derive(Debug, Clone, Args)]
pub struct ProviderConfig {
    /// Completion backend.
    #[arg(long = "ai-provider", env = "AI_PROVIDER", value_enum, default_value_t = AiProvider::Ollama)]
    pub ai_provider: AiProvider,

    /// Ollama server URL.
    #[arg(long = "ollama-base-url", env = "OLLAMA_BASE_URL", default_value = "http://localhost:11434")]
    pub ollama_base_url: String,

    /// Ollama completion model.
    #[arg(long = "ollama-model", env = "OLLAMA_MODEL", default_value = "granite3.3:8b")]
    pub ollama_model: String,

    /// Ollama embedding model.
    #[arg(long = "ollama-embedding-model", env = "OLLAMA_EMBEDDING_MODEL", default_value = "all-minilm")]
    pub ollama_embedding_model: String,

    /// Dimensions of the embedding model's vectors.
    #[arg(long = "embedding-dimensions", env = "EMBEDDING_DIMENSIONS", default_value_t = 384)]
    pub embedding_dimensions: usize,

    /// Gemini API key, required when the provider is `gemini`.
    #[arg(long = "gemini-api-key", env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    /// Gemini completion model.
    #[arg(long = "gemini-model", env = "GEMINI_MODEL", default_value = "gemini-2.0-flash")]
    pub gemini_model: String,
}

impl ProviderConfig {
    /// Validates provider settings that clap cannot check.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.ai_provider == AiProvider::Gemini
            && self.gemini_api_key.as_deref().is_none_or(|key| key.trim().is_empty())
        {
            anyhow::bail!("GEMINI_API_KEY is required when AI_PROVIDER is gemini");
        }
        if self.embedding_dimensions == 0 {
            anyhow::bail!("EMBEDDING_DIMENSIONS must be greater than 0");
        }
        Ok(())
    }

    /// Creates the embedder.
    pub fn create_embedder(&self) -> anyhow::Result<Arc<dyn Embedder>> {
        let provider = EmbeddingProvider::ollama(
            &self.ollama_base_url,
            &self.ollama_embedding_model,
            self.embedding_dimensions,
        )
        .context("failed to create Ollama embedding provider")?;
        Ok(Arc::new(provider))
    }

    /// Creates the completion model.
    pub fn create_language_model(&self) -> anyhow::Result<Arc<dyn LanguageModel>> {
        let provider = match self.ai_provider {
            AiProvider::Ollama => {
                CompletionProvider::ollama(&self.ollama_base_url, &self.ollama_model)
                    .context("failed to create Ollama completion provider")?
            }
            AiProvider::Gemini => {
                let api_key = self.gemini_api_key.as_deref().unwrap_or_default();
                CompletionProvider::gemini(api_key, &self.gemini_model)
                    .context("failed to create Gemini completion provider")?
            }
        };

        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            provider = %provider.provider_name(),
            model = %provider.model_name(),
            "Language model configured"
        );

        Ok(Arc::new(provider))
    }

    /// Logs provider configuration (no secrets).
    pub fn log(&self) {
        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            ai_provider = ?self.ai_provider,
            ollama_base_url = %self.ollama_base_url,
            embedding_model = %self.ollama_embedding_model,
            embedding_dimensions = self.embedding_dimensions,
            gemini_api_key_set = self.gemini_api_key.is_some(),
            "Provider configuration"
        );
    }
}
