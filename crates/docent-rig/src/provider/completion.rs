//! Completion provider backed by rig-core.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use rig::client::Nothing;
use rig::completion::{AssistantContent, CompletionError, CompletionModel as RigCompletionModel};
use rig::one_or_many::OneOrMany;
use rig::prelude::CompletionClient;
use rig::providers::{gemini, ollama};
use rig::streaming::StreamedAssistantContent;

use super::{FragmentStream, LanguageModel};
use crate::{Error, Result, TRACING_TARGET_PROVIDER as TRACING_TARGET};

/// Sampling parameters sent with every request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    /// Sampling temperature.
    pub temperature: f64,
    /// Upper bound on generated tokens.
    pub max_tokens: u64,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_tokens: 500,
        }
    }
}

/// Completion provider that wraps the supported rig completion models.
///
/// This is a cheaply cloneable wrapper around an `Arc<CompletionService>`.
#[derive(Clone)]
pub struct CompletionProvider(Arc<CompletionService>);

struct CompletionService {
    backend: CompletionBackend,
    model_name: String,
    params: GenerationParams,
}

#[derive(Clone)]
enum CompletionBackend {
    Ollama(ollama::Client),
    Gemini(gemini::completion::CompletionModel<reqwest::Client>),
}

impl CompletionProvider {
    /// Creates a provider for a model served by Ollama.
    pub fn ollama(base_url: &str, model: &str) -> Result<Self> {
        let client = ollama::Client::builder()
            .api_key(Nothing)
            .base_url(base_url)
            .build()
            .map_err(|e| Error::config(format!("invalid Ollama client: {e}")))?;

        Ok(Self::from_backend(CompletionBackend::Ollama(client), model))
    }

    /// Creates a provider for a Gemini model.
    pub fn gemini(api_key: &str, model: &str) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(Error::config("Gemini API key is required"));
        }

        let client = gemini::Client::new(api_key)
            .map_err(|e| Error::config(format!("invalid Gemini client: {e}")))?;

        Ok(Self::from_backend(
            CompletionBackend::Gemini(client.completion_model(model)),
            model,
        ))
    }

    fn from_backend(backend: CompletionBackend, model: &str) -> Self {
        Self(Arc::new(CompletionService {
            backend,
            model_name: model.to_string(),
            params: GenerationParams::default(),
        }))
    }

    /// Returns a provider using the given sampling parameters.
    pub fn with_params(self, params: GenerationParams) -> Self {
        Self(Arc::new(CompletionService {
            backend: self.0.backend.clone(),
            model_name: self.0.model_name.clone(),
            params,
        }))
    }

    /// Returns the model name.
    pub fn model_name(&self) -> &str {
        &self.0.model_name
    }

    /// Returns the provider name.
    pub fn provider_name(&self) -> &'static str {
        match self.0.backend {
            CompletionBackend::Ollama(_) => "ollama",
            CompletionBackend::Gemini(_) => "gemini",
        }
    }

    fn map_err(&self, err: CompletionError) -> Error {
        Error::generation(format!("{}: {}", self.model_name(), err))
    }
}

#[async_trait]
impl LanguageModel for CompletionProvider {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let params = self.0.params;
        let text = match &self.0.backend {
            CompletionBackend::Ollama(client) => {
                let model = client.completion_model(&self.0.model_name);
                complete_text(&model, prompt, params).await
            }
            CompletionBackend::Gemini(model) => complete_text(model, prompt, params).await,
        }
        .map_err(|e| self.map_err(e))?;

        tracing::debug!(
            target: TRACING_TARGET,
            provider = %self.provider_name(),
            model = %self.model_name(),
            characters = %text.len(),
            "Completion finished"
        );

        Ok(text)
    }

    async fn generate_stream(&self, prompt: &str) -> Result<FragmentStream> {
        let params = self.0.params;
        let stream = match &self.0.backend {
            CompletionBackend::Ollama(client) => {
                let model = client.completion_model(&self.0.model_name);
                stream_text(&model, prompt, params).await
            }
            CompletionBackend::Gemini(model) => stream_text(model, prompt, params).await,
        }
        .map_err(|e| self.map_err(e))?;

        tracing::debug!(
            target: TRACING_TARGET,
            provider = %self.provider_name(),
            model = %self.model_name(),
            "Completion stream opened"
        );

        let model_name = self.0.model_name.clone();
        Ok(stream
            .map(move |item| item.map_err(|e| Error::generation(format!("{model_name}: {e}"))))
            .boxed())
    }
}

async fn complete_text<M: RigCompletionModel>(
    model: &M,
    prompt: &str,
    params: GenerationParams,
) -> std::result::Result<String, CompletionError> {
    let response = model
        .completion_request(prompt)
        .temperature(params.temperature)
        .max_tokens(params.max_tokens)
        .send()
        .await?;

    Ok(extract_text_content(&response.choice))
}

async fn stream_text<M>(
    model: &M,
    prompt: &str,
    params: GenerationParams,
) -> std::result::Result<
    futures::stream::BoxStream<'static, std::result::Result<String, CompletionError>>,
    CompletionError,
>
where
    M: RigCompletionModel,
    M::StreamingResponse: 'static,
{
    let response = model
        .completion_request(prompt)
        .temperature(params.temperature)
        .max_tokens(params.max_tokens)
        .stream()
        .await?;

    // Only text deltas are relayed; reasoning, tool calls and the final
    // usage record are dropped.
    Ok(response
        .filter_map(|item| async move {
            match item {
                Ok(StreamedAssistantContent::Text(text)) => Some(Ok(text.text)),
                Ok(_) => None,
                Err(err) => Some(Err(err)),
            }
        })
        .boxed())
}

/// Extracts text content from assistant content choices.
fn extract_text_content(choice: &OneOrMany<AssistantContent>) -> String {
    choice
        .iter()
        .filter_map(|content| match content {
            AssistantContent::Text(text) => Some(text.text()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("")
}

impl std::fmt::Debug for CompletionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionProvider")
            .field("provider", &self.provider_name())
            .field("model", &self.0.model_name)
            .field("params", &self.0.params)
            .finish()
    }
}
