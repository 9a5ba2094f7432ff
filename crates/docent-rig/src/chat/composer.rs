//! Answer composition from accepted hits.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;

use super::prompt::{Prompt, PromptBuilder};
use super::reasoning::{ReasoningFilter, strip_reasoning};
use crate::provider::{FragmentStream, LanguageModel};
use crate::rag::ScoredHit;
use crate::{Error, RagConfig, Result, TRACING_TARGET_CHAT as TRACING_TARGET};

/// A complete answer and the sources it was composed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedAnswer {
    /// Answer text with reasoning spans removed.
    pub text: String,
    /// Distinct sources given to the model, most similar first.
    pub sources: Vec<String>,
}

/// A streamed answer and the sources it is composed from.
pub struct ComposedStream {
    /// Visible answer fragments in arrival order.
    pub fragments: FragmentStream,
    /// Distinct sources given to the model, most similar first.
    pub sources: Vec<String>,
}

impl std::fmt::Debug for ComposedStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComposedStream")
            .field("sources", &self.sources)
            .finish_non_exhaustive()
    }
}

/// Builds the prompt from accepted hits and runs the language model.
///
/// Cheap to clone; clones share the model.
#[derive(Clone)]
pub struct AnswerComposer {
    model: Arc<dyn LanguageModel>,
    prompts: PromptBuilder,
    timeout: Duration,
}

impl AnswerComposer {
    /// Creates a composer.
    ///
    /// `timeout` bounds the wait for the model's first response and for
    /// each following fragment.
    pub fn new(model: Arc<dyn LanguageModel>, prompts: PromptBuilder, timeout: Duration) -> Self {
        Self {
            model,
            prompts,
            timeout,
        }
    }

    /// Creates a composer from the retrieval configuration.
    pub fn from_config(model: Arc<dyn LanguageModel>, config: &RagConfig) -> Self {
        Self::new(
            model,
            PromptBuilder::from_config(config),
            config.generation_timeout,
        )
    }

    /// Renders the prompt without calling the model.
    pub fn prompt(&self, query: &str, hits: &[ScoredHit]) -> Prompt {
        let prompt = self.prompts.build(query, hits);
        if prompt.dropped > 0 || prompt.truncated {
            tracing::warn!(
                target: TRACING_TARGET,
                included = %prompt.included,
                dropped = %prompt.dropped,
                truncated = %prompt.truncated,
                budget = %self.prompts.max_context_characters(),
                "Context exceeded budget"
            );
        }
        prompt
    }

    /// Generates the complete answer.
    pub async fn compose(&self, query: &str, hits: &[ScoredHit]) -> Result<ComposedAnswer> {
        let prompt = self.prompt(query, hits);

        let raw = tokio::time::timeout(self.timeout, self.model.generate(&prompt.text))
            .await
            .map_err(|_| self.stalled())??;

        let answer = strip_reasoning(&raw);
        tracing::debug!(
            target: TRACING_TARGET,
            characters = %answer.len(),
            sources = %prompt.sources.len(),
            "Answer composed"
        );

        Ok(ComposedAnswer {
            text: answer,
            sources: prompt.sources,
        })
    }

    /// Starts a streamed answer.
    ///
    /// Fragments are relayed in arrival order with reasoning spans removed.
    /// A model failure or a stall longer than the timeout ends the stream
    /// with an `Err` item; fragments already yielded are not retracted.
    /// Dropping the stream drops the model stream with it.
    pub async fn compose_stream(&self, query: &str, hits: &[ScoredHit]) -> Result<ComposedStream> {
        let prompt = self.prompt(query, hits);

        let mut upstream =
            tokio::time::timeout(self.timeout, self.model.generate_stream(&prompt.text))
                .await
                .map_err(|_| self.stalled())??;

        let timeout = self.timeout;
        let stream = async_stream::stream! {
            let mut filter = ReasoningFilter::new();
            let mut fragments = 0usize;

            loop {
                let fragment = match tokio::time::timeout(timeout, upstream.next()).await {
                    Ok(Some(Ok(fragment))) => fragment,
                    Ok(Some(Err(err))) => {
                        yield Err(err);
                        return;
                    }
                    Ok(None) => break,
                    Err(_) => {
                        yield Err(stalled(timeout));
                        return;
                    }
                };

                let visible = filter.push(&fragment);
                if !visible.is_empty() {
                    fragments += 1;
                    yield Ok(visible);
                }
            }

            let rest = filter.finish();
            if !rest.is_empty() {
                fragments += 1;
                yield Ok(rest);
            }

            tracing::debug!(
                target: TRACING_TARGET,
                fragments = %fragments,
                "Answer stream finished"
            );
        };

        Ok(ComposedStream {
            fragments: Box::pin(stream),
            sources: prompt.sources,
        })
    }

    fn stalled(&self) -> Error {
        stalled(self.timeout)
    }
}

fn stalled(timeout: Duration) -> Error {
    Error::generation(format!(
        "language model produced no output for {}s",
        timeout.as_secs_f64()
    ))
}

impl std::fmt::Debug for AnswerComposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerComposer")
            .field("prompts", &self.prompts)
            .field("timeout", &self.timeout)
            .finish()
    }
}
