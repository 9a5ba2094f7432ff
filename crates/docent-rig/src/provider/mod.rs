//! Embedding and language-model contracts.
//!
//! The retrieval core depends only on [`Embedder`] and [`LanguageModel`].
//! [`EmbeddingProvider`] and [`CompletionProvider`] implement them on top of
//! `rig-core`.

mod completion;
mod embedding;

use async_trait::async_trait;
use futures::stream::BoxStream;

pub use completion::{CompletionProvider, GenerationParams};
pub use embedding::EmbeddingProvider;

use crate::Result;

/// Lazily produced answer fragments, in arrival order.
///
/// The stream ends when the model finishes. An `Err` item reports a failure
/// after any fragments already yielded.
pub type FragmentStream = BoxStream<'static, Result<String>>;

/// Maps text to a fixed-dimension vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embeds a single text.
    ///
    /// Fails with [`Error::Embedding`](crate::Error::Embedding) for malformed
    /// input and [`Error::UpstreamUnavailable`](crate::Error::UpstreamUnavailable)
    /// when the service cannot be reached.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Returns the vector dimension.
    fn dimensions(&self) -> usize;
}

/// Text-completion service.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generates the complete answer for a prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Starts a streamed generation for a prompt.
    async fn generate_stream(&self, prompt: &str) -> Result<FragmentStream>;
}
