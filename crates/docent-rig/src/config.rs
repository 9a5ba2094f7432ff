//! Retrieval configuration.
//!
//! Loaded once at startup and passed by value into the filter, the composer
//! and the chat service. Nothing reads it from ambient globals.

use std::time::Duration;

#[cfg(feature = "config")]
use clap::Args;
use derive_builder::Builder;
use docent_vector::DistanceMetric;

use crate::{Error, Result};

/// Default minimum similarity for a chunk to count as relevant.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.3;

/// Default number of nearest chunks requested from the store.
pub const DEFAULT_TOP_K: usize = 5;

/// Default character budget for the context section of the prompt.
pub const DEFAULT_MAX_CONTEXT_CHARACTERS: usize = 12_000;

/// Default stall timeout for incremental answering, in seconds.
pub const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 60;

/// Default chunk size in words.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Default overlap between consecutive chunks in words.
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

/// Configuration for retrieval, filtering and answering.
#[derive(Debug, Clone, PartialEq, Builder)]
#[builder(
    name = "RagConfigBuilder",
    pattern = "owned",
    setter(into, prefix = "with"),
    build_fn(private, name = "build_unvalidated")
)]
pub struct RagConfig {
    /// Minimum similarity in `[0.0, 1.0]` for a hit to be accepted.
    #[builder(default = "DEFAULT_SIMILARITY_THRESHOLD")]
    pub similarity_threshold: f64,

    /// Number of nearest chunks requested per query.
    #[builder(default = "DEFAULT_TOP_K")]
    pub top_k: usize,

    /// Report every hit's similarity and verdict on the filter target.
    #[builder(default = "false")]
    pub debug_similarity: bool,

    /// Metric of the vector store, which fixes the similarity mapping.
    #[builder(default)]
    pub distance_metric: DistanceMetric,

    /// Character budget for retrieved context in the prompt.
    #[builder(default = "DEFAULT_MAX_CONTEXT_CHARACTERS")]
    pub max_context_characters: usize,

    /// Longest wait for the next fragment while streaming an answer.
    #[builder(default = "Duration::from_secs(DEFAULT_GENERATION_TIMEOUT_SECS)")]
    pub generation_timeout: Duration,

    /// Words per chunk.
    #[builder(default = "DEFAULT_CHUNK_SIZE")]
    pub chunk_size: usize,

    /// Words shared by consecutive chunks.
    #[builder(default = "DEFAULT_CHUNK_OVERLAP")]
    pub chunk_overlap: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            top_k: DEFAULT_TOP_K,
            debug_similarity: false,
            distance_metric: DistanceMetric::default(),
            max_context_characters: DEFAULT_MAX_CONTEXT_CHARACTERS,
            generation_timeout: Duration::from_secs(DEFAULT_GENERATION_TIMEOUT_SECS),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl RagConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Checks every field. Out-of-range values are rejected, never clamped.
    pub fn validate(&self) -> Result<()> {
        let threshold = self.similarity_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::config(format!(
                "similarity threshold must be within [0.0, 1.0], got {threshold}"
            )));
        }

        if self.top_k == 0 {
            return Err(Error::config("top_k must be at least 1"));
        }

        if self.max_context_characters == 0 {
            return Err(Error::config("context budget must be greater than 0"));
        }

        if self.generation_timeout.is_zero() {
            return Err(Error::config("generation timeout must be greater than 0"));
        }

        if self.chunk_size == 0 {
            return Err(Error::config("chunk size must be greater than 0"));
        }

        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::config(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }

        Ok(())
    }
}

impl RagConfigBuilder {
    /// Builds and validates the configuration.
    pub fn build(self) -> Result<RagConfig> {
        let config = self.build_unvalidated().map_err(Error::config)?;
        config.validate()?;
        Ok(config)
    }
}

/// Command-line and environment mirror of [`RagConfig`].
#[cfg(feature = "config")]
#[derive(Debug, Clone, Args)]
pub struct RagArgs {
    /// Minimum similarity in [0.0, 1.0] for a chunk to be used as context.
    #[arg(
        long = "similarity-threshold",
        env = "SIMILARITY_THRESHOLD",
        default_value_t = DEFAULT_SIMILARITY_THRESHOLD
    )]
    pub similarity_threshold: f64,

    /// Number of nearest chunks retrieved per query.
    #[arg(long = "top-k", env = "TOP_K", default_value_t = DEFAULT_TOP_K)]
    pub top_k: usize,

    /// Log every retrieved chunk's similarity and verdict.
    #[arg(long = "debug-similarity", env = "DEBUG_SIMILARITY")]
    pub debug_similarity: bool,

    /// Distance metric of the vector store (cosine, inner_product, squared_l2).
    #[arg(
        long = "distance-metric",
        env = "DISTANCE_METRIC",
        default_value_t = DistanceMetric::Cosine
    )]
    pub distance_metric: DistanceMetric,

    /// Character budget for retrieved context in the prompt.
    #[arg(
        long = "max-context-characters",
        env = "MAX_CONTEXT_CHARACTERS",
        default_value_t = DEFAULT_MAX_CONTEXT_CHARACTERS
    )]
    pub max_context_characters: usize,

    /// Seconds to wait for the next streamed fragment before failing.
    #[arg(
        long = "generation-timeout-secs",
        env = "GENERATION_TIMEOUT_SECS",
        default_value_t = DEFAULT_GENERATION_TIMEOUT_SECS
    )]
    pub generation_timeout_secs: u64,

    /// Words per chunk when indexing.
    #[arg(long = "chunk-size", env = "CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Words shared by consecutive chunks when indexing.
    #[arg(long = "chunk-overlap", env = "CHUNK_OVERLAP", default_value_t = DEFAULT_CHUNK_OVERLAP)]
    pub chunk_overlap: usize,
}

#[cfg(feature = "config")]
impl RagArgs {
    /// Converts the arguments into a validated configuration.
    pub fn into_config(self) -> Result<RagConfig> {
        RagConfig::builder()
            .with_similarity_threshold(self.similarity_threshold)
            .with_top_k(self.top_k)
            .with_debug_similarity(self.debug_similarity)
            .with_distance_metric(self.distance_metric)
            .with_max_context_characters(self.max_context_characters)
            .with_generation_timeout(Duration::from_secs(self.generation_timeout_secs))
            .with_chunk_size(self.chunk_size)
            .with_chunk_overlap(self.chunk_overlap)
            .build()
    }
}
