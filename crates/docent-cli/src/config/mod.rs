//! CLI configuration management.
//!
//! This module defines the complete CLI configuration hierarchy:
//!
//! ```text
//! Cli
//! ├── rag: RagArgs              # Threshold, top-k, context budget, chunking
//! ├── provider: ProviderConfig  # Ollama / Gemini models
//! └── store: StoreConfig        # Memory or Chroma vector store
//! ```
//!
//! All configuration can be provided via CLI arguments or environment variables.
//! Use `--help` to see all available options.
//!
//! # Example
//!
//! ```bash
//! docent --similarity-threshold 0.4 --vector-store chroma
//!
//! # Or via environment variables
//! SIMILARITY_THRESHOLD=0.4 VECTOR_STORE=chroma docent
//! ```

mod provider;
mod store;

use std::process;

use anyhow::Context;
use clap::Parser;
use docent_rig::{RagArgs, RagConfig};
use docent_vector::VectorStoreConfig;
pub use provider::ProviderConfig;
pub use store::StoreConfig;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::{TRACING_TARGET_CONFIG, TRACING_TARGET_STARTUP};

/// Directive that shows the per-hit similarity report.
const SIMILARITY_REPORT_DIRECTIVE: &str = "docent_rig::filter=debug";

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "docent")]
#[command(about = "Chat with a knowledge base, refusing when nothing relevant is found")]
#[command(version)]
pub struct Cli {
    /// Retrieval, filtering and answering configuration.
    #[clap(flatten)]
    pub rag: RagArgs,

    /// Embedding and completion providers.
    #[clap(flatten)]
    pub provider: ProviderConfig,

    /// Vector store backend.
    #[clap(flatten)]
    pub store: StoreConfig,
}

/// Configuration after validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub rag: RagConfig,
    pub provider: ProviderConfig,
    pub store: VectorStoreConfig,
}

impl Cli {
    /// Loads environment variables from .env file (if enabled) and parses CLI arguments.
    ///
    /// The .env file is loaded before clap parses arguments, so its values act
    /// as defaults for the `env` attributes.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    /// Loads environment variables from .env file if the dotenv feature is enabled.
    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    /// No-op when dotenv feature is disabled.
    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Initializes tracing with environment-based filtering.
    ///
    /// The similarity report is enabled on top of `RUST_LOG` when
    /// `--debug-similarity` is set.
    pub fn init_tracing(&self) {
        let mut filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        if self.rag.debug_similarity
            && let Ok(directive) = SIMILARITY_REPORT_DIRECTIVE.parse()
        {
            filter = filter.add_directive(directive);
        }

        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    /// Validates all configuration values.
    ///
    /// Any failure here is fatal: the process exits before serving a turn.
    pub fn validate(self) -> anyhow::Result<Settings> {
        let rag = self
            .rag
            .into_config()
            .context("invalid retrieval configuration")?;

        self.provider
            .validate()
            .context("invalid provider configuration")?;

        let store = self.store.to_store_config(rag.distance_metric);
        if let VectorStoreConfig::Chroma(chroma) = &store {
            chroma.validate().context("invalid Chroma configuration")?;
        }

        Ok(Settings {
            rag,
            provider: self.provider,
            store,
        })
    }

    /// Logs configuration (no sensitive information).
    pub fn log(&self) {
        Self::log_build_info();

        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            similarity_threshold = self.rag.similarity_threshold,
            top_k = self.rag.top_k,
            debug_similarity = self.rag.debug_similarity,
            distance_metric = %self.rag.distance_metric,
            max_context_characters = self.rag.max_context_characters,
            generation_timeout_secs = self.rag.generation_timeout_secs,
            "Retrieval configuration"
        );
        self.provider.log();
        self.store.log();
    }

    /// Logs build information at debug level.
    fn log_build_info() {
        tracing::debug!(
            target: TRACING_TARGET_STARTUP,
            version = env!("CARGO_PKG_VERSION"),
            pid = process::id(),
            arch = std::env::consts::ARCH,
            os = std::env::consts::OS,
            features = ?Self::enabled_features(),
            "Build information"
        );
    }

    /// Returns a list of enabled compile-time features.
    fn enabled_features() -> Vec<&'static str> {
        [cfg!(feature = "dotenv").then_some("dotenv")]
            .into_iter()
            .flatten()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use docent_vector::DistanceMetric;

    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("docent").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_build_settings() {
        let settings = parse(&[
            "--similarity-threshold",
            "0.45",
            "--top-k",
            "3",
            "--distance-metric",
            "squared_l2",
            "--generation-timeout-secs",
            "10",
            "--vector-store",
            "chroma",
            "--chroma-collection",
            "docs",
        ])
        .validate()
        .unwrap();

        assert_eq!(settings.rag.similarity_threshold, 0.45);
        assert_eq!(settings.rag.top_k, 3);
        assert_eq!(settings.rag.generation_timeout, Duration::from_secs(10));
        match settings.store {
            VectorStoreConfig::Chroma(chroma) => {
                assert_eq!(chroma.collection, "docs");
                assert_eq!(chroma.metric, DistanceMetric::SquaredL2);
            }
            other => panic!("expected chroma, got {other:?}"),
        }
    }

    #[test]
    fn out_of_range_threshold_is_fatal() {
        let result = parse(&["--similarity-threshold", "1.5"]).validate();
        assert!(result.is_err());
    }

    #[test]
    fn gemini_requires_api_key() {
        let cli = parse(&["--ai-provider", "gemini", "--gemini-api-key", " "]);
        assert!(cli.validate().is_err());
    }
}
