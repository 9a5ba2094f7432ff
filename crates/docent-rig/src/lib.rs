#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod chat;
mod config;
mod error;
pub mod provider;
pub mod rag;

#[cfg(test)]
mod testing;

#[cfg(feature = "config")]
#[cfg_attr(docsrs, doc(cfg(feature = "config")))]
pub use config::RagArgs;
pub use config::{RagConfig, RagConfigBuilder};
pub use error::{Error, Result};

/// Tracing target for relevance decisions and the similarity report.
pub const TRACING_TARGET_FILTER: &str = "docent_rig::filter";

/// Tracing target for chat turns.
pub const TRACING_TARGET_CHAT: &str = "docent_rig::chat";

/// Tracing target for indexing.
pub const TRACING_TARGET_INDEXER: &str = "docent_rig::indexer";

/// Tracing target for embedding and completion calls.
pub const TRACING_TARGET_PROVIDER: &str = "docent_rig::provider";
