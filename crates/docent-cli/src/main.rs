#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod repl;

use std::process;

use anyhow::Context;
use docent_rig::chat::ChatService;
use docent_rig::rag::{ChunkIndexer, KnowledgeBase};
use docent_vector::VectorStore;

use crate::config::{Cli, Settings};
use crate::repl::Repl;

// Tracing target constants
pub const TRACING_TARGET_STARTUP: &str = "docent_cli::startup";
pub const TRACING_TARGET_SHUTDOWN: &str = "docent_cli::shutdown";
pub const TRACING_TARGET_CONFIG: &str = "docent_cli::config";
pub const TRACING_TARGET_REPL: &str = "docent_cli::repl";

#[tokio::main]
async fn main() {
    let Err(error) = run().await else {
        tracing::info!(
            target: TRACING_TARGET_SHUTDOWN,
            "application terminated successfully"
        );
        process::exit(0);
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_SHUTDOWN,
            error = %error,
            "application terminated with error"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

/// Main application entry point.
async fn run() -> anyhow::Result<()> {
    let cli = Cli::init();
    cli.init_tracing();
    cli.log();

    let settings = cli.validate()?;
    let session = create_session(settings).await?;
    session.run().await
}

/// Connects the providers and the store and wires up the chat session.
async fn create_session(settings: Settings) -> anyhow::Result<Repl<std::io::Stdout>> {
    let embedder = settings.provider.create_embedder()?;
    let model = settings.provider.create_language_model()?;

    let store = VectorStore::new(settings.store)
        .await
        .context("failed to connect to the vector store")?;

    let chat = ChatService::new(embedder.clone(), store.clone(), model, &settings.rag)
        .context("failed to create chat service")?;
    let indexer = ChunkIndexer::from_config(embedder, store.clone(), &settings.rag)
        .context("failed to create indexer")?;

    tracing::info!(
        target: TRACING_TARGET_STARTUP,
        version = env!("CARGO_PKG_VERSION"),
        backend = %store.backend_name(),
        "docent ready"
    );

    Ok(Repl::new(
        chat,
        indexer,
        KnowledgeBase::new(store),
        std::io::stdout(),
    ))
}
