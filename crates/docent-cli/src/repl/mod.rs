//! Interactive chat loop.

mod command;

use std::io::Write;
use std::path::Path;

use anyhow::Context;
use docent_rig::chat::{ChatEvent, ChatOutcome, ChatService};
use docent_rig::rag::{
    ChunkIndexer, ChunkKind, KnowledgeBase, RetrievalDecision, ScoredHit, SourceDocument,
};
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};

pub use self::command::{Command, HELP};
use crate::TRACING_TARGET_REPL;

/// Longest chunk excerpt shown by `/debug`, in characters.
const DEBUG_PREVIEW_CHARACTERS: usize = 100;

/// Interactive session over one knowledge base.
pub struct Repl<W> {
    chat: ChatService,
    indexer: ChunkIndexer,
    knowledge: KnowledgeBase,
    streaming: bool,
    out: W,
}

impl<W: Write + Send> Repl<W> {
    /// Creates a session writing to `out`. Answers are streamed by default.
    pub fn new(
        chat: ChatService,
        indexer: ChunkIndexer,
        knowledge: KnowledgeBase,
        out: W,
    ) -> Self {
        Self {
            chat,
            indexer,
            knowledge,
            streaming: true,
            out,
        }
    }

    /// Reads commands from stdin until `/quit` or end of input.
    pub async fn run(mut self) -> anyhow::Result<()> {
        let stats = self.knowledge.stats().await?;
        writeln!(
            self.out,
            "🤖 docent\n📚 {} chunks indexed, similarity threshold {}\n\n{HELP}",
            stats.total_chunks,
            self.chat.filter().threshold().value(),
        )?;

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            write!(self.out, "\n💬 You: ")?;
            self.out.flush()?;

            let Some(line) = lines.next_line().await.context("failed to read input")? else {
                break;
            };

            match Command::parse(&line) {
                Command::Quit => break,
                command => {
                    if let Err(error) = self.execute(command).await {
                        tracing::warn!(target: TRACING_TARGET_REPL, error = %error, "Command failed");
                        writeln!(self.out, "❌ {error:#}")?;
                    }
                }
            }
        }

        writeln!(self.out, "👋 Goodbye!")?;
        Ok(())
    }

    /// Executes one command.
    pub async fn execute(&mut self, command: Command) -> anyhow::Result<()> {
        match command {
            Command::Empty | Command::Quit => {}
            Command::Help => writeln!(self.out, "{HELP}")?,
            Command::Invalid(message) => writeln!(self.out, "❌ {message}")?,
            Command::ToggleStream => {
                self.streaming = !self.streaming;
                let state = if self.streaming { "on" } else { "off" };
                writeln!(self.out, "Streaming answers: {state}")?;
            }
            Command::AddText { path, kind } => self.add_text(&path, kind).await?,
            Command::Stats => self.stats().await?,
            Command::List => self.list().await?,
            Command::Debug(query) => self.debug(&query).await?,
            Command::Delete(id) => {
                if self.indexer.delete(&id).await? {
                    writeln!(self.out, "🗑️ Deleted chunk {id}")?;
                } else {
                    writeln!(self.out, "❌ Chunk {id} not found")?;
                }
            }
            Command::DeleteSource(kind) => {
                let deleted = self.indexer.delete_by_kind(&kind).await?;
                writeln!(self.out, "🗑️ Deleted {deleted} chunks of type {kind}")?;
            }
            Command::Clear => {
                let deleted = self.indexer.clear().await?;
                writeln!(self.out, "🗑️ Cleared {deleted} chunks")?;
            }
            Command::Ask(query) if self.streaming => self.ask_streaming(&query).await?,
            Command::Ask(query) => self.ask(&query).await?,
        }
        Ok(())
    }

    async fn add_text(&mut self, path: &Path, kind: ChunkKind) -> anyhow::Result<()> {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());

        writeln!(self.out, "📄 Processing {}", path.display())?;
        let indexed = self
            .indexer
            .index(&SourceDocument::new(kind, name, text))
            .await?;

        write!(
            self.out,
            "✅ Added {} chunks from {}",
            indexed.chunk_ids.len(),
            indexed.source
        )?;
        if indexed.replaced > 0 {
            write!(self.out, " (removed {} stale chunks)", indexed.replaced)?;
        }
        writeln!(self.out)?;
        Ok(())
    }

    async fn stats(&mut self) -> anyhow::Result<()> {
        let stats = self.knowledge.stats().await?;
        if stats.total_chunks == 0 {
            writeln!(self.out, "📊 Knowledge base is empty")?;
            return Ok(());
        }

        writeln!(self.out, "📊 Knowledge Base Stats:")?;
        writeln!(self.out, "  Total chunks: {}", stats.total_chunks)?;
        for (kind, count) in stats.by_kind.iter().filter(|(_, n)| *n > 0) {
            writeln!(self.out, "  {kind}: {count} chunks")?;
        }
        Ok(())
    }

    async fn list(&mut self) -> anyhow::Result<()> {
        let sources = self.knowledge.list().await?;
        if sources.is_empty() {
            writeln!(self.out, "📊 Knowledge base is empty")?;
            return Ok(());
        }

        for source in sources {
            writeln!(
                self.out,
                "📄 {} [{}] ({} chunks)",
                source.source,
                source.kind,
                source.chunks.len()
            )?;
            for chunk in source.chunks {
                writeln!(self.out, "  #{} {}: {}", chunk.chunk_index, chunk.id, chunk.preview)?;
            }
        }
        Ok(())
    }

    async fn debug(&mut self, query: &str) -> anyhow::Result<()> {
        writeln!(self.out, "🔍 Similarity scores for query: '{query}'")?;
        let decision = self.chat.debug_query(query).await?;
        self.write_decision(&decision)
    }

    fn write_decision(&mut self, decision: &RetrievalDecision) -> anyhow::Result<()> {
        let mut hits: Vec<(&ScoredHit, bool)> = decision
            .accepted_hits
            .iter()
            .map(|hit| (hit, true))
            .chain(decision.rejected_hits.iter().map(|hit| (hit, false)))
            .collect();
        hits.sort_by(|(a, _), (b, _)| a.distance().total_cmp(&b.distance()));

        for (i, (hit, accepted)) in hits.into_iter().enumerate() {
            let mark = if accepted { "✅" } else { "⛔" };
            let preview: String = hit
                .chunk()
                .content
                .chars()
                .take(DEBUG_PREVIEW_CHARACTERS)
                .collect();
            writeln!(
                self.out,
                "  {mark} {}. {:.3} (distance {:.3}) {} #{} - {}",
                i + 1,
                hit.similarity,
                hit.distance(),
                hit.chunk().source,
                hit.chunk().chunk_index,
                preview.replace('\n', " ")
            )?;
        }

        if !decision.is_answerable {
            writeln!(
                self.out,
                "  ⚠️ No documents met similarity threshold of {}",
                self.chat.filter().threshold().value()
            )?;
        }
        Ok(())
    }

    async fn ask(&mut self, query: &str) -> anyhow::Result<()> {
        match self.chat.answer_query(query).await? {
            ChatOutcome::Answered { text, sources } => {
                writeln!(self.out, "\n🤖 docent: {text}")?;
                self.write_sources(&sources)?;
            }
            ChatOutcome::Refused { message } => writeln!(self.out, "\n🤖 docent: {message}")?,
        }
        Ok(())
    }

    /// Streams an answer. Ctrl-C cancels the answer, not the session.
    async fn ask_streaming(&mut self, query: &str) -> anyhow::Result<()> {
        let mut events = self.chat.answer_query_stream(query).await?;
        let interrupt = tokio::signal::ctrl_c();
        tokio::pin!(interrupt);

        write!(self.out, "\n🤖 docent: ")?;
        let mut sources = Vec::new();
        loop {
            tokio::select! {
                event = events.next() => match event {
                    Some(Ok(ChatEvent::Sources(used))) => sources = used,
                    Some(Ok(ChatEvent::Fragment(text))) => {
                        write!(self.out, "{text}")?;
                        self.out.flush()?;
                    }
                    Some(Ok(ChatEvent::Refused(message))) => writeln!(self.out, "{message}")?,
                    Some(Ok(ChatEvent::End)) | None => break,
                    Some(Err(error)) => {
                        writeln!(self.out)?;
                        return Err(error).context("answer stopped early");
                    }
                },
                _ = &mut interrupt => {
                    writeln!(self.out, "\n⏹️ Cancelled")?;
                    return Ok(());
                }
            }
        }

        if !sources.is_empty() {
            writeln!(self.out)?;
            self.write_sources(&sources)?;
        }
        Ok(())
    }

    fn write_sources(&mut self, sources: &[String]) -> anyhow::Result<()> {
        if !sources.is_empty() {
            writeln!(self.out, "📚 Sources: {}", sources.join(", "))?;
        }
        Ok(())
    }
}
