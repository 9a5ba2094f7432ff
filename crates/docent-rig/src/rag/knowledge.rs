//! Knowledge base inspection.

use docent_vector::VectorStore;
use serde::{Deserialize, Serialize};

use super::chunk::{Chunk, ChunkKind};
use crate::Result;

/// Characters of chunk content shown in listings.
pub const PREVIEW_CHARACTERS: usize = 200;

/// Chunk counts for the whole knowledge base.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeStats {
    /// Total stored chunks.
    pub total_chunks: usize,
    /// Chunk count per kind, in [`ChunkKind::ALL`] order.
    pub by_kind: Vec<(ChunkKind, usize)>,
}

impl KnowledgeStats {
    /// Returns the chunk count of one kind.
    pub fn count(&self, kind: ChunkKind) -> usize {
        self.by_kind
            .iter()
            .find(|(k, _)| *k == kind)
            .map_or(0, |(_, n)| *n)
    }
}

/// A listed chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPreview {
    /// Chunk ID.
    pub id: String,
    /// Position within the source.
    pub chunk_index: usize,
    /// Leading characters of the content.
    pub preview: String,
}

/// Chunks grouped under their source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceListing {
    /// Source label.
    pub source: String,
    /// Source kind.
    pub kind: ChunkKind,
    /// Chunks in store order.
    pub chunks: Vec<ChunkPreview>,
}

/// Read-only view over the stored chunks.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    store: VectorStore,
}

impl KnowledgeBase {
    /// Creates a view over a store.
    pub fn new(store: VectorStore) -> Self {
        Self { store }
    }

    /// Returns chunk counts, total and per kind.
    pub async fn stats(&self) -> Result<KnowledgeStats> {
        let chunks = self.chunks().await?;

        let by_kind = ChunkKind::ALL
            .iter()
            .map(|kind| (*kind, chunks.iter().filter(|c| c.kind == *kind).count()))
            .collect();

        Ok(KnowledgeStats {
            total_chunks: chunks.len(),
            by_kind,
        })
    }

    /// Lists stored chunks grouped by source, in first-seen order.
    pub async fn list(&self) -> Result<Vec<SourceListing>> {
        let mut listings: Vec<SourceListing> = Vec::new();

        for chunk in self.chunks().await? {
            let entry = ChunkPreview {
                id: chunk.id,
                chunk_index: chunk.chunk_index,
                preview: preview(&chunk.content),
            };

            match listings.iter_mut().find(|l| l.source == chunk.source) {
                Some(listing) => listing.chunks.push(entry),
                None => listings.push(SourceListing {
                    source: chunk.source,
                    kind: chunk.kind,
                    chunks: vec![entry],
                }),
            }
        }

        for listing in &mut listings {
            listing.chunks.sort_by_key(|c| c.chunk_index);
        }

        Ok(listings)
    }

    async fn chunks(&self) -> Result<Vec<Chunk>> {
        let records = self.store.scan(None).await?;
        Ok(records.into_iter().map(Chunk::from).collect())
    }
}

/// Truncates content to [`PREVIEW_CHARACTERS`] on a character boundary.
fn preview(content: &str) -> String {
    match content.char_indices().nth(PREVIEW_CHARACTERS) {
        Some((end, _)) => format!("{}...", &content[..end]),
        None => content.to_string(),
    }
}
