//! Chunk ingestion and deletion.

use std::sync::Arc;

use docent_vector::{MetadataFilter, VectorRecord, VectorStore};
use futures::{StreamExt, TryStreamExt};
use serde_json::Value;

use super::chunk::{Chunk, ChunkKind, KIND_KEY, SOURCE_KEY, SourceDocument, TITLE_KEY, URL_KEY};
use super::splitter::TextSplitter;
use crate::provider::Embedder;
use crate::{Error, RagConfig, Result, TRACING_TARGET_INDEXER as TRACING_TARGET};

/// Chunks embedded concurrently while indexing one document.
const EMBED_CONCURRENCY: usize = 4;

/// Result of indexing one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedDocument {
    /// Label stored in each chunk's `source` field.
    pub source: String,
    /// IDs of the stored chunks, in order.
    pub chunk_ids: Vec<String>,
    /// Chunks of a previous version of the source past the new chunk count,
    /// removed after the write.
    pub replaced: usize,
}

/// Splits documents into chunks, embeds them and writes them to the store.
///
/// Cheap to clone; clones share the embedder and the store.
#[derive(Clone)]
pub struct ChunkIndexer {
    embedder: Arc<dyn Embedder>,
    store: VectorStore,
    splitter: TextSplitter,
}

impl ChunkIndexer {
    /// Creates an indexer.
    pub fn new(embedder: Arc<dyn Embedder>, store: VectorStore, splitter: TextSplitter) -> Self {
        Self {
            embedder,
            store,
            splitter,
        }
    }

    /// Creates an indexer using the configured chunk window.
    pub fn from_config(
        embedder: Arc<dyn Embedder>,
        store: VectorStore,
        config: &RagConfig,
    ) -> Result<Self> {
        let splitter = TextSplitter::new(config.chunk_size, config.chunk_overlap)?;
        Ok(Self::new(embedder, store, splitter))
    }

    /// Splits text into chunk contents.
    pub fn split(&self, text: &str) -> Vec<String> {
        self.splitter.split(text)
    }

    /// Builds the chunks of a document without storing them.
    pub fn chunks(&self, document: &SourceDocument) -> Vec<Chunk> {
        let source = document.source_label();
        let mut extra = std::collections::HashMap::new();
        if let Some(url) = &document.url {
            extra.insert(URL_KEY.to_string(), Value::from(url.clone()));
            extra.insert(TITLE_KEY.to_string(), Value::from(document.name.clone()));
        }

        self.split(&document.text)
            .into_iter()
            .enumerate()
            .map(|(chunk_index, content)| Chunk {
                id: document.chunk_id(chunk_index),
                source: source.clone(),
                kind: document.kind,
                content,
                chunk_index,
                metadata: extra.clone(),
            })
            .collect()
    }

    /// Embeds and stores every chunk of a document.
    ///
    /// Chunks from an earlier version of the same source that the new
    /// version does not overwrite are removed after the write succeeds. A
    /// failed write leaves the earlier version in place.
    pub async fn index(&self, document: &SourceDocument) -> Result<IndexedDocument> {
        let chunks = self.chunks(document);
        if chunks.is_empty() {
            return Err(Error::invalid_input(format!(
                "no text to index in '{}'",
                document.name
            )));
        }

        let embedder = &self.embedder;
        let vectors: Vec<Vec<f32>> = futures::stream::iter(chunks.iter())
            .map(|chunk| embedder.embed(&chunk.content))
            .buffered(EMBED_CONCURRENCY)
            .try_collect()
            .await?;

        let source = document.source_label();
        let chunk_ids: Vec<String> = chunks.iter().map(|c| c.id.clone()).collect();
        let records = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| {
                VectorRecord::new(chunk.id.clone(), vector, chunk.content.clone())
                    .with_metadata(chunk.to_metadata())
            })
            .collect();
        self.store.upsert(records).await?;

        let stale = self.stale_ids(&source, &chunk_ids).await?;
        let replaced = if stale.is_empty() {
            0
        } else {
            self.store.delete(&stale).await?
        };

        tracing::info!(
            target: TRACING_TARGET,
            source = %source,
            chunks = %chunk_ids.len(),
            replaced = %replaced,
            "Indexed document"
        );

        Ok(IndexedDocument {
            source,
            chunk_ids,
            replaced,
        })
    }

    /// IDs stored under `source` that are not in `keep`.
    async fn stale_ids(&self, source: &str, keep: &[String]) -> Result<Vec<String>> {
        let filter = MetadataFilter::eq(SOURCE_KEY, source);
        Ok(self
            .store
            .scan(None)
            .await?
            .into_iter()
            .filter(|record| filter.matches(&record.metadata) && !keep.contains(&record.id))
            .map(|record| record.id)
            .collect())
    }

    /// Deletes one chunk. Returns false if it did not exist.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.delete_many(&[id.to_string()]).await? > 0)
    }

    /// Deletes chunks by ID and returns how many existed.
    pub async fn delete_many(&self, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Err(Error::invalid_input("no chunk IDs given"));
        }

        let deleted = self.store.delete(ids).await?;
        tracing::info!(
            target: TRACING_TARGET,
            requested = %ids.len(),
            deleted = %deleted,
            "Deleted chunks"
        );
        Ok(deleted)
    }

    /// Deletes every chunk of a kind, named case-insensitively.
    pub async fn delete_by_kind(&self, kind: &str) -> Result<usize> {
        let kind: ChunkKind = kind
            .trim()
            .parse()
            .map_err(|_| Error::invalid_input(format!("unknown source type '{kind}'")))?;

        let deleted = self
            .store
            .delete_where(&MetadataFilter::eq(KIND_KEY, kind.as_ref()))
            .await?;

        tracing::info!(
            target: TRACING_TARGET,
            kind = %kind,
            deleted = %deleted,
            "Deleted chunks by source type"
        );
        Ok(deleted)
    }

    /// Deletes every chunk and returns how many were removed.
    pub async fn clear(&self) -> Result<usize> {
        let ids: Vec<String> = self
            .store
            .scan(None)
            .await?
            .into_iter()
            .map(|record| record.id)
            .collect();

        if ids.is_empty() {
            return Ok(0);
        }

        let deleted = self.store.delete(&ids).await?;
        tracing::info!(
            target: TRACING_TARGET,
            deleted = %deleted,
            "Cleared knowledge base"
        );
        Ok(deleted)
    }
}

impl std::fmt::Debug for ChunkIndexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkIndexer")
            .field("store", &self.store)
            .field("splitter", &self.splitter)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use docent_vector::{DistanceMetric, VectorStoreConfig};

    use super::*;
    use crate::testing::ScriptedEmbedder;

    async fn indexer(embedder: ScriptedEmbedder) -> ChunkIndexer {
        let store = VectorStore::new(VectorStoreConfig::memory(DistanceMetric::Cosine))
            .await
            .unwrap();
        ChunkIndexer::new(
            Arc::new(embedder),
            store,
            TextSplitter::new(4, 1).unwrap(),
        )
    }

    #[tokio::test]
    async fn index_stores_every_chunk() {
        let embedder = ScriptedEmbedder::new(3);
        let indexer = indexer(embedder.clone()).await;

        let indexed = indexer
            .index(&SourceDocument::pdf("a.pdf", "one two three four five six seven"))
            .await
            .unwrap();

        assert_eq!(indexed.source, "PDF: a.pdf");
        assert_eq!(indexed.chunk_ids, ["pdf_a.pdf_0", "pdf_a.pdf_1"]);
        assert_eq!(indexed.replaced, 0);
        assert_eq!(embedder.calls(), 2);
        assert_eq!(indexer.store.count().await.unwrap(), 2);

        let stored = indexer.store.get(&["pdf_a.pdf_1".to_string()]).await.unwrap();
        let chunk = Chunk::from(stored[0].clone());
        assert_eq!(chunk.content, "four five six seven");
        assert_eq!(chunk.kind, ChunkKind::Pdf);
        assert_eq!(chunk.chunk_index, 1);
    }

    #[tokio::test]
    async fn web_chunks_carry_url_and_title() {
        let indexer = indexer(ScriptedEmbedder::new(3)).await;
        let document = SourceDocument::website("https://example.com", "Example", "hello world");

        let chunks = indexer.chunks(&document);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].source, "Web: Example");
        assert_eq!(chunks[0].metadata[URL_KEY], Value::from("https://example.com"));
        assert_eq!(chunks[0].metadata[TITLE_KEY], Value::from("Example"));
    }

    #[tokio::test]
    async fn reindexing_replaces_previous_chunks() {
        let indexer = indexer(ScriptedEmbedder::new(3)).await;
        indexer
            .index(&SourceDocument::pdf("a.pdf", "one two three four five six seven"))
            .await
            .unwrap();

        let indexed = indexer
            .index(&SourceDocument::pdf("a.pdf", "one two"))
            .await
            .unwrap();

        assert_eq!(indexed.replaced, 1);
        assert_eq!(indexer.store.count().await.unwrap(), 1);

        let stored = indexer.store.get(&["pdf_a.pdf_0".to_string()]).await.unwrap();
        assert_eq!(stored[0].document, "one two");
    }

    #[tokio::test]
    async fn failed_reindex_keeps_previous_chunks() {
        let indexer = indexer(ScriptedEmbedder::new(3)).await;
        indexer
            .index(&SourceDocument::pdf("a.pdf", "one two three four five six seven"))
            .await
            .unwrap();
        indexer
            .index(&SourceDocument::pdf("b.pdf", "alpha beta"))
            .await
            .unwrap();
        assert_eq!(indexer.store.count().await.unwrap(), 3);

        let wider = ChunkIndexer::new(
            Arc::new(ScriptedEmbedder::new(4)),
            indexer.store.clone(),
            TextSplitter::new(4, 1).unwrap(),
        );
        let result = wider
            .index(&SourceDocument::pdf("a.pdf", "eight nine ten"))
            .await;
        assert!(result.is_err());

        let a_chunks = indexer
            .store
            .get(&["pdf_a.pdf_0".to_string(), "pdf_a.pdf_1".to_string()])
            .await
            .unwrap();
        assert_eq!(a_chunks.len(), 2);
        assert_eq!(a_chunks[0].document, "one two three four");
        assert_eq!(indexer.store.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn empty_document_is_rejected_without_embedding() {
        let embedder = ScriptedEmbedder::new(3);
        let indexer = indexer(embedder.clone()).await;

        let result = indexer.index(&SourceDocument::text("empty.txt", "  \n ")).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert_eq!(embedder.calls(), 0);
    }

    #[tokio::test]
    async fn embedding_failure_stores_nothing() {
        let embedder = ScriptedEmbedder::new(3).failing();
        let indexer = indexer(embedder).await;

        let result = indexer.index(&SourceDocument::text("a.txt", "some words")).await;
        assert!(matches!(result, Err(Error::UpstreamUnavailable { .. })));
        assert_eq!(indexer.store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_operations() {
        let indexer = indexer(ScriptedEmbedder::new(3)).await;
        indexer
            .index(&SourceDocument::pdf("a.pdf", "one two three four five six seven"))
            .await
            .unwrap();
        indexer
            .index(&SourceDocument::website("https://x.y", "X", "alpha beta"))
            .await
            .unwrap();
        indexer
            .index(&SourceDocument::text("t.txt", "gamma delta"))
            .await
            .unwrap();

        assert!(indexer.delete("pdf_a.pdf_0").await.unwrap());
        assert!(!indexer.delete("pdf_a.pdf_0").await.unwrap());
        assert!(indexer.delete_many(&[]).await.is_err());

        assert_eq!(indexer.delete_by_kind("WEBSITE").await.unwrap(), 1);
        assert!(matches!(
            indexer.delete_by_kind("spreadsheet").await,
            Err(Error::InvalidInput(_))
        ));

        assert_eq!(indexer.clear().await.unwrap(), 2);
        assert_eq!(indexer.clear().await.unwrap(), 0);
    }
}
