//! Retrieval: chunking, indexing and relevance filtering.
//!
//! ```text
//! SourceDocument -> TextSplitter -> Chunk -> Embedder -> VectorStore
//! query vector   -> VectorStore.query -> RetrievalHit -> RelevanceFilter -> RetrievalDecision
//! ```

mod chunk;
mod filter;
mod indexer;
mod knowledge;
mod splitter;

pub use chunk::{
    CHUNK_INDEX_KEY, Chunk, ChunkKind, KIND_KEY, SOURCE_KEY, SourceDocument, TITLE_KEY, URL_KEY,
};
pub use filter::{RelevanceFilter, RetrievalDecision, RetrievalHit, ScoredHit, Threshold};
pub use indexer::{ChunkIndexer, IndexedDocument};
pub use knowledge::{ChunkPreview, KnowledgeBase, KnowledgeStats, PREVIEW_CHARACTERS, SourceListing};
pub use splitter::TextSplitter;
