//! Chunk model and source documents.

use std::collections::HashMap;

use docent_vector::{QueryMatch, StoredRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use strum::{AsRefStr, Display, EnumString};

/// Metadata key holding the human-readable source label.
pub const SOURCE_KEY: &str = "source";
/// Metadata key holding the [`ChunkKind`].
pub const KIND_KEY: &str = "type";
/// Metadata key holding the chunk position within its source.
pub const CHUNK_INDEX_KEY: &str = "chunk_index";
/// Metadata key holding the source URL, for web pages.
pub const URL_KEY: &str = "url";
/// Metadata key holding the source title.
pub const TITLE_KEY: &str = "title";

/// Origin type of a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[derive(AsRefStr, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ChunkKind {
    /// Text extracted from a PDF.
    Pdf,
    /// Text scraped from a web page.
    #[strum(to_string = "website", serialize = "web")]
    Website,
    /// Plain text file.
    Text,
    /// Anything else.
    #[default]
    Other,
}

impl ChunkKind {
    /// All kinds, in display order.
    pub const ALL: [ChunkKind; 4] = [Self::Pdf, Self::Website, Self::Text, Self::Other];

    /// Prefix used in chunk IDs.
    fn id_prefix(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Website => "web",
            Self::Text => "text",
            Self::Other => "doc",
        }
    }

    /// Prefix used in the `source` label.
    fn label(self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::Website => "Web",
            Self::Text => "Text",
            Self::Other => "Document",
        }
    }
}

/// Already-extracted text handed to the indexer.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDocument {
    /// Origin type.
    pub kind: ChunkKind,
    /// File name or page title.
    pub name: String,
    /// Page URL, for web sources.
    pub url: Option<String>,
    /// Extracted text.
    pub text: String,
}

impl SourceDocument {
    /// Creates a document of the given kind.
    pub fn new(kind: ChunkKind, name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            url: None,
            text: text.into(),
        }
    }

    /// Creates a PDF document named after its file.
    pub fn pdf(file_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(ChunkKind::Pdf, file_name, text)
    }

    /// Creates a web page document.
    pub fn website(
        url: impl Into<String>,
        title: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::new(ChunkKind::Website, title, text)
        }
    }

    /// Creates a plain text document named after its file.
    pub fn text(file_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(ChunkKind::Text, file_name, text)
    }

    /// Returns the label stored in every chunk's `source` field.
    pub fn source_label(&self) -> String {
        format!("{}: {}", self.kind.label(), self.name)
    }

    /// Returns the deterministic ID of the chunk at `index`.
    ///
    /// Web pages are keyed by a hash of their URL so that re-indexing the
    /// same page replaces its chunks.
    pub fn chunk_id(&self, index: usize) -> String {
        let key = match (&self.kind, &self.url) {
            (ChunkKind::Website, Some(url)) => {
                let digest = hex::encode(Sha256::digest(url.as_bytes()));
                digest[..8].to_string()
            }
            _ => self.name.clone(),
        };
        format!("{}_{}_{}", self.kind.id_prefix(), key, index)
    }
}

/// A bounded span of source text with identity and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique ID.
    pub id: String,
    /// Origin label, e.g. `PDF: handbook.pdf`.
    pub source: String,
    /// Origin type.
    pub kind: ChunkKind,
    /// Chunk text.
    pub content: String,
    /// Position within the source.
    pub chunk_index: usize,
    /// Remaining metadata (URL, title, ...).
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl Chunk {
    /// Builds the metadata stored alongside the chunk text.
    pub fn to_metadata(&self) -> HashMap<String, Value> {
        let mut metadata = self.metadata.clone();
        metadata.insert(SOURCE_KEY.to_string(), Value::from(self.source.clone()));
        metadata.insert(KIND_KEY.to_string(), Value::from(self.kind.as_ref()));
        metadata.insert(CHUNK_INDEX_KEY.to_string(), Value::from(self.chunk_index));
        metadata
    }

    /// Rebuilds a chunk from stored fields.
    ///
    /// Missing or malformed fields fall back to `unknown`, [`ChunkKind::Other`]
    /// and index `0` so that foreign records still surface.
    pub fn from_parts(id: String, content: String, mut metadata: HashMap<String, Value>) -> Self {
        let source = match metadata.remove(SOURCE_KEY) {
            Some(Value::String(source)) => source,
            _ => "unknown".to_string(),
        };
        let kind = metadata
            .remove(KIND_KEY)
            .as_ref()
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();
        let chunk_index = metadata
            .remove(CHUNK_INDEX_KEY)
            .as_ref()
            .and_then(Value::as_u64)
            .and_then(|i| usize::try_from(i).ok())
            .unwrap_or_default();

        Self {
            id,
            source,
            kind,
            content,
            chunk_index,
            metadata,
        }
    }
}

impl From<StoredRecord> for Chunk {
    fn from(record: StoredRecord) -> Self {
        Self::from_parts(record.id, record.document, record.metadata)
    }
}

impl From<QueryMatch> for Chunk {
    fn from(record: QueryMatch) -> Self {
        Self::from_parts(record.id, record.document, record.metadata)
    }
}
