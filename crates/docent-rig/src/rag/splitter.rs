//! Word-window text splitting.

use crate::{Error, Result};

/// Splits text into overlapping windows of whitespace-separated words.
///
/// Windows hold `chunk_size` words and start every `chunk_size - overlap`
/// words. Whitespace inside a window is normalised to single spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSplitter {
    chunk_size: usize,
    overlap: usize,
}

impl TextSplitter {
    /// Creates a splitter. The overlap must be smaller than the chunk size.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::config("chunk size must be greater than 0"));
        }
        if overlap >= chunk_size {
            return Err(Error::config(format!(
                "chunk overlap ({overlap}) must be smaller than chunk size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    /// Returns the chunk size in words.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Returns the overlap in words.
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Splits text into chunks. Text without words yields no chunks.
    pub fn split(&self, text: &str) -> Vec<String> {
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return Vec::new();
        }

        let stride = self.chunk_size - self.overlap;
        let mut chunks = Vec::with_capacity(words.len().div_ceil(stride));
        let mut start = 0;

        while start < words.len() {
            let end = (start + self.chunk_size).min(words.len());
            chunks.push(words[start..end].join(" "));
            if end == words.len() {
                break;
            }
            start += stride;
        }

        chunks
    }
}
