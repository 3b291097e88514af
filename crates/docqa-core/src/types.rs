//! Domain types shared by the indices, the retrieval pipeline and the binaries.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub type ChunkId = String;
pub type Meta = BTreeMap<String, String>;

/// Where a chunk came from, plus the content flags computed at ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub source: String,
    pub page: u32,
    #[serde(default)]
    pub section: String,
    #[serde(default)]
    pub flags: Meta,
}

impl DocumentMeta {
    pub fn new(source: impl Into<String>, page: u32) -> Self {
        Self { source: source.into(), page, ..Self::default() }
    }

    /// Citation label, e.g. `manual.pdf (p.7)`.
    pub fn citation(&self) -> String {
        format!("{} (p.{})", self.source, self.page)
    }
}

/// An immutable, independently retrievable chunk of a source document.
///
/// `chunk_id` is assigned once at ingestion and never regenerated at query
/// time; every index returns the same id for the same chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub chunk_id: ChunkId,
    pub content: String,
    pub metadata: DocumentMeta,
}

impl Document {
    pub fn new(chunk_id: impl Into<ChunkId>, content: impl Into<String>, metadata: DocumentMeta) -> Self {
        Self { chunk_id: chunk_id.into(), content: content.into(), metadata }
    }

    /// Build a document whose id is derived from its source, page and content.
    pub fn with_content_id(content: impl Into<String>, metadata: DocumentMeta) -> Self {
        let content = content.into();
        let chunk_id = content_chunk_id(&metadata.source, metadata.page, &content);
        Self { chunk_id, content, metadata }
    }
}

/// Stable chunk key: truncated BLAKE3 over source, page and content.
pub fn content_chunk_id(source: &str, page: u32, content: &str) -> ChunkId {
    let mut hasher = blake3::Hasher::new();
    hasher.update(source.as_bytes());
    hasher.update(&[0]);
    hasher.update(&page.to_le_bytes());
    hasher.update(&[0]);
    hasher.update(content.as_bytes());
    let hex = hasher.finalize().to_hex();
    hex[..32].to_string()
}

/// Identifies one retrieval strategy. Ordering is the dispatch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyId {
    Lexical,
    Semantic,
    Diversity,
}

impl StrategyId {
    pub fn as_str(self) -> &'static str {
        match self {
            StrategyId::Lexical => "lexical",
            StrategyId::Semantic => "semantic",
            StrategyId::Diversity => "diversity",
        }
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Documents returned by one strategy for one query, best first.
/// The rank of a document is its 1-based position.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalResult {
    pub strategy: StrategyId,
    pub documents: Vec<Document>,
}

impl RetrievalResult {
    pub fn new(strategy: StrategyId, documents: Vec<Document>) -> Self {
        Self { strategy, documents }
    }

    /// `(rank, document)` pairs, rank starting at 1.
    pub fn ranked(&self) -> impl Iterator<Item = (usize, &Document)> {
        self.documents.iter().enumerate().map(|(i, d)| (i + 1, d))
    }
}
