use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::{GenerationError, IndexError, ScoringError};
use crate::types::Document;

/// Lazy, forward-only sequence of generated tokens. Dropping it cancels the
/// underlying generation call.
pub type TokenStream = BoxStream<'static, Result<String, GenerationError>>;

pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

#[async_trait]
pub trait EmbeddingIndex: Send + Sync {
    /// Up to `k` documents ranked by embedding similarity.
    async fn semantic_search(&self, query: &str, k: usize) -> Result<Vec<Document>, IndexError>;

    /// Up to `k` documents balancing relevance and diversity, chosen from the
    /// `fetch_k` nearest candidates.
    async fn diversity_search(&self, query: &str, k: usize, fetch_k: usize) -> Result<Vec<Document>, IndexError>;
}

#[async_trait]
pub trait LexicalIndex: Send + Sync {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<Document>, IndexError>;
}

#[async_trait]
pub trait RelevanceScorer: Send + Sync {
    /// One score per document, in input order; higher is more relevant.
    async fn score(&self, query: &str, documents: &[Document]) -> Result<Vec<f32>, ScoringError>;
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn stream_completion(&self, preamble: &str, context: &str, question: &str) -> Result<TokenStream, GenerationError>;
}
