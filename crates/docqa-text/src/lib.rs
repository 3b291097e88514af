//! docqa-text
//!
//! Tantivy-backed lexical (BM25) index over ingested chunks: a writer used at
//! ingestion and a read-only `LexicalIndex` used at query time.

pub mod tantivy_utils;
pub mod index;
pub mod search;

pub use index::TantivyIndexer;
pub use search::TantivyLexicalIndex;
