//! LanceDB-backed embedding index: chunk writer, nearest-neighbour search and
//! maximal-marginal-relevance diversification.

pub mod mmr;
pub mod schema;
pub mod search;
pub mod table;
pub mod writer;

pub use search::LanceEmbeddingIndex;
pub use writer::LanceDbIndexer;
