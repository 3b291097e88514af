//! Hybrid retrieval and answer streaming.
//!
//! A query flows through [`dispatch::QueryDispatcher`] (lexical, semantic and
//! diversity strategies), [`fusion::reciprocal_rank_fusion`],
//! [`rerank::Reranker`], [`context::assemble`] and finally
//! [`stream::StreamOrchestrator`], which yields one `Metadata` event followed
//! by generated tokens and at most one trailing `Error`.

pub mod context;
pub mod dispatch;
pub mod engine;
pub mod fusion;
pub mod rerank;
pub mod stream;
pub mod wire;

pub use context::{assemble, AssembledContext};
pub use dispatch::{QueryDispatcher, StrategyCaps, StrategyFailure, StrategyOutcome};
pub use engine::{AnswerService, EngineParts, Health, RagEngine};
pub use fusion::{reciprocal_rank_fusion, FusedCandidate};
pub use rerank::{RerankedCandidate, Reranker};
pub use stream::{EventStream, StreamEvent, StreamOrchestrator};
