use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::{error, info};

use docqa_core::config::RetrievalSettings;
use docqa_core::error::InitError;
use docqa_core::traits::{EmbeddingIndex, Generator, LexicalIndex, RelevanceScorer};

use crate::context::assemble;
use crate::dispatch::{QueryDispatcher, StrategyCaps};
use crate::fusion::reciprocal_rank_fusion;
use crate::rerank::{RerankedCandidate, Reranker};
use crate::stream::{EventStream, StreamOrchestrator};

/// Collaborators an engine is built from. `lexical` and `scorer` are optional.
pub struct EngineParts {
    pub embedding: Arc<dyn EmbeddingIndex>,
    pub lexical: Option<Arc<dyn LexicalIndex>>,
    pub scorer: Option<Arc<dyn RelevanceScorer>>,
    pub generator: Arc<dyn Generator>,
    pub preamble: String,
}

/// Stateless across queries; clones share the same collaborators.
#[derive(Clone)]
pub struct RagEngine {
    dispatcher: Arc<QueryDispatcher>,
    reranker: Arc<Reranker>,
    orchestrator: Arc<StreamOrchestrator>,
    settings: RetrievalSettings,
    rrf_k: NonZeroU32,
}

impl RagEngine {
    pub fn new(parts: EngineParts, settings: RetrievalSettings) -> Result<Self, InitError> {
        settings.validate()?;
        let rrf_k = NonZeroU32::new(settings.rrf_k).ok_or_else(|| InitError::InvalidConfig("rrf_k must be > 0".into()))?;
        if parts.preamble.trim().is_empty() {
            return Err(InitError::InvalidConfig("generation preamble is empty".into()));
        }
        info!(
            lexical = parts.lexical.is_some(),
            reranker = parts.scorer.is_some(),
            rrf_k = settings.rrf_k,
            k_final = settings.k_final,
            "RAG engine ready"
        );
        Ok(Self {
            dispatcher: Arc::new(QueryDispatcher::new(parts.embedding, parts.lexical)),
            reranker: Arc::new(Reranker::new(parts.scorer, settings.rerank_window)),
            orchestrator: Arc::new(StreamOrchestrator::new(parts.generator, parts.preamble)),
            settings,
            rrf_k,
        })
    }

    /// `top_k` when positive, the configured `k_final` otherwise.
    pub fn effective_k_final(&self, top_k: usize) -> usize {
        if top_k > 0 { top_k } else { self.settings.k_final }
    }

    /// Dispatch, fuse and rerank. Never fails: every stage degrades instead.
    pub async fn retrieve(&self, question: &str, k_final: usize) -> Vec<RerankedCandidate> {
        let results = self.dispatcher.dispatch(question, StrategyCaps::from(&self.settings)).await;
        let fused = reciprocal_rank_fusion(&results, self.rrf_k);
        let final_candidates = self.reranker.rerank(question, &fused, k_final).await;
        info!(fused = fused.len(), kept = final_candidates.len(), "retrieval complete");
        final_candidates
    }

    /// Lazily retrieves on first poll, then streams `Metadata` and tokens.
    pub fn stream_answer(&self, question: &str, top_k: usize) -> EventStream {
        let engine = self.clone();
        let question = question.to_string();
        let k_final = self.effective_k_final(top_k);
        stream::once(async move {
            let candidates = engine.retrieve(&question, k_final).await;
            let context = assemble(candidates.iter().map(|c| &c.document));
            engine.orchestrator.stream(question, context)
        })
        .flatten()
        .boxed()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub rag_engine_ready: bool,
}

/// Caller-facing wrapper holding the startup result, checked once.
pub struct AnswerService {
    engine: Result<RagEngine, InitError>,
}

impl AnswerService {
    pub fn new(engine: Result<RagEngine, InitError>) -> Self {
        if let Err(e) = &engine {
            error!(error = %e, "RAG engine failed to initialize; answers will report not ready");
        }
        Self { engine }
    }

    pub fn engine(&self) -> Option<&RagEngine> {
        self.engine.as_ref().ok()
    }

    pub fn init_error(&self) -> Option<&InitError> {
        self.engine.as_ref().err()
    }

    pub fn is_ready(&self) -> bool {
        self.engine.is_ok()
    }

    pub fn health(&self) -> Health {
        Health { status: "ok", rag_engine_ready: self.is_ready() }
    }

    pub fn stream_answer(&self, question: &str, top_k: usize) -> EventStream {
        match &self.engine {
            Ok(engine) => engine.stream_answer(question, top_k),
            Err(_) => StreamOrchestrator::not_ready(),
        }
    }
}
