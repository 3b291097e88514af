use futures::join;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use docqa_core::config::RetrievalSettings;
use docqa_core::error::IndexError;
use docqa_core::traits::{EmbeddingIndex, LexicalIndex};
use docqa_core::types::{Document, RetrievalResult, StrategyId};

/// Per-strategy result caps for one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategyCaps {
    pub k_lexical: usize,
    pub k_semantic: usize,
    pub k_diversity: usize,
    /// Candidate pool the diversity strategy selects from.
    pub diversity_fetch_k: usize,
}

impl From<&RetrievalSettings> for StrategyCaps {
    fn from(s: &RetrievalSettings) -> Self {
        Self { k_lexical: s.k_lexical, k_semantic: s.k_semantic, k_diversity: s.k_diversity, diversity_fetch_k: s.diversity_fetch_k() }
    }
}

#[derive(Debug, Error)]
#[error("{strategy} strategy failed: {error}")]
pub struct StrategyFailure {
    pub strategy: StrategyId,
    #[source]
    pub error: IndexError,
}

#[derive(Debug)]
pub enum StrategyOutcome {
    Ok(RetrievalResult),
    Failed(StrategyFailure),
    /// The strategy is not configured (no lexical index on disk).
    Skipped(StrategyId),
}

impl StrategyOutcome {
    fn from_search(strategy: StrategyId, k: usize, res: Result<Vec<Document>, IndexError>) -> Self {
        match res {
            Ok(mut documents) => {
                documents.truncate(k);
                StrategyOutcome::Ok(RetrievalResult::new(strategy, documents))
            }
            Err(error) => StrategyOutcome::Failed(StrategyFailure { strategy, error }),
        }
    }
}

/// Runs every configured strategy for a query. Strategies are independent:
/// one failing never affects the others.
pub struct QueryDispatcher {
    embedding: Arc<dyn EmbeddingIndex>,
    lexical: Option<Arc<dyn LexicalIndex>>,
}

impl QueryDispatcher {
    pub fn new(embedding: Arc<dyn EmbeddingIndex>, lexical: Option<Arc<dyn LexicalIndex>>) -> Self {
        Self { embedding, lexical }
    }

    pub fn has_lexical(&self) -> bool {
        self.lexical.is_some()
    }

    /// One outcome per strategy, in `StrategyId` order. The three searches run
    /// concurrently; a cap of zero yields an empty list without a call.
    pub async fn run(&self, query: &str, caps: StrategyCaps) -> Vec<StrategyOutcome> {
        let lexical = async {
            match &self.lexical {
                None => StrategyOutcome::Skipped(StrategyId::Lexical),
                Some(_) if caps.k_lexical == 0 => StrategyOutcome::Ok(RetrievalResult::new(StrategyId::Lexical, vec![])),
                Some(index) => StrategyOutcome::from_search(StrategyId::Lexical, caps.k_lexical, index.search(query, caps.k_lexical).await),
            }
        };
        let semantic = async {
            if caps.k_semantic == 0 {
                return StrategyOutcome::Ok(RetrievalResult::new(StrategyId::Semantic, vec![]));
            }
            StrategyOutcome::from_search(StrategyId::Semantic, caps.k_semantic, self.embedding.semantic_search(query, caps.k_semantic).await)
        };
        let diversity = async {
            if caps.k_diversity == 0 {
                return StrategyOutcome::Ok(RetrievalResult::new(StrategyId::Diversity, vec![]));
            }
            let fetch_k = caps.diversity_fetch_k.max(caps.k_diversity);
            StrategyOutcome::from_search(
                StrategyId::Diversity,
                caps.k_diversity,
                self.embedding.diversity_search(query, caps.k_diversity, fetch_k).await,
            )
        };
        let (lexical, semantic, diversity) = join!(lexical, semantic, diversity);
        vec![lexical, semantic, diversity]
    }

    /// Successful strategy results only; failures are logged and dropped.
    pub async fn dispatch(&self, query: &str, caps: StrategyCaps) -> Vec<RetrievalResult> {
        let outcomes = self.run(query, caps).await;
        let mut results = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome {
                StrategyOutcome::Ok(result) => {
                    debug!(strategy = %result.strategy, hits = result.documents.len(), "strategy finished");
                    results.push(result);
                }
                StrategyOutcome::Failed(failure) => {
                    warn!(strategy = %failure.strategy, error = %failure.error, "retrieval strategy failed, continuing without it");
                }
                StrategyOutcome::Skipped(strategy) => debug!(%strategy, "strategy not configured"),
            }
        }
        info!(strategies = results.len(), "dispatch complete");
        results
    }
}
