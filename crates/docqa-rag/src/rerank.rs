use std::sync::Arc;
use tracing::{debug, warn};

use docqa_core::error::ScoringError;
use docqa_core::traits::RelevanceScorer;
use docqa_core::types::Document;

use crate::fusion::FusedCandidate;

#[derive(Debug, Clone, PartialEq)]
pub struct RerankedCandidate {
    pub document: Document,
    pub relevance_score: f64,
}

/// Re-sorts the head of the fused list by pairwise relevance. Without a scorer,
/// or when scoring fails, the fused order is kept and `rrf_score` stands in
/// for relevance.
pub struct Reranker {
    scorer: Option<Arc<dyn RelevanceScorer>>,
    window: usize,
}

impl Reranker {
    pub fn new(scorer: Option<Arc<dyn RelevanceScorer>>, window: usize) -> Self {
        Self { scorer, window }
    }

    pub fn is_enabled(&self) -> bool {
        self.scorer.is_some()
    }

    /// At most `k_final` candidates, always drawn from `fused`.
    pub async fn rerank(&self, query: &str, fused: &[FusedCandidate], k_final: usize) -> Vec<RerankedCandidate> {
        if fused.is_empty() || k_final == 0 {
            return Vec::new();
        }
        let Some(scorer) = &self.scorer else {
            debug!("no relevance scorer configured, keeping fused order");
            return fallback(fused, k_final);
        };

        // the window never shrinks below k_final
        let window = self.window.max(k_final).min(fused.len());
        let head = &fused[..window];
        let documents: Vec<Document> = head.iter().map(|c| c.document.clone()).collect();
        match scorer.score(query, &documents).await.and_then(|scores| check_arity(scores, documents.len())) {
            Ok(scores) => {
                let mut scored: Vec<RerankedCandidate> = documents
                    .into_iter()
                    .zip(scores)
                    .map(|(document, s)| RerankedCandidate { document, relevance_score: sanitize(s) })
                    .collect();
                scored.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
                scored.truncate(k_final);
                debug!(scored = window, kept = scored.len(), "reranked");
                scored
            }
            Err(e) => {
                warn!(error = %e, candidates = window, "relevance scoring failed, falling back to fused order");
                fallback(fused, k_final)
            }
        }
    }
}

fn check_arity(scores: Vec<f32>, expected: usize) -> Result<Vec<f32>, ScoringError> {
    if scores.len() == expected {
        Ok(scores)
    } else {
        Err(ScoringError::Arity { expected, got: scores.len() })
    }
}

fn sanitize(score: f32) -> f64 {
    if score.is_nan() { f64::NEG_INFINITY } else { f64::from(score) }
}

fn fallback(fused: &[FusedCandidate], k_final: usize) -> Vec<RerankedCandidate> {
    fused
        .iter()
        .take(k_final)
        .map(|c| RerankedCandidate { document: c.document.clone(), relevance_score: c.rrf_score })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docqa_core::types::DocumentMeta;
    use std::collections::{BTreeMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ByLength {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RelevanceScorer for ByLength {
        async fn score(&self, _query: &str, documents: &[Document]) -> Result<Vec<f32>, ScoringError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(documents.iter().map(|d| d.content.len() as f32).collect())
        }
    }

    struct Fixed(Result<Vec<f32>, &'static str>);

    #[async_trait]
    impl RelevanceScorer for Fixed {
        async fn score(&self, _query: &str, _documents: &[Document]) -> Result<Vec<f32>, ScoringError> {
            self.0.clone().map_err(|e| ScoringError::Inference(e.to_string()))
        }
    }

    fn fused(contents: &[&str]) -> Vec<FusedCandidate> {
        contents
            .iter()
            .enumerate()
            .map(|(i, c)| FusedCandidate {
                document: Document::new(format!("c{i}"), *c, DocumentMeta::new("doc.pdf", i as u32 + 1)),
                rrf_score: 1.0 / (61.0 + i as f64),
                original_ranks: BTreeMap::new(),
            })
            .collect()
    }

    fn ids(out: &[RerankedCandidate]) -> Vec<&str> {
        out.iter().map(|c| c.document.chunk_id.as_str()).collect()
    }

    #[tokio::test]
    async fn output_size_is_min_of_k_and_input() {
        let scorer = Arc::new(ByLength { calls: AtomicUsize::new(0) });
        let reranker = Reranker::new(Some(scorer), 20);
        let input = fused(&["a", "bbb", "cc", "dddd", "e"]);
        for k in [1, 3, 5, 8] {
            let out = reranker.rerank("q", &input, k).await;
            assert_eq!(out.len(), k.min(input.len()));
            let known: HashSet<_> = input.iter().map(|c| c.document.chunk_id.clone()).collect();
            let seen: HashSet<_> = out.iter().map(|c| c.document.chunk_id.clone()).collect();
            assert_eq!(seen.len(), out.len());
            assert!(seen.is_subset(&known));
        }
    }

    #[tokio::test]
    async fn sorts_by_relevance_descending() {
        let reranker = Reranker::new(Some(Arc::new(ByLength { calls: AtomicUsize::new(0) })), 20);
        let out = reranker.rerank("q", &fused(&["a", "bbb", "cc", "dddd"]), 3).await;
        assert_eq!(ids(&out), vec!["c3", "c1", "c2"]);
        assert_eq!(out[0].relevance_score, 4.0);
    }

    #[tokio::test]
    async fn only_the_window_is_scored() {
        let reranker = Reranker::new(Some(Arc::new(ByLength { calls: AtomicUsize::new(0) })), 2);
        // c3 would win on length but sits outside the window of max(2, k_final=2)
        let out = reranker.rerank("q", &fused(&["a", "bb", "c", "dddddd"]), 2).await;
        assert_eq!(ids(&out), vec!["c1", "c0"]);
    }

    #[tokio::test]
    async fn empty_input_skips_scorer() {
        let scorer = Arc::new(ByLength { calls: AtomicUsize::new(0) });
        let reranker = Reranker::new(Some(Arc::clone(&scorer) as Arc<dyn RelevanceScorer>), 20);
        assert!(reranker.rerank("q", &[], 6).await.is_empty());
        assert_eq!(scorer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn scorer_failure_keeps_fused_order() {
        let reranker = Reranker::new(Some(Arc::new(Fixed(Err("model crashed")))), 20);
        let input = fused(&["a", "b", "c"]);
        let out = reranker.rerank("q", &input, 2).await;
        assert_eq!(ids(&out), vec!["c0", "c1"]);
        assert_eq!(out[0].relevance_score, input[0].rrf_score);
    }

    #[tokio::test]
    async fn wrong_arity_is_treated_as_failure() {
        let reranker = Reranker::new(Some(Arc::new(Fixed(Ok(vec![0.1, 0.9])))), 20);
        let out = reranker.rerank("q", &fused(&["a", "b", "c"]), 3).await;
        assert_eq!(ids(&out), vec!["c0", "c1", "c2"]);
    }

    #[tokio::test]
    async fn nan_scores_sink_to_the_bottom() {
        let reranker = Reranker::new(Some(Arc::new(Fixed(Ok(vec![f32::NAN, 0.2, 0.1])))), 20);
        let out = reranker.rerank("q", &fused(&["a", "b", "c"]), 3).await;
        assert_eq!(ids(&out), vec!["c1", "c2", "c0"]);
    }

    #[tokio::test]
    async fn without_scorer_fused_order_is_kept() {
        let reranker = Reranker::new(None, 20);
        assert!(!reranker.is_enabled());
        let out = reranker.rerank("q", &fused(&["a", "b", "c"]), 2).await;
        assert_eq!(ids(&out), vec!["c0", "c1"]);
    }
}
