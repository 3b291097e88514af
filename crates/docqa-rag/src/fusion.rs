use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroU32;

use docqa_core::types::{content_chunk_id, Document, RetrievalResult, StrategyId};

pub const DEFAULT_RRF_K: u32 = 60;

#[derive(Debug, Clone, PartialEq)]
pub struct FusedCandidate {
    pub document: Document,
    pub rrf_score: f64,
    /// 1-based rank of the document in each strategy that returned it.
    pub original_ranks: BTreeMap<StrategyId, usize>,
}

/// Reciprocal Rank Fusion.
///
/// Every (strategy, rank, document) adds `1/(k + rank)` to the document's score.
/// Documents are keyed by `chunk_id`; a document without one is keyed by its
/// content hash. Only the first occurrence of a document within one strategy's
/// list counts, so a score is at most one term per strategy. Summing every
/// triple instead would give `[d1, d1]` a score of `1/61 + 1/62`; here it is
/// `1/61`. Output is sorted by descending score, ties broken by ascending
/// `chunk_id`.
pub fn reciprocal_rank_fusion(results: &[RetrievalResult], k: NonZeroU32) -> Vec<FusedCandidate> {
    let k = f64::from(k.get());
    let mut by_key: HashMap<String, usize> = HashMap::new();
    let mut fused: Vec<FusedCandidate> = Vec::new();

    for result in results {
        for (rank, doc) in result.ranked() {
            let key = identity(doc);
            let idx = match by_key.get(&key) {
                Some(&idx) => idx,
                None => {
                    let mut document = doc.clone();
                    document.chunk_id = key.clone();
                    fused.push(FusedCandidate { document, rrf_score: 0.0, original_ranks: BTreeMap::new() });
                    by_key.insert(key, fused.len() - 1);
                    fused.len() - 1
                }
            };
            let candidate = &mut fused[idx];
            if candidate.original_ranks.contains_key(&result.strategy) {
                continue;
            }
            candidate.original_ranks.insert(result.strategy, rank);
            candidate.rrf_score += 1.0 / (k + rank as f64);
        }
    }

    fused.sort_by(|a, b| b.rrf_score.total_cmp(&a.rrf_score).then_with(|| a.document.chunk_id.cmp(&b.document.chunk_id)));
    fused
}

fn identity(doc: &Document) -> String {
    if doc.chunk_id.is_empty() {
        content_chunk_id(&doc.metadata.source, doc.metadata.page, &doc.content)
    } else {
        doc.chunk_id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa_core::types::DocumentMeta;

    fn doc(id: &str) -> Document {
        Document::new(id, format!("content of {id}"), DocumentMeta::new("doc.pdf", 1))
    }

    fn list(strategy: StrategyId, ids: &[&str]) -> RetrievalResult {
        RetrievalResult::new(strategy, ids.iter().map(|id| doc(id)).collect())
    }

    fn k60() -> NonZeroU32 {
        NonZeroU32::new(DEFAULT_RRF_K).unwrap()
    }

    #[test]
    fn worked_example_scores() {
        let fused = reciprocal_rank_fusion(
            &[list(StrategyId::Semantic, &["d1", "d2", "d3"]), list(StrategyId::Diversity, &["d2", "d1"])],
            k60(),
        );
        let ids: Vec<&str> = fused.iter().map(|c| c.document.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["d1", "d2", "d3"], "tie between d1 and d2 resolved by chunk id");
        assert!((fused[0].rrf_score - 0.0325225).abs() < 1e-6);
        assert_eq!(fused[0].rrf_score, fused[1].rrf_score);
        assert_eq!(fused[0].rrf_score, 1.0 / 61.0 + 1.0 / 62.0);
        assert!((fused[2].rrf_score - 0.015873).abs() < 1e-6);
        assert_eq!(fused[2].rrf_score, 1.0 / 63.0);
        assert_eq!(fused[1].original_ranks.get(&StrategyId::Semantic), Some(&2));
        assert_eq!(fused[1].original_ranks.get(&StrategyId::Diversity), Some(&1));
        assert_eq!(fused[2].original_ranks.get(&StrategyId::Diversity), None);
    }

    #[test]
    fn score_is_sum_over_strategies_present() {
        let results = [
            list(StrategyId::Lexical, &["a", "b", "c", "d"]),
            list(StrategyId::Semantic, &["d", "a"]),
            list(StrategyId::Diversity, &["x", "y", "d"]),
        ];
        let k = NonZeroU32::new(10).unwrap();
        let fused = reciprocal_rank_fusion(&results, k);
        for cand in &fused {
            let expected: f64 = results
                .iter()
                .filter_map(|r| r.documents.iter().position(|d| d.chunk_id == cand.document.chunk_id))
                .map(|pos| 1.0 / (10.0 + (pos + 1) as f64))
                .sum();
            assert!((cand.rrf_score - expected).abs() < 1e-12, "{}", cand.document.chunk_id);
        }
    }

    #[test]
    fn ordering_is_total_and_idempotent() {
        let results = [list(StrategyId::Semantic, &["m", "b", "z", "a"]), list(StrategyId::Diversity, &["z", "a", "m", "b"])];
        let first = reciprocal_rank_fusion(&results, k60());
        let second = reciprocal_rank_fusion(&results, k60());
        assert_eq!(first, second);
        assert_eq!(format!("{first:?}"), format!("{second:?}"));
        for pair in first.windows(2) {
            assert!(
                pair[0].rrf_score > pair[1].rrf_score
                    || (pair[0].rrf_score == pair[1].rrf_score && pair[0].document.chunk_id < pair[1].document.chunk_id)
            );
        }
    }

    #[test]
    fn shared_chunk_appears_once() {
        let fused = reciprocal_rank_fusion(
            &[list(StrategyId::Lexical, &["d1", "d2"]), list(StrategyId::Semantic, &["d2", "d1"]), list(StrategyId::Diversity, &["d2"])],
            k60(),
        );
        assert_eq!(fused.len(), 2);
        assert_eq!(fused[0].document.chunk_id, "d2");
        assert_eq!(fused[0].original_ranks.len(), 3);
    }

    #[test]
    fn duplicate_within_one_list_counts_once() {
        let fused = reciprocal_rank_fusion(&[list(StrategyId::Semantic, &["d1", "d1", "d2"])], k60());
        assert_eq!(fused.len(), 2);
        assert_eq!(fused[0].rrf_score, 1.0 / 61.0);
        assert_ne!(fused[0].rrf_score, 1.0 / 61.0 + 1.0 / 62.0);
        assert_eq!(fused[0].original_ranks.get(&StrategyId::Semantic), Some(&1));
        assert_eq!(fused[1].document.chunk_id, "d2");
        assert_eq!(fused[1].rrf_score, 1.0 / 63.0);
    }

    #[test]
    fn missing_chunk_id_falls_back_to_content_hash() {
        let anon = |content: &str| Document::new("", content, DocumentMeta::new("doc.pdf", 2));
        let results = [
            RetrievalResult::new(StrategyId::Semantic, vec![anon("same text"), anon("other")]),
            RetrievalResult::new(StrategyId::Diversity, vec![anon("same text")]),
        ];
        let fused = reciprocal_rank_fusion(&results, k60());
        assert_eq!(fused.len(), 2);
        assert_eq!(fused[0].document.chunk_id, content_chunk_id("doc.pdf", 2, "same text"));
        assert_eq!(fused[0].original_ranks.len(), 2);
    }

    #[test]
    fn larger_k_flattens_rank_influence() {
        let results = [list(StrategyId::Semantic, &["a", "b"])];
        let gap = |k: u32| {
            let f = reciprocal_rank_fusion(&results, NonZeroU32::new(k).unwrap());
            f[0].rrf_score / f[1].rrf_score
        };
        assert!(gap(1) > gap(60));
    }

    #[test]
    fn empty_input() {
        assert!(reciprocal_rank_fusion(&[], k60()).is_empty());
        assert!(reciprocal_rank_fusion(&[list(StrategyId::Lexical, &[])], k60()).is_empty());
    }
}
