//! Maximal Marginal Relevance.
//!
//! `MMR = λ × sim(query, doc) - (1-λ) × max(sim(doc, selected))`. λ = 1.0 keeps the
//! relevance order, λ = 0.0 picks for diversity only.

#[derive(Debug, Clone)]
pub struct MmrCandidate<T> {
    pub item: T,
    pub vector: Vec<f32>,
}

fn magnitude(v: &[f32]) -> f32 { v.iter().map(|x| x * x).sum::<f32>().sqrt() }

fn cosine_similarity(a: &[f32], b: &[f32], mag_a: f32, mag_b: f32) -> f32 {
    if mag_a == 0.0 || mag_b == 0.0 { return 0.0; }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    dot / (mag_a * mag_b)
}

/// Picks up to `k` candidates greedily. `candidates` must be sorted by relevance,
/// best first; ties keep that order.
pub fn mmr_select<T>(query: &[f32], candidates: Vec<MmrCandidate<T>>, k: usize, lambda: f32) -> Vec<T> {
    if candidates.is_empty() || k == 0 { return Vec::new(); }
    let lambda = lambda.clamp(0.0, 1.0);
    let k = k.min(candidates.len());
    let query_mag = magnitude(query);

    let mut remaining: Vec<(MmrCandidate<T>, f32, f32)> = candidates
        .into_iter()
        .map(|c| {
            let mag = magnitude(&c.vector);
            let relevance = cosine_similarity(query, &c.vector, query_mag, mag);
            (c, mag, relevance)
        })
        .collect();
    // (vector, magnitude) of everything picked so far
    let mut picked: Vec<(Vec<f32>, f32)> = Vec::with_capacity(k);
    let mut out = Vec::with_capacity(k);

    while out.len() < k && !remaining.is_empty() {
        let mut best_idx = 0;
        let mut best_score = f32::NEG_INFINITY;
        for (idx, (cand, mag, relevance)) in remaining.iter().enumerate() {
            let redundancy = picked
                .iter()
                .map(|(v, m)| cosine_similarity(&cand.vector, v, *mag, *m))
                .fold(f32::NEG_INFINITY, f32::max);
            let redundancy = if picked.is_empty() { 0.0 } else { redundancy };
            let score = lambda * relevance - (1.0 - lambda) * redundancy;
            if score > best_score { best_score = score; best_idx = idx; }
        }
        let (cand, mag, _) = remaining.remove(best_idx);
        picked.push((cand.vector, mag));
        out.push(cand.item);
    }
    out
}
