use std::collections::HashMap;

/// Reciprocal Rank Fusion constants
///
/// `score(d) = Σ weight_i / (k + rank_i(d) + 1)` across the rankings that
/// contain `d`. The classic `k` of 60 keeps single-list outliers from
/// dominating documents found by both rankings.
#[derive(Debug, Clone)]
pub struct FusionConfig {
    pub k: f32,
    pub lexical_weight: f32,
    pub vector_weight: f32,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            k: 60.0,
            lexical_weight: 1.0,
            vector_weight: 1.0,
        }
    }
}

/// Fuse a lexical and a vector ranking into one scored id list
///
/// Inputs are rank-ordered, best first. Ids appearing in both lists
/// accumulate both contributions. Equal fused scores fall back to
/// lexical rank, so the deterministic ranking wins when the evidence
/// is even.
pub fn fuse(
    config: &FusionConfig,
    lexical: &[String],
    vector: &[String],
) -> Vec<(String, f32)> {
    let mut scores: HashMap<&str, f32> = HashMap::new();
    let mut lexical_rank: HashMap<&str, usize> = HashMap::new();

    for (rank, id) in lexical.iter().enumerate() {
        *scores.entry(id.as_str()).or_insert(0.0) +=
            config.lexical_weight / (config.k + rank as f32 + 1.0);
        lexical_rank.entry(id.as_str()).or_insert(rank);
    }
    for (rank, id) in vector.iter().enumerate() {
        *scores.entry(id.as_str()).or_insert(0.0) +=
            config.vector_weight / (config.k + rank as f32 + 1.0);
    }

    let mut fused: Vec<(String, f32)> = scores
        .into_iter()
        .map(|(id, score)| (id.to_string(), score))
        .collect();
    fused.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                let ra = lexical_rank.get(a.0.as_str()).copied().unwrap_or(usize::MAX);
                let rb = lexical_rank.get(b.0.as_str()).copied().unwrap_or(usize::MAX);
                ra.cmp(&rb)
            })
            .then_with(|| a.0.cmp(&b.0))
    });
    fused
}
