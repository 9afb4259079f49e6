use crate::error::{Result, SearchError};
use codemap_graph::GraphStore;
use unicode_segmentation::UnicodeSegmentation;

const EXACT_SCORE: f32 = 100.0;
const PREFIX_SCORE: f32 = 60.0;
const SUBSTRING_SCORE: f32 = 30.0;
const SUMMARY_SCORE: f32 = 10.0;

/// One node ranked by the lexical pass
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalHit {
    pub node_id: String,
    pub score: f32,
}

/// Rank nodes by plain text evidence, strongest tier first
///
/// Exact name equality beats a name prefix, which beats a substring
/// anywhere in the name or qualified name, which beats words found only
/// in a generated summary. Summary hits are refined by how many query
/// words the summary contains, without ever crossing into the tier above.
pub fn lexical_search(store: &GraphStore, query: &str, limit: usize) -> Result<Vec<LexicalHit>> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Err(SearchError::EmptyQuery);
    }
    let query_words: Vec<&str> = needle.unicode_words().collect();

    let mut scored: Vec<(f32, &str, usize, &str)> = Vec::new();
    for node in store.nodes() {
        let name = node.name.to_lowercase();
        let qualified = node.qualified_name.to_lowercase();

        let score = if name == needle || qualified == needle {
            EXACT_SCORE
        } else if name.starts_with(&needle) {
            PREFIX_SCORE
        } else if name.contains(&needle) || qualified.contains(&needle) {
            SUBSTRING_SCORE
        } else if let Some(hits) = summary_hits(node.summary.as_deref(), &query_words) {
            SUMMARY_SCORE + (hits as f32).min(5.0)
        } else {
            continue;
        };
        scored.push((score, node.file.as_str(), node.line_start, node.id.as_str()));
    }

    scored.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.1.cmp(b.1))
            .then_with(|| a.2.cmp(&b.2))
            .then_with(|| a.3.cmp(b.3))
    });
    scored.truncate(limit);

    Ok(scored
        .into_iter()
        .map(|(score, _, _, id)| LexicalHit {
            node_id: id.to_string(),
            score,
        })
        .collect())
}

/// How many query words appear in the summary, `None` when none do
fn summary_hits(summary: Option<&str>, query_words: &[&str]) -> Option<usize> {
    let summary = summary?.to_lowercase();
    let words: Vec<&str> = summary.unicode_words().collect();
    let hits = query_words
        .iter()
        .map(|q| words.iter().filter(|w| *w == q).count())
        .sum();
    if hits > 0 {
        Some(hits)
    } else {
        None
    }
}
