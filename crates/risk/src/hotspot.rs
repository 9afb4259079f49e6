use codemap_extract::{Language, NodeKind};
use codemap_graph::{Direction, EdgeKind, GraphStore};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Change frequency of one file over an observation window, supplied
/// from VCS history by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChurnRecord {
    pub file: String,
    pub commit_count: u64,
    pub window_days: u32,
}

/// Optional narrowing applied before scoring
#[derive(Debug, Clone, Default)]
pub struct HotspotFilter {
    pub path_prefix: Option<String>,
    pub kind: Option<NodeKind>,
    pub language: Option<Language>,
}

/// One symbol scored by how connected and how frequently edited it is
#[derive(Debug, Clone, Serialize)]
pub struct Hotspot {
    pub node_id: String,
    pub name: String,
    pub qualified_name: String,
    pub file: String,
    pub line: usize,
    pub kind: NodeKind,
    pub language: Language,
    pub callers: usize,
    pub churn: u64,
    pub score: f64,
}

/// `ln(1 + callers) * ln(1 + churn)`
///
/// Multiplicative on purpose: a symbol nobody calls or a file nobody
/// edits scores zero no matter how large the other factor is.
#[must_use]
pub fn hotspot_score(callers: usize, churn: u64) -> f64 {
    (callers as f64).ln_1p() * (churn as f64).ln_1p()
}

/// Score every symbol against the churn table, highest first
///
/// `limit` of zero returns everything. Callers are distinct caller
/// nodes over call and bridge edges.
pub fn hotspot_report(
    store: &GraphStore,
    churn: &[ChurnRecord],
    filter: &HotspotFilter,
    limit: usize,
) -> Vec<Hotspot> {
    let churn_by_file: HashMap<&str, u64> = churn
        .iter()
        .map(|record| (record.file.as_str(), record.commit_count))
        .collect();

    let mut hotspots: Vec<Hotspot> = store
        .nodes()
        .filter(|node| !matches!(node.kind, NodeKind::File | NodeKind::Import))
        .filter(|node| match &filter.path_prefix {
            Some(prefix) => node.file.starts_with(prefix.as_str()),
            None => true,
        })
        .filter(|node| filter.kind.map_or(true, |k| node.kind == k))
        .filter(|node| filter.language.map_or(true, |l| node.language == l))
        .map(|node| {
            let callers = distinct_callers(store, &node.id);
            let churn = churn_by_file.get(node.file.as_str()).copied().unwrap_or(0);
            Hotspot {
                node_id: node.id.clone(),
                name: node.name.clone(),
                qualified_name: node.qualified_name.clone(),
                file: node.file.clone(),
                line: node.line_start,
                kind: node.kind,
                language: node.language,
                callers,
                churn,
                score: hotspot_score(callers, churn),
            }
        })
        .collect();

    hotspots.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.callers.cmp(&a.callers))
            .then_with(|| a.file.cmp(&b.file))
            .then_with(|| a.line.cmp(&b.line))
            .then_with(|| a.node_id.cmp(&b.node_id))
    });
    if limit > 0 {
        hotspots.truncate(limit);
    }
    hotspots
}

/// Distinct nodes with a call or bridge edge into `node_id`
pub(crate) fn distinct_callers(store: &GraphStore, node_id: &str) -> usize {
    store
        .neighbors(node_id, Direction::Callers, None)
        .iter()
        .filter(|edge| edge.kind != EdgeKind::Imports)
        .map(|edge| edge.from_node.as_str())
        .collect::<HashSet<_>>()
        .len()
}
