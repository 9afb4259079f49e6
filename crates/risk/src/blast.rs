use crate::diff::{parse_unified_diff, DiffHunk};
use crate::error::Result;
use crate::hotspot::distinct_callers;
use codemap_extract::NodeKind;
use codemap_graph::GraphStore;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Risk classification of one touched symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskBand {
    Low,
    Medium,
    High,
}

impl RiskBand {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RiskBand::Low => "low",
            RiskBand::Medium => "medium",
            RiskBand::High => "high",
        }
    }
}

/// Caller-count thresholds separating the bands
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskBands {
    pub low_max: usize,
    pub medium_max: usize,
}

impl Default for RiskBands {
    fn default() -> Self {
        Self {
            low_max: 2,
            medium_max: 10,
        }
    }
}

impl RiskBands {
    #[must_use]
    pub fn classify(&self, callers: usize) -> RiskBand {
        if callers <= self.low_max {
            RiskBand::Low
        } else if callers <= self.medium_max {
            RiskBand::Medium
        } else {
            RiskBand::High
        }
    }
}

/// A symbol whose line range intersects the diff
#[derive(Debug, Clone, Serialize)]
pub struct TouchedSymbol {
    pub node_id: String,
    pub name: String,
    pub qualified_name: String,
    pub file: String,
    pub line_start: usize,
    pub line_end: usize,
    pub caller_count: usize,
    pub risk_band: RiskBand,
}

/// What a proposed change would touch and how risky that is
#[derive(Debug, Clone, Serialize)]
pub struct DiffReport {
    pub files: usize,
    pub hunks: usize,
    pub symbols: Vec<TouchedSymbol>,
    pub highest: Option<RiskBand>,
}

/// Map a unified diff onto the graph and band every touched symbol
///
/// A diff that only touches lines outside any known symbol, or files
/// the store has never seen, legitimately reports zero symbols.
pub fn analyze_diff(store: &GraphStore, diff: &str, bands: &RiskBands) -> Result<DiffReport> {
    let hunks = parse_unified_diff(diff)?;
    Ok(analyze_hunks(store, &hunks, bands))
}

/// Same analysis over an already-built hunk list
pub fn analyze_hunks(store: &GraphStore, hunks: &[DiffHunk], bands: &RiskBands) -> DiffReport {
    let mut by_file: HashMap<&str, Vec<&DiffHunk>> = HashMap::new();
    for hunk in hunks {
        by_file.entry(hunk.file.as_str()).or_default().push(hunk);
    }

    let mut symbols: Vec<TouchedSymbol> = Vec::new();
    for (file, file_hunks) in &by_file {
        if !store.contains_file(file) {
            debug!("diff touches unindexed file {file}");
            continue;
        }
        for node_id in store.file_nodes(file) {
            let Some(node) = store.lookup_by_id(node_id) else {
                continue;
            };
            if matches!(node.kind, NodeKind::File | NodeKind::Import) {
                continue;
            }
            if !file_hunks
                .iter()
                .any(|h| h.overlaps(node.line_start, node.line_end))
            {
                continue;
            }
            let callers = distinct_callers(store, &node.id);
            symbols.push(TouchedSymbol {
                node_id: node.id.clone(),
                name: node.name.clone(),
                qualified_name: node.qualified_name.clone(),
                file: node.file.clone(),
                line_start: node.line_start,
                line_end: node.line_end,
                caller_count: callers,
                risk_band: bands.classify(callers),
            });
        }
    }
    symbols.sort_by(|a, b| {
        a.file
            .cmp(&b.file)
            .then_with(|| a.line_start.cmp(&b.line_start))
            .then_with(|| a.node_id.cmp(&b.node_id))
    });

    DiffReport {
        files: by_file.len(),
        hunks: hunks.len(),
        highest: symbols.iter().map(|s| s.risk_band).max(),
        symbols,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::LineRange;
    use codemap_extract::{CallSite, Language, Node};
    use codemap_graph::Edge;
    use pretty_assertions::assert_eq;

    fn store_with_charge(callers: usize) -> GraphStore {
        let mut store = GraphStore::new();
        let class = Node::new(
            NodeKind::Class,
            "PaymentService",
            "PaymentService",
            "src/svc.py",
            Language::Python,
            5,
            30,
        );
        let charge = Node::new(
            NodeKind::Method,
            "charge",
            "PaymentService.charge",
            "src/svc.py",
            Language::Python,
            10,
            20,
        );
        store
            .commit_file("src/svc.py", vec![class, charge], vec![])
            .unwrap();
        for i in 0..callers {
            let file = format!("src/caller{i}.py");
            let caller = Node::new(
                NodeKind::Function,
                format!("caller{i}"),
                format!("caller{i}"),
                &file,
                Language::Python,
                1,
                3,
            );
            let edge = Edge::call(
                &caller.id,
                &CallSite {
                    caller_id: caller.id.clone(),
                    callee: "PaymentService.charge".to_string(),
                    arguments: Vec::new(),
                    line: 2,
                },
            );
            store.commit_file(&file, vec![caller], vec![edge]).unwrap();
        }
        store.resolve_pending();
        store
    }

    fn diff_touching(file: &str, start: usize, count: usize) -> String {
        format!("--- a/{file}\n+++ b/{file}\n@@ -{start},{count} +{start},{count} @@\n")
    }

    #[test]
    fn test_touched_method_is_banded() {
        let store = store_with_charge(3);
        let diff = diff_touching("src/svc.py", 12, 2);

        let report = analyze_diff(&store, &diff, &RiskBands::default()).unwrap();
        assert_eq!(report.files, 1);
        assert_eq!(report.hunks, 1);
        // the class wraps the method, so both ranges intersect the hunk
        assert_eq!(report.symbols.len(), 2);
        let charge = report
            .symbols
            .iter()
            .find(|s| s.name == "charge")
            .unwrap();
        assert_eq!(charge.caller_count, 3);
        assert_eq!(charge.risk_band, RiskBand::Medium);
        assert_eq!(report.highest, Some(RiskBand::Medium));
    }

    #[test]
    fn test_edit_outside_symbols_reports_nothing() {
        let store = store_with_charge(1);
        let diff = diff_touching("src/svc.py", 1, 2);

        let report = analyze_diff(&store, &diff, &RiskBands::default()).unwrap();
        assert!(report.symbols.is_empty());
        assert_eq!(report.highest, None);
        assert_eq!(report.hunks, 1);
    }

    #[test]
    fn test_unindexed_file_reports_nothing() {
        let store = store_with_charge(1);
        let diff = diff_touching("docs/readme.md", 1, 5);

        let report = analyze_diff(&store, &diff, &RiskBands::default()).unwrap();
        assert!(report.symbols.is_empty());
        assert_eq!(report.files, 1);
    }

    #[test]
    fn test_band_thresholds() {
        let bands = RiskBands::default();
        assert_eq!(bands.classify(0), RiskBand::Low);
        assert_eq!(bands.classify(2), RiskBand::Low);
        assert_eq!(bands.classify(3), RiskBand::Medium);
        assert_eq!(bands.classify(10), RiskBand::Medium);
        assert_eq!(bands.classify(11), RiskBand::High);

        let strict = RiskBands {
            low_max: 0,
            medium_max: 1,
        };
        assert_eq!(strict.classify(1), RiskBand::Medium);
        assert_eq!(strict.classify(2), RiskBand::High);
    }

    #[test]
    fn test_malformed_diff_is_an_error() {
        let store = store_with_charge(0);
        let err = analyze_diff(&store, "@@ -1 +1 @@\n", &RiskBands::default()).unwrap_err();
        assert!(matches!(err, crate::error::RiskError::MalformedDiff(_)));
    }

    #[test]
    fn test_ready_hunks_band_a_deletion() {
        let store = store_with_charge(1);
        let hunks = vec![DiffHunk {
            file: "src/svc.py".to_string(),
            added: Vec::new(),
            removed: vec![LineRange::new(12, 14)],
        }];

        let report = analyze_hunks(&store, &hunks, &RiskBands::default());
        assert_eq!(report.hunks, 1);
        assert_eq!(report.symbols.len(), 2);
        let charge = report
            .symbols
            .iter()
            .find(|s| s.name == "charge")
            .unwrap();
        assert_eq!(charge.risk_band, RiskBand::Low);
    }
}
