use codemap_extract::{CallSite, Language, Node};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Type of relationship between nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// A calls B (call expression)
    Calls,

    /// A file imports a module
    Imports,

    /// A call site's URL argument lands on an endpoint
    Bridges,
}

impl EdgeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeKind::Calls => "calls",
            EdgeKind::Imports => "imports",
            EdgeKind::Bridges => "bridges",
        }
    }
}

/// One relationship in the graph
///
/// `to_node` is `None` for a call whose callee is not (yet) indexed; the
/// edge is kept so usages of external or not-yet-seen symbols stay
/// queryable, and resolution can fill the target in later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub from_node: String,
    pub to_node: Option<String>,
    pub kind: EdgeKind,
    /// Calls only: the callee expression exactly as written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callee_name: Option<String>,
    /// Calls only: literal argument text, one entry per argument
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_arguments: Option<Vec<String>>,
    pub line: usize,
}

impl Edge {
    /// A call edge, resolved or not
    pub fn call(from_node: impl Into<String>, site: &CallSite) -> Self {
        let from_node = from_node.into();
        let id = stable_edge_id(&from_node, EdgeKind::Calls, &site.callee, site.line);
        Self {
            id,
            from_node,
            to_node: None,
            kind: EdgeKind::Calls,
            callee_name: Some(site.callee.clone()),
            call_arguments: Some(site.arguments.clone()),
            line: site.line,
        }
    }

    /// A file-to-import edge
    pub fn import(from_node: impl Into<String>, to_node: impl Into<String>, line: usize) -> Self {
        let from_node = from_node.into();
        let to_node = to_node.into();
        let id = stable_edge_id(&from_node, EdgeKind::Imports, &to_node, line);
        Self {
            id,
            from_node,
            to_node: Some(to_node),
            kind: EdgeKind::Imports,
            callee_name: None,
            call_arguments: None,
            line,
        }
    }

    /// A bridge from a call site's caller to the endpoint it targets
    pub fn bridge(from_node: impl Into<String>, endpoint_id: impl Into<String>, line: usize) -> Self {
        let from_node = from_node.into();
        let to_node = endpoint_id.into();
        let id = stable_edge_id(&from_node, EdgeKind::Bridges, &to_node, line);
        Self {
            id,
            from_node,
            to_node: Some(to_node),
            kind: EdgeKind::Bridges,
            callee_name: None,
            call_arguments: None,
            line,
        }
    }

    /// Whether this call edge still lacks a target
    #[must_use]
    pub fn is_unresolved(&self) -> bool {
        self.kind == EdgeKind::Calls && self.to_node.is_none()
    }
}

/// Deterministic 16-hex-char edge id from caller-local facts
pub fn stable_edge_id(from_node: &str, kind: EdgeKind, target_text: &str, line: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(from_node.as_bytes());
    hasher.update(b"\x1f");
    hasher.update(kind.as_str().as_bytes());
    hasher.update(b"\x1f");
    hasher.update(target_text.as_bytes());
    hasher.update(b"\x1f");
    hasher.update(line.to_string().as_bytes());
    let digest = hasher.finalize();
    let word = u64::from_be_bytes([
        digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6], digest[7],
    ]);
    format!("{word:016x}")
}

/// Traversal direction for impact analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Who depends on this symbol (walk edges backwards)
    Callers,
    /// What this symbol depends on (walk edges forwards)
    Callees,
    /// Both at once
    Both,
}

/// Per-file rollup returned by `all_files`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSummary {
    pub path: String,
    pub language: Language,
    pub node_count: usize,
    pub edge_count: usize,
    /// Position of this file in indexing order; lower commits are older
    pub commit_seq: u64,
}

/// Full export of the graph in its wire shape
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// One hit from `find_usages`: the call edge plus its caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub edge: Edge,
    pub caller: Node,
}

/// One node reached by impact analysis, with its minimal hop distance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactedNode {
    pub node: Node,
    pub distance: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn site(callee: &str, line: usize) -> CallSite {
        CallSite {
            caller_id: "caller".into(),
            callee: callee.into(),
            arguments: vec!["x".into()],
            line,
        }
    }

    #[test]
    fn test_call_edge_starts_unresolved() {
        let edge = Edge::call("abc", &site("service.charge", 10));
        assert!(edge.is_unresolved());
        assert_eq!(edge.callee_name.as_deref(), Some("service.charge"));
        assert_eq!(edge.call_arguments, Some(vec!["x".to_string()]));
    }

    #[test]
    fn test_edge_id_is_stable() {
        let a = Edge::call("abc", &site("f", 3));
        let b = Edge::call("abc", &site("f", 3));
        assert_eq!(a.id, b.id);
        let c = Edge::call("abc", &site("f", 4));
        assert_ne!(a.id, c.id);
    }

    #[test]
    fn test_edge_serde_field_names() {
        let edge = Edge::import("from", "to", 1);
        let json = serde_json::to_value(&edge).unwrap();
        assert_eq!(json["from_node"], "from");
        assert_eq!(json["to_node"], "to");
        assert_eq!(json["kind"], "imports");
        assert!(json.get("callee_name").is_none());
    }

    #[test]
    fn test_node_serde_field_names() {
        use codemap_extract::NodeKind;

        let node = Node::new(
            NodeKind::Method,
            "charge",
            "Svc.charge",
            "src/a.py",
            Language::Python,
            2,
            9,
        );
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["kind"], "method");
        assert_eq!(json["qualified_name"], "Svc.charge");
        assert_eq!(json["line_start"], 2);
        assert_eq!(json["line_end"], 9);
        assert_eq!(json["is_async"], false);
        assert_eq!(json["visibility"], "public");
    }
}
