use crate::language::Language;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Kind of a symbol node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Class,
    Function,
    Method,
    Endpoint,
    Import,
}

impl NodeKind {
    /// Get kind name as string
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::File => "file",
            NodeKind::Class => "class",
            NodeKind::Function => "function",
            NodeKind::Method => "method",
            NodeKind::Endpoint => "endpoint",
            NodeKind::Import => "import",
        }
    }

    /// Kinds that can be the target of a resolved call
    pub fn is_callable(self) -> bool {
        matches!(self, NodeKind::Class | NodeKind::Function | NodeKind::Method)
    }
}

/// Symbol visibility, normalized across languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Private,
}

/// A declared parameter with its written type annotation, if any
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub type_hint: String,
}

impl Param {
    pub fn new(name: impl Into<String>, type_hint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_hint: type_hint.into(),
        }
    }

    /// Parameter without a type annotation
    pub fn untyped(name: impl Into<String>) -> Self {
        Self::new(name, "")
    }
}

/// One symbol discovered in a source file
///
/// Lines are 1-indexed and inclusive. `qualified_name` carries the
/// language's own convention (`Class.method`, `Recv.Name`,
/// `Ns\Class::method`); for file nodes it is the file path itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    pub name: String,
    pub qualified_name: String,
    pub file: String,
    pub line_start: usize,
    pub line_end: usize,
    pub language: Language,
    pub visibility: Visibility,
    pub is_async: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Param>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    pub complexity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl Node {
    /// Create a node with its stable id precomputed
    pub fn new(
        kind: NodeKind,
        name: impl Into<String>,
        qualified_name: impl Into<String>,
        file: impl Into<String>,
        language: Language,
        line_start: usize,
        line_end: usize,
    ) -> Self {
        let name = name.into();
        let qualified_name = qualified_name.into();
        let file = file.into();
        let id = stable_node_id(&file, language, &qualified_name, kind);
        Self {
            id,
            kind,
            name,
            qualified_name,
            file,
            line_start,
            line_end,
            language,
            visibility: Visibility::default(),
            is_async: false,
            params: Vec::new(),
            return_type: None,
            complexity: 1,
            summary: None,
        }
    }

    /// The file node that anchors every other node of a source file
    pub fn file_node(file: impl Into<String>, language: Language, line_end: usize) -> Self {
        let file = file.into();
        let mut node = Node::new(
            NodeKind::File,
            file.clone(),
            file.clone(),
            file,
            language,
            1,
            line_end.max(1),
        );
        node.complexity = 0;
        node
    }
}

/// A call expression awaiting resolution: caller, callee text as written,
/// full argument text, and the 1-indexed line of the call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSite {
    pub caller_id: String,
    pub callee: String,
    pub arguments: Vec<String>,
    pub line: usize,
}

/// Everything a single extractor pass found in one file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    pub nodes: Vec<Node>,
    pub calls: Vec<CallSite>,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.calls.is_empty()
    }
}

/// Deterministic 16-hex-char node id
///
/// Identical (file, language, qualified name, kind) always hashes to the
/// same id, which is what makes re-indexing idempotent.
pub fn stable_node_id(
    file: &str,
    language: Language,
    qualified_name: &str,
    kind: NodeKind,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(file.as_bytes());
    hasher.update(b"\x1f");
    hasher.update(language.as_str().as_bytes());
    hasher.update(b"\x1f");
    hasher.update(qualified_name.as_bytes());
    hasher.update(b"\x1f");
    hasher.update(kind.as_str().as_bytes());
    let digest = hasher.finalize();
    let word = u64::from_be_bytes([
        digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6], digest[7],
    ]);
    format!("{word:016x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_stable_id_deterministic() {
        let a = stable_node_id("src/a.py", Language::Python, "Svc.run", NodeKind::Method);
        let b = stable_node_id("src/a.py", Language::Python, "Svc.run", NodeKind::Method);
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn test_stable_id_varies_by_kind() {
        let f = stable_node_id("src/a.py", Language::Python, "run", NodeKind::Function);
        let m = stable_node_id("src/a.py", Language::Python, "run", NodeKind::Method);
        assert_ne!(f, m);
    }

    #[test]
    fn test_file_node_shape() {
        let node = Node::file_node("src/app.py", Language::Python, 42);
        assert_eq!(node.kind, NodeKind::File);
        assert_eq!(node.name, "src/app.py");
        assert_eq!(node.qualified_name, "src/app.py");
        assert_eq!(node.line_start, 1);
        assert_eq!(node.line_end, 42);
        assert_eq!(node.complexity, 0);
    }

    #[test]
    fn test_node_serde_field_names() {
        let node = Node::new(
            NodeKind::Function,
            "charge",
            "charge",
            "pay.py",
            Language::Python,
            3,
            9,
        );
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["kind"], "function");
        assert_eq!(json["qualified_name"], "charge");
        assert_eq!(json["line_start"], 3);
        assert_eq!(json["language"], "python");
        assert!(json.get("summary").is_none());
    }
}
