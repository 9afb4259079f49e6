//! Shared tree-sitter plumbing used by every language extractor.

use crate::error::{ExtractError, Result};
use crate::language::Language;
use once_cell::sync::Lazy;
use std::collections::HashSet;
use tree_sitter::{Node, Parser, Tree};

/// Callee names that are language built-ins rather than project symbols.
/// Edges to these would only bury the real call graph in noise.
pub static CALL_NOISE: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // JavaScript / TypeScript
        "console.log",
        "console.error",
        "console.warn",
        "console.info",
        "console.debug",
        "require",
        "parseInt",
        "parseFloat",
        "JSON.stringify",
        "JSON.parse",
        "setTimeout",
        "setInterval",
        "clearTimeout",
        "clearInterval",
        // Python
        "print",
        "len",
        "range",
        "str",
        "int",
        "float",
        "bool",
        "list",
        "dict",
        "set",
        "tuple",
        "isinstance",
        "issubclass",
        "super",
        "type",
        "enumerate",
        "zip",
        "map",
        "filter",
        "sorted",
        "getattr",
        "setattr",
        "hasattr",
        "repr",
        "min",
        "max",
        "sum",
        "abs",
        "open",
        // Go
        "fmt.Println",
        "fmt.Printf",
        "fmt.Sprintf",
        "fmt.Errorf",
        "fmt.Print",
        "make",
        "append",
        "cap",
        "copy",
        "delete",
        "panic",
        "recover",
        "new",
        // PHP
        "var_dump",
        "print_r",
        "count",
        "strlen",
        "is_array",
        "in_array",
        "array_map",
        "array_filter",
        "array_merge",
        "array_keys",
        "sprintf",
        "implode",
        "explode",
        // Rust macros arrive here without the bang
        "println",
        "eprintln",
        "format",
        "vec",
        "write",
        "writeln",
        "assert",
        "assert_eq",
        "assert_ne",
        "debug_assert",
        "dbg",
        "todo",
        "unimplemented",
        "unreachable",
        "matches",
    ]
    .into_iter()
    .collect()
});

/// Route registration method names shared by Python and JS/TS web stacks
pub static ROUTE_METHODS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "route", "get", "post", "put", "patch", "delete", "head", "options",
    ]
    .into_iter()
    .collect()
});

/// Receiver names that conventionally hold a router or application object
pub static ROUTE_OBJECTS: Lazy<HashSet<&'static str>> =
    Lazy::new(|| ["app", "router", "blueprint", "bp", "api"].into_iter().collect());

/// Parse a source file with the grammar for `language`
///
/// Tree-sitter recovers from most syntax errors, so only an unusable tree
/// counts as a parse failure: no tree at all, or a root that is pure error.
pub fn parse_source(language: Language, path: &str, source: &str) -> Result<Tree> {
    let ts_language = language.tree_sitter_language()?;
    let mut parser = Parser::new();
    parser
        .set_language(&ts_language)
        .map_err(|e| ExtractError::grammar(format!("failed to set language: {e}")))?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| ExtractError::parse_failure(path, "tree-sitter produced no tree"))?;

    if tree.root_node().is_error() {
        return Err(ExtractError::parse_failure(path, "unparsable source"));
    }
    Ok(tree)
}

/// Source text covered by a node
pub fn node_text<'a>(node: Node, source: &'a str) -> &'a str {
    &source[node.start_byte()..node.end_byte()]
}

/// 1-indexed inclusive line span of a node
pub fn node_lines(node: Node) -> (usize, usize) {
    (
        node.start_position().row + 1,
        node.end_position().row + 1,
    )
}

/// Text of a named field child, if present
pub fn field_text<'a>(node: Node, field: &str, source: &'a str) -> Option<&'a str> {
    node.child_by_field_name(field)
        .map(|child| node_text(child, source))
}

/// First direct child with the given kind
pub fn find_child<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|child| child.kind() == kind);
    found
}

/// Whether any direct child has the given kind (anonymous tokens included)
pub fn has_child(node: Node, kind: &str) -> bool {
    find_child(node, kind).is_some()
}

/// Normalize a callee expression into a graph-worthy name
///
/// Drops built-in noise, constructor prefixes, and malformed fragments.
/// Returns `None` when the call should not become an edge.
pub fn resolve_callee(raw: &str) -> Option<String> {
    let name = raw.trim();
    let name = name.strip_prefix("new ").unwrap_or(name).trim();
    if name.is_empty() || name.ends_with('.') || name.contains('\n') {
        return None;
    }
    if CALL_NOISE.contains(name) {
        return None;
    }
    Some(name.to_string())
}

/// Literal argument texts of a call, one string per argument
pub fn argument_texts(args_node: Node, source: &str) -> Vec<String> {
    let mut cursor = args_node.walk();
    args_node
        .named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .map(|child| node_text(child, source).trim().to_string())
        .collect()
}

/// Strip matching quotes from a string literal's text
pub fn unquote(text: &str) -> Option<&str> {
    let t = text.trim();
    for quote in ['"', '\'', '`'] {
        if t.len() >= 2 && t.starts_with(quote) && t.ends_with(quote) {
            return Some(&t[1..t.len() - 1]);
        }
    }
    None
}

/// Cyclomatic-style complexity: 1 plus the number of decision points
pub fn complexity_of(body: Node, decision_kinds: &[&str]) -> u32 {
    fn walk(node: Node, kinds: &[&str], count: &mut u32) {
        if kinds.contains(&node.kind()) {
            *count += 1;
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            walk(child, kinds, count);
        }
    }

    let mut count = 0;
    walk(body, decision_kinds, &mut count);
    1 + count
}
