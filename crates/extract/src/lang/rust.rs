use crate::error::Result;
use crate::extractor::StructuralExtractor;
use crate::helpers::{
    argument_texts, complexity_of, field_text, find_child, node_lines, node_text, parse_source,
    resolve_callee, unquote,
};
use crate::language::Language;
use crate::types::{stable_node_id, CallSite, Extraction, Node, NodeKind, Param, Visibility};
use tree_sitter::Node as TsNode;

const DECISION_KINDS: &[&str] = &[
    "if_expression",
    "match_expression",
    "for_expression",
    "while_expression",
    "loop_expression",
];

const ROUTE_ATTRS: &[&str] = &[
    "get", "post", "put", "patch", "delete", "head", "options", "route",
];

/// Structural extraction for Rust sources
///
/// Impl methods qualify as `Target::method`, traits normalize to class
/// nodes. Attribute routes (`#[get("/path")]`) declare endpoints.
pub struct RustExtractor;

impl StructuralExtractor for RustExtractor {
    fn language(&self) -> Language {
        Language::Rust
    }

    fn extract(&self, path: &str, source: &str) -> Result<Extraction> {
        let tree = parse_source(Language::Rust, path, source)?;
        let mut walker = Walker {
            source,
            path,
            file_id: stable_node_id(path, Language::Rust, path, NodeKind::File),
            out: Extraction::default(),
        };
        walker.items(tree.root_node());
        Ok(walker.out)
    }
}

struct Walker<'a> {
    source: &'a str,
    path: &'a str,
    file_id: String,
    out: Extraction,
}

impl<'a> Walker<'a> {
    /// Walks `source_file` and `mod` / `impl` / `trait` bodies alike
    fn items(&mut self, parent: TsNode) {
        let mut cursor = parent.walk();
        let children: Vec<_> = parent.children(&mut cursor).collect();
        let mut pending_attrs: Vec<TsNode> = Vec::new();

        for child in children {
            match child.kind() {
                "attribute_item" => {
                    pending_attrs.push(child);
                    continue;
                }
                "use_declaration" => self.use_declaration(child),
                "function_item" | "function_signature_item" => {
                    self.function_item(child, None, &pending_attrs);
                }
                "struct_item" | "enum_item" | "union_item" => self.type_item(child),
                "trait_item" => self.trait_item(child),
                "impl_item" => self.impl_item(child),
                "mod_item" => {
                    if let Some(body) = child.child_by_field_name("body") {
                        self.items(body);
                    }
                }
                _ => {
                    let caller = self.file_id.clone();
                    self.collect_calls(child, &caller);
                }
            }
            pending_attrs.clear();
        }
    }

    fn use_declaration(&mut self, node: TsNode) {
        let Some(argument) = field_text(node, "argument", self.source) else {
            return;
        };
        let (start, end) = node_lines(node);
        self.out.nodes.push(Node::new(
            NodeKind::Import,
            import_name(argument),
            argument,
            self.path,
            Language::Rust,
            start,
            end,
        ));
    }

    fn type_item(&mut self, node: TsNode) {
        let Some(name) = field_text(node, "name", self.source) else {
            return;
        };
        let (start, end) = node_lines(node);
        let mut class = Node::new(
            NodeKind::Class,
            name,
            name,
            self.path,
            Language::Rust,
            start,
            end,
        );
        class.visibility = item_visibility(node, self.source);
        self.out.nodes.push(class);
    }

    fn trait_item(&mut self, node: TsNode) {
        let Some(name) = field_text(node, "name", self.source) else {
            return;
        };
        let (start, end) = node_lines(node);
        let mut class = Node::new(
            NodeKind::Class,
            name,
            name,
            self.path,
            Language::Rust,
            start,
            end,
        );
        class.visibility = item_visibility(node, self.source);
        self.out.nodes.push(class);

        let owner = name.to_string();
        if let Some(body) = node.child_by_field_name("body") {
            self.member_functions(body, &owner);
        }
    }

    fn impl_item(&mut self, node: TsNode) {
        let target = impl_target(node, self.source);
        let Some(body) = node.child_by_field_name("body") else {
            return;
        };
        match target {
            Some(owner) => self.member_functions(body, &owner),
            None => self.member_functions(body, ""),
        }
    }

    fn member_functions(&mut self, body: TsNode, owner: &str) {
        let mut cursor = body.walk();
        let children: Vec<_> = body.children(&mut cursor).collect();
        let mut pending_attrs: Vec<TsNode> = Vec::new();

        for child in children {
            match child.kind() {
                "attribute_item" => {
                    pending_attrs.push(child);
                    continue;
                }
                "function_item" | "function_signature_item" => {
                    let owner = (!owner.is_empty()).then_some(owner);
                    self.function_item(child, owner, &pending_attrs);
                }
                _ => {}
            }
            pending_attrs.clear();
        }
    }

    fn function_item(&mut self, node: TsNode, owner: Option<&str>, attrs: &[TsNode]) {
        let Some(name) = field_text(node, "name", self.source) else {
            return;
        };
        let (start, end) = node_lines(node);
        let (kind, qualified) = match owner {
            Some(owner) => (NodeKind::Method, format!("{owner}::{name}")),
            None => (NodeKind::Function, name.to_string()),
        };
        let mut symbol = Node::new(
            kind,
            name,
            qualified,
            self.path,
            Language::Rust,
            start,
            end,
        );
        symbol.visibility = item_visibility(node, self.source);
        symbol.is_async = find_child(node, "function_modifiers")
            .map(|m| node_text(m, self.source).contains("async"))
            .unwrap_or(false);
        if let Some(params) = node.child_by_field_name("parameters") {
            symbol.params = self.parameters(params);
        }
        symbol.return_type =
            field_text(node, "return_type", self.source).map(|t| t.trim().to_string());
        if let Some(body) = node.child_by_field_name("body") {
            symbol.complexity = complexity_of(body, DECISION_KINDS);
        }

        let symbol_id = symbol.id.clone();
        self.out.nodes.push(symbol);
        for attr in attrs {
            self.route_attribute(*attr);
        }
        if let Some(body) = node.child_by_field_name("body") {
            self.collect_calls(body, &symbol_id);
        }
    }

    fn parameters(&self, params: TsNode) -> Vec<Param> {
        let mut collected = Vec::new();
        let mut cursor = params.walk();
        for child in params.named_children(&mut cursor) {
            if child.kind() != "parameter" {
                continue;
            }
            let Some(pattern) = field_text(child, "pattern", self.source) else {
                continue;
            };
            let type_hint = field_text(child, "type", self.source)
                .map(|t| t.trim().to_string())
                .unwrap_or_default();
            collected.push(Param::new(pattern, type_hint));
        }
        collected
    }

    /// `#[get("/api/users/{id}")]` in the axum/rocket attribute style
    fn route_attribute(&mut self, attribute_item: TsNode) {
        let Some(attribute) = find_child(attribute_item, "attribute") else {
            return;
        };
        let Some(path_node) = attribute.named_child(0) else {
            return;
        };
        let verb = node_text(path_node, self.source);
        let verb = verb.rsplit("::").next().unwrap_or(verb);
        if !ROUTE_ATTRS.contains(&verb) {
            return;
        }
        let Some(arguments) = attribute.child_by_field_name("arguments") else {
            return;
        };
        let Some(path) = first_string_literal(arguments, self.source).filter(|p| p.starts_with('/'))
        else {
            return;
        };

        let (line, _) = node_lines(attribute_item);
        let qualified = if verb == "route" {
            path.clone()
        } else {
            format!("{} {path}", verb.to_uppercase())
        };
        self.out.nodes.push(Node::new(
            NodeKind::Endpoint,
            path,
            qualified,
            self.path,
            Language::Rust,
            line,
            line,
        ));
    }

    fn collect_calls(&mut self, node: TsNode, caller_id: &str) {
        match node.kind() {
            "call_expression" => {
                if let Some(function) = node.child_by_field_name("function") {
                    if let Some(callee) = resolve_callee(node_text(function, self.source)) {
                        let arguments = node
                            .child_by_field_name("arguments")
                            .map(|args| argument_texts(args, self.source))
                            .unwrap_or_default();
                        let (line, _) = node_lines(node);
                        self.out.calls.push(CallSite {
                            caller_id: caller_id.to_string(),
                            callee,
                            arguments,
                            line,
                        });
                    }
                }
            }
            "macro_invocation" => {
                if let Some(name) = field_text(node, "macro", self.source) {
                    if let Some(callee) = resolve_callee(name) {
                        let arguments = find_child(node, "token_tree")
                            .map(|t| macro_arguments(t, self.source))
                            .unwrap_or_default();
                        let (line, _) = node_lines(node);
                        self.out.calls.push(CallSite {
                            caller_id: caller_id.to_string(),
                            callee,
                            arguments,
                            line,
                        });
                    }
                }
            }
            _ => {}
        }
        let mut cursor = node.walk();
        let children: Vec<_> = node.children(&mut cursor).collect();
        for child in children {
            self.collect_calls(child, caller_id);
        }
    }
}

/// Base name of an impl target: `Store`, `Store<T>`, `graph::Store`
fn impl_target(impl_node: TsNode, source: &str) -> Option<String> {
    let type_node = impl_node.child_by_field_name("type")?;
    base_type_name(type_node, source)
}

fn base_type_name(type_node: TsNode, source: &str) -> Option<String> {
    match type_node.kind() {
        "type_identifier" => Some(node_text(type_node, source).to_string()),
        "generic_type" | "scoped_type_identifier" | "reference_type" => {
            let mut cursor = type_node.walk();
            let children: Vec<_> = type_node.children(&mut cursor).collect();
            children
                .into_iter()
                .rev()
                .find_map(|c| base_type_name(c, source))
        }
        _ => None,
    }
}

fn item_visibility(node: TsNode, source: &str) -> Visibility {
    match find_child(node, "visibility_modifier") {
        Some(modifier) => {
            let text = node_text(modifier, source);
            if text == "pub" {
                Visibility::Public
            } else {
                // pub(crate), pub(super), pub(in ...)
                Visibility::Protected
            }
        }
        None => Visibility::Private,
    }
}

fn import_name(argument: &str) -> &str {
    let base = argument.split("::{").next().unwrap_or(argument);
    let base = base.rsplit(" as ").next().unwrap_or(base).trim();
    base.rsplit("::").next().unwrap_or(base)
}

fn first_string_literal(node: TsNode, source: &str) -> Option<String> {
    fn walk<'t>(node: TsNode<'t>, out: &mut Option<TsNode<'t>>) {
        if out.is_some() {
            return;
        }
        if node.kind() == "string_literal" {
            *out = Some(node);
            return;
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            walk(child, out);
        }
    }

    let mut found = None;
    walk(node, &mut found);
    found.and_then(|n| unquote(node_text(n, source))).map(str::to_string)
}

/// Token-tree text of a macro call as a single opaque argument
fn macro_arguments(token_tree: TsNode, source: &str) -> Vec<String> {
    let text = node_text(token_tree, source);
    let inner = text
        .strip_prefix(['(', '[', '{'])
        .and_then(|t| t.strip_suffix([')', ']', '}']))
        .unwrap_or(text)
        .trim();
    if inner.is_empty() {
        Vec::new()
    } else {
        vec![inner.to_string()]
    }
}
