use crate::error::Result;
use crate::extractor::StructuralExtractor;
use crate::helpers::{
    argument_texts, complexity_of, field_text, has_child, node_lines, node_text, parse_source,
    resolve_callee, unquote, ROUTE_METHODS, ROUTE_OBJECTS,
};
use crate::language::Language;
use crate::types::{stable_node_id, CallSite, Extraction, Node, NodeKind, Param, Visibility};
use tree_sitter::Node as TsNode;

const DECISION_KINDS: &[&str] = &[
    "if_statement",
    "elif_clause",
    "for_statement",
    "while_statement",
    "except_clause",
    "conditional_expression",
    "case_clause",
    "boolean_operator",
];

/// Structural extraction for Python sources
///
/// Classes with their methods, free functions, Flask/FastAPI-style route
/// decorators as endpoints, imports, and call sites with argument text.
pub struct PythonExtractor;

impl StructuralExtractor for PythonExtractor {
    fn language(&self) -> Language {
        Language::Python
    }

    fn extract(&self, path: &str, source: &str) -> Result<Extraction> {
        let tree = parse_source(Language::Python, path, source)?;
        let mut walker = Walker {
            source,
            path,
            file_id: stable_node_id(path, Language::Python, path, NodeKind::File),
            out: Extraction::default(),
        };
        walker.module(tree.root_node());
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
    fn module(&mut self, root: TsNode) {
        let mut cursor = root.walk();
        let children: Vec<_> = root.children(&mut cursor).collect();
        for child in children {
            match child.kind() {
                "import_statement" => self.import_statement(child),
                "import_from_statement" => self.import_from_statement(child),
                "class_definition" => self.class_definition(child),
                "function_definition" => self.function_definition(child, None, &[]),
                "decorated_definition" => self.decorated_definition(child, None),
                _ => {
                    let caller = self.file_id.clone();
                    self.collect_calls(child, &caller);
                }
            }
        }
    }

    /// `import a.b.c` and `import a.b as b2`
    fn import_statement(&mut self, node: TsNode) {
        let mut cursor = node.walk();
        let children: Vec<_> = node.named_children(&mut cursor).collect();
        for child in children {
            match child.kind() {
                "dotted_name" => {
                    let module = node_text(child, self.source);
                    self.push_import(module, last_segment(module, '.'), node);
                }
                "aliased_import" => {
                    let module = field_text(child, "name", self.source).unwrap_or_default();
                    let alias = field_text(child, "alias", self.source)
                        .unwrap_or_else(|| last_segment(module, '.'));
                    self.push_import(module, alias, node);
                }
                _ => {}
            }
        }
    }

    /// `from a.b import c, d as e`
    fn import_from_statement(&mut self, node: TsNode) {
        let Some(module_node) = node.child_by_field_name("module_name") else {
            return;
        };
        let module = node_text(module_node, self.source);

        let mut cursor = node.walk();
        let children: Vec<_> = node.named_children(&mut cursor).collect();
        for child in children {
            if child.id() == module_node.id() {
                continue;
            }
            match child.kind() {
                "dotted_name" => {
                    let name = node_text(child, self.source);
                    self.push_import(&format!("{module}.{name}"), name, node);
                }
                "aliased_import" => {
                    let name = field_text(child, "name", self.source).unwrap_or_default();
                    let alias = field_text(child, "alias", self.source).unwrap_or(name);
                    self.push_import(&format!("{module}.{name}"), alias, node);
                }
                "wildcard_import" => {
                    self.push_import(&format!("{module}.*"), "*", node);
                }
                _ => {}
            }
        }
    }

    fn push_import(&mut self, qualified: &str, name: &str, span: TsNode) {
        let (start, end) = node_lines(span);
        let node = Node::new(
            NodeKind::Import,
            name,
            qualified,
            self.path,
            Language::Python,
            start,
            end,
        );
        self.out.nodes.push(node);
    }

    fn class_definition(&mut self, node: TsNode) {
        let Some(name) = field_text(node, "name", self.source) else {
            return;
        };
        let (start, end) = node_lines(node);
        let mut class_node = Node::new(
            NodeKind::Class,
            name,
            name,
            self.path,
            Language::Python,
            start,
            end,
        );
        class_node.visibility = visibility_of(name);
        let class_id = class_node.id.clone();
        self.out.nodes.push(class_node);

        let class_name = name.to_string();
        let Some(body) = node.child_by_field_name("body") else {
            return;
        };
        let mut cursor = body.walk();
        let children: Vec<_> = body.children(&mut cursor).collect();
        for child in children {
            match child.kind() {
                "function_definition" => {
                    self.function_definition(child, Some(&class_name), &[]);
                }
                "decorated_definition" => {
                    self.decorated_definition(child, Some(&class_name));
                }
                _ => self.collect_calls(child, &class_id),
            }
        }
    }

    fn decorated_definition(&mut self, node: TsNode, class_name: Option<&str>) {
        let mut decorators = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "decorator" {
                decorators.push(child);
            }
        }
        let Some(definition) = node.child_by_field_name("definition") else {
            return;
        };
        match definition.kind() {
            "function_definition" => {
                self.function_definition(definition, class_name, &decorators);
            }
            "class_definition" => self.class_definition(definition),
            _ => {}
        }
    }

    fn function_definition(&mut self, node: TsNode, class_name: Option<&str>, decorators: &[TsNode]) {
        let Some(name) = field_text(node, "name", self.source) else {
            return;
        };
        let (start, end) = node_lines(node);
        let (kind, qualified) = match class_name {
            Some(class) => (NodeKind::Method, format!("{class}.{name}")),
            None => (NodeKind::Function, name.to_string()),
        };

        let mut symbol = Node::new(
            kind,
            name,
            qualified,
            self.path,
            Language::Python,
            start,
            end,
        );
        symbol.visibility = visibility_of(name);
        symbol.is_async = has_child(node, "async");
        if let Some(params) = node.child_by_field_name("parameters") {
            symbol.params = self.parameters(params, class_name.is_some());
        }
        symbol.return_type =
            field_text(node, "return_type", self.source).map(|t| t.trim().to_string());
        if let Some(body) = node.child_by_field_name("body") {
            symbol.complexity = complexity_of(body, DECISION_KINDS);
        }

        let symbol_id = symbol.id.clone();
        self.out.nodes.push(symbol);

        for decorator in decorators {
            self.route_endpoint(*decorator);
        }

        if let Some(body) = node.child_by_field_name("body") {
            self.collect_calls(body, &symbol_id);
        }
    }

    fn parameters(&self, params: TsNode, is_method: bool) -> Vec<Param> {
        let mut collected = Vec::new();
        let mut cursor = params.walk();
        for child in params.named_children(&mut cursor) {
            let param = match child.kind() {
                "identifier" => Param::untyped(node_text(child, self.source)),
                "typed_parameter" => {
                    let name = child
                        .named_child(0)
                        .map(|n| node_text(n, self.source))
                        .unwrap_or_default();
                    let hint = field_text(child, "type", self.source).unwrap_or_default();
                    Param::new(name, hint.trim())
                }
                "default_parameter" | "typed_default_parameter" => {
                    let name = field_text(child, "name", self.source).unwrap_or_default();
                    let hint = field_text(child, "type", self.source).unwrap_or_default();
                    Param::new(name, hint.trim())
                }
                "list_splat_pattern" | "dictionary_splat_pattern" => {
                    Param::untyped(node_text(child, self.source))
                }
                _ => continue,
            };
            if is_method && (param.name == "self" || param.name == "cls") {
                continue;
            }
            if param.name.is_empty() {
                continue;
            }
            collected.push(param);
        }
        collected
    }

    /// `@app.get("/users/{id}")` and `@bp.route("/users", methods=["POST"])`
    fn route_endpoint(&mut self, decorator: TsNode) {
        let Some(call) = decorator.named_child(0).filter(|c| c.kind() == "call") else {
            return;
        };
        let Some(function) = call.child_by_field_name("function") else {
            return;
        };
        if function.kind() != "attribute" {
            return;
        }
        let Some(object) = field_text(function, "object", self.source) else {
            return;
        };
        let Some(verb) = field_text(function, "attribute", self.source) else {
            return;
        };
        if !ROUTE_OBJECTS.contains(object) || !ROUTE_METHODS.contains(verb) {
            return;
        }
        let Some(args) = call.child_by_field_name("arguments") else {
            return;
        };

        let mut path_literal = None;
        let mut kwarg_method = None;
        let mut cursor = args.walk();
        for arg in args.named_children(&mut cursor) {
            match arg.kind() {
                "string" if path_literal.is_none() => {
                    path_literal = unquote(node_text(arg, self.source)).map(str::to_string);
                }
                "keyword_argument" => {
                    if field_text(arg, "name", self.source) == Some("methods") {
                        kwarg_method = single_list_string(arg, self.source);
                    }
                }
                _ => {}
            }
        }

        let Some(path) = path_literal.filter(|p| p.starts_with('/')) else {
            return;
        };
        let method = if verb == "route" {
            kwarg_method
        } else {
            Some(verb.to_uppercase())
        };

        let (line, _) = node_lines(decorator);
        let qualified = match &method {
            Some(m) => format!("{m} {path}"),
            None => path.clone(),
        };
        let endpoint = Node::new(
            NodeKind::Endpoint,
            path,
            qualified,
            self.path,
            Language::Python,
            line,
            line,
        );
        self.out.nodes.push(endpoint);
    }

    fn collect_calls(&mut self, node: TsNode, caller_id: &str) {
        if node.kind() == "decorator" {
            return;
        }
        if node.kind() == "call" {
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
        let mut cursor = node.walk();
        let children: Vec<_> = node.children(&mut cursor).collect();
        for child in children {
            self.collect_calls(child, caller_id);
        }
    }
}

fn visibility_of(name: &str) -> Visibility {
    if name.starts_with('_') {
        Visibility::Private
    } else {
        Visibility::Public
    }
}

fn last_segment(path: &str, sep: char) -> &str {
    path.rsplit(sep).next().unwrap_or(path)
}

/// `methods=["POST"]` with exactly one entry names the HTTP method
fn single_list_string(kwarg: TsNode, source: &str) -> Option<String> {
    let value = kwarg.child_by_field_name("value")?;
    if value.kind() != "list" {
        return None;
    }
    let mut cursor = value.walk();
    let strings: Vec<_> = value
        .named_children(&mut cursor)
        .filter(|c| c.kind() == "string")
        .collect();
    if strings.len() != 1 {
        return None;
    }
    unquote(node_text(strings[0], source)).map(|s| s.to_uppercase())
}
