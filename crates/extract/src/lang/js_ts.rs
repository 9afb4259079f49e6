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
    "for_statement",
    "for_in_statement",
    "while_statement",
    "do_statement",
    "switch_case",
    "catch_clause",
    "ternary_expression",
];

/// Structural extraction for JavaScript sources
pub struct JavaScriptExtractor;

impl StructuralExtractor for JavaScriptExtractor {
    fn language(&self) -> Language {
        Language::JavaScript
    }

    fn extract(&self, path: &str, source: &str) -> Result<Extraction> {
        extract_js_like(Language::JavaScript, path, source)
    }
}

/// Structural extraction for TypeScript sources
///
/// Shares the JavaScript walker; interfaces, enums, parameter types and
/// accessibility modifiers only ever appear in TypeScript trees.
pub struct TypeScriptExtractor;

impl StructuralExtractor for TypeScriptExtractor {
    fn language(&self) -> Language {
        Language::TypeScript
    }

    fn extract(&self, path: &str, source: &str) -> Result<Extraction> {
        extract_js_like(Language::TypeScript, path, source)
    }
}

fn extract_js_like(language: Language, path: &str, source: &str) -> Result<Extraction> {
    let tree = parse_source(language, path, source)?;
    let mut walker = Walker {
        source,
        path,
        language,
        file_id: stable_node_id(path, language, path, NodeKind::File),
        out: Extraction::default(),
    };
    walker.program(tree.root_node());
    Ok(walker.out)
}

struct Walker<'a> {
    source: &'a str,
    path: &'a str,
    language: Language,
    file_id: String,
    out: Extraction,
}

impl<'a> Walker<'a> {
    fn program(&mut self, root: TsNode) {
        let mut cursor = root.walk();
        let children: Vec<_> = root.children(&mut cursor).collect();
        for child in children {
            self.top_level(child);
        }
    }

    fn top_level(&mut self, node: TsNode) {
        match node.kind() {
            "import_statement" => self.import_statement(node),
            "export_statement" => {
                if let Some(declaration) = node.child_by_field_name("declaration") {
                    self.top_level(declaration);
                }
            }
            "class_declaration" | "abstract_class_declaration" => self.class_declaration(node),
            "function_declaration" | "generator_function_declaration" => {
                self.function_declaration(node);
            }
            "lexical_declaration" | "variable_declaration" => self.variable_declaration(node),
            "interface_declaration" => self.interface_declaration(node),
            "enum_declaration" => self.enum_declaration(node),
            _ => {
                let caller = self.file_id.clone();
                self.collect_calls(node, &caller);
            }
        }
    }

    /// `import { a, b as c } from './mod'` yields one import node per name
    fn import_statement(&mut self, node: TsNode) {
        let Some(module) =
            field_text(node, "source", self.source).and_then(unquote).map(str::to_string)
        else {
            return;
        };
        let (start, end) = node_lines(node);

        let mut named = Vec::new();
        collect_kinds(
            node,
            &["import_specifier", "namespace_import", "identifier"],
            &mut named,
        );
        if named.is_empty() {
            // Bare side-effect import: `import './polyfill'`
            self.push_import(&module, module_basename(&module), start, end);
            return;
        }
        for spec in named {
            // Local binding names the node; the source symbol qualifies it
            let (local, original) = match spec.kind() {
                "import_specifier" => {
                    let original = field_text(spec, "name", self.source).unwrap_or_default();
                    let local = field_text(spec, "alias", self.source).unwrap_or(original);
                    (local, original)
                }
                "namespace_import" => {
                    let local = spec
                        .named_child(0)
                        .map(|c| node_text(c, self.source))
                        .unwrap_or_default();
                    (local, "*")
                }
                _ => {
                    let local = node_text(spec, self.source);
                    (local, local)
                }
            };
            if local.is_empty() {
                continue;
            }
            self.push_import(&format!("{module}.{original}"), local, start, end);
        }
    }

    fn push_import(&mut self, qualified: &str, name: &str, start: usize, end: usize) {
        self.out.nodes.push(Node::new(
            NodeKind::Import,
            name,
            qualified,
            self.path,
            self.language,
            start,
            end,
        ));
    }

    fn class_declaration(&mut self, node: TsNode) {
        let Some(name) = field_text(node, "name", self.source) else {
            return;
        };
        let (start, end) = node_lines(node);
        let class_node = Node::new(
            NodeKind::Class,
            name,
            name,
            self.path,
            self.language,
            start,
            end,
        );
        let class_id = class_node.id.clone();
        self.out.nodes.push(class_node);

        let Some(body) = node.child_by_field_name("body") else {
            return;
        };
        let class_name = name.to_string();
        let mut cursor = body.walk();
        let children: Vec<_> = body.children(&mut cursor).collect();
        for child in children {
            if child.kind() == "method_definition" {
                self.method_definition(child, &class_name);
            } else {
                self.collect_calls(child, &class_id);
            }
        }
    }

    fn method_definition(&mut self, node: TsNode, class_name: &str) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        if name_node.kind() == "computed_property_name" {
            return;
        }
        let name = node_text(name_node, self.source);
        let (start, end) = node_lines(node);

        let mut method = Node::new(
            NodeKind::Method,
            name,
            format!("{class_name}.{name}"),
            self.path,
            self.language,
            start,
            end,
        );
        method.visibility = self.member_visibility(node, name_node);
        method.is_async = has_child(node, "async");
        if let Some(params) = node.child_by_field_name("parameters") {
            method.params = self.parameters(params);
        }
        method.return_type = self.annotated_type(node);
        if let Some(body) = node.child_by_field_name("body") {
            method.complexity = complexity_of(body, DECISION_KINDS);
        }

        let method_id = method.id.clone();
        self.out.nodes.push(method);
        if let Some(body) = node.child_by_field_name("body") {
            self.collect_calls(body, &method_id);
        }
    }

    fn function_declaration(&mut self, node: TsNode) {
        let Some(name) = field_text(node, "name", self.source) else {
            return;
        };
        let (start, end) = node_lines(node);
        let mut func = Node::new(
            NodeKind::Function,
            name,
            name,
            self.path,
            self.language,
            start,
            end,
        );
        func.is_async = has_child(node, "async");
        if let Some(params) = node.child_by_field_name("parameters") {
            func.params = self.parameters(params);
        }
        func.return_type = self.annotated_type(node);
        if let Some(body) = node.child_by_field_name("body") {
            func.complexity = complexity_of(body, DECISION_KINDS);
        }

        let func_id = func.id.clone();
        self.out.nodes.push(func);
        if let Some(body) = node.child_by_field_name("body") {
            self.collect_calls(body, &func_id);
        }
    }

    /// `const getUser = async (id) => { ... }` becomes a function node
    fn variable_declaration(&mut self, node: TsNode) {
        let mut cursor = node.walk();
        let declarators: Vec<_> = node
            .named_children(&mut cursor)
            .filter(|c| c.kind() == "variable_declarator")
            .collect();
        for declarator in declarators {
            let Some(value) = declarator.child_by_field_name("value") else {
                continue;
            };
            if !matches!(value.kind(), "arrow_function" | "function_expression" | "function") {
                let caller = self.file_id.clone();
                self.collect_calls(value, &caller);
                continue;
            }
            let Some(name) = field_text(declarator, "name", self.source) else {
                continue;
            };
            let (start, end) = node_lines(node);
            let mut func = Node::new(
                NodeKind::Function,
                name,
                name,
                self.path,
                self.language,
                start,
                end,
            );
            func.is_async = has_child(value, "async");
            if let Some(params) = value.child_by_field_name("parameters") {
                func.params = self.parameters(params);
            } else if let Some(single) = value.child_by_field_name("parameter") {
                func.params = vec![Param::untyped(node_text(single, self.source))];
            }
            func.return_type = self.annotated_type(value);
            if let Some(body) = value.child_by_field_name("body") {
                func.complexity = complexity_of(body, DECISION_KINDS);
            }

            let func_id = func.id.clone();
            self.out.nodes.push(func);
            if let Some(body) = value.child_by_field_name("body") {
                self.collect_calls(body, &func_id);
            }
        }
    }

    /// TypeScript interfaces normalize to class nodes with method children
    fn interface_declaration(&mut self, node: TsNode) {
        let Some(name) = field_text(node, "name", self.source) else {
            return;
        };
        let (start, end) = node_lines(node);
        self.out.nodes.push(Node::new(
            NodeKind::Class,
            name,
            name,
            self.path,
            self.language,
            start,
            end,
        ));

        let Some(body) = node.child_by_field_name("body") else {
            return;
        };
        let mut cursor = body.walk();
        let signatures: Vec<_> = body
            .named_children(&mut cursor)
            .filter(|c| c.kind() == "method_signature")
            .collect();
        for signature in signatures {
            let Some(method_name) = field_text(signature, "name", self.source) else {
                continue;
            };
            let (sig_start, sig_end) = node_lines(signature);
            let mut method = Node::new(
                NodeKind::Method,
                method_name,
                format!("{name}.{method_name}"),
                self.path,
                self.language,
                sig_start,
                sig_end,
            );
            if let Some(params) = signature.child_by_field_name("parameters") {
                method.params = self.parameters(params);
            }
            method.return_type = self.annotated_type(signature);
            self.out.nodes.push(method);
        }
    }

    fn enum_declaration(&mut self, node: TsNode) {
        let Some(name) = field_text(node, "name", self.source) else {
            return;
        };
        let (start, end) = node_lines(node);
        self.out.nodes.push(Node::new(
            NodeKind::Class,
            name,
            name,
            self.path,
            self.language,
            start,
            end,
        ));
    }

    fn parameters(&self, params: TsNode) -> Vec<Param> {
        let mut collected = Vec::new();
        let mut cursor = params.walk();
        for child in params.named_children(&mut cursor) {
            let param = match child.kind() {
                "identifier" => Param::untyped(node_text(child, self.source)),
                "required_parameter" | "optional_parameter" => {
                    let name = field_text(child, "pattern", self.source).unwrap_or_default();
                    Param::new(name, strip_annotation(field_text(child, "type", self.source)))
                }
                "assignment_pattern" => {
                    let name = field_text(child, "left", self.source).unwrap_or_default();
                    Param::untyped(name)
                }
                "rest_pattern" => Param::untyped(node_text(child, self.source)),
                _ => continue,
            };
            if !param.name.is_empty() {
                collected.push(param);
            }
        }
        collected
    }

    fn annotated_type(&self, node: TsNode) -> Option<String> {
        field_text(node, "return_type", self.source).map(|t| strip_annotation(Some(t)))
            .filter(|t| !t.is_empty())
    }

    fn member_visibility(&self, node: TsNode, name_node: TsNode) -> Visibility {
        if name_node.kind() == "private_property_identifier" {
            return Visibility::Private;
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "accessibility_modifier" {
                return match node_text(child, self.source) {
                    "private" => Visibility::Private,
                    "protected" => Visibility::Protected,
                    _ => Visibility::Public,
                };
            }
        }
        Visibility::Public
    }

    fn collect_calls(&mut self, node: TsNode, caller_id: &str) {
        match node.kind() {
            "call_expression" => {
                // Route registrations become endpoint nodes, not call edges;
                // their handler arguments are still scanned below.
                if !self.route_registration(node) {
                    if let Some(function) = node.child_by_field_name("function") {
                        self.push_call(node, node_text(function, self.source), caller_id);
                    }
                }
            }
            "new_expression" => {
                if let Some(constructor) = node.child_by_field_name("constructor") {
                    self.push_call(node, node_text(constructor, self.source), caller_id);
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

    fn push_call(&mut self, call: TsNode, callee_text: &str, caller_id: &str) {
        let Some(callee) = resolve_callee(callee_text) else {
            return;
        };
        let arguments = call
            .child_by_field_name("arguments")
            .map(|args| argument_texts(args, self.source))
            .unwrap_or_default();
        let (line, _) = node_lines(call);
        self.out.calls.push(CallSite {
            caller_id: caller_id.to_string(),
            callee,
            arguments,
            line,
        });
    }

    /// `app.get('/users/:id', handler)` declares an endpoint
    fn route_registration(&mut self, call: TsNode) -> bool {
        let Some(function) = call.child_by_field_name("function") else {
            return false;
        };
        if function.kind() != "member_expression" {
            return false;
        }
        let Some(object) = function.child_by_field_name("object") else {
            return false;
        };
        if object.kind() != "identifier" {
            return false;
        }
        let Some(verb) = field_text(function, "property", self.source) else {
            return false;
        };
        let object_name = node_text(object, self.source);
        if !ROUTE_OBJECTS.contains(object_name) || !ROUTE_METHODS.contains(verb) {
            return false;
        }

        let Some(args) = call.child_by_field_name("arguments") else {
            return false;
        };
        let Some(path) = first_string_literal(args, self.source).filter(|p| p.starts_with('/'))
        else {
            return false;
        };

        let (line, _) = node_lines(call);
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
            self.language,
            line,
            line,
        ));
        true
    }
}

fn strip_annotation(text: Option<&str>) -> String {
    text.map(|t| t.trim_start_matches(':').trim().to_string())
        .unwrap_or_default()
}

fn module_basename(module: &str) -> &str {
    module
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(module)
}

fn first_string_literal(args: TsNode, source: &str) -> Option<String> {
    let mut cursor = args.walk();
    let found = args
        .named_children(&mut cursor)
        .find(|c| c.kind() == "string")
        .and_then(|c| unquote(node_text(c, source)))
        .map(str::to_string);
    found
}

fn collect_kinds<'t>(node: TsNode<'t>, kinds: &[&str], out: &mut Vec<TsNode<'t>>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if kinds.contains(&child.kind()) {
            out.push(child);
        } else {
            collect_kinds(child, kinds, out);
        }
    }
}
