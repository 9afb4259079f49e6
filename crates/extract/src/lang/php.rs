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
    "if_statement",
    "else_if_clause",
    "for_statement",
    "foreach_statement",
    "while_statement",
    "do_statement",
    "case_statement",
    "catch_clause",
    "conditional_expression",
];

/// Structural extraction for PHP sources
///
/// Classes qualify with their namespace (`App\Billing\Service`), methods as
/// `Class::method`. Symfony-style `#[Route]` attributes declare endpoints.
pub struct PhpExtractor;

impl StructuralExtractor for PhpExtractor {
    fn language(&self) -> Language {
        Language::Php
    }

    fn extract(&self, path: &str, source: &str) -> Result<Extraction> {
        let tree = parse_source(Language::Php, path, source)?;
        let mut walker = Walker {
            source,
            path,
            file_id: stable_node_id(path, Language::Php, path, NodeKind::File),
            namespace: None,
            out: Extraction::default(),
        };
        walker.program(tree.root_node());
        Ok(walker.out)
    }
}

struct Walker<'a> {
    source: &'a str,
    path: &'a str,
    file_id: String,
    namespace: Option<String>,
    out: Extraction,
}

impl<'a> Walker<'a> {
    fn program(&mut self, root: TsNode) {
        let mut cursor = root.walk();
        let children: Vec<_> = root.children(&mut cursor).collect();
        for child in children {
            match child.kind() {
                "namespace_definition" => {
                    self.namespace = find_child(child, "namespace_name")
                        .map(|n| node_text(n, self.source).to_string());
                }
                "namespace_use_declaration" => self.use_declaration(child),
                "class_declaration"
                | "interface_declaration"
                | "trait_declaration"
                | "enum_declaration" => self.class_like(child),
                "function_definition" => self.function_definition(child),
                _ => {
                    let caller = self.file_id.clone();
                    self.collect_calls(child, &caller);
                }
            }
        }
    }

    /// `use App\Billing\Gateway as Pay;`
    fn use_declaration(&mut self, node: TsNode) {
        let mut clauses = Vec::new();
        collect_kind(node, "namespace_use_clause", &mut clauses);
        for clause in clauses {
            let Some(target) = clause
                .named_child(0)
                .filter(|c| matches!(c.kind(), "qualified_name" | "name"))
            else {
                continue;
            };
            let qualified = node_text(target, self.source);
            let alias = field_text(clause, "alias", self.source);
            let name = alias.unwrap_or_else(|| last_segment(qualified));
            let (start, end) = node_lines(node);
            self.out.nodes.push(Node::new(
                NodeKind::Import,
                name,
                qualified,
                self.path,
                Language::Php,
                start,
                end,
            ));
        }
    }

    fn class_like(&mut self, node: TsNode) {
        let Some(name) = field_text(node, "name", self.source) else {
            return;
        };
        let qualified = match &self.namespace {
            Some(ns) => format!("{ns}\\{name}"),
            None => name.to_string(),
        };
        let (start, end) = node_lines(node);
        let class_node = Node::new(
            NodeKind::Class,
            name,
            qualified.clone(),
            self.path,
            Language::Php,
            start,
            end,
        );
        let class_id = class_node.id.clone();
        self.out.nodes.push(class_node);

        let Some(body) = node.child_by_field_name("body") else {
            return;
        };
        let mut cursor = body.walk();
        let children: Vec<_> = body.children(&mut cursor).collect();
        for child in children {
            if child.kind() == "method_declaration" {
                self.method_declaration(child, &qualified);
            } else {
                self.collect_calls(child, &class_id);
            }
        }
    }

    fn method_declaration(&mut self, node: TsNode, class_qualified: &str) {
        let Some(name) = field_text(node, "name", self.source) else {
            return;
        };
        let (start, end) = node_lines(node);
        let mut method = Node::new(
            NodeKind::Method,
            name,
            format!("{class_qualified}::{name}"),
            self.path,
            Language::Php,
            start,
            end,
        );
        method.visibility = self.member_visibility(node);
        if let Some(params) = node.child_by_field_name("parameters") {
            method.params = self.parameters(params);
        }
        method.return_type =
            field_text(node, "return_type", self.source).map(|t| t.trim().to_string());
        if let Some(body) = node.child_by_field_name("body") {
            method.complexity = complexity_of(body, DECISION_KINDS);
        }

        let method_id = method.id.clone();
        self.out.nodes.push(method);
        self.route_attributes(node);
        if let Some(body) = node.child_by_field_name("body") {
            self.collect_calls(body, &method_id);
        }
    }

    fn function_definition(&mut self, node: TsNode) {
        let Some(name) = field_text(node, "name", self.source) else {
            return;
        };
        let qualified = match &self.namespace {
            Some(ns) => format!("{ns}\\{name}"),
            None => name.to_string(),
        };
        let (start, end) = node_lines(node);
        let mut func = Node::new(
            NodeKind::Function,
            name,
            qualified,
            self.path,
            Language::Php,
            start,
            end,
        );
        if let Some(params) = node.child_by_field_name("parameters") {
            func.params = self.parameters(params);
        }
        func.return_type =
            field_text(node, "return_type", self.source).map(|t| t.trim().to_string());
        if let Some(body) = node.child_by_field_name("body") {
            func.complexity = complexity_of(body, DECISION_KINDS);
        }

        let func_id = func.id.clone();
        self.out.nodes.push(func);
        self.route_attributes(node);
        if let Some(body) = node.child_by_field_name("body") {
            self.collect_calls(body, &func_id);
        }
    }

    fn member_visibility(&self, node: TsNode) -> Visibility {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "visibility_modifier" {
                return match node_text(child, self.source) {
                    "private" => Visibility::Private,
                    "protected" => Visibility::Protected,
                    _ => Visibility::Public,
                };
            }
        }
        Visibility::Public
    }

    fn parameters(&self, params: TsNode) -> Vec<Param> {
        let mut collected = Vec::new();
        let mut cursor = params.walk();
        for child in params.named_children(&mut cursor) {
            if !matches!(
                child.kind(),
                "simple_parameter" | "property_promotion_parameter" | "variadic_parameter"
            ) {
                continue;
            }
            let Some(name) = field_text(child, "name", self.source) else {
                continue;
            };
            let type_hint = field_text(child, "type", self.source)
                .map(|t| t.trim().to_string())
                .unwrap_or_default();
            collected.push(Param::new(name, type_hint));
        }
        collected
    }

    /// `#[Route('/api/users/{id}', methods: ['GET'])]`
    fn route_attributes(&mut self, declaration: TsNode) {
        let mut attributes = Vec::new();
        let mut cursor = declaration.walk();
        for child in declaration.children(&mut cursor) {
            if child.kind() == "attribute_list" {
                collect_kind(child, "attribute", &mut attributes);
            }
        }

        for attribute in attributes {
            let Some(attr_name) = attribute.named_child(0) else {
                continue;
            };
            let attr_text = node_text(attr_name, self.source);
            if attr_text != "Route" && !attr_text.ends_with("\\Route") {
                continue;
            }
            let Some(args) = find_child(attribute, "arguments") else {
                continue;
            };
            let Some((path, method)) = self.route_arguments(args) else {
                continue;
            };

            let (line, _) = node_lines(attribute);
            let qualified = match &method {
                Some(m) => format!("{m} {path}"),
                None => path.clone(),
            };
            self.out.nodes.push(Node::new(
                NodeKind::Endpoint,
                path,
                qualified,
                self.path,
                Language::Php,
                line,
                line,
            ));
        }
    }

    fn route_arguments(&self, args: TsNode) -> Option<(String, Option<String>)> {
        let mut path = None;
        let mut method = None;
        let mut cursor = args.walk();
        for arg in args.named_children(&mut cursor) {
            if arg.kind() != "argument" {
                continue;
            }
            let named = field_text(arg, "name", self.source);
            match named {
                None if path.is_none() => {
                    path = first_string(arg, self.source);
                }
                Some("methods") => {
                    let mut strings = Vec::new();
                    collect_string_values(arg, self.source, &mut strings);
                    if strings.len() == 1 {
                        method = Some(strings.remove(0).to_uppercase());
                    }
                }
                _ => {}
            }
        }
        let path = path.filter(|p| p.starts_with('/'))?;
        Some((path, method))
    }

    fn collect_calls(&mut self, node: TsNode, caller_id: &str) {
        let callee = match node.kind() {
            "function_call_expression" => node
                .child_by_field_name("function")
                .map(|f| node_text(f, self.source).to_string()),
            "member_call_expression" | "nullsafe_member_call_expression" => {
                let object = field_text(node, "object", self.source);
                let name = field_text(node, "name", self.source);
                match (object, name) {
                    (Some(object), Some(name)) => Some(format!("{object}->{name}")),
                    _ => None,
                }
            }
            "scoped_call_expression" => {
                let scope = field_text(node, "scope", self.source);
                let name = field_text(node, "name", self.source);
                match (scope, name) {
                    (Some(scope), Some(name)) => Some(format!("{scope}::{name}")),
                    _ => None,
                }
            }
            "object_creation_expression" => node
                .named_children(&mut node.walk())
                .find(|c| matches!(c.kind(), "name" | "qualified_name"))
                .map(|c| node_text(c, self.source).to_string()),
            _ => None,
        };

        if let Some(callee) = callee.as_deref().and_then(resolve_callee) {
            let arguments = find_child(node, "arguments")
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

        let mut cursor = node.walk();
        let children: Vec<_> = node.children(&mut cursor).collect();
        for child in children {
            self.collect_calls(child, caller_id);
        }
    }
}

fn last_segment(qualified: &str) -> &str {
    qualified.rsplit('\\').next().unwrap_or(qualified)
}

fn collect_kind<'t>(node: TsNode<'t>, kind: &str, out: &mut Vec<TsNode<'t>>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == kind {
            out.push(child);
        } else {
            collect_kind(child, kind, out);
        }
    }
}

fn first_string(node: TsNode, source: &str) -> Option<String> {
    let mut strings = Vec::new();
    collect_string_values(node, source, &mut strings);
    strings.into_iter().next()
}

fn collect_string_values(node: TsNode, source: &str, out: &mut Vec<String>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if matches!(child.kind(), "string" | "encapsed_string") {
            if let Some(value) = unquote(node_text(child, source)) {
                out.push(value.to_string());
            }
        } else {
            collect_string_values(child, source, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn extract(source: &str) -> Extraction {
        PhpExtractor
            .extract("src/Controller/UserController.php", source)
            .unwrap()
    }

    fn find<'a>(extraction: &'a Extraction, qualified: &str) -> &'a Node {
        extraction
            .nodes
            .iter()
            .find(|n| n.qualified_name == qualified)
            .unwrap_or_else(|| panic!("missing node {qualified}"))
    }

    #[test]
    fn test_namespaced_class_and_method() {
        let extraction = extract(
            "<?php\n\
             namespace App\\Billing;\n\
             \n\
             class PaymentService {\n\
             \x20   private function audit(): void {}\n\
             \n\
             \x20   public function charge(int $amount): bool {\n\
             \x20       if ($amount <= 0) {\n\
             \x20           return false;\n\
             \x20       }\n\
             \x20       return $this->gateway->send($amount);\n\
             \x20   }\n\
             }\n",
        );
        let class = find(&extraction, "App\\Billing\\PaymentService");
        assert_eq!(class.kind, NodeKind::Class);

        let charge = find(&extraction, "App\\Billing\\PaymentService::charge");
        assert_eq!(charge.kind, NodeKind::Method);
        assert_eq!(charge.visibility, Visibility::Public);
        assert_eq!(charge.params, vec![Param::new("$amount", "int")]);
        assert_eq!(charge.return_type.as_deref(), Some("bool"));
        assert_eq!(charge.complexity, 2);

        let audit = find(&extraction, "App\\Billing\\PaymentService::audit");
        assert_eq!(audit.visibility, Visibility::Private);
    }

    #[test]
    fn test_route_attribute_endpoint() {
        let extraction = extract(
            "<?php\n\
             namespace App\\Controller;\n\
             \n\
             class UserController {\n\
             \x20   #[Route('/api/v1/users/{id}', methods: ['GET'])]\n\
             \x20   public function show(int $id): Response {\n\
             \x20       return $this->json($this->repo->find($id));\n\
             \x20   }\n\
             }\n",
        );
        let endpoint = extraction
            .nodes
            .iter()
            .find(|n| n.kind == NodeKind::Endpoint)
            .unwrap();
        assert_eq!(endpoint.name, "/api/v1/users/{id}");
        assert_eq!(endpoint.qualified_name, "GET /api/v1/users/{id}");
    }

    #[test]
    fn test_use_declarations() {
        let extraction = extract(
            "<?php\n\
             use App\\Billing\\Gateway as Pay;\n\
             use App\\Models\\User;\n",
        );
        let imports: Vec<_> = extraction
            .nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Import)
            .map(|n| (n.name.as_str(), n.qualified_name.as_str()))
            .collect();
        assert_eq!(
            imports,
            vec![
                ("Pay", "App\\Billing\\Gateway"),
                ("User", "App\\Models\\User"),
            ]
        );
    }

    #[test]
    fn test_call_shapes() {
        let extraction = extract(
            "<?php\n\
             function pay($user) {\n\
             \x20   $svc = new PaymentService();\n\
             \x20   $svc->charge($user->id, 100);\n\
             \x20   Logger::info('paid');\n\
             \x20   var_dump($user);\n\
             }\n",
        );
        let callees: Vec<_> = extraction.calls.iter().map(|c| c.callee.as_str()).collect();
        assert_eq!(
            callees,
            vec!["PaymentService", "$svc->charge", "Logger::info"]
        );
        let charge = &extraction.calls[1];
        assert_eq!(charge.arguments, vec!["$user->id", "100"]);
    }

    #[test]
    fn test_free_function_with_namespace() {
        let extraction = extract(
            "<?php\n\
             namespace App\\Util;\n\
             function slugify(string $title): string {\n\
             \x20   return strtolower($title);\n\
             }\n",
        );
        let func = find(&extraction, "App\\Util\\slugify");
        assert_eq!(func.kind, NodeKind::Function);
        assert_eq!(func.params, vec![Param::new("$title", "string")]);
    }
}
