use crate::error::Result;
use crate::extractor::StructuralExtractor;
use crate::helpers::{
    argument_texts, complexity_of, field_text, node_lines, node_text, parse_source,
    resolve_callee, unquote,
};
use crate::language::Language;
use crate::types::{stable_node_id, CallSite, Extraction, Node, NodeKind, Param, Visibility};
use tree_sitter::Node as TsNode;

const DECISION_KINDS: &[&str] = &[
    "if_statement",
    "for_statement",
    "expression_switch_statement",
    "type_switch_statement",
    "select_statement",
];

/// `r.GET("/users", handler)` style registrations used by gin and echo
const ROUTER_VERBS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

/// Structural extraction for Go sources
///
/// Structs and interfaces normalize to class nodes; methods qualify as
/// `Receiver.Name`. Exported-initial names are public, everything else
/// package private.
pub struct GoExtractor;

impl StructuralExtractor for GoExtractor {
    fn language(&self) -> Language {
        Language::Go
    }

    fn extract(&self, path: &str, source: &str) -> Result<Extraction> {
        let tree = parse_source(Language::Go, path, source)?;
        let mut walker = Walker {
            source,
            path,
            file_id: stable_node_id(path, Language::Go, path, NodeKind::File),
            out: Extraction::default(),
        };
        walker.source_file(tree.root_node());
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
    fn source_file(&mut self, root: TsNode) {
        let mut cursor = root.walk();
        let children: Vec<_> = root.children(&mut cursor).collect();
        for child in children {
            match child.kind() {
                "import_declaration" => self.import_declaration(child),
                "function_declaration" => self.function_declaration(child),
                "method_declaration" => self.method_declaration(child),
                "type_declaration" => self.type_declaration(child),
                _ => {
                    let caller = self.file_id.clone();
                    self.collect_calls(child, &caller);
                }
            }
        }
    }

    fn import_declaration(&mut self, node: TsNode) {
        let mut specs = Vec::new();
        collect_kind(node, "import_spec", &mut specs);
        for spec in specs {
            let Some(path_text) = field_text(spec, "path", self.source) else {
                continue;
            };
            let module = unquote(path_text).unwrap_or(path_text);
            let name = field_text(spec, "name", self.source)
                .unwrap_or_else(|| module.rsplit('/').next().unwrap_or(module));
            let (start, end) = node_lines(spec);
            self.out.nodes.push(Node::new(
                NodeKind::Import,
                name,
                module,
                self.path,
                Language::Go,
                start,
                end,
            ));
        }
    }

    fn function_declaration(&mut self, node: TsNode) {
        let Some(name) = field_text(node, "name", self.source) else {
            return;
        };
        self.push_callable(node, NodeKind::Function, name, name.to_string());
    }

    /// `func (s *Server) Handle(...)` qualifies as `Server.Handle`
    fn method_declaration(&mut self, node: TsNode) {
        let Some(name) = field_text(node, "name", self.source) else {
            return;
        };
        let receiver = node
            .child_by_field_name("receiver")
            .and_then(|r| self.receiver_type(r));
        let qualified = match &receiver {
            Some(recv) => format!("{recv}.{name}"),
            None => name.to_string(),
        };
        self.push_callable(node, NodeKind::Method, name, qualified);
    }

    fn push_callable(&mut self, node: TsNode, kind: NodeKind, name: &str, qualified: String) {
        let (start, end) = node_lines(node);
        let mut symbol = Node::new(
            kind,
            name,
            qualified,
            self.path,
            Language::Go,
            start,
            end,
        );
        symbol.visibility = visibility_of(name);
        if let Some(params) = node.child_by_field_name("parameters") {
            symbol.params = self.parameters(params);
        }
        symbol.return_type =
            field_text(node, "result", self.source).map(|t| t.trim().to_string());
        if let Some(body) = node.child_by_field_name("body") {
            symbol.complexity = complexity_of(body, DECISION_KINDS);
        }

        let symbol_id = symbol.id.clone();
        self.out.nodes.push(symbol);
        if let Some(body) = node.child_by_field_name("body") {
            self.collect_calls(body, &symbol_id);
        }
    }

    fn receiver_type(&self, receiver: TsNode) -> Option<String> {
        let mut decls = Vec::new();
        collect_kind(receiver, "parameter_declaration", &mut decls);
        let type_node = decls.first()?.child_by_field_name("type")?;
        Some(base_type_name(type_node, self.source))
    }

    fn type_declaration(&mut self, node: TsNode) {
        let mut specs = Vec::new();
        collect_kind(node, "type_spec", &mut specs);
        for spec in specs {
            let Some(name) = field_text(spec, "name", self.source) else {
                continue;
            };
            let Some(type_node) = spec.child_by_field_name("type") else {
                continue;
            };
            if !matches!(type_node.kind(), "struct_type" | "interface_type") {
                continue;
            }
            let (start, end) = node_lines(spec);
            let mut class = Node::new(
                NodeKind::Class,
                name,
                name,
                self.path,
                Language::Go,
                start,
                end,
            );
            class.visibility = visibility_of(name);
            self.out.nodes.push(class);

            if type_node.kind() == "interface_type" {
                self.interface_methods(type_node, name);
            }
        }
    }

    fn interface_methods(&mut self, interface: TsNode, owner: &str) {
        let mut cursor = interface.walk();
        let elems: Vec<_> = interface
            .named_children(&mut cursor)
            .filter(|c| matches!(c.kind(), "method_elem" | "method_spec"))
            .collect();
        for elem in elems {
            let Some(name) = field_text(elem, "name", self.source) else {
                continue;
            };
            let (start, end) = node_lines(elem);
            let mut method = Node::new(
                NodeKind::Method,
                name,
                format!("{owner}.{name}"),
                self.path,
                Language::Go,
                start,
                end,
            );
            method.visibility = visibility_of(name);
            if let Some(params) = elem.child_by_field_name("parameters") {
                method.params = self.parameters(params);
            }
            method.return_type =
                field_text(elem, "result", self.source).map(|t| t.trim().to_string());
            self.out.nodes.push(method);
        }
    }

    fn parameters(&self, params: TsNode) -> Vec<Param> {
        let mut collected = Vec::new();
        let mut cursor = params.walk();
        for decl in params.named_children(&mut cursor) {
            if !matches!(
                decl.kind(),
                "parameter_declaration" | "variadic_parameter_declaration"
            ) {
                continue;
            }
            let type_hint = field_text(decl, "type", self.source)
                .map(|t| t.trim().to_string())
                .unwrap_or_default();
            let mut name_cursor = decl.walk();
            let names: Vec<_> = decl
                .children_by_field_name("name", &mut name_cursor)
                .map(|n| node_text(n, self.source))
                .collect();
            if names.is_empty() {
                collected.push(Param::new("_", type_hint.clone()));
            }
            for name in names {
                collected.push(Param::new(name, type_hint.clone()));
            }
        }
        collected
    }

    fn collect_calls(&mut self, node: TsNode, caller_id: &str) {
        if node.kind() == "call_expression" && !self.route_registration(node) {
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

    /// `http.HandleFunc("/users", h)` and `r.GET("/users", h)` declare endpoints
    fn route_registration(&mut self, call: TsNode) -> bool {
        let Some(function) = call.child_by_field_name("function") else {
            return false;
        };
        if function.kind() != "selector_expression" {
            return false;
        }
        let Some(verb) = field_text(function, "field", self.source) else {
            return false;
        };
        let is_mux = verb == "HandleFunc" || verb == "Handle";
        let is_router = ROUTER_VERBS.contains(&verb);
        if !is_mux && !is_router {
            return false;
        }
        let Some(args) = call.child_by_field_name("arguments") else {
            return false;
        };
        let mut cursor = args.walk();
        let Some(path) = args
            .named_children(&mut cursor)
            .find(|c| c.kind() == "interpreted_string_literal")
            .and_then(|c| unquote(node_text(c, self.source)))
            .filter(|p| p.starts_with('/'))
        else {
            return false;
        };

        let (line, _) = node_lines(call);
        let qualified = if is_router {
            format!("{verb} {path}")
        } else {
            path.to_string()
        };
        self.out.nodes.push(Node::new(
            NodeKind::Endpoint,
            path,
            qualified,
            self.path,
            Language::Go,
            line,
            line,
        ));
        true
    }
}

fn visibility_of(name: &str) -> Visibility {
    if name.chars().next().is_some_and(|c| c.is_uppercase()) {
        Visibility::Public
    } else {
        Visibility::Private
    }
}

/// Base identifier of a receiver type, `*Server` and `Server[T]` included
fn base_type_name(type_node: TsNode, source: &str) -> String {
    match type_node.kind() {
        "pointer_type" | "generic_type" => type_node
            .named_child(0)
            .map(|c| base_type_name(c, source))
            .unwrap_or_else(|| node_text(type_node, source).to_string()),
        _ => node_text(type_node, source).to_string(),
    }
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

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn extract(source: &str) -> Extraction {
        GoExtractor.extract("internal/api/server.go", source).unwrap()
    }

    fn find<'a>(extraction: &'a Extraction, qualified: &str) -> &'a Node {
        extraction
            .nodes
            .iter()
            .find(|n| n.qualified_name == qualified)
            .unwrap_or_else(|| panic!("missing node {qualified}"))
    }

    #[test]
    fn test_method_with_pointer_receiver() {
        let extraction = extract(
            "package api\n\
             \n\
             type Server struct{}\n\
             \n\
             func (s *Server) Handle(req Request) error {\n\
             \tif req.Valid() {\n\
             \t\treturn s.process(req)\n\
             \t}\n\
             \treturn nil\n\
             }\n",
        );
        let class = find(&extraction, "Server");
        assert_eq!(class.kind, NodeKind::Class);
        assert_eq!(class.visibility, Visibility::Public);

        let method = find(&extraction, "Server.Handle");
        assert_eq!(method.kind, NodeKind::Method);
        assert_eq!(method.params, vec![Param::new("req", "Request")]);
        assert_eq!(method.return_type.as_deref(), Some("error"));
        assert_eq!(method.complexity, 2);
    }

    #[test]
    fn test_unexported_function_is_private() {
        let extraction = extract("package api\n\nfunc helper() {}\n");
        assert_eq!(find(&extraction, "helper").visibility, Visibility::Private);
    }

    #[test]
    fn test_imports_with_alias() {
        let extraction = extract(
            "package api\n\
             \n\
             import (\n\
             \t\"net/http\"\n\
             \tlog \"github.com/rs/zerolog\"\n\
             )\n",
        );
        let imports: Vec<_> = extraction
            .nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Import)
            .map(|n| (n.name.as_str(), n.qualified_name.as_str()))
            .collect();
        assert_eq!(
            imports,
            vec![("http", "net/http"), ("log", "github.com/rs/zerolog")]
        );
    }

    #[test]
    fn test_interface_methods() {
        let extraction = extract(
            "package api\n\
             \n\
             type Store interface {\n\
             \tLoad(id string) (*User, error)\n\
             \tSave(u *User) error\n\
             }\n",
        );
        assert_eq!(find(&extraction, "Store").kind, NodeKind::Class);
        let load = find(&extraction, "Store.Load");
        assert_eq!(load.kind, NodeKind::Method);
        assert_eq!(load.params, vec![Param::new("id", "string")]);
        assert_eq!(load.return_type.as_deref(), Some("(*User, error)"));
    }

    #[test]
    fn test_handlefunc_endpoint() {
        let extraction = extract(
            "package api\n\
             \n\
             func routes() {\n\
             \thttp.HandleFunc(\"/api/v1/users\", listUsers)\n\
             }\n",
        );
        let endpoint = extraction
            .nodes
            .iter()
            .find(|n| n.kind == NodeKind::Endpoint)
            .unwrap();
        assert_eq!(endpoint.name, "/api/v1/users");
        assert_eq!(endpoint.qualified_name, "/api/v1/users");
        assert!(!extraction.calls.iter().any(|c| c.callee == "http.HandleFunc"));
    }

    #[test]
    fn test_router_verb_endpoint() {
        let extraction = extract(
            "package api\n\
             \n\
             func routes() {\n\
             \trouter.GET(\"/api/v1/users/:id\", getUser)\n\
             }\n",
        );
        let endpoint = extraction
            .nodes
            .iter()
            .find(|n| n.kind == NodeKind::Endpoint)
            .unwrap();
        assert_eq!(endpoint.qualified_name, "GET /api/v1/users/:id");
    }

    #[test]
    fn test_calls_and_noise() {
        let extraction = extract(
            "package api\n\
             \n\
             func run(u User) {\n\
             \tfmt.Println(u)\n\
             \tbilling.Charge(u.ID, 100)\n\
             }\n",
        );
        let callees: Vec<_> = extraction.calls.iter().map(|c| c.callee.as_str()).collect();
        assert_eq!(callees, vec!["billing.Charge"]);
        assert_eq!(extraction.calls[0].arguments, vec!["u.ID", "100"]);
    }
}
