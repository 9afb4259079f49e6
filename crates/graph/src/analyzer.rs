use crate::cancel::CancelToken;
use crate::error::{GraphError, Result};
use crate::store::GraphStore;
use crate::types::{Direction, Edge, EdgeKind, ImpactedNode, Usage};
use codemap_extract::Node;
use globset::Glob;
use log::debug;
use regex::Regex;
use std::collections::{HashSet, VecDeque};

/// Whole-word matcher for a symbol inside callee text
///
/// `save` has to match `save` and `service.save` without matching
/// `saveAll`, so the symbol must be fenced by non-identifier characters
/// or the ends of the string.
fn symbol_pattern(symbol: &str) -> Result<Regex> {
    let trimmed = symbol.trim();
    if trimmed.is_empty() {
        return Err(GraphError::invalid_filter("symbol must not be empty"));
    }
    let pattern = format!(r"(?:^|[^\w]){}(?:[^\w]|$)", regex::escape(trimmed));
    Regex::new(&pattern)
        .map_err(|e| GraphError::invalid_filter(format!("bad symbol pattern: {e}")))
}

/// File filter that treats plain text as a path substring and anything
/// with glob metacharacters as a glob
enum PathFilter {
    Substring(String),
    Glob(globset::GlobMatcher),
}

impl PathFilter {
    fn parse(filter: &str) -> Result<Self> {
        if filter.contains(['*', '?', '[', '{']) {
            let glob = Glob::new(filter)
                .map_err(|e| GraphError::invalid_filter(format!("bad file glob: {e}")))?;
            Ok(Self::Glob(glob.compile_matcher()))
        } else {
            Ok(Self::Substring(filter.to_string()))
        }
    }

    fn matches(&self, path: &str) -> bool {
        match self {
            Self::Substring(needle) => path.contains(needle),
            Self::Glob(matcher) => matcher.is_match(path),
        }
    }
}

/// Every call site whose callee text mentions `symbol` as a whole word
///
/// `file_filter` restricts results to callers in matching files and
/// `argument_filter` to calls whose argument text contains the needle.
pub fn find_usages(
    store: &GraphStore,
    symbol: &str,
    file_filter: Option<&str>,
    argument_filter: Option<&str>,
) -> Result<Vec<Usage>> {
    let pattern = symbol_pattern(symbol)?;
    let path_filter = file_filter.map(PathFilter::parse).transpose()?;

    let mut usages: Vec<Usage> = Vec::new();
    for edge in store.edges() {
        if edge.kind != EdgeKind::Calls {
            continue;
        }
        let Some(callee) = edge.callee_name.as_deref() else {
            continue;
        };
        if !pattern.is_match(callee) {
            continue;
        }
        let Some(caller) = store.lookup_by_id(&edge.from_node) else {
            continue;
        };
        if let Some(filter) = &path_filter {
            if !filter.matches(&caller.file) {
                continue;
            }
        }
        if let Some(needle) = argument_filter {
            let arguments = edge.call_arguments.as_deref().unwrap_or(&[]);
            if !arguments.iter().any(|a| a.contains(needle)) {
                continue;
            }
        }
        usages.push(Usage {
            edge: edge.clone(),
            caller: caller.clone(),
        });
    }

    usages.sort_by(|a, b| {
        a.caller
            .file
            .cmp(&b.caller.file)
            .then_with(|| a.edge.line.cmp(&b.edge.line))
            .then_with(|| a.edge.id.cmp(&b.edge.id))
    });
    debug!("find_usages({symbol}): {} hits", usages.len());
    Ok(usages)
}

/// Breadth-first blast radius of `symbol` out to `depth` hops
///
/// Roots are every node whose name or qualified name equals the symbol.
/// Each reachable node is reported once with its minimal hop distance,
/// which also makes cycles terminate. The token is checked between
/// expansions so a superseded traversal stops early.
pub fn impact_analysis(
    store: &GraphStore,
    symbol: &str,
    depth: usize,
    direction: Direction,
    cancel: &CancelToken,
) -> Result<Vec<ImpactedNode>> {
    let roots: Vec<&Node> = store
        .nodes()
        .filter(|n| n.name == symbol || n.qualified_name == symbol)
        .collect();
    if roots.is_empty() {
        return Err(GraphError::not_found(symbol));
    }
    let root_ids: Vec<String> = roots.iter().map(|n| n.id.clone()).collect();
    impact_of_nodes(store, &root_ids, depth, direction, cancel)
}

/// Blast radius starting from one known node id
pub fn impact_of_node(
    store: &GraphStore,
    node_id: &str,
    depth: usize,
    direction: Direction,
    cancel: &CancelToken,
) -> Result<Vec<ImpactedNode>> {
    if store.lookup_by_id(node_id).is_none() {
        return Err(GraphError::not_found(node_id));
    }
    impact_of_nodes(store, &[node_id.to_string()], depth, direction, cancel)
}

fn impact_of_nodes(
    store: &GraphStore,
    roots: &[String],
    depth: usize,
    direction: Direction,
    cancel: &CancelToken,
) -> Result<Vec<ImpactedNode>> {
    let mut visited: HashSet<String> = roots.iter().cloned().collect();
    let mut queue: VecDeque<(String, usize)> =
        roots.iter().map(|id| (id.clone(), 0)).collect();
    let mut impacted: Vec<ImpactedNode> = Vec::new();

    while let Some((current, distance)) = queue.pop_front() {
        if cancel.is_cancelled() {
            return Err(GraphError::Cancelled);
        }
        if distance == depth {
            continue;
        }
        for edge in store.neighbors(&current, direction, None) {
            if edge.kind == EdgeKind::Imports {
                continue;
            }
            let next = match direction {
                Direction::Callers => step_towards_caller(&current, edge),
                Direction::Callees => step_towards_callee(&current, edge),
                Direction::Both => step_towards_caller(&current, edge)
                    .or_else(|| step_towards_callee(&current, edge)),
            };
            let Some(next_id) = next else {
                continue;
            };
            if !visited.insert(next_id.to_string()) {
                continue;
            }
            if let Some(node) = store.lookup_by_id(next_id) {
                impacted.push(ImpactedNode {
                    node: node.clone(),
                    distance: distance + 1,
                });
                queue.push_back((next_id.to_string(), distance + 1));
            }
        }
    }

    impacted.sort_by(|a, b| {
        a.distance
            .cmp(&b.distance)
            .then_with(|| a.node.file.cmp(&b.node.file))
            .then_with(|| a.node.line_start.cmp(&b.node.line_start))
            .then_with(|| a.node.id.cmp(&b.node.id))
    });
    Ok(impacted)
}

/// The node on the caller side of an edge arriving at `current`
fn step_towards_caller<'a>(current: &str, edge: &'a Edge) -> Option<&'a str> {
    if edge.to_node.as_deref() == Some(current) {
        Some(edge.from_node.as_str())
    } else {
        None
    }
}

/// The node on the callee side of an edge leaving `current`
fn step_towards_callee<'a>(current: &str, edge: &'a Edge) -> Option<&'a str> {
    if edge.from_node == current {
        edge.to_node.as_deref()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codemap_extract::{CallSite, Language, NodeKind};
    use pretty_assertions::assert_eq;

    fn node(name: &str, qualified: &str, file: &str, line: usize) -> Node {
        Node::new(
            NodeKind::Function,
            name,
            qualified,
            file,
            Language::Python,
            line,
            line + 3,
        )
    }

    fn call_edge(from: &Node, callee: &str, arguments: &[&str], line: usize) -> Edge {
        Edge::call(
            &from.id,
            &CallSite {
                caller_id: from.id.clone(),
                callee: callee.to_string(),
                arguments: arguments.iter().map(|s| s.to_string()).collect(),
                line,
            },
        )
    }

    /// a -> b -> c, plus d -> b, all in separate files
    fn chain_store() -> (GraphStore, Node, Node, Node, Node) {
        let mut store = GraphStore::new();
        let c = node("c", "c", "src/c.py", 1);
        store.commit_file("src/c.py", vec![c.clone()], vec![]).unwrap();
        let b = node("b", "b", "src/b.py", 1);
        let b_call = call_edge(&b, "c", &[], 2);
        store.commit_file("src/b.py", vec![b.clone()], vec![b_call]).unwrap();
        let a = node("a", "a", "src/a.py", 1);
        let a_call = call_edge(&a, "b", &[], 2);
        store.commit_file("src/a.py", vec![a.clone()], vec![a_call]).unwrap();
        let d = node("d", "d", "src/d.py", 1);
        let d_call = call_edge(&d, "b", &[], 2);
        store.commit_file("src/d.py", vec![d.clone()], vec![d_call]).unwrap();
        store.resolve_pending();
        (store, a, b, c, d)
    }

    #[test]
    fn test_usages_respect_word_boundaries() {
        let mut store = GraphStore::new();
        let caller = node("main", "main", "src/app.py", 1);
        let edges = vec![
            call_edge(&caller, "save", &[], 2),
            call_edge(&caller, "service.save", &[], 3),
            call_edge(&caller, "saveAll", &[], 4),
            call_edge(&caller, "save_all", &[], 5),
        ];
        store.commit_file("src/app.py", vec![caller], edges).unwrap();

        let usages = find_usages(&store, "save", None, None).unwrap();
        let callees: Vec<&str> = usages
            .iter()
            .filter_map(|u| u.edge.callee_name.as_deref())
            .collect();
        assert_eq!(callees, vec!["save", "service.save"]);
    }

    #[test]
    fn test_usages_file_filter() {
        let mut store = GraphStore::new();
        let py = node("handler", "handler", "src/app.py", 1);
        store
            .commit_file("src/app.py", vec![py.clone()], vec![call_edge(&py, "save", &[], 2)])
            .unwrap();
        let go = node("Handler", "Handler", "pkg/app.go", 1);
        store
            .commit_file("pkg/app.go", vec![go.clone()], vec![call_edge(&go, "save", &[], 2)])
            .unwrap();

        let all = find_usages(&store, "save", None, None).unwrap();
        assert_eq!(all.len(), 2);
        let py_only = find_usages(&store, "save", Some("src/"), None).unwrap();
        assert_eq!(py_only.len(), 1);
        assert_eq!(py_only[0].caller.file, "src/app.py");
        let glob = find_usages(&store, "save", Some("**/*.go"), None).unwrap();
        assert_eq!(glob.len(), 1);
        assert_eq!(glob[0].caller.file, "pkg/app.go");
    }

    #[test]
    fn test_usages_argument_filter() {
        let mut store = GraphStore::new();
        let caller = node("main", "main", "src/app.py", 1);
        let edges = vec![
            call_edge(&caller, "charge", &["Money(10, \"EUR\")"], 2),
            call_edge(&caller, "charge", &["Money(5, \"USD\")"], 3),
        ];
        store.commit_file("src/app.py", vec![caller], edges).unwrap();

        let eur = find_usages(&store, "charge", None, Some("EUR")).unwrap();
        assert_eq!(eur.len(), 1);
        assert_eq!(eur[0].edge.line, 2);
    }

    #[test]
    fn test_usages_rejects_empty_symbol() {
        let store = GraphStore::new();
        assert!(matches!(
            find_usages(&store, "  ", None, None),
            Err(GraphError::InvalidFilter(_))
        ));
    }

    #[test]
    fn test_impact_depth_one_callers() {
        let (store, a, b, _, d) = chain_store();
        let cancel = CancelToken::new();

        let hits = impact_analysis(&store, "b", 1, Direction::Callers, &cancel).unwrap();
        let mut names: Vec<&str> = hits.iter().map(|h| h.node.name.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["a", "d"]);
        assert!(hits.iter().all(|h| h.distance == 1));
        assert!(hits.iter().any(|h| h.node.id == a.id));
        assert!(hits.iter().any(|h| h.node.id == d.id));
        assert_eq!(b.name, "b");
    }

    #[test]
    fn test_impact_deeper_is_superset() {
        let (store, _, _, _, _) = chain_store();
        let cancel = CancelToken::new();

        let one = impact_analysis(&store, "c", 1, Direction::Callers, &cancel).unwrap();
        let two = impact_analysis(&store, "c", 2, Direction::Callers, &cancel).unwrap();
        let ids_one: HashSet<&str> = one.iter().map(|h| h.node.id.as_str()).collect();
        let ids_two: HashSet<&str> = two.iter().map(|h| h.node.id.as_str()).collect();
        assert!(ids_one.is_subset(&ids_two));
        assert_eq!(one.len(), 1);
        assert_eq!(two.len(), 3);
        let b_hit = two.iter().find(|h| h.node.name == "b").unwrap();
        assert_eq!(b_hit.distance, 1);
    }

    #[test]
    fn test_impact_callees_direction() {
        let (store, _, _, c, _) = chain_store();
        let cancel = CancelToken::new();

        let hits = impact_analysis(&store, "a", 2, Direction::Callees, &cancel).unwrap();
        let names: Vec<&str> = hits.iter().map(|h| h.node.name.as_str()).collect();
        assert_eq!(names, vec!["b", "c"]);
        assert_eq!(hits[1].node.id, c.id);
        assert_eq!(hits[1].distance, 2);
    }

    #[test]
    fn test_impact_cycle_visits_once() {
        let mut store = GraphStore::new();
        let ping = node("ping", "ping", "src/p.py", 1);
        let pong = node("pong", "pong", "src/p.py", 10);
        let edges = vec![
            call_edge(&ping, "pong", &[], 2),
            call_edge(&pong, "ping", &[], 11),
        ];
        store
            .commit_file("src/p.py", vec![ping.clone(), pong.clone()], edges)
            .unwrap();
        store.resolve_pending();
        let cancel = CancelToken::new();

        let hits = impact_analysis(&store, "ping", 10, Direction::Both, &cancel).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].node.id, pong.id);
        assert_eq!(hits[0].distance, 1);
    }

    #[test]
    fn test_impact_unknown_symbol() {
        let (store, _, _, _, _) = chain_store();
        let cancel = CancelToken::new();
        assert!(matches!(
            impact_analysis(&store, "ghost", 1, Direction::Both, &cancel),
            Err(GraphError::NodeNotFound(_))
        ));
    }

    #[test]
    fn test_impact_cancellation() {
        let (store, _, _, _, _) = chain_store();
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(matches!(
            impact_analysis(&store, "b", 2, Direction::Both, &cancel),
            Err(GraphError::Cancelled)
        ));
    }
}
