use crate::store::GraphStore;
use crate::types::{Edge, EdgeKind};
use codemap_extract::NodeKind;
use log::debug;
use std::collections::HashSet;

/// One slash-separated piece of a normalized route
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Wildcard,
}

/// Route path reduced to comparable segments
///
/// `/api/v1/users/{id}`, `/api/v1/users/:id` and `` `/api/v1/users/${id}` ``
/// all normalize to the same template. Scheme, host, query string and
/// trailing slash are stripped; literals are lowercased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PathTemplate {
    segments: Vec<Segment>,
}

impl PathTemplate {
    /// Parse a raw route or URL, `None` when it is not a plausible path
    pub(crate) fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
            return None;
        }
        let without_scheme = if let Some(rest) = trimmed
            .strip_prefix("http://")
            .or_else(|| trimmed.strip_prefix("https://"))
        {
            match rest.find('/') {
                Some(idx) => &rest[idx..],
                None => "/",
            }
        } else if trimmed.starts_with('/') {
            trimmed
        } else {
            return None;
        };
        let path = without_scheme
            .split(['?', '#'])
            .next()
            .unwrap_or(without_scheme);

        let segments = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(parse_segment)
            .collect();
        Some(Self { segments })
    }

    /// Whether a concrete or templated call path fits this route
    ///
    /// Segment counts must be equal; a wildcard on either side matches
    /// anything in the opposite position.
    pub(crate) fn matches(&self, other: &PathTemplate) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|(a, b)| match (a, b) {
                    (Segment::Wildcard, _) | (_, Segment::Wildcard) => true,
                    (Segment::Literal(a), Segment::Literal(b)) => a == b,
                })
    }
}

fn parse_segment(segment: &str) -> Segment {
    let is_wildcard = segment == "*"
        || (segment.starts_with('{') && segment.ends_with('}'))
        || (segment.starts_with('<') && segment.ends_with('>'))
        || segment.starts_with(':')
        || segment.contains("${");
    if is_wildcard {
        Segment::Wildcard
    } else {
        Segment::Literal(segment.to_lowercase())
    }
}

/// Inner text of a quoted argument, `None` when the argument is not a
/// plain string or template literal
fn string_literal(argument: &str) -> Option<&str> {
    let trimmed = argument.trim();
    // tolerate python prefixes like f"...", rb"..."
    let unprefixed = trimmed.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    if trimmed.len() - unprefixed.len() > 2 {
        return None;
    }
    let mut chars = unprefixed.chars();
    let first = chars.next()?;
    let last = unprefixed.chars().last()?;
    if unprefixed.len() >= 2 && first == last && matches!(first, '"' | '\'' | '`') {
        Some(&unprefixed[1..unprefixed.len() - 1])
    } else {
        None
    }
}

/// Recompute every bridge edge from scratch
///
/// Endpoint declarations on one side, call arguments that look like URL
/// paths on the other. A call path matching several endpoints links all
/// of them. Returns the number of bridges now in the store.
pub fn recompute_bridges(store: &mut GraphStore) -> usize {
    let endpoints: Vec<(String, PathTemplate)> = store
        .nodes()
        .filter(|n| n.kind == NodeKind::Endpoint)
        .filter_map(|n| PathTemplate::parse(&n.name).map(|t| (n.id.clone(), t)))
        .collect();

    let mut bridges: Vec<Edge> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    if !endpoints.is_empty() {
        for edge in store.edges().filter(|e| e.kind == EdgeKind::Calls) {
            let arguments = edge.call_arguments.as_deref().unwrap_or(&[]);
            for argument in arguments {
                let Some(call_path) = string_literal(argument).and_then(PathTemplate::parse)
                else {
                    continue;
                };
                let matched: Vec<&(String, PathTemplate)> = endpoints
                    .iter()
                    .filter(|(_, template)| template.matches(&call_path))
                    .collect();
                if matched.len() > 1 {
                    debug!(
                        "call at {}:{} matches {} endpoints, linking all",
                        edge.from_node,
                        edge.line,
                        matched.len()
                    );
                }
                for (endpoint_id, _) in matched {
                    let bridge = Edge::bridge(&edge.from_node, endpoint_id, edge.line);
                    if seen.insert(bridge.id.clone()) {
                        bridges.push(bridge);
                    }
                }
            }
        }
    }

    let count = bridges.len();
    store.replace_bridges(bridges);
    debug!("bridge recompute produced {count} edges");
    count
}
