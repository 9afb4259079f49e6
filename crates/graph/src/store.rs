use crate::error::{GraphError, Result};
use crate::name_index::NameIndex;
use crate::types::{Direction, Edge, EdgeKind, FileSummary, GraphSnapshot};
use codemap_extract::{Language, Node};
use log::{debug, warn};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Per-file bookkeeping inside the store
#[derive(Debug, Clone)]
struct FileEntry {
    node_ids: Vec<String>,
    edge_ids: Vec<String>,
    language: Language,
    commit_seq: u64,
}

/// In-memory code graph with per-file transactional commits
///
/// Nodes and edges are owned by the file they were extracted from. A commit
/// replaces a file's whole subgraph atomically: validation runs against the
/// post-commit state first, and any integrity violation leaves the store
/// untouched. Cross-file call edges that lose their target are demoted back
/// to unresolved rather than dropped, so the callee text survives for a
/// later resolution pass.
#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    nodes: HashMap<String, Node>,
    edges: HashMap<String, Edge>,
    outgoing: HashMap<String, Vec<String>>,
    incoming: HashMap<String, Vec<String>>,
    files: BTreeMap<String, FileEntry>,
    name_index: NameIndex,
    next_commit_seq: u64,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace `path`'s subgraph with freshly extracted nodes and edges
    ///
    /// Validates before mutating: every node must belong to `path`, every
    /// edge must originate from one of the new nodes, and every resolved
    /// edge target must exist after the commit. On violation the store is
    /// left exactly as it was.
    pub fn commit_file(&mut self, path: &str, nodes: Vec<Node>, edges: Vec<Edge>) -> Result<()> {
        let new_ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        let old_ids: HashSet<&str> = self
            .files
            .get(path)
            .map(|entry| entry.node_ids.iter().map(String::as_str).collect())
            .unwrap_or_default();

        for node in &nodes {
            if node.file != path {
                return Err(GraphError::integrity(format!(
                    "node {} belongs to {} but was committed for {}",
                    node.id, node.file, path
                )));
            }
        }
        for edge in &edges {
            if !new_ids.contains(edge.from_node.as_str()) {
                return Err(GraphError::integrity(format!(
                    "edge {} starts at {} which is not part of {}",
                    edge.id, edge.from_node, path
                )));
            }
            if let Some(to) = &edge.to_node {
                let survives = new_ids.contains(to.as_str())
                    || (self.nodes.contains_key(to) && !old_ids.contains(to.as_str()));
                if !survives {
                    return Err(GraphError::integrity(format!(
                        "edge {} targets {} which will not exist after committing {}",
                        edge.id, to, path
                    )));
                }
            }
        }

        let language = nodes
            .first()
            .map(|n| n.language)
            .unwrap_or(Language::Unknown);
        let commit_seq = self.detach_file(path).unwrap_or_else(|| {
            let seq = self.next_commit_seq;
            self.next_commit_seq += 1;
            seq
        });

        let mut entry = FileEntry {
            node_ids: Vec::with_capacity(nodes.len()),
            edge_ids: Vec::with_capacity(edges.len()),
            language,
            commit_seq,
        };
        for node in nodes {
            entry.node_ids.push(node.id.clone());
            self.name_index.insert(&node);
            self.nodes.insert(node.id.clone(), node);
        }
        for edge in edges {
            if self.edges.contains_key(&edge.id) {
                debug!("skipping duplicate edge {} in {}", edge.id, path);
                continue;
            }
            entry.edge_ids.push(edge.id.clone());
            self.attach_edge(edge);
        }
        self.files.insert(path.to_string(), entry);
        Ok(())
    }

    /// Remove a file and its subgraph, returns whether the file was present
    ///
    /// Inbound call edges from other files are demoted to unresolved;
    /// inbound bridge edges are deleted outright.
    pub fn remove_file(&mut self, path: &str) -> bool {
        self.detach_file(path).is_some()
    }

    /// Shared removal used by both commit and remove
    ///
    /// Returns the file's commit sequence so a re-commit can keep it.
    fn detach_file(&mut self, path: &str) -> Option<u64> {
        let entry = self.files.remove(path)?;

        for edge_id in &entry.edge_ids {
            self.detach_edge(edge_id);
        }
        for node_id in &entry.node_ids {
            let inbound = self.incoming.get(node_id).cloned().unwrap_or_default();
            for edge_id in inbound {
                match self.edges.get(&edge_id).map(|e| e.kind) {
                    Some(EdgeKind::Calls) => self.demote_edge(&edge_id),
                    Some(EdgeKind::Bridges) => self.drop_foreign_edge(&edge_id),
                    Some(EdgeKind::Imports) | None => self.drop_foreign_edge(&edge_id),
                }
            }
            if let Some(node) = self.nodes.remove(node_id) {
                self.name_index.remove(&node);
            }
            self.outgoing.remove(node_id);
            self.incoming.remove(node_id);
        }
        Some(entry.commit_seq)
    }

    fn attach_edge(&mut self, edge: Edge) {
        self.outgoing
            .entry(edge.from_node.clone())
            .or_default()
            .push(edge.id.clone());
        if let Some(to) = &edge.to_node {
            self.incoming
                .entry(to.clone())
                .or_default()
                .push(edge.id.clone());
        }
        self.edges.insert(edge.id.clone(), edge);
    }

    /// Drop an edge owned by the file being detached
    fn detach_edge(&mut self, edge_id: &str) {
        if let Some(edge) = self.edges.remove(edge_id) {
            if let Some(out) = self.outgoing.get_mut(&edge.from_node) {
                out.retain(|id| id != edge_id);
            }
            if let Some(to) = &edge.to_node {
                if let Some(inc) = self.incoming.get_mut(to) {
                    inc.retain(|id| id != edge_id);
                }
            }
        }
    }

    /// Turn a resolved call edge back into an unresolved one
    fn demote_edge(&mut self, edge_id: &str) {
        if let Some(edge) = self.edges.get_mut(edge_id) {
            if let Some(to) = edge.to_node.take() {
                if let Some(inc) = self.incoming.get_mut(&to) {
                    inc.retain(|id| id != edge_id);
                }
                debug!(
                    "demoted call edge {} ({}), target file removed",
                    edge_id,
                    edge.callee_name.as_deref().unwrap_or("?")
                );
            }
        }
    }

    /// Delete an inbound edge owned by another file
    fn drop_foreign_edge(&mut self, edge_id: &str) {
        if let Some(edge) = self.edges.remove(edge_id) {
            if let Some(out) = self.outgoing.get_mut(&edge.from_node) {
                out.retain(|id| id != edge_id);
            }
            if let Some(to) = &edge.to_node {
                if let Some(inc) = self.incoming.get_mut(to) {
                    inc.retain(|id| id != edge_id);
                }
            }
            for entry in self.files.values_mut() {
                entry.edge_ids.retain(|id| id != edge_id);
            }
        }
    }

    /// Try to resolve every unresolved call edge against current nodes
    ///
    /// Candidates match the callee text by qualified name, then bare name,
    /// then the trailing segment of a dotted or scoped path. Ambiguity is
    /// settled by the caller's own file, then the caller's directory, then
    /// the earliest committed candidate.
    pub fn resolve_pending(&mut self) -> usize {
        let callable: Vec<&Node> = self
            .nodes
            .values()
            .filter(|n| n.kind.is_callable())
            .collect();
        let mut by_qualified: HashMap<&str, Vec<&Node>> = HashMap::new();
        let mut by_name: HashMap<&str, Vec<&Node>> = HashMap::new();
        for node in &callable {
            by_qualified
                .entry(node.qualified_name.as_str())
                .or_default()
                .push(node);
            by_name.entry(node.name.as_str()).or_default().push(node);
        }

        let mut resolutions: Vec<(String, String)> = Vec::new();
        for edge in self.edges.values() {
            if edge.kind != EdgeKind::Calls || edge.to_node.is_some() {
                continue;
            }
            let Some(callee) = edge.callee_name.as_deref() else {
                continue;
            };
            let Some(caller) = self.nodes.get(&edge.from_node) else {
                continue;
            };
            let candidates = by_qualified
                .get(callee)
                .filter(|c| !c.is_empty())
                .or_else(|| by_name.get(callee).filter(|c| !c.is_empty()))
                .or_else(|| {
                    trailing_segment(callee)
                        .and_then(|tail| by_name.get(tail))
                        .filter(|c| !c.is_empty())
                });
            let Some(candidates) = candidates else {
                continue;
            };
            if let Some(target) = self.pick_candidate(caller, candidates) {
                resolutions.push((edge.id.clone(), target.id.clone()));
            }
        }

        let resolved = resolutions.len();
        for (edge_id, target_id) in resolutions {
            if let Some(edge) = self.edges.get_mut(&edge_id) {
                edge.to_node = Some(target_id.clone());
            }
            self.incoming.entry(target_id).or_default().push(edge_id);
        }
        if resolved > 0 {
            debug!("resolved {resolved} call edges");
        }
        resolved
    }

    /// Same file, then same directory, then earliest commit order
    fn pick_candidate<'a>(&self, caller: &Node, candidates: &[&'a Node]) -> Option<&'a Node> {
        let same_file: Vec<&'a Node> = candidates
            .iter()
            .copied()
            .filter(|n| n.file == caller.file)
            .collect();
        if same_file.len() == 1 {
            return Some(same_file[0]);
        }

        let caller_dir = parent_dir(&caller.file);
        let same_dir: Vec<&'a Node> = candidates
            .iter()
            .copied()
            .filter(|n| parent_dir(&n.file) == caller_dir)
            .collect();
        if same_dir.len() == 1 {
            return Some(same_dir[0]);
        }

        candidates
            .iter()
            .min_by_key(|n| (self.commit_seq_of(&n.file), n.line_start, n.id.as_str()))
            .copied()
    }

    fn commit_seq_of(&self, path: &str) -> u64 {
        self.files
            .get(path)
            .map(|entry| entry.commit_seq)
            .unwrap_or(u64::MAX)
    }

    /// Nodes matching `query`, best tier first, stable order within a tier
    pub fn lookup_by_name(&self, query: &str) -> Vec<&Node> {
        let mut hits: Vec<(crate::name_index::MatchTier, &Node)> = self
            .name_index
            .lookup(query)
            .into_iter()
            .filter_map(|(id, tier)| self.nodes.get(&id).map(|node| (tier, node)))
            .collect();
        hits.sort_by(|a, b| {
            a.0.cmp(&b.0)
                .then_with(|| a.1.file.cmp(&b.1.file))
                .then_with(|| a.1.line_start.cmp(&b.1.line_start))
                .then_with(|| a.1.id.cmp(&b.1.id))
        });
        hits.into_iter().map(|(_, node)| node).collect()
    }

    #[must_use]
    pub fn lookup_by_id(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Edges touching `node_id` in the given direction, optionally filtered by kind
    pub fn neighbors(
        &self,
        node_id: &str,
        direction: Direction,
        kind: Option<EdgeKind>,
    ) -> Vec<&Edge> {
        let mut seen = HashSet::new();
        let mut result = Vec::new();
        let lists: &[&HashMap<String, Vec<String>>] = match direction {
            Direction::Callers => &[&self.incoming],
            Direction::Callees => &[&self.outgoing],
            Direction::Both => &[&self.incoming, &self.outgoing],
        };
        for list in lists {
            for edge_id in list.get(node_id).into_iter().flatten() {
                if !seen.insert(edge_id.as_str()) {
                    continue;
                }
                if let Some(edge) = self.edges.get(edge_id) {
                    if kind.map_or(true, |k| edge.kind == k) {
                        result.push(edge);
                    }
                }
            }
        }
        result
    }

    /// Summaries of every indexed file, ordered by path
    pub fn all_files(&self) -> Vec<FileSummary> {
        self.files
            .iter()
            .map(|(path, entry)| FileSummary {
                path: path.clone(),
                language: entry.language,
                node_count: entry.node_ids.len(),
                edge_count: entry.edge_ids.len(),
                commit_seq: entry.commit_seq,
            })
            .collect()
    }

    /// Attach generated summaries to nodes of one file, returns how many stuck
    pub fn apply_summaries(&mut self, path: &str, summaries: &[(String, String)]) -> usize {
        let Some(entry) = self.files.get(path) else {
            warn!("apply_summaries: {path} is not indexed");
            return 0;
        };
        let owned: HashSet<&str> = entry.node_ids.iter().map(String::as_str).collect();
        let mut applied = 0;
        for (node_id, summary) in summaries {
            if !owned.contains(node_id.as_str()) {
                warn!("apply_summaries: {node_id} does not belong to {path}");
                continue;
            }
            if let Some(node) = self.nodes.get_mut(node_id) {
                node.summary = Some(summary.clone());
                applied += 1;
            }
        }
        applied
    }

    /// Owned copy of the whole graph in deterministic order
    pub fn export(&self) -> GraphSnapshot {
        let mut nodes: Vec<Node> = self.nodes.values().cloned().collect();
        nodes.sort_by(|a, b| {
            a.file
                .cmp(&b.file)
                .then_with(|| a.line_start.cmp(&b.line_start))
                .then_with(|| a.id.cmp(&b.id))
        });
        let mut edges: Vec<Edge> = self.edges.values().cloned().collect();
        edges.sort_by(|a, b| {
            a.from_node
                .cmp(&b.from_node)
                .then_with(|| a.line.cmp(&b.line))
                .then_with(|| a.id.cmp(&b.id))
        });
        GraphSnapshot { nodes, edges }
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn contains_file(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Ids of the nodes owned by `path`, in extraction order
    pub fn file_nodes(&self, path: &str) -> &[String] {
        self.files
            .get(path)
            .map(|entry| entry.node_ids.as_slice())
            .unwrap_or(&[])
    }

    /// Count of call edges still lacking a target
    pub fn unresolved_count(&self) -> usize {
        self.edges
            .values()
            .filter(|e| e.kind == EdgeKind::Calls && e.to_node.is_none())
            .count()
    }

    /// Replace every bridge edge with `bridges`, which must target endpoints
    pub(crate) fn replace_bridges(&mut self, bridges: Vec<Edge>) {
        let stale: Vec<String> = self
            .edges
            .values()
            .filter(|e| e.kind == EdgeKind::Bridges)
            .map(|e| e.id.clone())
            .collect();
        for edge_id in &stale {
            self.drop_foreign_edge(edge_id);
        }
        for edge in bridges {
            if edge.kind != EdgeKind::Bridges || self.edges.contains_key(&edge.id) {
                continue;
            }
            if let Some(entry) = self
                .nodes
                .get(&edge.from_node)
                .map(|n| n.file.clone())
                .and_then(|file| self.files.get_mut(&file))
            {
                entry.edge_ids.push(edge.id.clone());
            }
            self.attach_edge(edge);
        }
    }
}

/// Last segment of a dotted, arrow, or scoped call path
pub fn trailing_segment(callee: &str) -> Option<&str> {
    let tail = callee
        .rsplit(['.', '\\'])
        .next()
        .and_then(|s| s.rsplit("::").next())
        .and_then(|s| s.rsplit("->").next())?;
    let tail = tail.trim();
    if tail.is_empty() || tail == callee {
        None
    } else {
        Some(tail)
    }
}

fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}
