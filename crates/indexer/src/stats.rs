use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Statistics reported by every pipeline entry point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of files committed
    pub files: usize,

    /// Number of symbol nodes committed
    pub nodes: usize,

    /// Number of call and import edges committed
    pub edges: usize,

    /// Call edges that found their target during resolution
    pub resolved_calls: usize,

    /// Bridge edges currently linking call sites to endpoints
    pub bridges: usize,

    /// Total lines of code
    pub total_lines: usize,

    /// Time taken in milliseconds
    pub time_ms: u64,

    /// Files per language
    pub languages: HashMap<String, usize>,

    /// Per-file failures that did not stop the run
    pub errors: Vec<String>,
}

impl IndexStats {
    pub fn new() -> Self {
        Self {
            files: 0,
            nodes: 0,
            edges: 0,
            resolved_calls: 0,
            bridges: 0,
            total_lines: 0,
            time_ms: 0,
            languages: HashMap::new(),
            errors: Vec::new(),
        }
    }

    pub fn add_file(&mut self, language: &str, lines: usize) {
        self.files += 1;
        self.total_lines += lines;
        *self.languages.entry(language.to_string()).or_insert(0) += 1;
    }

    pub fn add_nodes(&mut self, count: usize) {
        self.nodes += count;
    }

    pub fn add_edges(&mut self, count: usize) {
        self.edges += count;
    }

    pub fn add_error(&mut self, error: String) {
        self.errors.push(error);
    }
}

impl Default for IndexStats {
    fn default() -> Self {
        Self::new()
    }
}
