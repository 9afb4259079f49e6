use crate::error::{IndexerError, Result};
use crate::scanner::FileScanner;
use crate::stats::IndexStats;
use codemap_extract::{Extraction, ExtractorRegistry, NodeKind};
use codemap_graph::{recompute_bridges, CancelToken, Edge, GraphError, SharedGraph};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Project indexer that scans, extracts, and commits code into the graph
///
/// `index_full` builds the graph from scratch; `update_file` and
/// `remove_file` keep it current as single paths change. Every entry
/// point ends with call resolution and bridge recomputation, so readers
/// always observe a fully linked graph.
pub struct ProjectIndexer {
    root: PathBuf,
    scanner: FileScanner,
    registry: ExtractorRegistry,
    graph: SharedGraph,
}

impl ProjectIndexer {
    /// Create new indexer for a project, with every built-in language
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(IndexerError::invalid_path(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        let root = root.canonicalize()?;
        let scanner = FileScanner::new(&root);
        Ok(Self {
            root,
            scanner,
            registry: ExtractorRegistry::with_builtin_languages(),
            graph: SharedGraph::new(),
        })
    }

    /// Replace the default extractor registry
    #[must_use]
    pub fn with_registry(mut self, registry: ExtractorRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Veto paths beyond the scanner defaults
    #[must_use]
    pub fn with_indexability(
        mut self,
        predicate: impl Fn(&Path) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.scanner = FileScanner::new(&self.root).with_predicate(predicate);
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Handle readers use to snapshot the graph
    #[must_use]
    pub fn graph(&self) -> SharedGraph {
        self.graph.clone()
    }

    /// Whether the scanner would pick this path up at all
    #[must_use]
    pub fn is_indexable(&self, path: &Path) -> bool {
        self.scanner.admits(&self.absolute(path))
    }

    /// Index the whole project from scratch
    ///
    /// Files are read through a bounded worker pool, then extracted and
    /// committed serially in sorted path order. Indexing order decides
    /// resolution ties, so it has to be reproducible run to run.
    pub async fn index_full(&self) -> Result<IndexStats> {
        let started = Instant::now();
        let mut stats = IndexStats::new();

        let files = self.scanner.scan();
        let sources = read_sources(files, &mut stats).await;

        for (path, source) in &sources {
            let relative = self.normalize_path(path)?;
            match self.registry.extract_file(&relative, source) {
                Ok(extraction) => self.commit_extraction(&relative, extraction, &mut stats)?,
                Err(e) => {
                    warn!("Extraction failed for {relative}: {e}");
                    stats.add_error(format!("{relative}: {e}"));
                }
            }
        }

        self.link(&mut stats);

        stats.time_ms = elapsed_ms(started);
        info!(
            "Indexed {} files, {} nodes, {} edges in {}ms",
            stats.files, stats.nodes, stats.edges, stats.time_ms
        );
        Ok(stats)
    }

    /// Re-index one changed path
    ///
    /// The cancellation token is the supersession hook: when a newer
    /// change to the same path cancels it, the commit is skipped and the
    /// graph keeps its previous state for the path. A path that turns out
    /// to be deleted is forwarded to `remove_file`.
    pub async fn update_file(&self, path: &Path, cancel: &CancelToken) -> Result<IndexStats> {
        let started = Instant::now();
        let absolute = self.absolute(path);
        let relative = self.normalize_path(&absolute)?;

        if !self.scanner.admits(&absolute) {
            debug!("Skipping non-indexable {relative}");
            return Ok(IndexStats::new());
        }
        if cancel.is_cancelled() {
            return Err(GraphError::Cancelled.into());
        }

        let source = match tokio::fs::read_to_string(&absolute).await {
            Ok(source) => source,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return self.remove_file(path);
            }
            Err(e) => return Err(e.into()),
        };

        let mut stats = IndexStats::new();
        let extraction = match self.registry.extract_file(&relative, &source) {
            Ok(extraction) => extraction,
            Err(e) => {
                // the graph keeps its previous state for the path
                warn!("Extraction failed for {relative}: {e}");
                stats.add_error(format!("{relative}: {e}"));
                stats.time_ms = elapsed_ms(started);
                return Ok(stats);
            }
        };

        if cancel.is_cancelled() {
            debug!("Update of {relative} superseded, commit skipped");
            return Err(GraphError::Cancelled.into());
        }

        self.commit_extraction(&relative, extraction, &mut stats)?;
        self.link(&mut stats);
        stats.time_ms = elapsed_ms(started);
        debug!("Updated {relative} in {}ms", stats.time_ms);
        Ok(stats)
    }

    /// Drop one path from the graph
    ///
    /// Surviving calls into the removed file demote to unresolved, then
    /// resolution gets a chance to re-link them elsewhere.
    pub fn remove_file(&self, path: &Path) -> Result<IndexStats> {
        let started = Instant::now();
        let relative = self.normalize_path(&self.absolute(path))?;
        let mut stats = IndexStats::new();

        let removed = self.graph.with_write(|store| store.remove_file(&relative));
        if removed {
            info!("Removed {relative} from the graph");
            self.link(&mut stats);
        } else {
            debug!("Remove of {relative} ignored, path was never indexed");
        }
        stats.time_ms = elapsed_ms(started);
        Ok(stats)
    }

    /// Commit one extraction, turning call sites and imports into edges
    fn commit_extraction(
        &self,
        path: &str,
        extraction: Extraction,
        stats: &mut IndexStats,
    ) -> Result<()> {
        let Some(file_node) = extraction.nodes.first() else {
            return Ok(());
        };
        let language = file_node.language;
        let file_id = file_node.id.clone();
        let lines = file_node.line_end;

        let edges = build_edges(&file_id, &extraction);
        let node_count = extraction.nodes.len();
        let edge_count = edges.len();

        self.graph
            .with_write(|store| store.commit_file(path, extraction.nodes, edges))?;

        stats.add_file(language.as_str(), lines);
        stats.add_nodes(node_count);
        stats.add_edges(edge_count);
        Ok(())
    }

    /// Resolve pending calls and recompute bridges
    fn link(&self, stats: &mut IndexStats) {
        let (resolved, bridges) = self.graph.with_write(|store| {
            let resolved = store.resolve_pending();
            let bridges = recompute_bridges(store);
            (resolved, bridges)
        });
        stats.resolved_calls = resolved;
        stats.bridges = bridges;
        debug!("Resolution linked {resolved} calls, {bridges} bridges");
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Store paths are root-relative with forward slashes
    fn normalize_path(&self, path: &Path) -> Result<String> {
        let relative = path.strip_prefix(&self.root).map_err(|_| {
            IndexerError::invalid_path(format!(
                "{} is outside {}",
                path.display(),
                self.root.display()
            ))
        })?;
        Ok(relative.to_string_lossy().replace('\\', "/"))
    }
}

/// Call sites become call edges; import nodes hang off the file node
fn build_edges(file_id: &str, extraction: &Extraction) -> Vec<Edge> {
    let mut edges = Vec::with_capacity(extraction.calls.len());
    for site in &extraction.calls {
        edges.push(Edge::call(&site.caller_id, site));
    }
    for node in &extraction.nodes {
        if node.kind == NodeKind::Import {
            edges.push(Edge::import(file_id, &node.id, node.line_start));
        }
    }
    edges
}

/// Read a batch of files through a bounded pool of blocking-read tasks
async fn read_sources(files: Vec<PathBuf>, stats: &mut IndexStats) -> Vec<(PathBuf, String)> {
    let max_concurrent = worker_count();
    let mut sources = Vec::with_capacity(files.len());

    for chunk in files.chunks(max_concurrent) {
        let mut tasks = Vec::with_capacity(chunk.len());
        for path in chunk {
            tasks.push(tokio::spawn(read_source(path.clone())));
        }
        for task in tasks {
            match task.await {
                Ok(Ok(entry)) => sources.push(entry),
                Ok(Err(e)) => stats.add_error(e),
                Err(e) => stats.add_error(format!("Task panicked: {e}")),
            }
        }
    }

    sources
}

async fn read_source(path: PathBuf) -> std::result::Result<(PathBuf, String), String> {
    match tokio::fs::read_to_string(&path).await {
        Ok(source) => Ok((path, source)),
        Err(e) => Err(format!("Failed to read {}: {e}", path.display())),
    }
}

/// `available_parallelism` clamped to [2, 8]
pub(crate) fn worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .clamp(2, 8)
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis())
        .unwrap_or(u64::MAX)
        .max(1)
}
