use crate::error::{IndexerError, Result};
use crate::indexer::{worker_count, ProjectIndexer};
use crate::stats::IndexStats;
use codemap_graph::CancelToken;
use log::{debug, warn};
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::time;

/// Tuning for the filesystem watcher
#[derive(Debug, Clone, Copy)]
pub struct WatchConfig {
    /// Quiet period a path must hold before it is reindexed
    pub debounce: Duration,
    /// Hard cap on how long a steadily-changing path can defer its run
    pub max_batch_wait: Duration,
    /// Bound on the raw filesystem event queue
    pub queue_capacity: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
            max_batch_wait: Duration::from_secs(3),
            queue_capacity: 1024,
        }
    }
}

/// Broadcast after every dispatched change
#[derive(Debug, Clone)]
pub struct WatchUpdate {
    /// The path as the event reported it
    pub path: PathBuf,
    pub stats: Option<IndexStats>,
    pub success: bool,
    /// A newer change to the same path cancelled this one
    pub superseded: bool,
    pub duration_ms: u64,
}

/// Watches a project root and keeps the graph current
///
/// Filesystem events land on a bounded queue, collapse per path inside
/// the debounce window, then fan out to the pipeline through a worker
/// pool. A burst of saves to one file runs once; a save that arrives
/// while an update for the same path is in flight cancels that update.
#[derive(Clone)]
pub struct FileWatcher {
    inner: Arc<WatcherInner>,
}

struct WatcherInner {
    command_tx: mpsc::Sender<WatcherCommand>,
    update_tx: broadcast::Sender<WatchUpdate>,
    _watcher: std::sync::Mutex<Option<RecommendedWatcher>>,
}

enum WatcherCommand {
    Touch(PathBuf),
    Shutdown,
}

impl FileWatcher {
    /// Start watching; events flow until the last handle drops
    pub fn start(indexer: Arc<ProjectIndexer>, config: WatchConfig) -> Result<Self> {
        let (event_tx, event_rx) = mpsc::channel(config.queue_capacity.max(1));
        let (command_tx, command_rx) = mpsc::channel(16);
        let (update_tx, _) = broadcast::channel(64);

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = event_tx.blocking_send(res);
            },
            NotifyConfig::default(),
        )
        .map_err(|e| IndexerError::other(format!("watcher init failed: {e}")))?;
        watcher
            .watch(indexer.root(), RecursiveMode::Recursive)
            .map_err(|e| {
                IndexerError::other(format!(
                    "failed to watch {}: {e}",
                    indexer.root().display()
                ))
            })?;

        spawn_watch_loop(indexer, config, event_rx, command_rx, update_tx.clone());

        Ok(Self {
            inner: Arc::new(WatcherInner {
                command_tx,
                update_tx,
                _watcher: std::sync::Mutex::new(Some(watcher)),
            }),
        })
    }

    /// Queue a path as if the filesystem had reported a change to it
    pub async fn touch(&self, path: impl Into<PathBuf>) -> Result<()> {
        self.inner
            .command_tx
            .send(WatcherCommand::Touch(path.into()))
            .await
            .map_err(|_| IndexerError::QueueClosed)
    }

    /// Subscribe to per-change outcomes
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<WatchUpdate> {
        self.inner.update_tx.subscribe()
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        if Arc::strong_count(&self.inner) == 1 {
            let _ = self.inner.command_tx.try_send(WatcherCommand::Shutdown);
        }
    }
}

fn spawn_watch_loop(
    indexer: Arc<ProjectIndexer>,
    config: WatchConfig,
    mut event_rx: mpsc::Receiver<notify::Result<Event>>,
    mut command_rx: mpsc::Receiver<WatcherCommand>,
    update_tx: broadcast::Sender<WatchUpdate>,
) {
    tokio::spawn(async move {
        let mut state = DebounceState::new(config.debounce, config.max_batch_wait);
        let workers = Arc::new(Semaphore::new(worker_count()));
        let (done_tx, mut done_rx) = mpsc::channel::<(PathBuf, u64)>(64);

        loop {
            let next_deadline = state.next_deadline();

            tokio::select! {
                Some(event) = event_rx.recv() => {
                    record_event(&indexer, event, &mut state);
                }
                Some(command) = command_rx.recv() => {
                    match command {
                        WatcherCommand::Touch(path) => {
                            state.record(path, ChangeKind::Modified, Instant::now());
                        }
                        WatcherCommand::Shutdown => break,
                    }
                }
                Some((path, generation)) = done_rx.recv() => {
                    state.finish(&path, generation);
                }
                () = async {
                    if let Some(deadline) = next_deadline {
                        time::sleep_until(deadline).await;
                    }
                }, if next_deadline.is_some() => {
                    for (path, kind) in state.take_ripe(Instant::now()) {
                        let (generation, cancel) = state.begin(&path);
                        dispatch(
                            indexer.clone(),
                            path,
                            kind,
                            generation,
                            cancel,
                            workers.clone(),
                            update_tx.clone(),
                            done_tx.clone(),
                        );
                    }
                }
            }
        }
    });
}

fn record_event(indexer: &ProjectIndexer, event: notify::Result<Event>, state: &mut DebounceState) {
    let event = match event {
        Ok(event) => event,
        Err(e) => {
            warn!("Watcher error: {e}");
            return;
        }
    };
    let kind = match event.kind {
        EventKind::Remove(_) => ChangeKind::Removed,
        EventKind::Access(_) => return,
        _ => ChangeKind::Modified,
    };
    let now = Instant::now();
    for path in event.paths {
        if indexer.is_indexable(&path) {
            state.record(path, kind, now);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn dispatch(
    indexer: Arc<ProjectIndexer>,
    path: PathBuf,
    kind: ChangeKind,
    generation: u64,
    cancel: CancelToken,
    workers: Arc<Semaphore>,
    update_tx: broadcast::Sender<WatchUpdate>,
    done_tx: mpsc::Sender<(PathBuf, u64)>,
) {
    tokio::spawn(async move {
        let Ok(_permit) = workers.acquire().await else {
            return;
        };
        let started = Instant::now();
        let result = match kind {
            ChangeKind::Modified => indexer.update_file(&path, &cancel).await,
            ChangeKind::Removed => indexer.remove_file(&path),
        };
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let update = match result {
            Ok(stats) => WatchUpdate {
                path: path.clone(),
                stats: Some(stats),
                success: true,
                superseded: false,
                duration_ms,
            },
            Err(e) if e.is_cancelled() => {
                debug!("Update of {} superseded", path.display());
                WatchUpdate {
                    path: path.clone(),
                    stats: None,
                    success: false,
                    superseded: true,
                    duration_ms,
                }
            }
            Err(e) => {
                warn!("Update of {} failed: {e}", path.display());
                WatchUpdate {
                    path: path.clone(),
                    stats: None,
                    success: false,
                    superseded: false,
                    duration_ms,
                }
            }
        };
        let _ = update_tx.send(update);
        let _ = done_tx.send((path, generation)).await;
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChangeKind {
    Modified,
    Removed,
}

struct PendingChange {
    kind: ChangeKind,
    deadline: Instant,
    first_seen: Instant,
}

struct InFlight {
    generation: u64,
    cancel: CancelToken,
}

/// Per-path debounce bookkeeping plus supersession of in-flight work
struct DebounceState {
    debounce: Duration,
    max_batch: Duration,
    pending: HashMap<PathBuf, PendingChange>,
    in_flight: HashMap<PathBuf, InFlight>,
    generation: u64,
}

impl DebounceState {
    fn new(debounce: Duration, max_batch: Duration) -> Self {
        Self {
            debounce,
            max_batch,
            pending: HashMap::new(),
            in_flight: HashMap::new(),
            generation: 0,
        }
    }

    /// Fold one event in; a later event resets the quiet period but never
    /// pushes a path past `first_seen + max_batch`
    fn record(&mut self, path: PathBuf, kind: ChangeKind, now: Instant) {
        let deadline = now + self.debounce;
        match self.pending.entry(path) {
            Entry::Occupied(mut entry) => {
                let change = entry.get_mut();
                // latest kind wins: a re-created file is a modification again
                change.kind = kind;
                change.deadline = deadline;
            }
            Entry::Vacant(entry) => {
                entry.insert(PendingChange {
                    kind,
                    deadline,
                    first_seen: now,
                });
            }
        }
    }

    fn effective_deadline(&self, change: &PendingChange) -> Instant {
        change.deadline.min(change.first_seen + self.max_batch)
    }

    fn next_deadline(&self) -> Option<time::Instant> {
        self.pending
            .values()
            .map(|change| self.effective_deadline(change))
            .min()
            .map(time::Instant::from_std)
    }

    /// Paths whose quiet period has elapsed, in path order
    fn take_ripe(&mut self, now: Instant) -> Vec<(PathBuf, ChangeKind)> {
        let ripe: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, change)| self.effective_deadline(change) <= now)
            .map(|(path, _)| path.clone())
            .collect();
        let mut out = Vec::with_capacity(ripe.len());
        for path in ripe {
            if let Some(change) = self.pending.remove(&path) {
                out.push((path, change.kind));
            }
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Start work on a path, cancelling whatever was already running for it
    fn begin(&mut self, path: &Path) -> (u64, CancelToken) {
        if let Some(previous) = self.in_flight.get(path) {
            previous.cancel.cancel();
            debug!("Superseding in-flight update of {}", path.display());
        }
        self.generation += 1;
        let cancel = CancelToken::new();
        self.in_flight.insert(
            path.to_path_buf(),
            InFlight {
                generation: self.generation,
                cancel: cancel.clone(),
            },
        );
        (self.generation, cancel)
    }

    /// Forget a finished task unless a newer generation replaced it
    fn finish(&mut self, path: &Path, generation: u64) {
        if self
            .in_flight
            .get(path)
            .is_some_and(|task| task.generation == generation)
        {
            self.in_flight.remove(path);
        }
    }

    #[cfg(test)]
    fn tracks(&self, path: &Path) -> bool {
        self.in_flight.contains_key(path)
    }
}

#[cfg(test)]
mod tests {
    use super::{ChangeKind, DebounceState};
    use pretty_assertions::assert_eq;
    use std::path::{Path, PathBuf};
    use std::time::{Duration, Instant};

    fn state() -> DebounceState {
        DebounceState::new(Duration::from_millis(100), Duration::from_millis(250))
    }

    #[test]
    fn record_generates_deadline() {
        let mut state = state();
        let t0 = Instant::now();
        state.record(PathBuf::from("a.py"), ChangeKind::Modified, t0);

        assert!(state.next_deadline().is_some());
        assert!(state.take_ripe(t0).is_empty());
        let ripe = state.take_ripe(t0 + Duration::from_millis(101));
        assert_eq!(ripe.len(), 1);
        assert!(state.next_deadline().is_none());
    }

    #[test]
    fn burst_coalesces_to_one_run() {
        let mut state = state();
        let t0 = Instant::now();
        state.record(PathBuf::from("a.py"), ChangeKind::Modified, t0);
        state.record(
            PathBuf::from("a.py"),
            ChangeKind::Modified,
            t0 + Duration::from_millis(50),
        );

        // the second event pushed the quiet period out
        assert!(state.take_ripe(t0 + Duration::from_millis(120)).is_empty());
        let ripe = state.take_ripe(t0 + Duration::from_millis(160));
        assert_eq!(ripe.len(), 1);
    }

    #[test]
    fn max_batch_caps_deferral() {
        let mut state = state();
        let t0 = Instant::now();
        for i in 0..5 {
            state.record(
                PathBuf::from("hot.py"),
                ChangeKind::Modified,
                t0 + Duration::from_millis(i * 60),
            );
        }

        // last deadline would land at t0+340ms, the cap fires at t0+250ms
        let ripe = state.take_ripe(t0 + Duration::from_millis(260));
        assert_eq!(ripe.len(), 1);
    }

    #[test]
    fn latest_kind_wins() {
        let mut state = state();
        let t0 = Instant::now();
        state.record(PathBuf::from("a.py"), ChangeKind::Modified, t0);
        state.record(
            PathBuf::from("a.py"),
            ChangeKind::Removed,
            t0 + Duration::from_millis(10),
        );

        let ripe = state.take_ripe(t0 + Duration::from_secs(1));
        assert_eq!(ripe, vec![(PathBuf::from("a.py"), ChangeKind::Removed)]);
    }

    #[test]
    fn distinct_paths_ripen_independently() {
        let mut state = state();
        let t0 = Instant::now();
        state.record(PathBuf::from("a.py"), ChangeKind::Modified, t0);
        state.record(
            PathBuf::from("b.py"),
            ChangeKind::Modified,
            t0 + Duration::from_millis(80),
        );

        let first = state.take_ripe(t0 + Duration::from_millis(110));
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].0, PathBuf::from("a.py"));
        let second = state.take_ripe(t0 + Duration::from_millis(200));
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].0, PathBuf::from("b.py"));
    }

    #[test]
    fn begin_cancels_previous_generation() {
        let mut state = state();
        let path = Path::new("a.py");

        let (g1, c1) = state.begin(path);
        let (g2, c2) = state.begin(path);

        assert!(g2 > g1);
        assert!(c1.is_cancelled());
        assert!(!c2.is_cancelled());
    }

    #[test]
    fn finish_ignores_stale_generation() {
        let mut state = state();
        let path = Path::new("a.py");

        let (g1, _) = state.begin(path);
        let (g2, _) = state.begin(path);

        state.finish(path, g1);
        assert!(state.tracks(path));
        state.finish(path, g2);
        assert!(!state.tracks(path));
    }
}
