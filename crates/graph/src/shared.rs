use crate::store::GraphStore;
use std::sync::{Arc, RwLock};

/// Single-writer, many-reader handle over a [`GraphStore`]
///
/// Readers take an `Arc` snapshot and keep traversing it while the writer
/// swaps in the next version. Writes go through `Arc::make_mut`, so a
/// snapshot taken before a commit never changes under its reader.
#[derive(Debug, Clone, Default)]
pub struct SharedGraph {
    inner: Arc<RwLock<Arc<GraphStore>>>,
}

impl SharedGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Immutable view of the graph as of now
    pub fn snapshot(&self) -> Arc<GraphStore> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Run one mutation while holding the write side
    pub fn with_write<T>(&self, f: impl FnOnce(&mut GraphStore) -> T) -> T {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        f(Arc::make_mut(&mut guard))
    }
}
