//! # Codemap Graph
//!
//! In-memory code graph: transactional per-file commits, name lookup,
//! usage and impact analysis, and shared read snapshots.
//!
//! ## Features
//!
//! - **Transactional commits** - a file's subgraph is replaced atomically
//! - **Tiered name lookup** - exact, then prefix, then substring matches
//! - **Usage search** - word-boundary matching with file and argument filters
//! - **Impact analysis** - cancellable BFS over callers, callees, or both
//! - **Endpoint bridges** - URL literals in calls linked to route declarations
//!
//! ## Architecture
//!
//! ```text
//! Extraction (nodes + calls)
//!     │
//!     ├──> GraphStore
//!     │      ├─ commit_file / remove_file (validate, then swap)
//!     │      ├─ NameIndex (token index over identifiers)
//!     │      ├─ resolve_pending (callee text -> node)
//!     │      └─ recompute_bridges (call paths -> endpoints)
//!     │
//!     ├──> Analyzer
//!     │      ├─ find_usages (word-boundary, filters)
//!     │      └─ impact_analysis (BFS with minimal distances)
//!     │
//!     └──> SharedGraph
//!            ├─ snapshot() for readers
//!            └─ with_write() for the single writer
//! ```

mod analyzer;
mod bridge;
mod cancel;
mod error;
mod name_index;
mod shared;
mod store;
mod types;

pub use analyzer::{find_usages, impact_analysis, impact_of_node};
pub use bridge::recompute_bridges;
pub use cancel::CancelToken;
pub use error::{GraphError, Result};
pub use name_index::MatchTier;
pub use shared::SharedGraph;
pub use store::GraphStore;
pub use types::{
    Direction, Edge, EdgeKind, FileSummary, GraphSnapshot, ImpactedNode, Usage,
};
