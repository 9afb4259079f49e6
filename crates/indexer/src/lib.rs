//! # Codemap Indexer
//!
//! Feeds source trees into the code graph and keeps them current.
//!
//! ## Pipeline
//!
//! ```text
//! Directory
//!     │
//!     ├──> File Scanner (.gitignore aware)
//!     │      └─> Source files
//!     │
//!     ├──> Parallel read stage (worker pool)
//!     │      └─> File contents
//!     │
//!     └──> Extract + commit (one file at a time, path order)
//!            └─> Resolution + API bridges
//!                   └─> Linked graph behind `SharedGraph`
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use codemap_indexer::ProjectIndexer;
//!
//! #[tokio::main]
//! async fn main() -> codemap_indexer::Result<()> {
//!     let indexer = ProjectIndexer::new("/path/to/project")?;
//!     let stats = indexer.index_full().await?;
//!
//!     println!("Indexed {} files, {} nodes", stats.files, stats.nodes);
//!     Ok(())
//! }
//! ```

mod error;
mod indexer;
mod scanner;
mod stats;
mod watcher;

pub use error::{IndexerError, Result};
pub use indexer::ProjectIndexer;
pub use scanner::FileScanner;
pub use stats::IndexStats;
pub use watcher::{FileWatcher, WatchConfig, WatchUpdate};
