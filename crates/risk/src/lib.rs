//! # Codemap Risk
//!
//! Change-risk signals on top of the code graph: hotspot scoring from
//! churn history and blast-radius analysis of unified diffs.
//!
//! ## Features
//!
//! - **Diff parsing** - `+++ b/` and `@@` headers to added/removed ranges
//! - **Blast radius** - touched symbols banded by how many callers they have
//! - **Hotspots** - `ln(1 + callers) * ln(1 + churn)` per symbol
//!
//! ## Architecture
//!
//! ```text
//! unified diff ──> DiffHunk[] ──┐
//!                               ├──> analyze_diff ──> DiffReport (bands)
//! GraphStore ───────────────────┤
//!                               └──> hotspot_report ──> Hotspot[] (scores)
//! churn table ──────────────────┘
//! ```

mod blast;
mod diff;
mod error;
mod hotspot;

pub use blast::{analyze_diff, analyze_hunks, DiffReport, RiskBand, RiskBands, TouchedSymbol};
pub use diff::{parse_unified_diff, DiffHunk, LineRange};
pub use error::{Result, RiskError};
pub use hotspot::{hotspot_report, hotspot_score, ChurnRecord, Hotspot, HotspotFilter};
