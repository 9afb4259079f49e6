//! # Codemap Extract
//!
//! Language-aware structural extraction: one tree-sitter pass per file,
//! a uniform symbol model out.
//!
//! ## Features
//!
//! - **Six languages** - Rust, Python, JavaScript, TypeScript, Go, PHP
//! - **Uniform model** - classes, methods, functions, endpoints, imports
//! - **Call candidates** - callee text plus full argument text per call site
//! - **Endpoint detection** - route decorators, attributes, registrations
//!
//! ## Architecture
//!
//! ```text
//! Source File
//!     │
//!     ├──> Language Detection (extension)
//!     │
//!     ├──> ExtractorRegistry
//!     │      ├─ StructuralExtractor per language
//!     │      ├─ tree-sitter parse → AST walk
//!     │      └─ unknown language → bare file node
//!     │
//!     └──> Extraction
//!            ├─ Node[] (file, classes, methods, functions,
//!            │          endpoints, imports)
//!            └─ CallSite[] (caller id, callee text, arguments, line)
//! ```
//!
//! Node ids are content-addressed over (file, language, qualified name,
//! kind), so re-extracting identical source is byte-for-byte idempotent.

mod error;
mod extractor;
mod helpers;
pub mod lang;
mod language;
mod types;

pub use error::{ExtractError, Result};
pub use extractor::{ExtractorRegistry, StructuralExtractor};
pub use helpers::{resolve_callee, CALL_NOISE};
pub use language::Language;
pub use types::{stable_node_id, CallSite, Extraction, Node, NodeKind, Param, Visibility};
