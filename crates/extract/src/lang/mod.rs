//! Per-language structural extractors.

mod go;
mod js_ts;
mod php;
mod python;
mod rust;

pub use go::GoExtractor;
pub use js_ts::{JavaScriptExtractor, TypeScriptExtractor};
pub use php::PhpExtractor;
pub use python::PythonExtractor;
pub use rust::RustExtractor;
