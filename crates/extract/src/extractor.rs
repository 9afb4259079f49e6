use crate::error::Result;
use crate::language::Language;
use crate::types::{Extraction, Node};
use std::collections::{HashMap, HashSet};

/// One structural extractor per supported language
///
/// Implementations parse a single file and report its classes, functions,
/// endpoints, imports, and candidate call sites. Extractors hold no
/// per-file state, so one instance serves concurrent callers.
pub trait StructuralExtractor: Send + Sync {
    /// The language this extractor understands
    fn language(&self) -> Language;

    /// Extract every symbol and call site from one file
    fn extract(&self, path: &str, source: &str) -> Result<Extraction>;
}

/// Dispatches files to the extractor registered for their language
pub struct ExtractorRegistry {
    extractors: HashMap<Language, Box<dyn StructuralExtractor>>,
}

impl ExtractorRegistry {
    /// Empty registry; callers register extractors themselves
    pub fn new() -> Self {
        Self {
            extractors: HashMap::new(),
        }
    }

    /// Registry with every built-in language wired up
    pub fn with_builtin_languages() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(crate::lang::RustExtractor));
        registry.register(Box::new(crate::lang::PythonExtractor));
        registry.register(Box::new(crate::lang::JavaScriptExtractor));
        registry.register(Box::new(crate::lang::TypeScriptExtractor));
        registry.register(Box::new(crate::lang::GoExtractor));
        registry.register(Box::new(crate::lang::PhpExtractor));
        registry
    }

    /// Register an extractor, replacing any previous one for its language
    pub fn register(&mut self, extractor: Box<dyn StructuralExtractor>) {
        self.extractors.insert(extractor.language(), extractor);
    }

    /// Languages with a registered extractor
    #[must_use]
    pub fn supported_languages(&self) -> Vec<Language> {
        let mut langs: Vec<_> = self.extractors.keys().copied().collect();
        langs.sort_by_key(|l| l.as_str());
        langs
    }

    /// Extract one file, synthesizing its file node
    ///
    /// Files in a language without an extractor still yield the bare file
    /// node, so the graph can anchor imports and churn against them. The
    /// extractors never emit the file node themselves; they reference its
    /// deterministic id for module-level call sites.
    pub fn extract_file(&self, path: &str, source: &str) -> Result<Extraction> {
        let language = Language::from_path(path);
        let line_count = source.lines().count();
        let file_node = Node::file_node(path, language, line_count);

        let Some(extractor) = self.extractors.get(&language) else {
            log::debug!("no extractor for {path} ({})", language.as_str());
            return Ok(Extraction {
                nodes: vec![file_node],
                calls: Vec::new(),
            });
        };

        let extraction = extractor.extract(path, source)?;
        let mut nodes = Vec::with_capacity(extraction.nodes.len() + 1);
        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(file_node.id.clone());
        nodes.push(file_node);
        for node in extraction.nodes {
            // Redefinitions hash to the same id; the first occurrence wins
            if seen.insert(node.id.clone()) {
                nodes.push(node);
            } else {
                log::debug!("duplicate symbol {} in {path}", node.qualified_name);
            }
        }

        Ok(Extraction {
            nodes,
            calls: extraction.calls,
        })
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::with_builtin_languages()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_unknown_language_yields_file_node_only() {
        let registry = ExtractorRegistry::with_builtin_languages();
        let extraction = registry
            .extract_file("notes/build.gradle", "apply plugin: 'java'\n")
            .unwrap();
        assert_eq!(extraction.nodes.len(), 1);
        assert_eq!(extraction.nodes[0].kind, NodeKind::File);
        assert_eq!(extraction.nodes[0].language, Language::Unknown);
        assert!(extraction.calls.is_empty());
    }

    #[test]
    fn test_builtin_language_coverage() {
        let registry = ExtractorRegistry::with_builtin_languages();
        let langs = registry.supported_languages();
        assert_eq!(langs.len(), 6);
        assert!(langs.contains(&Language::Rust));
        assert!(langs.contains(&Language::Php));
    }

    #[test]
    fn test_file_node_precedes_symbols() {
        let registry = ExtractorRegistry::with_builtin_languages();
        let extraction = registry
            .extract_file("svc.py", "def run():\n    pass\n")
            .unwrap();
        assert_eq!(extraction.nodes[0].kind, NodeKind::File);
        assert!(extraction.nodes.len() > 1);
    }
}
