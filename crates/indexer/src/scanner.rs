use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

/// Scanner for finding source files in a project
///
/// gitignore-aware walk with the usual build and vendor directories
/// excluded, a size cap, and an optional caller-supplied predicate that
/// can veto any path on top of the defaults. Paths come back sorted;
/// that order is the pipeline's indexing order.
pub struct FileScanner {
    root: PathBuf,
    predicate: Option<Box<dyn Fn(&Path) -> bool + Send + Sync>>,
}

impl FileScanner {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            predicate: None,
        }
    }

    /// Add an external indexability veto on top of the default excludes
    #[must_use]
    pub fn with_predicate(
        mut self,
        predicate: impl Fn(&Path) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.predicate = Some(Box::new(predicate));
        self
    }

    /// Scan the project for source files (.gitignore aware)
    pub fn scan(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();

        let root = self.root.clone();
        let mut builder = WalkBuilder::new(&self.root);
        builder
            .hidden(true) // do not index hidden files
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true);
        builder.filter_entry(move |entry| !FileScanner::is_ignored_scope(entry.path(), &root));

        for result in builder.build() {
            match result {
                Ok(entry) => {
                    let Some(file_type) = entry.file_type() else {
                        continue;
                    };
                    if !file_type.is_file() {
                        continue;
                    }

                    let path = entry.path();
                    if self.admits(path) {
                        files.push(path.to_path_buf());
                    }
                }
                Err(e) => log::warn!("Failed to read entry: {e}"),
            }
        }

        files.sort();
        log::info!("Found {} source files", files.len());
        files
    }

    /// Whether one path would be picked up by `scan`
    ///
    /// The watcher asks this about event paths, so a change under
    /// `node_modules` or a vetoed file never reaches the pipeline. A path
    /// that no longer exists on disk skips the size check; removals of
    /// source files must still be admitted.
    pub fn admits(&self, path: &Path) -> bool {
        if Self::is_ignored_scope(path, &self.root) {
            return false;
        }
        if !Self::is_source_file(path) {
            return false;
        }
        if let Ok(meta) = std::fs::metadata(path) {
            if meta.len() > MAX_FILE_SIZE_BYTES {
                log::debug!(
                    "Skipping large file {} ({} bytes > {})",
                    path.display(),
                    meta.len(),
                    MAX_FILE_SIZE_BYTES
                );
                return false;
            }
        }
        if let Some(predicate) = &self.predicate {
            if !predicate(path) {
                log::debug!("Predicate vetoed {}", path.display());
                return false;
            }
        }
        true
    }

    /// Check if file has a source code extension
    fn is_source_file(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .is_some_and(|ext| SOURCE_EXTENSIONS.iter().any(|candidate| candidate == &ext))
    }

    fn is_ignored_scope(path: &Path, root: &Path) -> bool {
        if let Ok(relative) = path.strip_prefix(root) {
            for component in relative.components() {
                if let std::path::Component::Normal(name) = component {
                    let lowered = name.to_string_lossy().to_lowercase();
                    if lowered.starts_with('.') {
                        return true;
                    }
                    if IGNORED_SCOPES.iter().any(|ignored| ignored == &lowered) {
                        return true;
                    }
                }
            }
        }
        false
    }
}

const IGNORED_SCOPES: &[&str] = &[
    // caches / builds
    "node_modules",
    "target",
    "build",
    "dist",
    "coverage",
    "__pycache__",
    "venv",
    // data / vendor
    "vendor",
    "third_party",
    "third-party",
];

const MAX_FILE_SIZE_BYTES: u64 = 1_048_576; // 1 MB

/// Code extensions the pipeline accepts. Languages without a structural
/// extractor still enter the graph as bare file nodes.
const SOURCE_EXTENSIONS: &[&str] = &[
    // structural extractors
    "rs",
    "py",
    "pyw",
    "js",
    "mjs",
    "cjs",
    "jsx",
    "ts",
    "tsx",
    "mts",
    "go",
    "php",
    // file-node anchors only
    "java",
    "kt",
    "rb",
    "cs",
    "c",
    "h",
    "cpp",
    "hpp",
    "swift",
    "scala",
];

#[cfg(test)]
mod tests {
    use super::FileScanner;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn scan_is_sorted_and_code_only() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("zeta.py"), b"def z():\n    pass\n").unwrap();
        fs::write(temp.path().join("alpha.js"), b"function a() {}\n").unwrap();
        fs::write(temp.path().join("README.md"), b"# docs\n").unwrap();

        let scanner = FileScanner::new(temp.path());
        let files = scanner.scan();

        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("alpha.js"));
        assert!(files[1].ends_with("zeta.py"));
    }

    #[test]
    fn skips_ignored_directories() {
        let temp = tempdir().unwrap();
        // .gitignore only applies inside a git repo; the walker checks for .git
        fs::create_dir_all(temp.path().join(".git")).unwrap();
        let deps = temp.path().join("node_modules").join("left-pad");
        fs::create_dir_all(&deps).unwrap();
        fs::write(deps.join("index.js"), b"module.exports = 1;\n").unwrap();
        let generated = temp.path().join("gen");
        fs::create_dir_all(&generated).unwrap();
        fs::write(generated.join("data.py"), b"X = 1\n").unwrap();
        fs::write(temp.path().join("src.rs"), b"fn main() {}\n").unwrap();
        fs::write(temp.path().join(".gitignore"), b"/gen\n").unwrap();

        let scanner = FileScanner::new(temp.path());
        let files = scanner.scan();

        assert!(files
            .iter()
            .all(|p| !p.to_string_lossy().contains("node_modules")));
        assert!(files.iter().all(|p| !p.to_string_lossy().contains("gen")));
        assert!(files.iter().any(|p| p.ends_with("src.rs")));
    }

    #[test]
    fn predicate_vetoes_paths() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("keep.py"), b"def k():\n    pass\n").unwrap();
        fs::write(temp.path().join("skip.generated.py"), b"X = 1\n").unwrap();

        let scanner = FileScanner::new(temp.path())
            .with_predicate(|p| !p.to_string_lossy().contains(".generated."));
        let files = scanner.scan();

        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("keep.py"));
    }

    #[test]
    fn admits_missing_source_path() {
        let temp = tempdir().unwrap();
        let scanner = FileScanner::new(temp.path());

        // A deleted source file still has to pass, so removals propagate.
        assert!(scanner.admits(&temp.path().join("gone.py")));
        assert!(!scanner.admits(&temp.path().join("gone.lock")));
        assert!(!scanner.admits(&temp.path().join("node_modules/x.js")));
    }
}
