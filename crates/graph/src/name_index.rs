use codemap_extract::Node;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// How strongly an index entry matched a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchTier {
    /// Whole name or qualified name equals the query (case-insensitive)
    Exact,
    /// Some identifier token starts with the query
    Prefix,
    /// Some identifier token contains the query
    Substring,
}

/// Inverted index over node names
///
/// Identifier tokens split on non-alphanumeric runs and camelCase humps:
/// `saveAll` and `save_all` both index under `save` and `all`. Tokens are
/// kept in a BTreeMap so prefix lookups are a bounded range scan.
#[derive(Debug, Clone, Default)]
pub struct NameIndex {
    tokens: BTreeMap<String, BTreeSet<String>>,
    exact: HashMap<String, BTreeSet<String>>,
}

impl NameIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: &Node) {
        for key in exact_keys(node) {
            self.exact.entry(key).or_default().insert(node.id.clone());
        }
        for token in index_tokens(node) {
            self.tokens.entry(token).or_default().insert(node.id.clone());
        }
    }

    pub fn remove(&mut self, node: &Node) {
        for key in exact_keys(node) {
            if let Some(ids) = self.exact.get_mut(&key) {
                ids.remove(&node.id);
                if ids.is_empty() {
                    self.exact.remove(&key);
                }
            }
        }
        for token in index_tokens(node) {
            if let Some(ids) = self.tokens.get_mut(&token) {
                ids.remove(&node.id);
                if ids.is_empty() {
                    self.tokens.remove(&token);
                }
            }
        }
    }

    /// All ids matching `query`, each with its best tier
    pub fn lookup(&self, query: &str) -> Vec<(String, MatchTier)> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        let mut best: HashMap<String, MatchTier> = HashMap::new();
        if let Some(ids) = self.exact.get(&needle) {
            for id in ids {
                best.insert(id.clone(), MatchTier::Exact);
            }
        }
        for (token, ids) in self.tokens.range(needle.clone()..) {
            if !token.starts_with(&needle) {
                break;
            }
            for id in ids {
                best.entry(id.clone()).or_insert(MatchTier::Prefix);
            }
        }
        for (token, ids) in &self.tokens {
            if token.contains(&needle) {
                for id in ids {
                    best.entry(id.clone()).or_insert(MatchTier::Substring);
                }
            }
        }

        best.into_iter().collect()
    }

    #[must_use]
    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }
}

fn exact_keys(node: &Node) -> Vec<String> {
    let name = node.name.to_lowercase();
    let qualified = node.qualified_name.to_lowercase();
    if name == qualified {
        vec![name]
    } else {
        vec![name, qualified]
    }
}

fn index_tokens(node: &Node) -> BTreeSet<String> {
    let mut tokens = BTreeSet::new();
    tokenize_identifier(&node.name, &mut tokens);
    tokenize_identifier(&node.qualified_name, &mut tokens);
    tokens
}

/// Split an identifier into lowercased word-boundary tokens
///
/// Boundaries are non-alphanumeric runs, a lower-to-upper transition, and
/// the last capital of an acronym run (`HTTPServer` → `http`, `server`).
pub fn tokenize_identifier(text: &str, out: &mut BTreeSet<String>) {
    let chars: Vec<char> = text.chars().collect();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            flush(&mut current, out);
            continue;
        }
        let prev = i.checked_sub(1).and_then(|p| chars.get(p)).copied();
        let next = chars.get(i + 1).copied();
        let starts_hump = match prev {
            Some(p) if p.is_alphanumeric() => {
                (p.is_lowercase() && c.is_uppercase())
                    || (p.is_uppercase()
                        && c.is_uppercase()
                        && next.is_some_and(|n| n.is_lowercase()))
            }
            _ => false,
        };
        if starts_hump {
            flush(&mut current, out);
        }
        current.extend(c.to_lowercase());
    }
    flush(&mut current, out);
}

fn flush(current: &mut String, out: &mut BTreeSet<String>) {
    if !current.is_empty() {
        out.insert(std::mem::take(current));
    }
}
