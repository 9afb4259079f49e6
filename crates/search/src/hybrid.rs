use crate::error::{Result, SearchError};
use crate::fusion::{fuse, FusionConfig};
use crate::lexical::lexical_search;
use async_trait::async_trait;
use codemap_extract::Node;
use codemap_graph::GraphStore;
use log::{debug, warn};
use serde::Serialize;
use std::sync::Arc;

/// One id ranked by an external vector backend
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub node_id: String,
    pub score: f32,
}

/// External semantic ranking backend
///
/// Implementations embed the query, compare against their own index and
/// return node ids best first. The engine treats the backend as optional:
/// absence or failure degrades to lexical-only search.
#[async_trait]
pub trait VectorRanker: Send + Sync {
    async fn rank(&self, query: &str, limit: usize) -> Result<Vec<VectorHit>>;
}

/// A search result with the node it points at
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub node: Node,
    pub score: f32,
}

/// Hybrid search over the graph: lexical tiers fused with vector ranks
pub struct HybridSearch {
    vector: Option<Arc<dyn VectorRanker>>,
    fusion: FusionConfig,
}

impl Default for HybridSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl HybridSearch {
    pub fn new() -> Self {
        Self {
            vector: None,
            fusion: FusionConfig::default(),
        }
    }

    pub fn with_vector(mut self, ranker: Arc<dyn VectorRanker>) -> Self {
        self.vector = Some(ranker);
        self
    }

    pub fn with_fusion(mut self, fusion: FusionConfig) -> Self {
        self.fusion = fusion;
        self
    }

    /// Rank nodes for `query`, best first
    pub async fn search(
        &self,
        store: &GraphStore,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        if query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        debug!("hybrid search: query={query:?} limit={limit}");

        // retrieve a wider pool so fusion has something to reorder
        let pool = limit.max(1) * 5;
        let lexical_ids: Vec<String> = lexical_search(store, query, pool)?
            .into_iter()
            .map(|hit| hit.node_id)
            .collect();

        let vector_ids: Vec<String> = match &self.vector {
            Some(ranker) => match ranker.rank(query, pool).await {
                Ok(hits) => hits.into_iter().map(|hit| hit.node_id).collect(),
                Err(e) => {
                    warn!("vector backend unavailable, lexical only: {e}");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        debug!(
            "lexical: {} candidates, vector: {} candidates",
            lexical_ids.len(),
            vector_ids.len()
        );

        let mut hits: Vec<SearchHit> = fuse(&self.fusion, &lexical_ids, &vector_ids)
            .into_iter()
            .filter_map(|(node_id, score)| {
                let node = store.lookup_by_id(&node_id);
                if node.is_none() {
                    debug!("vector backend returned unknown node {node_id}");
                }
                node.map(|n| SearchHit {
                    node: n.clone(),
                    score,
                })
            })
            .collect();
        hits.truncate(limit);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codemap_extract::{Language, NodeKind};
    use pretty_assertions::assert_eq;

    struct FixedRanker(Vec<VectorHit>);

    #[async_trait]
    impl VectorRanker for FixedRanker {
        async fn rank(&self, _query: &str, _limit: usize) -> Result<Vec<VectorHit>> {
            Ok(self.0.clone())
        }
    }

    struct FailingRanker;

    #[async_trait]
    impl VectorRanker for FailingRanker {
        async fn rank(&self, _query: &str, _limit: usize) -> Result<Vec<VectorHit>> {
            Err(SearchError::backend("model not loaded"))
        }
    }

    fn seeded_store() -> (GraphStore, Node, Node) {
        let mut store = GraphStore::new();
        let charge = Node::new(
            NodeKind::Function,
            "charge",
            "charge",
            "src/a.py",
            Language::Python,
            1,
            4,
        );
        let charge_card = Node::new(
            NodeKind::Function,
            "chargeCard",
            "chargeCard",
            "src/a.py",
            Language::Python,
            10,
            14,
        );
        store
            .commit_file("src/a.py", vec![charge.clone(), charge_card.clone()], vec![])
            .unwrap();
        (store, charge, charge_card)
    }

    #[tokio::test]
    async fn test_lexical_only_without_backend() {
        let (store, charge, _) = seeded_store();
        let engine = HybridSearch::new();

        let hits = engine.search(&store, "charge", 10).await.unwrap();
        assert_eq!(hits[0].node.id, charge.id);
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn test_even_votes_fall_back_to_lexical_rank() {
        let (store, charge, charge_card) = seeded_store();
        // vector backend is confident about the prefix match
        let ranker = FixedRanker(vec![
            VectorHit {
                node_id: charge_card.id.clone(),
                score: 0.99,
            },
            VectorHit {
                node_id: charge.id.clone(),
                score: 0.42,
            },
        ]);
        let engine = HybridSearch::new().with_vector(Arc::new(ranker));

        let hits = engine.search(&store, "charge", 10).await.unwrap();
        // both sides now vote for both nodes; lexical rank breaks the tie
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].node.id, charge.id);
    }

    #[tokio::test]
    async fn test_failing_backend_degrades_to_lexical() {
        let (store, charge, _) = seeded_store();
        let engine = HybridSearch::new().with_vector(Arc::new(FailingRanker));

        let hits = engine.search(&store, "charge", 10).await.unwrap();
        assert_eq!(hits[0].node.id, charge.id);
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_vector_ids_are_dropped() {
        let (store, charge, _) = seeded_store();
        let ranker = FixedRanker(vec![VectorHit {
            node_id: "ffffffffffffffff".to_string(),
            score: 1.0,
        }]);
        let engine = HybridSearch::new().with_vector(Arc::new(ranker));

        let hits = engine.search(&store, "charge", 10).await.unwrap();
        assert!(hits.iter().all(|h| h.node.id != "ffffffffffffffff"));
        assert_eq!(hits[0].node.id, charge.id);
    }

    #[tokio::test]
    async fn test_empty_query_is_an_error() {
        let (store, _, _) = seeded_store();
        let engine = HybridSearch::new();
        assert!(matches!(
            engine.search(&store, "", 10).await,
            Err(SearchError::EmptyQuery)
        ));
    }
}
