mod error;
mod fusion;
mod hybrid;
mod lexical;

pub use error::{Result, SearchError};
pub use fusion::{fuse, FusionConfig};
pub use hybrid::{HybridSearch, SearchHit, VectorHit, VectorRanker};
pub use lexical::{lexical_search, LexicalHit};
