pub mod bm25;
pub mod expand;
pub mod fusion;
pub mod retriever;

pub use bm25::{SparseHit, SparseIndex};
pub use expand::{ExpandOptions, ExpandedQuery, QueryExpander};
pub use fusion::{
	FusedScore, apply_filter, dedup_documents, fuse, rank_map, reciprocal_rank_fusion,
};
pub use retriever::{EnhancedRetriever, RetrievalRequest, RetrieverSettings, SingleMode};
