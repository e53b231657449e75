use std::{
	fmt::{Display, Formatter, Result as FmtResult},
	sync::{Arc, OnceLock},
};

use serde_json::{Map, Value};

use crate::{
	bm25::SparseIndex,
	expand::{ExpandOptions, QueryExpander},
	fusion,
};
use dx_config::{Bm25, Retrieval};
use dx_domain::{Document, MetadataFilter};
use dx_providers::{DenseRetriever, LlmClient, Reranker};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SingleMode {
	Dense,
	Sparse,
}
impl SingleMode {
	pub fn parse(raw: &str) -> Option<Self> {
		match raw {
			"dense" => Some(Self::Dense),
			"sparse" => Some(Self::Sparse),
			_ => None,
		}
	}
}
impl Display for SingleMode {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.write_str(match self {
			Self::Dense => "dense",
			Self::Sparse => "sparse",
		})
	}
}

/// Engine-wide knobs. Per-call switches live on [`RetrievalRequest`].
#[derive(Clone, Debug)]
pub struct RetrieverSettings {
	pub alpha: f32,
	pub rrf_k: u32,
	pub candidate_multiplier: u32,
	pub num_queries: u32,
	pub single_mode: SingleMode,
	pub dense_prefilter: bool,
	pub bm25: Bm25,
}
impl RetrieverSettings {
	pub fn from_config(cfg: &Retrieval) -> Self {
		Self {
			alpha: cfg.alpha,
			rrf_k: cfg.rrf_k,
			candidate_multiplier: cfg.candidate_multiplier,
			num_queries: cfg.num_queries,
			single_mode: SingleMode::parse(&cfg.single_mode).unwrap_or(SingleMode::Dense),
			dense_prefilter: cfg.dense_prefilter,
			bm25: cfg.bm25.clone(),
		}
	}
}
impl Default for RetrieverSettings {
	fn default() -> Self {
		Self::from_config(&Retrieval::default())
	}
}

#[derive(Clone, Debug)]
pub struct RetrievalRequest {
	pub query: String,
	pub top_k: usize,
	pub enable_query_expansion: bool,
	pub enable_multi_query: bool,
	pub enable_hyde: bool,
	pub enable_hybrid: bool,
	pub enable_rerank: bool,
	pub metadata_filter: MetadataFilter,
}
impl RetrievalRequest {
	/// Plain hybrid search without expansion or reranking.
	pub fn new(query: impl Into<String>, top_k: usize) -> Self {
		Self {
			query: query.into(),
			top_k,
			enable_query_expansion: false,
			enable_multi_query: false,
			enable_hyde: false,
			enable_hybrid: true,
			enable_rerank: false,
			metadata_filter: MetadataFilter::new(),
		}
	}

	/// Request switches taken from `[retrieval]`.
	pub fn from_config(query: impl Into<String>, top_k: usize, cfg: &Retrieval) -> Self {
		Self {
			query: query.into(),
			top_k,
			enable_query_expansion: cfg.enable_query_expansion,
			enable_multi_query: cfg.enable_multi_query,
			enable_hyde: cfg.enable_hyde,
			enable_hybrid: cfg.enable_hybrid,
			enable_rerank: cfg.enable_rerank,
			metadata_filter: MetadataFilter::new(),
		}
	}

	pub fn with_filter(mut self, filter: MetadataFilter) -> Self {
		self.metadata_filter = filter;

		self
	}

	fn wants_expansion(&self) -> bool {
		self.enable_query_expansion || self.enable_multi_query || self.enable_hyde
	}
}

/// Hybrid retrieval façade: expansion, sparse and dense search, fusion, dedup, filtering,
/// rerank and truncation.
///
/// The sparse index is built from the corpus on first use and reused afterwards.
pub struct EnhancedRetriever {
	corpus: Vec<Document>,
	sparse: OnceLock<SparseIndex>,
	dense: Option<Arc<dyn DenseRetriever>>,
	expander: Option<QueryExpander>,
	reranker: Option<Arc<dyn Reranker>>,
	settings: RetrieverSettings,
}
impl EnhancedRetriever {
	pub fn new(corpus: Vec<Document>, settings: RetrieverSettings) -> Self {
		Self {
			corpus,
			sparse: OnceLock::new(),
			dense: None,
			expander: None,
			reranker: None,
			settings,
		}
	}

	pub fn with_dense(mut self, dense: Arc<dyn DenseRetriever>) -> Self {
		self.dense = Some(dense);

		self
	}

	pub fn with_expander(mut self, llm: Arc<dyn LlmClient>) -> Self {
		self.expander = Some(QueryExpander::new(llm));

		self
	}

	pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
		self.reranker = Some(reranker);

		self
	}

	pub fn corpus(&self) -> &[Document] {
		&self.corpus
	}

	pub fn settings(&self) -> &RetrieverSettings {
		&self.settings
	}

	/// Never fails. Backend errors degrade to fewer candidates and are logged.
	pub async fn retrieve(&self, request: &RetrievalRequest) -> Vec<Document> {
		if request.top_k == 0 || self.corpus.is_empty() {
			return Vec::new();
		}

		let (queries, hypothetical) = self.query_set(request).await;
		let candidate_k = request.top_k.saturating_mul(self.settings.candidate_multiplier as usize);
		let prefilter = self.dense_prefilter(&request.metadata_filter);
		let mut accumulated = Vec::new();

		for (idx, query) in queries.iter().enumerate() {
			// The hypothetical answer stands in for the original query on the dense side only.
			let dense_text = match (idx, hypothetical.as_deref()) {
				(0, Some(text)) => text,
				_ => query.as_str(),
			};
			let results = if request.enable_hybrid {
				let dense = self.dense_search(dense_text, candidate_k, prefilter.as_ref()).await;
				let sparse = self.sparse_search(query, candidate_k);

				fusion::fuse(&dense, &sparse, self.settings.alpha, self.settings.rrf_k)
			} else {
				match (self.settings.single_mode, self.dense.is_some()) {
					(SingleMode::Dense, true) =>
						self.dense_search(dense_text, candidate_k, prefilter.as_ref()).await,
					_ => self.sparse_search(query, candidate_k),
				}
			};

			accumulated.extend(results);
		}

		let total = accumulated.len();
		let unique = fusion::dedup_documents(accumulated);
		let unique_count = unique.len();
		let filtered = fusion::apply_filter(unique, &request.metadata_filter);
		let mut ranked = if request.enable_rerank {
			self.rerank(&request.query, filtered).await
		} else {
			filtered
		};

		ranked.truncate(request.top_k);

		tracing::info!(
			queries = queries.len(),
			candidates = total,
			unique = unique_count,
			returned = ranked.len(),
			hybrid = request.enable_hybrid,
			"Retrieval completed."
		);

		ranked
	}

	async fn query_set(&self, request: &RetrievalRequest) -> (Vec<String>, Option<String>) {
		let original = request.query.clone();
		let Some(expander) = self.expander.as_ref().filter(|_| request.wants_expansion()) else {
			return (vec![original], None);
		};
		let limit = (self.settings.num_queries as usize).max(1);
		let expanded = expander
			.expand(
				&original,
				ExpandOptions {
					rewrite: request.enable_query_expansion,
					multi_query: request.enable_multi_query,
					hyde: request.enable_hyde,
					num_queries: limit,
				},
			)
			.await;
		let mut queries = vec![original];

		for variant in expanded.variants {
			if !queries.contains(&variant) {
				queries.push(variant);
			}
		}

		queries.truncate(limit);

		(queries, expanded.hypothetical)
	}

	fn sparse_index(&self) -> &SparseIndex {
		self.sparse.get_or_init(|| SparseIndex::build(&self.corpus, &self.settings.bm25))
	}

	fn sparse_search(&self, query: &str, k: usize) -> Vec<Document> {
		let index = self.sparse_index();

		index
			.search(query, k)
			.into_iter()
			.filter_map(|hit| self.corpus.get(hit.index).cloned())
			.collect()
	}

	async fn dense_search(
		&self,
		query: &str,
		k: usize,
		filter: Option<&Map<String, Value>>,
	) -> Vec<Document> {
		let Some(dense) = self.dense.as_ref() else {
			return Vec::new();
		};

		match dense.similarity_search(query, k, filter).await {
			Ok(docs) => docs,
			Err(err) => {
				tracing::warn!(error = %err, "Dense search failed. Continuing without it.");

				Vec::new()
			},
		}
	}

	fn dense_prefilter(&self, filter: &MetadataFilter) -> Option<Map<String, Value>> {
		if !self.settings.dense_prefilter {
			return None;
		}

		let exact = filter.exact_conditions();

		if exact.is_empty() { None } else { Some(exact) }
	}

	async fn rerank(&self, query: &str, docs: Vec<Document>) -> Vec<Document> {
		let Some(reranker) = self.reranker.as_ref() else {
			return docs;
		};

		if docs.is_empty() {
			return docs;
		}

		let texts: Vec<String> = docs.iter().map(|doc| doc.content().to_string()).collect();
		let scores = match reranker.rerank(query, &texts).await {
			Ok(scores) if scores.len() == docs.len() => scores,
			Ok(scores) => {
				tracing::warn!(
					expected = docs.len(),
					actual = scores.len(),
					"Rerank score count mismatch. Keeping fused order."
				);

				return docs;
			},
			Err(err) => {
				tracing::warn!(error = %err, "Rerank failed. Keeping fused order.");

				return docs;
			},
		};
		let mut scored: Vec<(f32, Document)> = scores.into_iter().zip(docs).collect();

		scored.sort_by(|a, b| b.0.total_cmp(&a.0));

		scored.into_iter().map(|(_, doc)| doc).collect()
	}
}
