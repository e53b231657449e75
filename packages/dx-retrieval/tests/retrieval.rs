use std::{collections::HashSet, sync::Arc};

use serde_json::json;

use dx_domain::{Document, FilterCondition, MetadataFilter};
use dx_retrieval::{
	EnhancedRetriever, RetrievalRequest, RetrieverSettings, SingleMode, SparseIndex,
};
use dx_testkit::{
	FailingDenseRetriever, FailingReranker, ReverseReranker, ScriptedLlm, StaticDenseRetriever,
	doc_by_source, transformer_corpus,
};

fn doc(source: &str) -> Document {
	doc_by_source(&transformer_corpus(), source).expect("fixture document must exist")
}

fn sources(docs: &[Document]) -> Vec<String> {
	docs.iter()
		.map(|doc| doc.metadata().get("source").and_then(|v| v.as_str()).unwrap_or("").to_string())
		.collect()
}

fn hybrid_retriever(dense: Arc<StaticDenseRetriever>) -> EnhancedRetriever {
	EnhancedRetriever::new(transformer_corpus(), RetrieverSettings::default()).with_dense(dense)
}

#[tokio::test]
async fn hybrid_fusion_ranks_temperature_document_first() {
	let dense = Arc::new(StaticDenseRetriever::new(vec![doc("doc1"), doc("doc3"), doc("doc2")]));
	let retriever = hybrid_retriever(dense);
	let docs = retriever.retrieve(&RetrievalRequest::new("变压器温度", 3)).await;

	assert_eq!(sources(&docs), vec!["doc3", "doc1", "doc2"]);
	assert!(docs[0].content().contains("温度"));
}

#[test]
fn sparse_scores_are_deterministic() {
	let corpus = transformer_corpus();
	let index = SparseIndex::build(&corpus, &Default::default());
	let first = index.search("变压器温度", 5);
	let second = index.search("变压器温度", 5);
	let rebuilt = SparseIndex::build(&corpus, &Default::default()).search("变压器温度", 5);

	assert_eq!(first, second);
	assert_eq!(first, rebuilt);
	assert_eq!(first.iter().map(|hit| hit.index).collect::<Vec<_>>(), vec![2, 1, 0]);
}

#[tokio::test]
async fn sparse_only_hits_survive_fusion() {
	let dense = Arc::new(StaticDenseRetriever::new(vec![doc("doc1")]));
	let docs = hybrid_retriever(dense).retrieve(&RetrievalRequest::new("断路器", 5)).await;

	assert!(sources(&docs).contains(&"doc5".to_string()));
	assert!(sources(&docs).contains(&"doc1".to_string()));
}

#[tokio::test]
async fn empty_corpus_returns_nothing_for_any_flags() {
	let llm = Arc::new(ScriptedLlm::new().fallback("变压器"));
	let retriever = EnhancedRetriever::new(Vec::new(), RetrieverSettings::default())
		.with_dense(Arc::new(StaticDenseRetriever::new(vec![doc("doc1")])))
		.with_expander(llm.clone())
		.with_reranker(Arc::new(ReverseReranker));

	for hybrid in [true, false] {
		let mut request = RetrievalRequest::new("变压器温度", 5);

		request.enable_query_expansion = true;
		request.enable_multi_query = true;
		request.enable_hyde = true;
		request.enable_rerank = true;
		request.enable_hybrid = hybrid;

		assert!(retriever.retrieve(&request).await.is_empty());
	}

	assert_eq!(llm.calls(), 0);
}

#[tokio::test]
async fn expanded_queries_are_deduplicated() {
	let llm = Arc::new(
		ScriptedLlm::new().route("查询优化", "变压器油温").route("查询变体", "变压器过热\n断路器"),
	);
	let dense = Arc::new(StaticDenseRetriever::new(vec![doc("doc3"), doc("doc2")]));
	let retriever = hybrid_retriever(dense.clone()).with_expander(llm);
	let mut request = RetrievalRequest::new("变压器温度", 5);

	request.enable_query_expansion = true;
	request.enable_multi_query = true;

	let docs = retriever.retrieve(&request).await;
	let keys: HashSet<_> = docs.iter().map(Document::key).collect();

	assert_eq!(dense.queries(), vec!["变压器温度", "变压器油温", "变压器过热"]);
	assert_eq!(keys.len(), docs.len());
	assert!(!docs.is_empty());
}

#[tokio::test]
async fn hypothetical_answer_drives_dense_search_for_original_query() {
	let llm = Arc::new(ScriptedLlm::new().route("技术文档", "变压器正常油温在85度以下。"));
	let dense = Arc::new(StaticDenseRetriever::new(vec![doc("doc2")]));
	let retriever = hybrid_retriever(dense.clone()).with_expander(llm);
	let mut request = RetrievalRequest::new("变压器温度", 3);

	request.enable_hyde = true;

	let docs = retriever.retrieve(&request).await;

	assert_eq!(dense.queries(), vec!["变压器正常油温在85度以下。"]);
	assert_eq!(sources(&docs)[0], "doc2");
}

#[tokio::test]
async fn expansion_failure_falls_back_to_original_query() {
	let llm = Arc::new(ScriptedLlm::new());
	let dense = Arc::new(StaticDenseRetriever::new(vec![doc("doc3")]));
	let retriever = hybrid_retriever(dense.clone()).with_expander(llm);
	let mut request = RetrievalRequest::new("变压器温度", 3);

	request.enable_query_expansion = true;
	request.enable_multi_query = true;
	request.enable_hyde = true;

	let docs = retriever.retrieve(&request).await;

	assert_eq!(dense.queries(), vec!["变压器温度"]);
	assert_eq!(sources(&docs)[0], "doc3");
}

#[tokio::test]
async fn dense_failure_degrades_to_sparse() {
	let retriever = EnhancedRetriever::new(transformer_corpus(), RetrieverSettings::default())
		.with_dense(Arc::new(FailingDenseRetriever));
	let docs = retriever.retrieve(&RetrievalRequest::new("变压器温度", 5)).await;

	assert_eq!(sources(&docs), vec!["doc3", "doc2", "doc1"]);
}

#[tokio::test]
async fn single_mode_uses_configured_retriever() {
	let dense = Arc::new(StaticDenseRetriever::new(vec![doc("doc4"), doc("doc5")]));
	let mut request = RetrievalRequest::new("变压器温度", 5);

	request.enable_hybrid = false;

	let dense_first = hybrid_retriever(dense.clone()).retrieve(&request).await;
	let sparse_first = EnhancedRetriever::new(
		transformer_corpus(),
		RetrieverSettings { single_mode: SingleMode::Sparse, ..RetrieverSettings::default() },
	)
	.with_dense(dense)
	.retrieve(&request)
	.await;

	assert_eq!(sources(&dense_first), vec!["doc4", "doc5"]);
	assert_eq!(sources(&sparse_first), vec!["doc3", "doc2", "doc1"]);
}

#[tokio::test]
async fn metadata_filter_drops_non_matching_documents() {
	let dense = Arc::new(StaticDenseRetriever::new(vec![doc("doc4"), doc("doc3")]));
	let filter = MetadataFilter::new()
		.with("source", FilterCondition::OneOf(vec![json!("doc2"), json!("doc3")]));
	let docs = hybrid_retriever(dense)
		.retrieve(&RetrievalRequest::new("变压器温度", 5).with_filter(filter))
		.await;

	assert_eq!(sources(&docs), vec!["doc3", "doc2"]);
}

#[tokio::test]
async fn exact_filters_are_pushed_to_dense_backend_when_enabled() {
	let dense = Arc::new(StaticDenseRetriever::new(vec![doc("doc3")]));
	let retriever = EnhancedRetriever::new(
		transformer_corpus(),
		RetrieverSettings { dense_prefilter: true, ..RetrieverSettings::default() },
	)
	.with_dense(dense.clone());
	let filter = MetadataFilter::new()
		.with("topic", FilterCondition::Equals(json!("变压器")))
		.with("source", FilterCondition::predicate(|value| value.as_str() != Some("doc1")));

	retriever.retrieve(&RetrievalRequest::new("变压器温度", 5).with_filter(filter)).await;

	let pushed = dense.filters();

	assert_eq!(pushed.len(), 1);
	assert_eq!(pushed[0], json!({ "topic": "变压器" }).as_object().cloned());
}

#[tokio::test]
async fn rerank_reorders_and_failure_keeps_fused_order() {
	let dense = Arc::new(StaticDenseRetriever::new(vec![doc("doc1"), doc("doc3"), doc("doc2")]));
	let mut request = RetrievalRequest::new("变压器温度", 3);

	request.enable_rerank = true;

	let reranked = hybrid_retriever(dense.clone())
		.with_reranker(Arc::new(ReverseReranker))
		.retrieve(&request)
		.await;
	let kept = hybrid_retriever(dense)
		.with_reranker(Arc::new(FailingReranker))
		.retrieve(&request)
		.await;

	assert_eq!(sources(&reranked), vec!["doc2", "doc1", "doc3"]);
	assert_eq!(sources(&kept), vec!["doc3", "doc1", "doc2"]);
}

#[tokio::test]
async fn results_are_truncated_to_top_k() {
	let dense = Arc::new(StaticDenseRetriever::new(vec![doc("doc1"), doc("doc3"), doc("doc2")]));
	let docs = hybrid_retriever(dense).retrieve(&RetrievalRequest::new("变压器温度", 1)).await;

	assert_eq!(sources(&docs), vec!["doc3"]);
}
