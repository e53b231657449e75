use std::sync::Arc;

use dx_domain::Document;
use dx_providers::LlmClient;
use dx_retrieval::{EnhancedRetriever, RetrieverSettings};
use dx_service::{
	DxService, Providers,
	qa::{ANSWER_FAILURE_PREFIX, NO_CONTEXT_ANSWER, QA_PROMPT},
};
use dx_testkit::{FailingLlm, RecordingReportEmitter, ScriptedLlm, test_config, transformer_corpus};

const QUESTION: &str = "变压器的正常温度范围是多少？";
const ANSWER: &str = "根据来源 1，变压器的正常运行温度一般在60-85摄氏度之间，超过90度时应该立即检查冷却系统。";

fn service(corpus: Vec<Document>, llm: Arc<dyn LlmClient>) -> DxService {
	let cfg = test_config();
	let retriever = EnhancedRetriever::new(corpus, RetrieverSettings::from_config(&cfg.retrieval));

	DxService::new(
		cfg,
		Arc::new(retriever),
		Providers::new(llm, Arc::new(RecordingReportEmitter::default())),
	)
}

#[tokio::test]
async fn answers_from_retrieved_context() {
	let llm = Arc::new(ScriptedLlm::new().route(QA_PROMPT, ANSWER));
	let answer = service(transformer_corpus(), llm.clone()).answer(QUESTION).await;

	assert!(!answer.degraded);
	assert_eq!(answer.answer, ANSWER);
	assert!(answer.confidence > 0.5 && answer.confidence <= 1.0);
	assert_eq!(answer.sources[0], "doc2");

	let mut sources = answer.sources.clone();

	sources.sort();

	assert_eq!(sources, vec!["doc1", "doc2", "doc3"]);
	assert_eq!(llm.calls(), 1);
}

#[tokio::test]
async fn empty_context_skips_the_model() {
	let llm = Arc::new(ScriptedLlm::new().route(QA_PROMPT, ANSWER));
	let answer = service(Vec::new(), llm.clone()).answer(QUESTION).await;

	assert!(answer.degraded);
	assert_eq!(answer.answer, NO_CONTEXT_ANSWER);
	assert_eq!(answer.confidence, 0.0);
	assert!(answer.sources.is_empty());
	assert_eq!(llm.calls(), 0);
}

#[tokio::test]
async fn model_failure_is_reported_in_the_answer() {
	let llm = Arc::new(FailingLlm::default());
	let answer = service(transformer_corpus(), llm.clone()).answer(QUESTION).await;

	assert!(answer.degraded);
	assert!(answer.answer.starts_with(ANSWER_FAILURE_PREFIX), "{}", answer.answer);
	assert!(answer.answer.contains("LLM endpoint unavailable."));
	assert_eq!(answer.confidence, 0.0);
	assert!(answer.sources.is_empty());
	assert_eq!(llm.calls(), 1);
}
