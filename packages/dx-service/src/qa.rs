use serde::Serialize;
use serde_json::Value;

use crate::DxService;
use dx_domain::Document;
use dx_providers::LlmClient;

pub const QA_PROMPT: &str = "你是一个专业的电气工程设备知识助手。基于提供的上下文信息，准确回答用户的问题。\n\n\
要求：\n\
1. 只使用提供的上下文信息，不要编造答案\n\
2. 如果上下文中没有相关信息，明确说明\n\
3. 答案要准确、清晰、专业\n\
4. 必要时引用具体的来源\n\
5. 如果涉及数值、标准等，要确保准确";

pub const NO_CONTEXT_ANSWER: &str = "未找到相关上下文，无法生成答案";
pub const ANSWER_FAILURE_PREFIX: &str = "答案生成失败: ";

const UNKNOWN_SOURCE: &str = "未知来源";
const BASE_CONFIDENCE: f32 = 0.5;
const POSITIVE_MARKERS: &[&str] = &["根据", "按照", "标准规定", "技术规范", "应该"];
const NEGATIVE_MARKERS: &[&str] = &["不确定", "无法判断", "信息不足", "没有提供"];

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QaAnswer {
	pub answer: String,
	/// In `[0, 1]`. Zero when degraded.
	pub confidence: f32,
	/// Distinct `source` metadata values of the context documents, in rank order.
	pub sources: Vec<String>,
	/// Whether `answer` is a failure message instead of a model answer.
	pub degraded: bool,
}
impl QaAnswer {
	fn degraded(answer: String) -> Self {
		Self { answer, confidence: 0.0, sources: Vec::new(), degraded: true }
	}
}

impl DxService {
	/// Retrieves context for `query` and asks the model to answer from it.
	pub async fn answer(&self, query: &str) -> QaAnswer {
		let documents = self.search(query, None).await;

		synthesize_answer(self.providers.llm.as_ref(), query, &documents).await
	}
}

/// Answers `query` from `documents`. Never fails; problems are reported in the answer text.
pub async fn synthesize_answer(
	llm: &dyn LlmClient,
	query: &str,
	documents: &[Document],
) -> QaAnswer {
	let context = build_context(documents);

	if context.is_empty() {
		tracing::warn!("No context retrieved. Skipping answer synthesis.");

		return QaAnswer::degraded(NO_CONTEXT_ANSWER.to_string());
	}

	let message = format!("问题：{query}\n\n参考信息：\n{context}\n\n请基于以上信息回答问题。");

	match llm.complete(QA_PROMPT, &[message]).await {
		Ok(answer) => {
			let confidence = answer_confidence(query, &answer);

			tracing::info!(confidence, documents = documents.len(), "Answer generated.");

			QaAnswer { sources: sources(documents), answer, confidence, degraded: false }
		},
		Err(err) => {
			tracing::warn!(error = %err, "Answer synthesis failed.");

			QaAnswer::degraded(format!("{ANSWER_FAILURE_PREFIX}{err}"))
		},
	}
}

/// Numbered `[来源 i: source]` blocks, one per document.
pub fn build_context(documents: &[Document]) -> String {
	documents
		.iter()
		.enumerate()
		.map(|(idx, doc)| format!("[来源 {}: {}]\n{}", idx + 1, source_of(doc), doc.content()))
		.collect::<Vec<_>>()
		.join("\n\n")
}

/// Heuristic confidence from answer length, hedging words and overlap with the query.
pub fn answer_confidence(query: &str, answer: &str) -> f32 {
	let len = answer.chars().count();
	let mut confidence = BASE_CONFIDENCE;

	if (50..=500).contains(&len) {
		confidence += 0.1;
	} else if len < 20 {
		confidence -= 0.2;
	}

	for marker in POSITIVE_MARKERS {
		if answer.contains(marker) {
			confidence += 0.05;
		}
	}
	for marker in NEGATIVE_MARKERS {
		if answer.contains(marker) {
			confidence -= 0.1;
		}
	}

	let answer_words: Vec<&str> = answer.split_whitespace().collect();
	let mut query_words: Vec<&str> = query.split_whitespace().collect();

	query_words.sort_unstable();
	query_words.dedup();

	let overlap = query_words.iter().filter(|word| answer_words.contains(*word)).count();

	if overlap > 0 {
		confidence += (overlap as f32 * 0.05).min(0.2);
	}

	confidence.clamp(0.0, 1.0)
}

fn sources(documents: &[Document]) -> Vec<String> {
	let mut sources: Vec<String> = Vec::new();

	for doc in documents {
		let source = source_of(doc);

		if !sources.iter().any(|seen| seen == source) {
			sources.push(source.to_string());
		}
	}

	sources
}

fn source_of(doc: &Document) -> &str {
	doc.metadata()
		.get("source")
		.and_then(Value::as_str)
		.filter(|source| !source.trim().is_empty())
		.unwrap_or(UNKNOWN_SOURCE)
}
