use std::{
	collections::HashSet,
	sync::{Arc, LazyLock},
};

use regex::Regex;

use dx_providers::LlmClient;

const REWRITE_PROMPT: &str = "你是一个专业的查询优化助手。将用户的查询重写为更清晰、更具体、更适合检索的表述。\
保持原意不变，使用专业术语，补充省略的上下文。只返回重写后的查询，不要解释。";
const VARIANTS_PROMPT: &str = "你是一个专业的查询扩展助手。基于用户的原始查询，从不同角度生成查询变体，\
使用同义词和相关概念，覆盖问题描述、原因分析和解决方案。每行一个查询，不要编号，不要解释。";
const HYDE_PROMPT: &str = "你是一个专业的电气工程知识专家。假设你找到了相关的技术文档，\
基于专业知识为用户的问题生成一段详细、准确的答案，包含具体的数据、标准和参数，长度在200到400字之间。\
不要编造不确定的信息，直接给出答案。";

// Leading bullets and numbering such as "1.", "2、", "(3)" or "- ".
static LIST_MARKER: LazyLock<Option<Regex>> =
	LazyLock::new(|| Regex::new(r"^\s*(?:[-*•·]+\s*|[(（]?\d+\s*[.、)）:：]\s*)").ok());

#[derive(Clone, Copy, Debug)]
pub struct ExpandOptions {
	pub rewrite: bool,
	pub multi_query: bool,
	pub hyde: bool,
	/// Upper bound on `variants`, original included.
	pub num_queries: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpandedQuery {
	pub original: String,
	pub rewritten: String,
	/// Variants of `rewritten`, which is always first.
	pub variants: Vec<String>,
	pub hypothetical: Option<String>,
}

/// LLM-backed query reformulation. Every operation falls back to the input on failure.
#[derive(Clone)]
pub struct QueryExpander {
	llm: Arc<dyn LlmClient>,
}
impl QueryExpander {
	pub fn new(llm: Arc<dyn LlmClient>) -> Self {
		Self { llm }
	}

	pub async fn rewrite(&self, query: &str) -> String {
		let message = format!("原始查询：{query}\n\n重写后的查询：");

		match self.llm.complete(REWRITE_PROMPT, &[message]).await {
			Ok(reply) => {
				let rewritten = reply.trim();

				if rewritten.is_empty() {
					return query.to_string();
				}

				tracing::debug!(query, rewritten, "Query rewritten.");

				rewritten.to_string()
			},
			Err(err) => {
				tracing::warn!(error = %err, "Query rewrite failed. Using the original query.");

				query.to_string()
			},
		}
	}

	/// Returns at most `n` queries with `query` first and no duplicates.
	pub async fn generate_variants(&self, query: &str, n: usize) -> Vec<String> {
		if n <= 1 {
			return vec![query.to_string()];
		}

		let message = format!("原始查询：{query}\n\n生成{n}个查询变体：");
		let reply = match self.llm.complete(VARIANTS_PROMPT, &[message]).await {
			Ok(reply) => reply,
			Err(err) => {
				tracing::warn!(
					error = %err,
					"Variant generation failed. Using the original query."
				);

				return vec![query.to_string()];
			},
		};
		let mut seen = HashSet::new();
		let mut out = Vec::new();
		let lines = reply
			.lines()
			.map(|line| strip_list_marker(line).trim().to_string())
			.filter(|line| !line.is_empty());

		for candidate in std::iter::once(query.to_string()).chain(lines) {
			if seen.insert(candidate.clone()) {
				out.push(candidate);
			}
		}

		out.truncate(n);

		out
	}

	pub async fn hypothetical_document(&self, query: &str) -> String {
		let message = format!("问题：{query}\n\n请生成一个详细的答案：");

		match self.llm.complete(HYDE_PROMPT, &[message]).await {
			Ok(reply) if !reply.trim().is_empty() => reply.trim().to_string(),
			Ok(_) => query.to_string(),
			Err(err) => {
				tracing::warn!(
					error = %err,
					"Hypothetical document failed. Using the original query."
				);

				query.to_string()
			},
		}
	}

	/// Rewrites first, derives variants from the rewritten query, and writes the hypothetical
	/// answer for the original query.
	pub async fn expand(&self, query: &str, options: ExpandOptions) -> ExpandedQuery {
		let rewritten =
			if options.rewrite { self.rewrite(query).await } else { query.to_string() };
		let variants = if options.multi_query {
			self.generate_variants(&rewritten, options.num_queries).await
		} else {
			vec![rewritten.clone()]
		};
		let hypothetical =
			if options.hyde { Some(self.hypothetical_document(query).await) } else { None };

		ExpandedQuery { original: query.to_string(), rewritten, variants, hypothetical }
	}
}

fn strip_list_marker(line: &str) -> String {
	match LIST_MARKER.as_ref() {
		Some(re) => re.replace(line, "").into_owned(),
		None => line.to_string(),
	}
}
