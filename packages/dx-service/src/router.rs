use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::DxService;
use dx_providers::LlmClient;

pub const INTENT_PROMPT: &str = "你是一个专业的意图分类助手。将用户查询分类为以下意图之一：\
diagnosis（设备诊断：生成诊断报告、评估设备健康或运行状态），qa（问答：概念、参数、知识性问题），\
reasoning（推理：计算、因果分析、多步判断）。逐步分析查询中的关键动词和名词，\
输出格式：推理过程 | 意图 | 置信度(0-1)。\n\
示例：生成变压器诊断报告 → 用户明确要求诊断报告 | diagnosis | 0.95\n\
示例：变压器的正常温度范围是多少？ → 询问技术参数 | qa | 0.9\n\
示例：如果变压器温度过高，会导致什么后果？ → 询问因果关系 | reasoning | 0.85";

/// Confidence reported when the reply carries no number and for keyword fallbacks.
pub const FALLBACK_CONFIDENCE: f32 = 0.5;

const DIAGNOSIS_KEYWORDS: &[&str] = &[
	"诊断", "报告", "分析", "评估", "健康", "状态", "检测", "运行正常", "diagnosis", "report",
	"analyze", "evaluate",
];
const REASONING_KEYWORDS: &[&str] = &[
	"为什么", "如果", "计算", "推断", "综合", "推理", "后果", "会怎样", "影响", "why",
	"calculate", "infer", "reasoning",
];

static NUMBER: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?|\.\d+").ok());

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
	Diagnosis,
	Qa,
	Reasoning,
}
impl Intent {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Diagnosis => "diagnosis",
			Self::Qa => "qa",
			Self::Reasoning => "reasoning",
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IntentDecision {
	pub intent: Intent,
	/// In `[0, 1]`.
	pub confidence: f32,
	pub reasoning: String,
	/// Whether the decision came from keyword rules instead of the model.
	pub fallback: bool,
}

impl DxService {
	pub async fn classify_intent(&self, query: &str) -> IntentDecision {
		classify_intent(self.providers.llm.as_ref(), query).await
	}
}

/// Classifies with the model, falling back to keyword rules when the call fails.
pub async fn classify_intent(llm: &dyn LlmClient, query: &str) -> IntentDecision {
	let message = format!("用户查询：{query}\n\n分析：");

	match llm.complete(INTENT_PROMPT, &[message]).await {
		Ok(reply) => {
			let decision = parse_intent_reply(&reply);

			tracing::info!(
				intent = decision.intent.as_str(),
				confidence = decision.confidence,
				"Intent classified."
			);

			decision
		},
		Err(err) => {
			tracing::warn!(error = %err, "Intent classification failed. Using keyword rules.");

			IntentDecision {
				intent: rule_based_intent(query),
				confidence: FALLBACK_CONFIDENCE,
				reasoning: String::new(),
				fallback: true,
			}
		},
	}
}

/// Parses `<reasoning> | <intent> | <confidence>`.
///
/// Replies that do not follow the format are scanned whole. Confidence values above 1 are read
/// as percentages.
pub fn parse_intent_reply(reply: &str) -> IntentDecision {
	let parts: Vec<&str> = reply.trim().split('|').map(str::trim).collect();
	let (reasoning, intent_part, confidence_part) = match parts.as_slice() {
		[reasoning, intent, confidence, ..] => (*reasoning, *intent, *confidence),
		[reasoning, intent] => (*reasoning, *intent, ""),
		_ => ("", reply, reply),
	};

	IntentDecision {
		intent: intent_from_text(intent_part),
		confidence: confidence_from_text(confidence_part),
		reasoning: reasoning.to_string(),
		fallback: false,
	}
}

pub fn rule_based_intent(query: &str) -> Intent {
	let lowered = query.to_lowercase();

	if DIAGNOSIS_KEYWORDS.iter().any(|keyword| lowered.contains(keyword)) {
		Intent::Diagnosis
	} else if REASONING_KEYWORDS.iter().any(|keyword| lowered.contains(keyword)) {
		Intent::Reasoning
	} else {
		Intent::Qa
	}
}

fn intent_from_text(text: &str) -> Intent {
	let lowered = text.to_lowercase();

	if lowered.contains("diagnosis") || lowered.contains("诊断") {
		Intent::Diagnosis
	} else if lowered.contains("reasoning") || lowered.contains("推理") {
		Intent::Reasoning
	} else {
		Intent::Qa
	}
}

fn confidence_from_text(text: &str) -> f32 {
	let Some(re) = NUMBER.as_ref() else {
		return FALLBACK_CONFIDENCE;
	};
	let Some(value) = re.find(text).and_then(|found| found.as_str().parse::<f32>().ok()) else {
		return FALLBACK_CONFIDENCE;
	};

	if value <= 1.0 { value } else { (value / 100.0).min(1.0) }
}
