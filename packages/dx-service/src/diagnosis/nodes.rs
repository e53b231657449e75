//! One function per pipeline stage. Each returns a [`NodeResult`] and never propagates errors.

use serde_json::{Map, Value, json};
use time::OffsetDateTime;

use crate::{
	Result,
	diagnosis::{
		merge,
		prompts::{
			CORE_ASSESSMENT_EXAMPLE, CORE_ASSESSMENT_PROMPT, DEVICE_INFO_PROMPT,
			FAULT_ANALYSIS_PROMPT, MAINTENANCE_PROMPT, MONITORING_PROMPT, RISK_ANALYSIS_PROMPT,
			VALIDATION_PROMPT,
		},
		state::{DegradedDefault, DiagnosisState, NodeResult, Stage, StateUpdate},
	},
	json::parse_json_object,
};
use dx_config::Config;
use dx_domain::{Document, HealthStatus, RiskLevel};
use dx_providers::{LlmClient, ReportEmitter};
use dx_retrieval::{EnhancedRetriever, RetrievalRequest};

pub const EMPTY_RECORD_SENTINEL: &str = "诊断数据为空，无法生成报告";
pub const REPORT_FAILURE_PREFIX: &str = "报告生成失败: ";

const MISSING: &str = "N/A";
const NONE_TEXT: &str = "无";

/// The concurrently scheduled analysis stages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Analysis {
	Fault,
	Risk,
	DeviceInfo,
	Monitoring,
}
impl Analysis {
	/// Fixed application order after the join.
	pub const ALL: [Self; 4] = [Self::Fault, Self::Risk, Self::DeviceInfo, Self::Monitoring];

	pub fn stage(self) -> Stage {
		match self {
			Self::Fault => Stage::FaultAnalysis,
			Self::Risk => Stage::RiskAnalysis,
			Self::DeviceInfo => Stage::DeviceInfo,
			Self::Monitoring => Stage::Monitoring,
		}
	}

	pub fn update(self, fields: Map<String, Value>) -> StateUpdate {
		match self {
			Self::Fault => StateUpdate::FaultAnalysis(fields),
			Self::Risk => StateUpdate::RiskAnalysis(fields),
			Self::DeviceInfo => StateUpdate::DeviceInfo(fields),
			Self::Monitoring => StateUpdate::Monitoring(fields),
		}
	}

	fn prompt(self) -> &'static str {
		match self {
			Self::Fault => FAULT_ANALYSIS_PROMPT,
			Self::Risk => RISK_ANALYSIS_PROMPT,
			Self::DeviceInfo => DEVICE_INFO_PROMPT,
			Self::Monitoring => MONITORING_PROMPT,
		}
	}

	fn message(self, snapshot: &AnalysisSnapshot) -> String {
		let name = &snapshot.device_name;
		let core = &snapshot.core_assessment;
		let context = document_context(&snapshot.documents);

		match self {
			Self::Fault => format!(
				"设备名称：{name}\n\n核心评估结果：\n- 健康评分：{}\n- 健康状态：{}\n- 风险等级：{}\n\
				 - 评估依据：{}\n\n设备文档：\n{context}",
				field_text(core, "health_score", MISSING),
				field_text(core, "health_status", MISSING),
				field_text(core, "risk_level", MISSING),
				field_text(core, "assessment_reasoning", MISSING),
			),
			Self::Risk => format!(
				"设备名称：{name}\n\n核心评估：健康评分 {}，{}\n\n设备文档：\n{context}",
				field_text(core, "health_score", MISSING),
				field_text(core, "health_status", MISSING),
			),
			Self::DeviceInfo => format!("设备名称：{name}\n\n设备文档：\n{context}"),
			Self::Monitoring => format!(
				"设备名称：{name}\n健康评分：{}\n\n设备文档：\n{context}",
				field_text(core, "health_score", MISSING),
			),
		}
	}
}

/// Read-only upstream state shared by the analysis tasks.
#[derive(Clone, Debug)]
pub struct AnalysisSnapshot {
	pub device_name: String,
	pub documents: Vec<Document>,
	pub core_assessment: Map<String, Value>,
}
impl AnalysisSnapshot {
	pub fn from_state(state: &DiagnosisState) -> Self {
		Self {
			device_name: state.device_name.clone(),
			documents: state.documents.clone(),
			core_assessment: state.core_assessment.clone(),
		}
	}
}

pub async fn retrieval(
	retriever: &EnhancedRetriever,
	cfg: &Config,
	state: &DiagnosisState,
) -> NodeResult {
	let device_name = [state.device_name.trim(), state.query.trim()]
		.into_iter()
		.find(|name| !name.is_empty())
		.unwrap_or(cfg.diagnosis.unknown_device.as_str())
		.to_string();
	let request =
		RetrievalRequest::from_config(&device_name, cfg.diagnosis.top_k as usize, &cfg.retrieval);
	let documents = retriever.retrieve(&request).await;

	tracing::info!(
		device = %device_name,
		documents = documents.len(),
		"Device documents retrieved."
	);

	if documents.is_empty() {
		return Err(DegradedDefault::new(
			"No documents matched the device.",
			StateUpdate::Retrieval { device_name, documents },
		));
	}

	Ok(StateUpdate::Retrieval { device_name, documents })
}

/// Assessment used when there is nothing to assess or the model cannot be reached.
pub fn core_assessment_default() -> Map<String, Value> {
	let mut fields = Map::new();

	fields.insert("health_score".to_string(), json!(0));
	fields.insert("health_status".to_string(), json!(HealthStatus::Abnormal.as_str()));
	fields.insert("risk_level".to_string(), json!(RiskLevel::High.as_str()));
	fields.insert("issue_count".to_string(), json!(0));

	fields
}

pub async fn core_assessment(llm: &dyn LlmClient, state: &DiagnosisState) -> NodeResult {
	if state.documents.is_empty() {
		return Err(DegradedDefault::new(
			"No documents to assess.",
			StateUpdate::CoreAssessment(core_assessment_default()),
		));
	}

	let message = format!(
		"设备名称：{}\n\n设备文档：\n{}\n\n{CORE_ASSESSMENT_EXAMPLE}",
		state.device_name,
		document_context(&state.documents)
	);

	match ask_json(llm, CORE_ASSESSMENT_PROMPT, message).await {
		Ok(fields) => {
			tracing::info!(
				health_score = %field_text(&fields, "health_score", MISSING),
				"Core assessment produced."
			);

			Ok(StateUpdate::CoreAssessment(fields))
		},
		Err(err) => Err(DegradedDefault::new(
			err.to_string(),
			StateUpdate::CoreAssessment(core_assessment_default()),
		)),
	}
}

pub async fn analysis(
	analysis: Analysis,
	llm: &dyn LlmClient,
	snapshot: &AnalysisSnapshot,
) -> NodeResult {
	match ask_json(llm, analysis.prompt(), analysis.message(snapshot)).await {
		Ok(fields) => Ok(analysis.update(fields)),
		Err(err) => Err(DegradedDefault::new(err.to_string(), analysis.update(Map::new()))),
	}
}

pub async fn maintenance(llm: &dyn LlmClient, state: &DiagnosisState) -> NodeResult {
	let core = &state.core_assessment;
	let fault = &state.fault_analysis;
	let risk = &state.risk_analysis;
	let message = format!(
		"设备名称：{}\n\n核心评估：\n- 健康评分：{}\n- 健康状态：{}\n- 风险等级：{}\n\n\
		 故障分析：\n- 故障描述：{}\n- 故障原因：{}\n\n风险分析：\n- 当前风险：{}\n- 潜在风险：{}\n\n\
		 设备文档：\n{}",
		state.device_name,
		field_text(core, "health_score", MISSING),
		field_text(core, "health_status", MISSING),
		field_text(core, "risk_level", MISSING),
		field_text(fault, "fault_description", NONE_TEXT),
		field_text(fault, "fault_cause_analysis", NONE_TEXT),
		field_text(risk, "current_risks", NONE_TEXT),
		field_text(risk, "potential_risks", NONE_TEXT),
		document_context(&state.documents),
	);

	match ask_json(llm, MAINTENANCE_PROMPT, message).await {
		Ok(fields) => Ok(StateUpdate::Maintenance(fields)),
		Err(err) =>
			Err(DegradedDefault::new(err.to_string(), StateUpdate::Maintenance(Map::new()))),
	}
}

/// Asks the model for contradictions across every stage output. Corrections are stored, not
/// applied; the merge stage layers them on top.
pub async fn validation(llm: &dyn LlmClient, state: &DiagnosisState) -> NodeResult {
	let mut all_fields = Map::new();

	for layer in [
		&state.core_assessment,
		&state.fault_analysis,
		&state.risk_analysis,
		&state.device_info_fields,
		&state.monitoring_fields,
		&state.maintenance_fields,
	] {
		all_fields.extend(layer.iter().map(|(key, value)| (key.clone(), value.clone())));
	}

	let rendered = match serde_json::to_string_pretty(&all_fields) {
		Ok(rendered) => rendered,
		Err(err) => return Err(no_corrections(err.to_string())),
	};
	let message = format!("请检查以下诊断数据的一致性：\n\n{rendered}");
	let reply = match ask_json(llm, VALIDATION_PROMPT, message).await {
		Ok(reply) => reply,
		Err(err) => return Err(no_corrections(err.to_string())),
	};
	let issues: Vec<String> = match reply.get("issues") {
		Some(Value::Array(items)) => items.iter().filter_map(issue_text).collect(),
		_ => Vec::new(),
	};
	let corrections = match reply.get("corrections") {
		Some(Value::Object(map)) => map.clone(),
		_ => Map::new(),
	};

	tracing::info!(
		issues = issues.len(),
		corrections = corrections.len(),
		"Consistency check finished."
	);

	Ok(StateUpdate::Validation { issues, corrections })
}

pub fn merge(state: &DiagnosisState, unknown_device: &str, now: OffsetDateTime) -> NodeResult {
	match merge::merge_fields(state, unknown_device, now) {
		Ok(fields) => {
			tracing::info!(fields = fields.len(), "Diagnosis fields merged.");

			Ok(StateUpdate::Merge(fields))
		},
		Err((err, raw)) => Err(DegradedDefault::new(
			format!("Schema validation failed. {err}"),
			StateUpdate::Merge(raw),
		)),
	}
}

pub async fn report(
	emitter: &dyn ReportEmitter,
	template_id: &str,
	state: &DiagnosisState,
) -> NodeResult {
	let failed = |reason: String, detail: &str| {
		DegradedDefault::new(
			reason,
			StateUpdate::Report { report_path: format!("{REPORT_FAILURE_PREFIX}{detail}") },
		)
	};

	if state.diagnosis_data.is_empty() {
		return Err(DegradedDefault::new(
			"Diagnosis data is empty.",
			StateUpdate::Report { report_path: EMPTY_RECORD_SENTINEL.to_string() },
		));
	}

	match emitter.generate(&state.diagnosis_data, template_id).await {
		Ok(outcome) if outcome.success => match outcome.output_path {
			Some(path) if !path.trim().is_empty() => {
				tracing::info!(report_path = %path, "Report generated.");

				Ok(StateUpdate::Report { report_path: path })
			},
			_ => Err(failed("Renderer returned no output path.".to_string(), "未返回报告路径")),
		},
		Ok(outcome) => {
			let detail = outcome.error.unwrap_or_else(|| "未知错误".to_string());

			Err(failed(format!("Renderer rejected the record: {detail}"), &detail))
		},
		Err(err) => Err(failed(err.to_string(), &err.to_string())),
	}
}

async fn ask_json(
	llm: &dyn LlmClient,
	system_prompt: &str,
	message: String,
) -> Result<Map<String, Value>> {
	let reply = llm.complete(system_prompt, &[message]).await?;

	parse_json_object(&reply)
}

fn no_corrections(reason: String) -> DegradedDefault {
	DegradedDefault::new(
		reason,
		StateUpdate::Validation { issues: Vec::new(), corrections: Map::new() },
	)
}

fn issue_text(item: &Value) -> Option<String> {
	match item {
		Value::String(text) => Some(text.clone()),
		Value::Object(map) => map.get("problem").and_then(Value::as_str).map(str::to_string),
		_ => None,
	}
}

fn document_context(documents: &[Document]) -> String {
	documents.iter().map(Document::content).collect::<Vec<_>>().join("\n\n")
}

fn field_text(fields: &Map<String, Value>, key: &str, missing: &str) -> String {
	match fields.get(key) {
		Some(Value::String(text)) => text.clone(),
		Some(Value::Null) | None => missing.to_string(),
		Some(other) => other.to_string(),
	}
}
