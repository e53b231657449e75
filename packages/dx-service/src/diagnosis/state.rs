use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::Serialize;
use serde_json::{Map, Value};

use dx_domain::Document;

/// Pipeline stages in execution order. The four analysis stages between `CoreAssessment` and
/// `Maintenance` run concurrently.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
	Retrieval,
	CoreAssessment,
	FaultAnalysis,
	RiskAnalysis,
	DeviceInfo,
	Monitoring,
	Maintenance,
	Validation,
	Merge,
	Report,
}
impl Stage {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Retrieval => "retrieval",
			Self::CoreAssessment => "core_assessment",
			Self::FaultAnalysis => "fault_analysis",
			Self::RiskAnalysis => "risk_analysis",
			Self::DeviceInfo => "device_info",
			Self::Monitoring => "monitoring",
			Self::Maintenance => "maintenance",
			Self::Validation => "validation",
			Self::Merge => "merge",
			Self::Report => "report",
		}
	}
}
impl Display for Stage {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.write_str(self.as_str())
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageOutcome {
	Succeeded,
	Degraded { reason: String },
}

/// Partial output of one stage. The only way stage results reach [`DiagnosisState`].
#[derive(Clone, Debug, PartialEq)]
pub enum StateUpdate {
	Retrieval { device_name: String, documents: Vec<Document> },
	CoreAssessment(Map<String, Value>),
	FaultAnalysis(Map<String, Value>),
	RiskAnalysis(Map<String, Value>),
	DeviceInfo(Map<String, Value>),
	Monitoring(Map<String, Value>),
	Maintenance(Map<String, Value>),
	Validation { issues: Vec<String>, corrections: Map<String, Value> },
	Merge(Map<String, Value>),
	Report { report_path: String },
}
impl StateUpdate {
	pub fn stage(&self) -> Stage {
		match self {
			Self::Retrieval { .. } => Stage::Retrieval,
			Self::CoreAssessment(_) => Stage::CoreAssessment,
			Self::FaultAnalysis(_) => Stage::FaultAnalysis,
			Self::RiskAnalysis(_) => Stage::RiskAnalysis,
			Self::DeviceInfo(_) => Stage::DeviceInfo,
			Self::Monitoring(_) => Stage::Monitoring,
			Self::Maintenance(_) => Stage::Maintenance,
			Self::Validation { .. } => Stage::Validation,
			Self::Merge(_) => Stage::Merge,
			Self::Report { .. } => Stage::Report,
		}
	}
}

/// A stage that could not produce its real output, with the value that stands in for it.
#[derive(Clone, Debug, PartialEq)]
pub struct DegradedDefault {
	pub stage: Stage,
	pub reason: String,
	pub fallback: StateUpdate,
}
impl DegradedDefault {
	pub fn new(reason: impl Into<String>, fallback: StateUpdate) -> Self {
		Self { stage: fallback.stage(), reason: reason.into(), fallback }
	}
}

pub type NodeResult = Result<StateUpdate, DegradedDefault>;

/// Accumulated pipeline state. Mutated only through [`DiagnosisState::apply`].
#[derive(Clone, Debug, Default, Serialize)]
pub struct DiagnosisState {
	pub query: String,
	pub device_name: String,
	pub documents: Vec<Document>,
	pub core_assessment: Map<String, Value>,
	pub fault_analysis: Map<String, Value>,
	pub risk_analysis: Map<String, Value>,
	pub device_info_fields: Map<String, Value>,
	pub monitoring_fields: Map<String, Value>,
	pub maintenance_fields: Map<String, Value>,
	pub validation_issues: Vec<String>,
	/// Field overrides proposed by the validation stage. Applied last during merge.
	pub corrections: Map<String, Value>,
	pub diagnosis_data: Map<String, Value>,
	/// Rendered report location on success, otherwise a readable failure message.
	pub report_path: String,
	pub stage_outcomes: Vec<(Stage, StageOutcome)>,
}
impl DiagnosisState {
	pub fn new(query: impl Into<String>) -> Self {
		Self { query: query.into(), ..Self::default() }
	}

	/// Reducer for stage outputs. A blank device name never replaces a set one.
	pub fn apply(&mut self, update: StateUpdate) {
		match update {
			StateUpdate::Retrieval { device_name, documents } => {
				if !device_name.trim().is_empty() {
					self.device_name = device_name;
				}

				self.documents = documents;
			},
			StateUpdate::CoreAssessment(fields) => self.core_assessment = fields,
			StateUpdate::FaultAnalysis(fields) => self.fault_analysis = fields,
			StateUpdate::RiskAnalysis(fields) => self.risk_analysis = fields,
			StateUpdate::DeviceInfo(fields) => self.device_info_fields = fields,
			StateUpdate::Monitoring(fields) => self.monitoring_fields = fields,
			StateUpdate::Maintenance(fields) => self.maintenance_fields = fields,
			StateUpdate::Validation { issues, corrections } => {
				self.validation_issues = issues;
				self.corrections = corrections;
			},
			StateUpdate::Merge(fields) => self.diagnosis_data = fields,
			StateUpdate::Report { report_path } => self.report_path = report_path,
		}
	}

	/// Applies a node result, degraded or not, and records its outcome.
	pub fn record(&mut self, result: NodeResult) {
		match result {
			Ok(update) => {
				let stage = update.stage();

				tracing::info!(stage = %stage, "Diagnosis stage completed.");

				self.apply(update);
				self.stage_outcomes.push((stage, StageOutcome::Succeeded));
			},
			Err(DegradedDefault { stage, reason, fallback }) => {
				tracing::warn!(stage = %stage, reason = %reason, "Diagnosis stage degraded.");

				self.apply(fallback);
				self.stage_outcomes.push((stage, StageOutcome::Degraded { reason }));
			},
		}
	}

	pub fn outcome(&self, stage: Stage) -> Option<&StageOutcome> {
		self.stage_outcomes.iter().find(|(recorded, _)| *recorded == stage).map(|(_, out)| out)
	}

	pub fn is_degraded(&self, stage: Stage) -> bool {
		matches!(self.outcome(stage), Some(StageOutcome::Degraded { .. }))
	}
}
