pub mod merge;
pub mod nodes;
pub mod prompts;
pub mod state;

use std::sync::Arc;

use time::OffsetDateTime;
use tokio::task::JoinSet;
use tracing::Instrument;
use uuid::Uuid;

use crate::DxService;
use dx_providers::LlmClient;
use nodes::{Analysis, AnalysisSnapshot};
use state::{DegradedDefault, DiagnosisState, NodeResult, StageOutcome};

impl DxService {
	/// Runs the full diagnosis pipeline for a device name or question.
	///
	/// Never fails. Stages that cannot produce output fall back to defaults, recorded in
	/// [`DiagnosisState::stage_outcomes`], and report failures surface as text in
	/// [`DiagnosisState::report_path`].
	pub async fn run_diagnosis(&self, query: &str) -> DiagnosisState {
		self.run_diagnosis_at(query, OffsetDateTime::now_utc()).await
	}

	/// [`DxService::run_diagnosis`] with the clock used for `diagnosis_date` and `report_id`.
	pub async fn run_diagnosis_at(&self, query: &str, now: OffsetDateTime) -> DiagnosisState {
		let run_id = Uuid::new_v4();

		self.diagnose(query, now)
			.instrument(tracing::info_span!("diagnosis", run_id = %run_id))
			.await
	}

	async fn diagnose(&self, query: &str, now: OffsetDateTime) -> DiagnosisState {
		let llm = self.providers.llm.as_ref();
		let mut state = DiagnosisState::new(query);
		let retrieved = nodes::retrieval(&self.retriever, &self.cfg, &state).await;

		state.record(retrieved);

		let core = nodes::core_assessment(llm, &state).await;

		state.record(core);

		let snapshot = Arc::new(AnalysisSnapshot::from_state(&state));

		for result in parallel_analysis(Arc::clone(&self.providers.llm), snapshot).await {
			state.record(result);
		}

		let maintenance = nodes::maintenance(llm, &state).await;

		state.record(maintenance);

		let validation = nodes::validation(llm, &state).await;

		state.record(validation);

		let merged = nodes::merge(&state, &self.cfg.diagnosis.unknown_device, now);

		state.record(merged);

		let report =
			nodes::report(self.providers.report.as_ref(), &self.cfg.diagnosis.template_id, &state)
				.await;

		state.record(report);

		let degraded = state
			.stage_outcomes
			.iter()
			.filter(|(_, outcome)| matches!(outcome, StageOutcome::Degraded { .. }))
			.count();

		tracing::info!(
			device = %state.device_name,
			degraded_stages = degraded,
			report_path = %state.report_path,
			"Diagnosis completed."
		);

		state
	}
}

/// Runs the four analysis stages concurrently over one snapshot.
///
/// Results come back in [`Analysis::ALL`] order whatever the completion order. A task that
/// panics or is cancelled yields its stage's empty fields as a degraded result.
pub async fn parallel_analysis(
	llm: Arc<dyn LlmClient>,
	snapshot: Arc<AnalysisSnapshot>,
) -> Vec<NodeResult> {
	let mut tasks = JoinSet::new();

	for analysis in Analysis::ALL {
		let llm = Arc::clone(&llm);
		let snapshot = Arc::clone(&snapshot);

		tasks.spawn(async move {
			let result = nodes::analysis(analysis, llm.as_ref(), &snapshot).await;

			(analysis, result)
		});
	}

	let mut results: Vec<NodeResult> = Analysis::ALL
		.iter()
		.map(|analysis| {
			Err(DegradedDefault::new(
				"Analysis task did not complete.",
				analysis.update(Default::default()),
			))
		})
		.collect();

	while let Some(joined) = tasks.join_next().await {
		match joined {
			Ok((analysis, result)) =>
				if let Some(slot) = results.get_mut(analysis as usize) {
					*slot = result;
				},
			Err(err) => {
				tracing::warn!(error = %err, "Analysis task failed to complete.");
			},
		}
	}

	results
}
