pub mod diagnosis;
pub mod error;
pub mod json;
pub mod qa;
pub mod router;

pub use diagnosis::state::{
	DegradedDefault, DiagnosisState, NodeResult, Stage, StageOutcome, StateUpdate,
};
pub use error::{Error, Result};
pub use qa::QaAnswer;
pub use router::{Intent, IntentDecision};

use std::sync::Arc;

use dx_config::Config;
use dx_domain::Document;
use dx_providers::{LlmClient, ReportEmitter};
use dx_retrieval::{EnhancedRetriever, RetrievalRequest};

/// Collaborators shared by every request.
#[derive(Clone)]
pub struct Providers {
	pub llm: Arc<dyn LlmClient>,
	pub report: Arc<dyn ReportEmitter>,
}
impl Providers {
	pub fn new(llm: Arc<dyn LlmClient>, report: Arc<dyn ReportEmitter>) -> Self {
		Self { llm, report }
	}
}

/// Entry point for search, question answering, diagnosis and intent routing. Built once at startup.
pub struct DxService {
	pub cfg: Config,
	pub retriever: Arc<EnhancedRetriever>,
	pub providers: Providers,
}
impl DxService {
	pub fn new(cfg: Config, retriever: Arc<EnhancedRetriever>, providers: Providers) -> Self {
		Self { cfg, retriever, providers }
	}

	/// Retrieval with the request switches from `[retrieval]`.
	pub async fn search(&self, query: &str, top_k: Option<usize>) -> Vec<Document> {
		let top_k = top_k.unwrap_or(self.cfg.retrieval.top_k as usize);
		let request = RetrievalRequest::from_config(query, top_k, &self.cfg.retrieval);

		self.retriever.retrieve(&request).await
	}
}
