use std::{fs, path::Path, sync::Arc};

use clap::{Parser, Subcommand};
use color_eyre::eyre::WrapErr;
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

use dx_config::Config;
use dx_domain::Document;
use dx_providers::{ChatClient, HttpReportEmitter, HttpReranker, LlmClient, QdrantDenseRetriever};
use dx_retrieval::{EnhancedRetriever, RetrieverSettings};
use dx_service::{DiagnosisState, DxService, Intent, Providers, StageOutcome};

#[derive(Debug, Parser)]
#[command(
	version = dx_cli::VERSION,
	rename_all = "kebab",
	styles = dx_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: std::path::PathBuf,
	/// One `{content, metadata}` JSON object per line.
	#[arg(long, value_name = "FILE")]
	pub corpus: std::path::PathBuf,
	#[command(subcommand)]
	pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
	/// Print ranked documents for a query.
	Search {
		query: String,
		#[arg(long)]
		top_k: Option<usize>,
	},
	/// Run the diagnosis pipeline for a device.
	Diagnose { device: String },
	/// Route a free-form query by intent: diagnosis runs the pipeline, anything else is answered
	/// from retrieved context.
	Ask { query: String },
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = dx_config::load(&args.config)?;

	init_tracing(&config);

	let corpus = load_corpus(&args.corpus)?;

	tracing::info!(documents = corpus.len(), "Corpus loaded.");

	let service = build_service(config, corpus)?;
	let output = match args.command {
		Command::Search { query, top_k } => search_output(&service, &query, top_k).await,
		Command::Diagnose { device } => diagnosis_output(&service.run_diagnosis(&device).await),
		Command::Ask { query } => {
			let decision = service.classify_intent(&query).await;
			let answer = match decision.intent {
				Intent::Diagnosis => diagnosis_output(&service.run_diagnosis(&query).await),
				Intent::Qa | Intent::Reasoning => json!(service.answer(&query).await),
			};

			json!({ "intent": decision, "answer": answer })
		},
	};

	println!("{}", serde_json::to_string_pretty(&output)?);

	Ok(())
}

/// Reads a JSONL corpus. Blank lines are skipped.
pub fn load_corpus(path: &Path) -> color_eyre::Result<Vec<Document>> {
	let raw = fs::read_to_string(path)
		.wrap_err_with(|| format!("Failed to read corpus file {}.", path.display()))?;
	let mut docs = Vec::new();

	for (idx, line) in raw.lines().enumerate() {
		if line.trim().is_empty() {
			continue;
		}

		let doc: Document = serde_json::from_str(line)
			.wrap_err_with(|| format!("Invalid corpus entry on line {}.", idx + 1))?;

		docs.push(doc);
	}

	Ok(docs)
}

/// Constructs every provider once and injects them into the retriever and the service.
pub fn build_service(config: Config, corpus: Vec<Document>) -> color_eyre::Result<DxService> {
	let llm: Arc<dyn LlmClient> = Arc::new(ChatClient::new(config.providers.llm.clone())?);
	let dense = QdrantDenseRetriever::new(
		&config.storage.qdrant,
		config.providers.embedding.clone(),
	)?;
	let report = HttpReportEmitter::new(config.providers.report.clone())?;
	let mut retriever =
		EnhancedRetriever::new(corpus, RetrieverSettings::from_config(&config.retrieval))
			.with_dense(Arc::new(dense))
			.with_expander(llm.clone());

	if let Some(rerank) = config.providers.rerank.clone() {
		retriever = retriever.with_reranker(Arc::new(HttpReranker::new(rerank)?));
	}

	let providers = Providers::new(llm, Arc::new(report));

	Ok(DxService::new(config, Arc::new(retriever), providers))
}

fn init_tracing(config: &Config) {
	let filter = EnvFilter::try_new(&config.service.log_level)
		.unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn search_output(service: &DxService, query: &str, top_k: Option<usize>) -> Value {
	let docs = service.search(query, top_k).await;
	let hits: Vec<Value> = docs
		.iter()
		.enumerate()
		.map(|(rank, doc)| {
			json!({ "rank": rank + 1, "content": doc.content(), "metadata": doc.metadata() })
		})
		.collect();

	json!({ "query": query, "documents": hits })
}

pub fn diagnosis_output(state: &DiagnosisState) -> Value {
	let degraded: Vec<Value> = state
		.stage_outcomes
		.iter()
		.filter_map(|(stage, outcome)| match outcome {
			StageOutcome::Degraded { reason } => {
				Some(json!({ "stage": stage.as_str(), "reason": reason }))
			},
			StageOutcome::Succeeded => None,
		})
		.collect();

	json!({
		"device_name": state.device_name,
		"report_path": state.report_path,
		"diagnosis_data": state.diagnosis_data,
		"validation_issues": state.validation_issues,
		"degraded": degraded,
	})
}
