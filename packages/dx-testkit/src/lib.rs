//! Deterministic collaborators and fixtures for tests. Nothing here touches the network.

use std::{
	sync::{
		Mutex,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};

use serde_json::{Map, Value, json};

use dx_config::{
	Config, Diagnosis, EmbeddingProviderConfig, LlmProviderConfig, ProviderConfig, Providers,
	Qdrant, ReportProviderConfig, Retrieval, Service, Storage,
};
use dx_domain::Document;
use dx_providers::{
	BoxFuture, DenseRetriever, Error, LlmClient, ReportEmitter, ReportOutcome, Reranker, Result,
};

struct Route {
	marker: String,
	reply: Option<String>,
	delay: Duration,
}

/// LLM stub that answers by matching a marker against the system prompt.
///
/// Routes are checked in insertion order and the first marker contained in the system prompt
/// wins. Unmatched prompts get the fallback reply, or an error when none is set.
#[derive(Default)]
pub struct ScriptedLlm {
	routes: Vec<Route>,
	fallback: Option<String>,
	calls: AtomicUsize,
	prompts: Mutex<Vec<String>>,
}
impl ScriptedLlm {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn route(self, marker: impl Into<String>, reply: impl Into<String>) -> Self {
		self.route_with_delay(marker, reply, Duration::ZERO)
	}

	pub fn route_with_delay(
		mut self,
		marker: impl Into<String>,
		reply: impl Into<String>,
		delay: Duration,
	) -> Self {
		self.routes.push(Route { marker: marker.into(), reply: Some(reply.into()), delay });

		self
	}

	/// Prompts containing `marker` fail.
	pub fn fail_route(mut self, marker: impl Into<String>) -> Self {
		self.routes.push(Route { marker: marker.into(), reply: None, delay: Duration::ZERO });

		self
	}

	pub fn fallback(mut self, reply: impl Into<String>) -> Self {
		self.fallback = Some(reply.into());

		self
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	/// System prompts received so far, in call order.
	pub fn prompts(&self) -> Vec<String> {
		self.prompts.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}
}
impl LlmClient for ScriptedLlm {
	fn complete<'a>(
		&'a self,
		system_prompt: &'a str,
		_messages: &'a [String],
	) -> BoxFuture<'a, Result<String>> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		self.prompts.lock().unwrap_or_else(|err| err.into_inner()).push(system_prompt.to_string());

		let route = self.routes.iter().find(|route| system_prompt.contains(&route.marker));
		let (reply, delay) = match route {
			Some(route) => (route.reply.clone(), route.delay),
			None => (self.fallback.clone(), Duration::ZERO),
		};

		Box::pin(async move {
			if !delay.is_zero() {
				tokio::time::sleep(delay).await;
			}

			reply.ok_or_else(|| Error::InvalidResponse {
				message: "No scripted reply.".to_string(),
			})
		})
	}
}

/// LLM stub that always fails.
#[derive(Default)]
pub struct FailingLlm {
	calls: AtomicUsize,
}
impl FailingLlm {
	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl LlmClient for FailingLlm {
	fn complete<'a>(
		&'a self,
		_system_prompt: &'a str,
		_messages: &'a [String],
	) -> BoxFuture<'a, Result<String>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		Box::pin(async {
			Err(Error::InvalidResponse { message: "LLM endpoint unavailable.".to_string() })
		})
	}
}

/// Dense stub that returns a fixed ranking regardless of the query.
pub struct StaticDenseRetriever {
	docs: Vec<Document>,
	queries: Mutex<Vec<String>>,
	filters: Mutex<Vec<Option<Map<String, Value>>>>,
}
impl StaticDenseRetriever {
	pub fn new(docs: Vec<Document>) -> Self {
		Self { docs, queries: Mutex::new(Vec::new()), filters: Mutex::new(Vec::new()) }
	}

	/// Query texts received so far, in call order.
	pub fn queries(&self) -> Vec<String> {
		self.queries.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	pub fn filters(&self) -> Vec<Option<Map<String, Value>>> {
		self.filters.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}
}
impl DenseRetriever for StaticDenseRetriever {
	fn similarity_search<'a>(
		&'a self,
		query: &'a str,
		k: usize,
		filter: Option<&'a Map<String, Value>>,
	) -> BoxFuture<'a, Result<Vec<Document>>> {
		self.queries.lock().unwrap_or_else(|err| err.into_inner()).push(query.to_string());
		self.filters.lock().unwrap_or_else(|err| err.into_inner()).push(filter.cloned());

		let docs = self.docs.iter().take(k).cloned().collect();

		Box::pin(async move { Ok(docs) })
	}
}

pub struct FailingDenseRetriever;
impl DenseRetriever for FailingDenseRetriever {
	fn similarity_search<'a>(
		&'a self,
		_query: &'a str,
		_k: usize,
		_filter: Option<&'a Map<String, Value>>,
	) -> BoxFuture<'a, Result<Vec<Document>>> {
		Box::pin(async {
			Err(Error::InvalidResponse { message: "Vector store unavailable.".to_string() })
		})
	}
}

/// Scores later inputs higher, so a rerank reverses the candidate order.
pub struct ReverseReranker;
impl Reranker for ReverseReranker {
	fn rerank<'a>(
		&'a self,
		_query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, Result<Vec<f32>>> {
		let scores = (0..docs.len()).map(|idx| idx as f32).collect();

		Box::pin(async move { Ok(scores) })
	}
}

pub struct FailingReranker;
impl Reranker for FailingReranker {
	fn rerank<'a>(
		&'a self,
		_query: &'a str,
		_docs: &'a [String],
	) -> BoxFuture<'a, Result<Vec<f32>>> {
		Box::pin(async {
			Err(Error::InvalidResponse { message: "Rerank endpoint unavailable.".to_string() })
		})
	}
}

/// Report stub that accepts every request and remembers what it was given.
#[derive(Default)]
pub struct RecordingReportEmitter {
	requests: Mutex<Vec<(Map<String, Value>, String)>>,
}
impl RecordingReportEmitter {
	/// `(fields, template_id)` pairs received so far.
	pub fn requests(&self) -> Vec<(Map<String, Value>, String)> {
		self.requests.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}
}
impl ReportEmitter for RecordingReportEmitter {
	fn generate<'a>(
		&'a self,
		fields: &'a Map<String, Value>,
		template_id: &'a str,
	) -> BoxFuture<'a, Result<ReportOutcome>> {
		self.requests
			.lock()
			.unwrap_or_else(|err| err.into_inner())
			.push((fields.clone(), template_id.to_string()));

		let report_id = fields.get("report_id").and_then(Value::as_str).unwrap_or("report");
		let outcome = ReportOutcome {
			success: true,
			output_path: Some(format!("reports/{report_id}.pdf")),
			error: None,
		};

		Box::pin(async move { Ok(outcome) })
	}
}

pub enum FailingReportEmitter {
	/// The renderer answers with `success = false` and this message.
	Rejected(String),
	/// The renderer cannot be reached.
	Unreachable,
}
impl ReportEmitter for FailingReportEmitter {
	fn generate<'a>(
		&'a self,
		_fields: &'a Map<String, Value>,
		_template_id: &'a str,
	) -> BoxFuture<'a, Result<ReportOutcome>> {
		let result = match self {
			Self::Rejected(message) => Ok(ReportOutcome {
				success: false,
				output_path: None,
				error: Some(message.clone()),
			}),
			Self::Unreachable =>
				Err(Error::InvalidResponse { message: "Renderer unreachable.".to_string() }),
		};

		Box::pin(async move { result })
	}
}

/// Five short power-equipment passages, three of them about transformer temperature.
pub fn transformer_corpus() -> Vec<Document> {
	[
		("变压器是电力系统中的重要设备，主要用于电压变换。", "doc1", "变压器"),
		("变压器的正常运行温度一般在60-85摄氏度之间。", "doc2", "变压器"),
		("当变压器温度超过90度时，需要立即检查冷却系统。", "doc3", "变压器"),
		("电力电容器用于无功补偿，提高功率因数。", "doc4", "电容器"),
		("断路器是电力系统中的重要保护设备。", "doc5", "断路器"),
	]
	.into_iter()
	.map(|(content, source, topic)| {
		let metadata = json!({ "source": source, "topic": topic });

		Document::new(content, metadata.as_object().cloned().unwrap_or_default())
	})
	.collect()
}

/// Looks up a corpus document by its `source` metadata.
pub fn doc_by_source(corpus: &[Document], source: &str) -> Option<Document> {
	corpus.iter().find(|doc| doc.metadata().get("source") == Some(&json!(source))).cloned()
}

/// A complete configuration pointing at unreachable local endpoints.
pub fn test_config() -> Config {
	Config {
		service: Service { log_level: "info".to_string() },
		providers: Providers {
			llm: LlmProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://127.0.0.1:9".to_string(),
				api_key: "test-key".to_string(),
				path: "/chat/completions".to_string(),
				model: "test-chat".to_string(),
				temperature: 0.1,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
			embedding: EmbeddingProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://127.0.0.1:9".to_string(),
				api_key: "test-key".to_string(),
				path: "/embeddings".to_string(),
				model: "test-embed".to_string(),
				dimensions: 4,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
			rerank: Some(ProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://127.0.0.1:9".to_string(),
				api_key: "test-key".to_string(),
				path: "/rerank".to_string(),
				model: "test-rerank".to_string(),
				timeout_ms: 1_000,
				default_headers: Map::new(),
			}),
			report: ReportProviderConfig {
				api_base: "http://127.0.0.1:9".to_string(),
				path: "/render".to_string(),
				api_key: None,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
		},
		storage: Storage {
			qdrant: Qdrant {
				url: "http://127.0.0.1:6334".to_string(),
				collection: "test_docs".to_string(),
				vector_dim: 4,
				content_field: "content".to_string(),
			},
		},
		retrieval: Retrieval {
			enable_query_expansion: false,
			enable_multi_query: false,
			..Retrieval::default()
		},
		diagnosis: Diagnosis::default(),
	}
}
