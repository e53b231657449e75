pub mod chat;
pub mod dense;
pub mod embedding;
pub mod error;
pub mod rerank;
pub mod report;

pub use chat::ChatClient;
pub use dense::QdrantDenseRetriever;
pub use embedding::EmbeddingClient;
pub use error::{Error, Result};
pub use rerank::HttpReranker;
pub use report::HttpReportEmitter;

use std::{future::Future, pin::Pin};

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use dx_domain::Document;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Chat-completion endpoint.
pub trait LlmClient
where
	Self: Send + Sync,
{
	/// Sends one system prompt followed by `messages` as user turns and returns the reply text.
	fn complete<'a>(
		&'a self,
		system_prompt: &'a str,
		messages: &'a [String],
	) -> BoxFuture<'a, Result<String>>;
}

/// Nearest-neighbor search over an embedding index.
pub trait DenseRetriever
where
	Self: Send + Sync,
{
	/// `filter` holds exact-match metadata conditions the backend may apply before ranking.
	fn similarity_search<'a>(
		&'a self,
		query: &'a str,
		k: usize,
		filter: Option<&'a Map<String, Value>>,
	) -> BoxFuture<'a, Result<Vec<Document>>>;
}

pub trait Reranker
where
	Self: Send + Sync,
{
	/// Returns one relevance score per input document, aligned with `docs`.
	fn rerank<'a>(&'a self, query: &'a str, docs: &'a [String]) -> BoxFuture<'a, Result<Vec<f32>>>;
}

pub trait ReportEmitter
where
	Self: Send + Sync,
{
	fn generate<'a>(
		&'a self,
		fields: &'a Map<String, Value>,
		template_id: &'a str,
	) -> BoxFuture<'a, Result<ReportOutcome>>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportOutcome {
	pub success: bool,
	#[serde(default)]
	pub output_path: Option<String>,
	#[serde(default)]
	pub error: Option<String>,
}

pub fn auth_headers(api_key: &str, default_headers: &Map<String, Value>) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	headers.insert(AUTHORIZATION, format!("Bearer {api_key}").parse()?);
	headers.extend(extra_headers(default_headers)?);

	Ok(headers)
}

pub fn extra_headers(default_headers: &Map<String, Value>) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	for (key, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(Error::InvalidConfig {
				message: "Default header values must be strings.".to_string(),
			});
		};

		headers.insert(HeaderName::from_bytes(key.as_bytes())?, raw.parse()?);
	}

	Ok(headers)
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn default_headers_extend_auth() {
		let extra = json!({ "x-trace": "on" }).as_object().cloned().expect("object");
		let headers = auth_headers("secret", &extra).expect("headers should build");

		assert_eq!(headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()), Some("Bearer secret"));
		assert_eq!(headers.get("x-trace").and_then(|v| v.to_str().ok()), Some("on"));
	}

	#[test]
	fn non_string_header_is_rejected() {
		let extra = json!({ "x-retries": 3 }).as_object().cloned().expect("object");

		assert!(matches!(auth_headers("k", &extra), Err(Error::InvalidConfig { .. })));
	}
}
