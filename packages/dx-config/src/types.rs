use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub providers: Providers,
	pub storage: Storage,
	#[serde(default)]
	pub retrieval: Retrieval,
	#[serde(default)]
	pub diagnosis: Diagnosis,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub llm: LlmProviderConfig,
	pub embedding: EmbeddingProviderConfig,
	pub rerank: Option<ProviderConfig>,
	pub report: ReportProviderConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

/// Document rendering service. Authentication is optional because the renderer usually runs
/// next to the agent.
#[derive(Clone, Debug, Deserialize)]
pub struct ReportProviderConfig {
	pub api_base: String,
	pub path: String,
	pub api_key: Option<String>,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub qdrant: Qdrant,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
	/// Payload key holding the document body.
	#[serde(default = "default_content_field")]
	pub content_field: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Retrieval {
	pub top_k: u32,
	pub enable_query_expansion: bool,
	pub enable_multi_query: bool,
	pub enable_hyde: bool,
	pub enable_hybrid: bool,
	pub enable_rerank: bool,
	/// Upper bound on the query set produced by variant generation, original included.
	pub num_queries: u32,
	/// Dense weight in reciprocal rank fusion. The sparse list gets `1 - alpha`.
	pub alpha: f32,
	pub rrf_k: u32,
	/// Per-retriever candidate depth is `top_k * candidate_multiplier`.
	pub candidate_multiplier: u32,
	/// Retriever used when hybrid search is disabled: "dense" or "sparse".
	pub single_mode: String,
	/// Forward exact-match metadata filters to the dense backend.
	pub dense_prefilter: bool,
	pub bm25: Bm25,
}
impl Default for Retrieval {
	fn default() -> Self {
		Self {
			top_k: 5,
			enable_query_expansion: true,
			enable_multi_query: true,
			enable_hyde: false,
			enable_hybrid: true,
			enable_rerank: false,
			num_queries: 3,
			alpha: 0.5,
			rrf_k: 60,
			candidate_multiplier: 2,
			single_mode: "dense".to_string(),
			dense_prefilter: false,
			bm25: Bm25::default(),
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Bm25 {
	pub k1: f32,
	pub b: f32,
}
impl Default for Bm25 {
	fn default() -> Self {
		Self { k1: 1.5, b: 0.75 }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Diagnosis {
	pub top_k: u32,
	pub template_id: String,
	/// Device name used when neither the state nor the query provides one.
	pub unknown_device: String,
}
impl Default for Diagnosis {
	fn default() -> Self {
		Self {
			top_k: 10,
			template_id: "device_diagnosis".to_string(),
			unknown_device: "未知设备".to_string(),
		}
	}
}

fn default_content_field() -> String {
	"content".to_string()
}
