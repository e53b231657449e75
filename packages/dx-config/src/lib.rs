mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Bm25, Config, Diagnosis, EmbeddingProviderConfig, LlmProviderConfig, ProviderConfig,
	Providers, Qdrant, ReportProviderConfig, Retrieval, Service, Storage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}

	for (label, key) in
		[("llm", &cfg.providers.llm.api_key), ("embedding", &cfg.providers.embedding.api_key)]
	{
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}
	if cfg.storage.qdrant.content_field.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.qdrant.content_field must be non-empty.".to_string(),
		});
	}

	validate_retrieval(cfg)?;

	if cfg.diagnosis.top_k == 0 {
		return Err(Error::Validation {
			message: "diagnosis.top_k must be greater than zero.".to_string(),
		});
	}
	if cfg.diagnosis.template_id.trim().is_empty() {
		return Err(Error::Validation {
			message: "diagnosis.template_id must be non-empty.".to_string(),
		});
	}

	Ok(())
}

fn validate_retrieval(cfg: &Config) -> Result<()> {
	let retrieval = &cfg.retrieval;

	if retrieval.top_k == 0 {
		return Err(Error::Validation {
			message: "retrieval.top_k must be greater than zero.".to_string(),
		});
	}
	if retrieval.num_queries == 0 {
		return Err(Error::Validation {
			message: "retrieval.num_queries must be greater than zero.".to_string(),
		});
	}
	if !retrieval.alpha.is_finite() {
		return Err(Error::Validation {
			message: "retrieval.alpha must be a finite number.".to_string(),
		});
	}
	if !(0.0..=1.0).contains(&retrieval.alpha) {
		return Err(Error::Validation {
			message: "retrieval.alpha must be in the range 0.0-1.0.".to_string(),
		});
	}
	if retrieval.rrf_k == 0 {
		return Err(Error::Validation {
			message: "retrieval.rrf_k must be greater than zero.".to_string(),
		});
	}
	if retrieval.candidate_multiplier == 0 {
		return Err(Error::Validation {
			message: "retrieval.candidate_multiplier must be greater than zero.".to_string(),
		});
	}
	if !matches!(retrieval.single_mode.as_str(), "dense" | "sparse") {
		return Err(Error::Validation {
			message: "retrieval.single_mode must be one of dense or sparse.".to_string(),
		});
	}
	if !retrieval.bm25.k1.is_finite() || retrieval.bm25.k1 < 0.0 {
		return Err(Error::Validation {
			message: "retrieval.bm25.k1 must be a finite number, zero or greater.".to_string(),
		});
	}
	if !retrieval.bm25.b.is_finite() || !(0.0..=1.0).contains(&retrieval.bm25.b) {
		return Err(Error::Validation {
			message: "retrieval.bm25.b must be in the range 0.0-1.0.".to_string(),
		});
	}
	if retrieval.enable_rerank && cfg.providers.rerank.is_none() {
		return Err(Error::Validation {
			message: "retrieval.enable_rerank requires [providers.rerank].".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	trim_api_base(&mut cfg.providers.llm.api_base);
	trim_api_base(&mut cfg.providers.embedding.api_base);
	trim_api_base(&mut cfg.providers.report.api_base);

	if let Some(rerank) = cfg.providers.rerank.as_mut() {
		trim_api_base(&mut rerank.api_base);
	}
	if cfg.providers.report.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
		cfg.providers.report.api_key = None;
	}
}

fn trim_api_base(api_base: &mut String) {
	while api_base.ends_with('/') {
		api_base.pop();
	}
}
