use std::collections::HashMap;

use qdrant_client::{
	Qdrant,
	qdrant::{
		Condition, Filter, Query, QueryPointsBuilder, ScoredPoint, Value as QdrantValue,
		value::Kind,
	},
};
use serde_json::{Map, Number, Value};

use crate::{BoxFuture, DenseRetriever, EmbeddingClient, Error, Result};
use dx_config::{EmbeddingProviderConfig, Qdrant as QdrantConfig};
use dx_domain::Document;

/// Dense retriever over a Qdrant collection whose payload carries the document body.
pub struct QdrantDenseRetriever {
	client: Qdrant,
	collection: String,
	vector_dim: u32,
	content_field: String,
	embedder: EmbeddingClient,
}
impl QdrantDenseRetriever {
	pub fn new(qdrant: &QdrantConfig, embedding: EmbeddingProviderConfig) -> Result<Self> {
		let client = Qdrant::from_url(&qdrant.url).build()?;

		Ok(Self {
			client,
			collection: qdrant.collection.clone(),
			vector_dim: qdrant.vector_dim,
			content_field: qdrant.content_field.clone(),
			embedder: EmbeddingClient::new(embedding)?,
		})
	}

	async fn search(
		&self,
		query: &str,
		k: usize,
		filter: Option<&Map<String, Value>>,
	) -> Result<Vec<Document>> {
		if k == 0 {
			return Ok(Vec::new());
		}

		let vector = self
			.embedder
			.embed(&[query.to_string()])
			.await?
			.into_iter()
			.next()
			.ok_or_else(|| Error::InvalidResponse {
				message: "Embedding response is empty.".to_string(),
			})?;

		if vector.len() != self.vector_dim as usize {
			return Err(Error::InvalidResponse {
				message: "Embedding vector dimension mismatch.".to_string(),
			});
		}

		let mut search = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(vector))
			.limit(k as u64)
			.with_payload(true);

		if let Some(filter) = filter.and_then(build_filter) {
			search = search.filter(filter);
		}

		let response = self.client.query(search).await?;

		Ok(points_to_documents(response.result, &self.content_field))
	}
}
impl DenseRetriever for QdrantDenseRetriever {
	fn similarity_search<'a>(
		&'a self,
		query: &'a str,
		k: usize,
		filter: Option<&'a Map<String, Value>>,
	) -> BoxFuture<'a, Result<Vec<Document>>> {
		Box::pin(self.search(query, k, filter))
	}
}

/// Exact-match conditions on keyword, integer and boolean payload values. Other value types
/// cannot be expressed as a Qdrant match and are left to post-filtering.
fn build_filter(conditions: &Map<String, Value>) -> Option<Filter> {
	let mut must = Vec::new();

	for (key, value) in conditions {
		let condition = match value {
			Value::String(text) => Condition::matches(key.as_str(), text.clone()),
			Value::Bool(flag) => Condition::matches(key.as_str(), *flag),
			Value::Number(number) => match number.as_i64() {
				Some(int) => Condition::matches(key.as_str(), int),
				None => {
					tracing::warn!(key = %key, "Skipping non-integer numeric prefilter.");

					continue;
				},
			},
			_ => {
				tracing::warn!(key = %key, "Skipping unsupported prefilter value.");

				continue;
			},
		};

		must.push(condition);
	}

	if must.is_empty() { None } else { Some(Filter::must(must)) }
}

fn points_to_documents(points: Vec<ScoredPoint>, content_field: &str) -> Vec<Document> {
	let mut out = Vec::with_capacity(points.len());

	for point in points {
		let mut payload = payload_to_json(point.payload);
		let content = match payload.remove(content_field) {
			Some(Value::String(content)) => content,
			_ => {
				tracing::warn!(point_id = ?point.id, "Dense hit missing content payload.");

				continue;
			},
		};

		out.push(Document::new(content, payload));
	}

	out
}

fn payload_to_json(payload: HashMap<String, QdrantValue>) -> Map<String, Value> {
	payload.into_iter().map(|(key, value)| (key, qdrant_value_to_json(value))).collect()
}

fn qdrant_value_to_json(value: QdrantValue) -> Value {
	match value.kind {
		Some(Kind::NullValue(_)) | None => Value::Null,
		Some(Kind::BoolValue(flag)) => Value::Bool(flag),
		Some(Kind::IntegerValue(int)) => Value::from(int),
		Some(Kind::DoubleValue(float)) =>
			Number::from_f64(float).map(Value::Number).unwrap_or(Value::Null),
		Some(Kind::StringValue(text)) => Value::String(text),
		Some(Kind::ListValue(list)) =>
			Value::Array(list.values.into_iter().map(qdrant_value_to_json).collect()),
		Some(Kind::StructValue(inner)) => Value::Object(payload_to_json(inner.fields)),
	}
}
