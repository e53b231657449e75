use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Content identity of a [`Document`]. Equal keys mean equal content and equal metadata.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentKey([u8; 32]);
impl DocumentKey {
	pub fn as_bytes(&self) -> &[u8; 32] {
		&self.0
	}
}
impl Display for DocumentKey {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.write_str(blake3::Hash::from(self.0).to_hex().as_str())
	}
}

/// A retrieved text passage. Immutable once built so that its key stays valid.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(from = "RawDocument")]
pub struct Document {
	content: String,
	#[serde(default)]
	metadata: Map<String, Value>,
	#[serde(skip)]
	key: DocumentKey,
}
impl Document {
	pub fn new(content: impl Into<String>, metadata: Map<String, Value>) -> Self {
		let content = content.into();
		let key = document_key(&content, &metadata);

		Self { content, metadata, key }
	}

	pub fn from_content(content: impl Into<String>) -> Self {
		Self::new(content, Map::new())
	}

	pub fn content(&self) -> &str {
		&self.content
	}

	pub fn metadata(&self) -> &Map<String, Value> {
		&self.metadata
	}

	pub fn key(&self) -> DocumentKey {
		self.key
	}

	pub fn into_parts(self) -> (String, Map<String, Value>) {
		(self.content, self.metadata)
	}
}
impl PartialEq for Document {
	fn eq(&self, other: &Self) -> bool {
		self.key == other.key
	}
}
impl Eq for Document {}

#[derive(Deserialize)]
struct RawDocument {
	content: String,
	#[serde(default)]
	metadata: Map<String, Value>,
}
impl From<RawDocument> for Document {
	fn from(raw: RawDocument) -> Self {
		Self::new(raw.content, raw.metadata)
	}
}

/// Hashes `content | canonical(metadata)` where object keys are sorted at every depth.
pub fn document_key(content: &str, metadata: &Map<String, Value>) -> DocumentKey {
	let mut hasher = blake3::Hasher::new();

	hasher.update(content.as_bytes());
	hasher.update(b"|");
	hasher.update(canonical_json(&Value::Object(metadata.clone())).as_bytes());

	DocumentKey(*hasher.finalize().as_bytes())
}

fn canonical_json(value: &Value) -> String {
	serde_json::to_string(&canonicalize(value)).unwrap_or_default()
}

fn canonicalize(value: &Value) -> Value {
	match value {
		Value::Object(map) => {
			let mut entries: Vec<(&String, &Value)> = map.iter().collect();

			entries.sort_by(|a, b| a.0.cmp(b.0));

			Value::Object(entries.into_iter().map(|(k, v)| (k.clone(), canonicalize(v))).collect())
		},
		Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
		other => other.clone(),
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn meta(value: Value) -> Map<String, Value> {
		value.as_object().cloned().expect("metadata must be an object")
	}

	#[test]
	fn key_ignores_metadata_insertion_order() {
		let mut first = Map::new();

		first.insert("source".to_string(), json!("doc1"));
		first.insert("topic".to_string(), json!("变压器"));

		let mut second = Map::new();

		second.insert("topic".to_string(), json!("变压器"));
		second.insert("source".to_string(), json!("doc1"));

		assert_eq!(Document::new("a", first).key(), Document::new("a", second).key());
	}

	#[test]
	fn key_separates_content_and_metadata() {
		let a = Document::new("温度", meta(json!({ "source": "doc1" })));
		let b = Document::new("温度", meta(json!({ "source": "doc2" })));
		let c = Document::new("温度高", meta(json!({ "source": "doc1" })));

		assert_ne!(a.key(), b.key());
		assert_ne!(a.key(), c.key());
	}

	#[test]
	fn deserialize_recomputes_key() {
		let doc: Document =
			serde_json::from_value(json!({ "content": "断路器", "metadata": { "source": "doc5" } }))
				.expect("document should deserialize");

		assert_eq!(doc.key(), Document::new("断路器", meta(json!({ "source": "doc5" }))).key());
		assert_eq!(doc.key().to_string().len(), 64);
	}

	#[test]
	fn missing_metadata_defaults_to_empty() {
		let doc: Document = serde_json::from_value(json!({ "content": "x" }))
			.expect("document should deserialize");

		assert!(doc.metadata().is_empty());
		assert_eq!(doc, Document::from_content("x"));
	}
}
