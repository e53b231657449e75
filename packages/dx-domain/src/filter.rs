use std::{
	collections::BTreeMap,
	fmt::{Debug, Formatter, Result as FmtResult},
	sync::Arc,
};

use serde_json::{Map, Value};

use crate::document::Document;

pub type Predicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

#[derive(Clone)]
pub enum FilterCondition {
	Equals(Value),
	OneOf(Vec<Value>),
	Predicate(Predicate),
}
impl FilterCondition {
	pub fn predicate<F>(f: F) -> Self
	where
		F: Fn(&Value) -> bool + Send + Sync + 'static,
	{
		Self::Predicate(Arc::new(f))
	}

	pub fn accepts(&self, value: &Value) -> bool {
		match self {
			Self::Equals(expected) => expected == value,
			Self::OneOf(options) => options.contains(value),
			Self::Predicate(f) => f(value),
		}
	}
}
impl Debug for FilterCondition {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		match self {
			Self::Equals(value) => f.debug_tuple("Equals").field(value).finish(),
			Self::OneOf(values) => f.debug_tuple("OneOf").field(values).finish(),
			Self::Predicate(_) => f.write_str("Predicate(..)"),
		}
	}
}

/// Conjunction of per-key conditions over document metadata.
///
/// A document passes only when every key is present in its metadata and the value satisfies the
/// key's condition. An empty filter accepts everything.
#[derive(Clone, Debug, Default)]
pub struct MetadataFilter {
	conditions: BTreeMap<String, FilterCondition>,
}
impl MetadataFilter {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with(mut self, key: impl Into<String>, condition: FilterCondition) -> Self {
		self.insert(key, condition);

		self
	}

	pub fn insert(&mut self, key: impl Into<String>, condition: FilterCondition) {
		self.conditions.insert(key.into(), condition);
	}

	pub fn is_empty(&self) -> bool {
		self.conditions.is_empty()
	}

	pub fn matches(&self, doc: &Document) -> bool {
		self.conditions.iter().all(|(key, condition)| {
			doc.metadata().get(key).map(|value| condition.accepts(value)).unwrap_or(false)
		})
	}

	/// Single-value equality conditions, suitable for pushing down to a vector store.
	pub fn exact_conditions(&self) -> Map<String, Value> {
		self.conditions
			.iter()
			.filter_map(|(key, condition)| match condition {
				FilterCondition::Equals(value) => Some((key.clone(), value.clone())),
				_ => None,
			})
			.collect()
	}

	/// Builds a filter from a JSON object: arrays become `OneOf`, everything else `Equals`.
	pub fn from_json(map: &Map<String, Value>) -> Self {
		let mut filter = Self::new();

		for (key, value) in map {
			let condition = match value {
				Value::Array(values) => FilterCondition::OneOf(values.clone()),
				other => FilterCondition::Equals(other.clone()),
			};

			filter.insert(key.clone(), condition);
		}

		filter
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn doc(metadata: Value) -> Document {
		Document::new("body", metadata.as_object().cloned().expect("metadata must be an object"))
	}

	#[test]
	fn empty_filter_accepts_all() {
		assert!(MetadataFilter::new().matches(&doc(json!({}))));
	}

	#[test]
	fn equals_one_of_and_predicate() {
		let filter = MetadataFilter::new()
			.with("source", FilterCondition::OneOf(vec![json!("doc1"), json!("doc3")]))
			.with("topic", FilterCondition::Equals(json!("温度")))
			.with("page", FilterCondition::predicate(|v| v.as_u64().is_some_and(|p| p > 2)));

		assert!(filter.matches(&doc(json!({ "source": "doc3", "topic": "温度", "page": 3 }))));
		assert!(!filter.matches(&doc(json!({ "source": "doc2", "topic": "温度", "page": 3 }))));
		assert!(!filter.matches(&doc(json!({ "source": "doc1", "topic": "温度", "page": 1 }))));
	}

	#[test]
	fn missing_key_is_rejected() {
		let filter = MetadataFilter::new().with("source", FilterCondition::Equals(json!("doc1")));

		assert!(!filter.matches(&doc(json!({ "topic": "温度" }))));
	}

	#[test]
	fn exact_conditions_skip_lists_and_predicates() {
		let filter = MetadataFilter::from_json(
			json!({ "source": "doc1", "topic": ["a", "b"] }).as_object().expect("object"),
		)
		.with("page", FilterCondition::predicate(|_| true));
		let exact = filter.exact_conditions();

		assert_eq!(exact.len(), 1);
		assert_eq!(exact.get("source"), Some(&json!("doc1")));
	}
}
