use std::collections::HashSet;

use serde_json::{Map, Value, json};

use dx_domain::{DiagnosisRecord, Document, FilterCondition, MetadataFilter, tokenize};

fn metadata(value: Value) -> Map<String, Value> {
	value.as_object().cloned().expect("metadata must be an object")
}

#[test]
fn tokenizer_covers_query_terms_inside_longer_sentences() {
	let query = tokenize("变压器温度");
	let doc: HashSet<String> =
		tokenize("当变压器温度超过90度时，需要立即检查冷却系统。").into_iter().collect();

	assert!(query.iter().all(|term| doc.contains(term)));
	assert!(doc.contains("90"));
}

#[test]
fn identical_documents_share_a_key_across_serde() {
	let doc = Document::new("断路器是电力系统中的重要保护设备。", metadata(json!({
		"topic": "断路器",
		"source": "doc5",
	})));
	let encoded = serde_json::to_string(&doc).expect("document should serialize");
	let decoded: Document = serde_json::from_str(&encoded).expect("document should deserialize");

	assert_eq!(decoded.key(), doc.key());
	assert_eq!(decoded.content(), doc.content());
}

#[test]
fn filter_selects_documents_by_metadata() {
	let docs = vec![
		Document::new("a", metadata(json!({ "source": "doc1", "topic": "变压器" }))),
		Document::new("b", metadata(json!({ "source": "doc4", "topic": "电容器" }))),
		Document::new("c", metadata(json!({ "source": "doc5" }))),
	];
	let filter = MetadataFilter::new()
		.with("topic", FilterCondition::OneOf(vec![json!("变压器"), json!("断路器")]));
	let kept: Vec<&str> =
		docs.iter().filter(|doc| filter.matches(doc)).map(Document::content).collect();

	assert_eq!(kept, vec!["a"]);
}

#[test]
fn record_round_trips_through_fields() {
	let record = DiagnosisRecord::from_fields(&metadata(json!({
		"device_name": "1号主变",
		"health_score": "60",
		"health_status": "警告",
		"risk_level": "中",
		"issue_count": 2,
		"unknown_key": true,
	})))
	.expect("record should validate");
	let again = DiagnosisRecord::from_fields(&record.to_fields()).expect("record should validate");

	assert_eq!(again, record);
	assert_eq!(again.health_score, 60);
	assert!(!record.to_fields().contains_key("unknown_key"));
}
