use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::diagnosis::state::DiagnosisState;
use dx_domain::{
	DiagnosisRecord, SchemaError,
	record::{PLACEHOLDER_REPORT_ID, coerce_integer},
};

/// Internal reasoning from the core assessment. Never part of the record.
const REASONING_KEY: &str = "assessment_reasoning";
const INTEGER_KEYS: [&str; 2] = ["health_score", "issue_count"];

/// Stage field maps in ascending precedence, then validation corrections on top.
pub fn layered_fields(state: &DiagnosisState) -> Map<String, Value> {
	let layers = [
		&state.device_info_fields,
		&state.core_assessment,
		&state.monitoring_fields,
		&state.fault_analysis,
		&state.risk_analysis,
		&state.maintenance_fields,
		&state.corrections,
	];
	let mut merged = Map::new();

	merged.insert("device_name".to_string(), Value::String(state.device_name.clone()));

	for layer in layers {
		for (key, value) in layer {
			merged.insert(key.clone(), value.clone());
		}
	}

	merged
}

/// Builds the record field map.
///
/// On schema failure the error is returned together with the unvalidated map so the caller can
/// still hand it to the renderer. Integer fields are coerced in both cases.
pub fn merge_fields(
	state: &DiagnosisState,
	unknown_device: &str,
	now: OffsetDateTime,
) -> Result<Map<String, Value>, (SchemaError, Map<String, Value>)> {
	let mut merged = layered_fields(state);
	let fallback_name =
		if state.device_name.trim().is_empty() { unknown_device } else { &state.device_name };

	if is_blank(merged.get("device_name")) {
		merged.insert("device_name".to_string(), Value::String(fallback_name.to_string()));
	}

	merged.remove(REASONING_KEY);
	fill_report_identity(&mut merged, now);

	for key in INTEGER_KEYS {
		if let Some(value) = merged.get_mut(key) {
			*value = coerce_integer(value);
		}
	}

	match DiagnosisRecord::from_fields(&merged) {
		Ok(record) => Ok(record.to_fields()),
		Err(err) => Err((err, merged)),
	}
}

/// Sets `diagnosis_date` and `report_id` from `now` when they are missing, blank or the
/// placeholder id.
pub fn fill_report_identity(fields: &mut Map<String, Value>, now: OffsetDateTime) {
	let date = now.date();
	let (year, month, day) = (date.year(), u8::from(date.month()), date.day());

	if is_blank(fields.get("diagnosis_date")) {
		fields.insert(
			"diagnosis_date".to_string(),
			Value::String(format!("{year:04}-{month:02}-{day:02}")),
		);
	}

	let placeholder = match fields.get("report_id") {
		Some(Value::String(id)) => id.trim().is_empty() || id == PLACEHOLDER_REPORT_ID,
		Some(Value::Null) | None => true,
		Some(_) => false,
	};

	if placeholder {
		fields.insert(
			"report_id".to_string(),
			Value::String(format!("DX-{year:04}{month:02}{day:02}-001")),
		);
	}
}

fn is_blank(value: Option<&Value>) -> bool {
	match value {
		Some(Value::String(text)) => text.trim().is_empty(),
		Some(Value::Null) | None => true,
		Some(_) => false,
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;
	use time::macros::datetime;

	use super::*;

	fn fields(value: Value) -> Map<String, Value> {
		value.as_object().cloned().expect("object")
	}

	fn state() -> DiagnosisState {
		DiagnosisState { device_name: "1号主变".to_string(), ..DiagnosisState::new("1号主变") }
	}

	#[test]
	fn later_layers_win() {
		let mut state = state();

		state.device_info_fields = fields(json!({ "location": "A站", "fault_location": "未知" }));
		state.fault_analysis = fields(json!({ "fault_location": "高压套管" }));
		state.maintenance_fields = fields(json!({ "location": "B站" }));
		state.corrections = fields(json!({ "location": "C站" }));

		let merged = layered_fields(&state);

		assert_eq!(merged.get("fault_location"), Some(&json!("高压套管")));
		assert_eq!(merged.get("location"), Some(&json!("C站")));
	}

	#[test]
	fn blank_device_name_is_restored_and_reasoning_removed() {
		let mut state = state();

		state.device_info_fields = fields(json!({ "device_name": "" }));
		state.core_assessment =
			fields(json!({ "health_score": "88", "assessment_reasoning": "x" }));

		let merged = merge_fields(&state, "未知设备", datetime!(2025-03-07 10:00 UTC))
			.expect("valid record");

		assert_eq!(merged.get("device_name"), Some(&json!("1号主变")));
		assert_eq!(merged.get("health_score"), Some(&json!(88)));
		assert!(!merged.contains_key("assessment_reasoning"));
		assert_eq!(merged.get("diagnosis_date"), Some(&json!("2025-03-07")));
		assert_eq!(merged.get("report_id"), Some(&json!("DX-20250307-001")));
	}

	#[test]
	fn supplied_identity_is_kept() {
		let mut map = fields(json!({ "diagnosis_date": "2024-12-01", "report_id": "DX-1" }));

		fill_report_identity(&mut map, datetime!(2025-03-07 10:00 UTC));

		assert_eq!(map.get("diagnosis_date"), Some(&json!("2024-12-01")));
		assert_eq!(map.get("report_id"), Some(&json!("DX-1")));
	}

	#[test]
	fn schema_failure_returns_raw_fields() {
		let mut state = state();

		state.core_assessment = fields(json!({ "health_score": 140, "assessment_reasoning": "x" }));

		let (err, raw) = merge_fields(&state, "未知设备", datetime!(2025-03-07 10:00 UTC))
			.expect_err("score out of range");

		assert_eq!(err.field, "health_score");
		assert_eq!(raw.get("health_score"), Some(&json!(140)));
		assert_eq!(raw.get("device_name"), Some(&json!("1号主变")));
		assert!(!raw.contains_key("assessment_reasoning"));
	}

	#[test]
	fn raw_fields_carry_coerced_integers() {
		let mut state = state();

		state.core_assessment = fields(json!({ "health_score": "85", "issue_count": "-1" }));

		let (err, raw) = merge_fields(&state, "未知设备", datetime!(2025-03-07 10:00 UTC))
			.expect_err("negative issue count");

		assert_eq!(err.field, "issue_count");
		assert_eq!(raw.get("health_score"), Some(&json!(85)));
		assert_eq!(raw.get("issue_count"), Some(&json!(-1)));
	}
}
