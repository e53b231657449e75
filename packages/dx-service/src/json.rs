use serde_json::{Map, Value};

use crate::{Error, Result};

const PREVIEW_CHARS: usize = 200;

/// Parses an LLM reply that should hold one JSON object.
///
/// Control characters are dropped first. The cleaned text is tried as-is, then the body of its
/// first fenced code block (```json or a bare fence).
pub fn parse_json_object(reply: &str) -> Result<Map<String, Value>> {
	let cleaned = strip_control_chars(reply);
	let value = match serde_json::from_str::<Value>(cleaned.trim()) {
		Ok(value) => value,
		Err(direct_err) => {
			let Some(block) = fenced_block(&cleaned) else {
				return Err(parse_error(reply, &direct_err.to_string()));
			};

			serde_json::from_str::<Value>(block.trim())
				.map_err(|err| parse_error(reply, &err.to_string()))?
		},
	};

	match value {
		Value::Object(map) => Ok(map),
		other => Err(Error::JsonParse {
			message: format!("Expected a JSON object, got {}.", json_kind(&other)),
		}),
	}
}

fn strip_control_chars(text: &str) -> String {
	text.chars().filter(|ch| !matches!(*ch as u32, 0x00..=0x1f | 0x7f..=0x9f)).collect()
}

fn fenced_block(text: &str) -> Option<&str> {
	let (_, rest) = text.split_once("```json").or_else(|| text.split_once("```"))?;

	Some(rest.split_once("```").map(|(body, _)| body).unwrap_or(rest))
}

fn parse_error(reply: &str, detail: &str) -> Error {
	let preview: String = reply.chars().take(PREVIEW_CHARS).collect();

	Error::JsonParse { message: format!("{detail} Reply starts with: {preview}") }
}

fn json_kind(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "a boolean",
		Value::Number(_) => "a number",
		Value::String(_) => "a string",
		Value::Array(_) => "an array",
		Value::Object(_) => "an object",
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn parses_plain_object() {
		let map = parse_json_object(r#" {"health_score": 85} "#).expect("plain object");

		assert_eq!(map.get("health_score"), Some(&json!(85)));
	}

	#[test]
	fn parses_fenced_block_with_prose() {
		let reply = "评估结果如下：\n```json\n{\"risk_level\": \"中\"}\n```\n以上。";
		let map = parse_json_object(reply).expect("fenced object");

		assert_eq!(map.get("risk_level"), Some(&json!("中")));
	}

	#[test]
	fn parses_bare_fence() {
		let map = parse_json_object("```\n{\"a\": 1}\n```").expect("bare fence");

		assert_eq!(map.get("a"), Some(&json!(1)));
	}

	#[test]
	fn control_characters_inside_strings_are_dropped() {
		let map = parse_json_object("{\"fault_description\": \"油温\u{1}偏高\"}").expect("object");

		assert_eq!(map.get("fault_description"), Some(&json!("油温偏高")));
	}

	#[test]
	fn rejects_non_objects_and_garbage() {
		assert!(matches!(parse_json_object("[1, 2]"), Err(Error::JsonParse { .. })));
		assert!(matches!(parse_json_object("无法评估"), Err(Error::JsonParse { .. })));
	}
}
