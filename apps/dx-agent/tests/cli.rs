use std::{fs, path::PathBuf};

use clap::Parser;
use serde_json::json;

use dx_agent::{Args, Command};
use dx_service::{DiagnosisState, Stage, StageOutcome};

fn corpus_file(name: &str, body: &str) -> PathBuf {
	let path = std::env::temp_dir().join(format!("dx-agent-{}-{name}.jsonl", std::process::id()));

	fs::write(&path, body).expect("corpus file should be written");

	path
}

#[test]
fn parses_search_command() {
	let args = Args::try_parse_from([
		"dx-agent", "-c", "dx.toml", "--corpus", "docs.jsonl", "search", "变压器温度", "--top-k",
		"3",
	])
	.expect("arguments should parse");

	assert_eq!(args.config, PathBuf::from("dx.toml"));
	assert!(matches!(
		args.command,
		Command::Search { ref query, top_k: Some(3) } if query == "变压器温度"
	));
}

#[test]
fn corpus_is_required() {
	assert!(Args::try_parse_from(["dx-agent", "-c", "dx.toml", "ask", "变压器"]).is_err());
}

#[test]
fn loads_jsonl_and_skips_blank_lines() {
	let path = corpus_file(
		"ok",
		"{\"content\":\"变压器油温过高\",\"metadata\":{\"id\":\"doc1\"}}\n\n   \n{\"content\":\"断路器拒动\"}\n",
	);
	let docs = dx_agent::load_corpus(&path).expect("corpus should load");

	fs::remove_file(&path).ok();

	assert_eq!(docs.len(), 2);
	assert_eq!(docs[0].content(), "变压器油温过高");
	assert_eq!(docs[0].metadata().get("id"), Some(&json!("doc1")));
	assert!(docs[1].metadata().is_empty());
}

#[test]
fn invalid_line_is_reported_with_its_number() {
	let path = corpus_file("bad", "{\"content\":\"变压器\"}\nnot json\n");
	let err = dx_agent::load_corpus(&path).expect_err("second line is invalid");

	fs::remove_file(&path).ok();

	assert!(err.to_string().contains("line 2"), "{err}");
}

#[test]
fn diagnosis_output_lists_degraded_stages() {
	let mut state = DiagnosisState::new("1号主变");

	state.device_name = "1号主变".to_string();
	state.report_path = "reports/DX-20250307-001.pdf".to_string();
	state.stage_outcomes = vec![
		(Stage::Retrieval, StageOutcome::Succeeded),
		(Stage::Validation, StageOutcome::Degraded { reason: "timeout".to_string() }),
	];

	let output = dx_agent::diagnosis_output(&state);

	assert_eq!(output["report_path"], json!("reports/DX-20250307-001.pdf"));
	assert_eq!(output["degraded"], json!([{ "stage": "validation", "reason": "timeout" }]));
}
