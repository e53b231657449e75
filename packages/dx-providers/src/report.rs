use std::time::Duration;

use reqwest::Client;
use serde_json::{Map, Value};

use crate::{BoxFuture, ReportEmitter, ReportOutcome, Result};
use dx_config::ReportProviderConfig;

/// Document rendering service. Posts `{template_id, fields}` and expects a [`ReportOutcome`].
pub struct HttpReportEmitter {
	cfg: ReportProviderConfig,
	client: Client,
}
impl HttpReportEmitter {
	pub fn new(cfg: ReportProviderConfig) -> Result<Self> {
		let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;

		Ok(Self { cfg, client })
	}

	async fn render(&self, fields: &Map<String, Value>, template_id: &str) -> Result<ReportOutcome> {
		let url = format!("{}{}", self.cfg.api_base, self.cfg.path);
		let headers = match self.cfg.api_key.as_deref() {
			Some(api_key) => crate::auth_headers(api_key, &self.cfg.default_headers)?,
			None => crate::extra_headers(&self.cfg.default_headers)?,
		};
		let body = serde_json::json!({ "template_id": template_id, "fields": fields });
		let res = self.client.post(url).headers(headers).json(&body).send().await?;
		let json: Value = res.error_for_status()?.json().await?;

		parse_report_response(json)
	}
}
impl ReportEmitter for HttpReportEmitter {
	fn generate<'a>(
		&'a self,
		fields: &'a Map<String, Value>,
		template_id: &'a str,
	) -> BoxFuture<'a, Result<ReportOutcome>> {
		Box::pin(self.render(fields, template_id))
	}
}

fn parse_report_response(json: Value) -> Result<ReportOutcome> {
	Ok(serde_json::from_value(json)?)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_success_and_failure() {
		let ok = parse_report_response(serde_json::json!({
			"success": true,
			"output_path": "/tmp/reports/DX-20250101-001.pdf",
		}))
		.expect("parse failed");

		assert!(ok.success);
		assert_eq!(ok.output_path.as_deref(), Some("/tmp/reports/DX-20250101-001.pdf"));

		let failed = parse_report_response(serde_json::json!({
			"success": false,
			"error": "xelatex exited with status 1",
		}))
		.expect("parse failed");

		assert!(!failed.success);
		assert_eq!(failed.error.as_deref(), Some("xelatex exited with status 1"));
	}

	#[test]
	fn missing_success_flag_is_an_error() {
		assert!(parse_report_response(serde_json::json!({ "output_path": "x" })).is_err());
	}
}
