use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{BoxFuture, Error, LlmClient, Result};
use dx_config::LlmProviderConfig;

/// OpenAI-compatible chat completions client.
pub struct ChatClient {
	cfg: LlmProviderConfig,
	client: Client,
}
impl ChatClient {
	pub fn new(cfg: LlmProviderConfig) -> Result<Self> {
		let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;

		Ok(Self { cfg, client })
	}

	async fn chat(&self, system_prompt: &str, messages: &[String]) -> Result<String> {
		let url = format!("{}{}", self.cfg.api_base, self.cfg.path);
		let body = serde_json::json!({
			"model": self.cfg.model,
			"temperature": self.cfg.temperature,
			"messages": build_messages(system_prompt, messages),
		});
		let res = self
			.client
			.post(url)
			.headers(crate::auth_headers(&self.cfg.api_key, &self.cfg.default_headers)?)
			.json(&body)
			.send()
			.await?;
		let json: Value = res.error_for_status()?.json().await?;

		parse_chat_response(json)
	}
}
impl LlmClient for ChatClient {
	fn complete<'a>(
		&'a self,
		system_prompt: &'a str,
		messages: &'a [String],
	) -> BoxFuture<'a, Result<String>> {
		Box::pin(self.chat(system_prompt, messages))
	}
}

fn build_messages(system_prompt: &str, messages: &[String]) -> Vec<Value> {
	let mut out = Vec::with_capacity(messages.len() + 1);

	if !system_prompt.is_empty() {
		out.push(serde_json::json!({ "role": "system", "content": system_prompt }));
	}

	out.extend(
		messages.iter().map(|content| serde_json::json!({ "role": "user", "content": content })),
	);

	out
}

fn parse_chat_response(json: Value) -> Result<String> {
	json.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
		.map(str::to_string)
		.ok_or_else(|| Error::InvalidResponse {
			message: "Chat response is missing choices[0].message.content.".to_string(),
		})
}
