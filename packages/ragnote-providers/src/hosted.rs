//! Hosted chat API speaking the Anthropic Messages protocol.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;

use ragnote_config::HostedChatConfig;

use crate::{
	Result,
	chat::{ChatCompletion, ChatMessage, ChatPrompt},
};

const API_KEY_HEADER: HeaderName = HeaderName::from_static("x-api-key");
const API_VERSION_HEADER: HeaderName = HeaderName::from_static("anthropic-version");

pub(crate) async fn complete(cfg: &HostedChatConfig, prompt: &ChatPrompt) -> Result<ChatCompletion> {
	let client = crate::http_client(cfg.timeout_ms)?;
	let mut headers = HeaderMap::new();

	headers.insert(API_KEY_HEADER, HeaderValue::from_str(&cfg.api_key)?);
	headers.insert(API_VERSION_HEADER, HeaderValue::from_str(&cfg.api_version)?);

	crate::extend_default_headers(&mut headers, &cfg.default_headers)?;

	let res = client
		.post(crate::endpoint(&cfg.api_base, &cfg.path))
		.headers(headers)
		.json(&request_body(cfg, prompt))
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	crate::chat::usable_text(response_text(&json).unwrap_or_default(), &cfg.model)
}

fn request_body(cfg: &HostedChatConfig, prompt: &ChatPrompt) -> Value {
	serde_json::json!({
		"model": cfg.model,
		"max_tokens": cfg.max_tokens,
		"system": system_text(prompt),
		"messages": [ChatMessage { role: "user", content: &prompt.question }],
	})
}

/// The context block rides along in the system text, separated by one space.
fn system_text(prompt: &ChatPrompt) -> String {
	match prompt.context.as_deref() {
		Some(context) => format!("{} {context}", prompt.system),
		None => prompt.system.clone(),
	}
}

/// Text of every text block, one per line.
fn response_text(json: &Value) -> Option<String> {
	let blocks = json.get("content")?.as_array()?;
	let texts = blocks
		.iter()
		.filter(|block| block.get("type").and_then(Value::as_str).is_none_or(|kind| kind == "text"))
		.filter_map(|block| block.get("text").and_then(Value::as_str))
		.collect::<Vec<_>>();

	if texts.is_empty() {
		return None;
	}

	Some(texts.join("\n"))
}
