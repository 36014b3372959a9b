//! Managed instruct model behind a run endpoint.

use serde_json::Value;

use ragnote_config::ManagedChatConfig;

use crate::{
	Result,
	chat::{ChatCompletion, ChatMessage, ChatPrompt},
};

pub(crate) async fn complete(
	cfg: &ManagedChatConfig,
	prompt: &ChatPrompt,
) -> Result<ChatCompletion> {
	let client = crate::http_client(cfg.timeout_ms)?;
	let body = serde_json::json!({ "model": cfg.model, "messages": messages(prompt) });
	let res = client
		.post(crate::endpoint(&cfg.api_base, &cfg.path))
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	crate::chat::usable_text(response_text(&json).unwrap_or_default(), &cfg.model)
}

/// Context first, then the persona, then the question.
fn messages(prompt: &ChatPrompt) -> Vec<ChatMessage<'_>> {
	let mut messages = Vec::with_capacity(3);

	if let Some(context) = prompt.context.as_deref() {
		messages.push(ChatMessage { role: "system", content: context });
	}

	messages.push(ChatMessage { role: "system", content: &prompt.system });
	messages.push(ChatMessage { role: "user", content: &prompt.question });

	messages
}

/// Accepts the run envelope, a bare run result, or a chat-completions body.
fn response_text(json: &Value) -> Option<String> {
	json.pointer("/result/response")
		.or_else(|| json.get("response"))
		.or_else(|| json.pointer("/choices/0/message/content"))
		.and_then(Value::as_str)
		.map(str::to_string)
}
