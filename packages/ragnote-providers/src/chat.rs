//! One chat capability over two backends.
//!
//! The hosted backend is used whenever it is configured with an API key; otherwise requests go to
//! the managed instruct model. Both normalize their answer to [`ChatCompletion`].

use serde::Serialize;

use ragnote_config::{ChatProviders, HostedChatConfig, ManagedChatConfig};

use crate::{Result, hosted, managed};

/// Everything a backend needs to answer one question.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatPrompt {
	pub system: String,
	/// Retrieved notes already formatted as a context block. `None` when nothing was retrieved.
	pub context: Option<String>,
	pub question: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatCompletion {
	pub text: String,
	pub model_id: String,
}

#[derive(Clone, Copy, Debug)]
pub enum ChatBackend<'a> {
	Hosted(&'a HostedChatConfig),
	Managed(&'a ManagedChatConfig),
}
impl<'a> ChatBackend<'a> {
	pub fn select(cfg: &'a ChatProviders) -> Self {
		match cfg.hosted.as_ref().filter(|hosted| !hosted.api_key.trim().is_empty()) {
			Some(hosted) => Self::Hosted(hosted),
			None => Self::Managed(&cfg.managed),
		}
	}

	pub fn model_id(&self) -> &'a str {
		match self {
			Self::Hosted(cfg) => cfg.model.as_str(),
			Self::Managed(cfg) => cfg.model.as_str(),
		}
	}

	pub fn provider_id(&self) -> &'a str {
		match self {
			Self::Hosted(cfg) => cfg.provider_id.as_str(),
			Self::Managed(cfg) => cfg.provider_id.as_str(),
		}
	}

	pub async fn complete(self, prompt: &ChatPrompt) -> Result<ChatCompletion> {
		match self {
			Self::Hosted(cfg) => hosted::complete(cfg, prompt).await,
			Self::Managed(cfg) => managed::complete(cfg, prompt).await,
		}
	}
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatMessage<'a> {
	pub(crate) role: &'static str,
	pub(crate) content: &'a str,
}

/// Rejects blank answers. Usable text is returned as the backend sent it.
pub(crate) fn usable_text(text: String, model_id: &str) -> Result<ChatCompletion> {
	if text.trim().is_empty() {
		return Err(crate::Error::EmptyCompletion { model_id: model_id.to_string() });
	}

	Ok(ChatCompletion { text, model_id: model_id.to_string() })
}

#[cfg(test)]
mod tests {
	use serde_json::Map;

	use super::*;

	fn managed() -> ManagedChatConfig {
		ManagedChatConfig {
			provider_id: "workers-ai".to_string(),
			api_base: "http://127.0.0.1:9".to_string(),
			api_key: "managed-key".to_string(),
			path: "/run".to_string(),
			model: "@cf/meta/llama-3.3-70b-instruct-fp8-fast".to_string(),
			timeout_ms: 1_000,
			default_headers: Map::new(),
		}
	}

	#[test]
	fn managed_backend_is_used_without_hosted_config() {
		let cfg = ChatProviders { managed: managed(), hosted: None };
		let backend = ChatBackend::select(&cfg);

		assert!(matches!(backend, ChatBackend::Managed(_)));
		assert_eq!(backend.model_id(), "@cf/meta/llama-3.3-70b-instruct-fp8-fast");
	}

	#[test]
	fn hosted_backend_wins_when_it_has_a_key() {
		let hosted = HostedChatConfig { api_key: "sk-ant".to_string(), ..Default::default() };
		let cfg = ChatProviders { managed: managed(), hosted: Some(hosted) };
		let backend = ChatBackend::select(&cfg);

		assert!(matches!(backend, ChatBackend::Hosted(_)));
		assert_eq!(backend.model_id(), "claude-3-5-sonnet-latest");
		assert_eq!(backend.provider_id(), "anthropic");
	}

	#[test]
	fn hosted_backend_without_a_key_is_ignored() {
		let cfg =
			ChatProviders { managed: managed(), hosted: Some(HostedChatConfig::default()) };

		assert!(matches!(ChatBackend::select(&cfg), ChatBackend::Managed(_)));
	}

	#[test]
	fn blank_answers_are_not_usable() {
		let err = usable_text(" \n".to_string(), "m").expect_err("Expected empty completion.");

		assert!(matches!(err, crate::Error::EmptyCompletion { .. }));
	}

	#[test]
	fn usable_answers_keep_their_whitespace() {
		let completion = usable_text("\nThe Celtics.\n".to_string(), "m").expect("Expected text.");

		assert_eq!(completion.text, "\nThe Celtics.\n");
		assert_eq!(completion.model_id, "m");
	}
}
