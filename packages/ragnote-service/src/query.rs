//! Single-hop retrieval followed by one chat completion.

use serde::{Deserialize, Serialize};

use crate::{Error, RagService, Result};
use ragnote_providers::chat::ChatPrompt;
use ragnote_storage::queries;

pub const MISSING_QUESTION: &str =
	"Please provide a question using the '?text=<your question>' query parameter.";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct QueryRequest {
	#[serde(default)]
	pub text: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryResponse {
	pub answer: String,
	pub model_id: String,
	/// Notes whose text went into the context message.
	pub context_note_ids: Vec<i64>,
}

impl RagService {
	pub async fn query(&self, req: QueryRequest) -> Result<QueryResponse> {
		// Only an absent or empty parameter counts as missing.
		let question = match req.text.as_deref() {
			Some(text) if !text.is_empty() => text,
			_ => return Err(Error::InvalidRequest { message: MISSING_QUESTION.to_string() }),
		};
		let texts = vec![question.to_string()];
		let vector = self
			.providers
			.embedding
			.embed(&self.cfg.providers.embedding, &texts)
			.await?
			.into_iter()
			.next()
			.ok_or_else(|| Error::Provider {
				message: "Embedding provider returned no vector.".to_string(),
			})?;
		let matches = self.qdrant.nearest_note_ids(vector, u64::from(self.cfg.query.top_k)).await?;
		// Only the closest match feeds the prompt. A vector without a row reads as no match.
		let notes = match matches.first() {
			Some(note_id) => queries::fetch_notes_by_id(&self.db, *note_id).await?,
			None => Vec::new(),
		};
		let note_texts = notes.iter().map(|note| note.text.as_str()).collect::<Vec<_>>();
		let prompt = build_prompt(&self.cfg.query.system_prompt, &note_texts, question);
		let completion = self.providers.chat.complete(&self.cfg.providers.chat, &prompt).await?;

		tracing::info!(
			model_id = %completion.model_id,
			matches = matches.len(),
			context_notes = notes.len(),
			"Query answered."
		);

		Ok(QueryResponse {
			answer: completion.text,
			model_id: completion.model_id,
			context_note_ids: notes.iter().map(|note| note.id).collect(),
		})
	}
}

pub fn build_prompt(system: &str, note_texts: &[&str], question: &str) -> ChatPrompt {
	ChatPrompt {
		system: system.to_string(),
		context: context_message(note_texts),
		question: question.to_string(),
	}
}

/// `None` when nothing was retrieved, so backends omit the section entirely.
pub fn context_message(note_texts: &[&str]) -> Option<String> {
	if note_texts.is_empty() {
		return None;
	}

	let bullets = note_texts.iter().map(|text| format!("- {text}")).collect::<Vec<_>>();

	Some(format!("Context:\n{}", bullets.join("\n")))
}
