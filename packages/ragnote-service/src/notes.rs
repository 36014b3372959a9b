use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Error, RagService, Result};
use ragnote_storage::jobs;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CreateNoteRequest {
	#[serde(default)]
	pub text: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateNoteResponse {
	pub job_id: Uuid,
	pub split_text: bool,
}

impl RagService {
	/// Schedules ingestion and returns without waiting for it.
	pub async fn create_note(&self, req: CreateNoteRequest) -> Result<CreateNoteResponse> {
		let text = validate_note_text(req.text.as_deref())?;
		let job_id = Uuid::new_v4();
		let split_text = self.cfg.ingest.enable_text_splitting;

		jobs::enqueue_job(&self.db, job_id, text, split_text, OffsetDateTime::now_utc()).await?;

		tracing::info!(%job_id, split_text, chars = text.chars().count(), "Ingestion job scheduled.");

		Ok(CreateNoteResponse { job_id, split_text })
	}
}

pub fn validate_note_text(text: Option<&str>) -> Result<&str> {
	match text {
		Some(text) if !text.trim().is_empty() => Ok(text),
		_ => Err(Error::InvalidRequest { message: "Missing text".to_string() }),
	}
}
