use serde::{Deserialize, Serialize};

use crate::{RagService, Result};
use ragnote_storage::queries;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteItem {
	pub id: i64,
	pub text: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListResponse {
	pub data: Vec<NoteItem>,
}

impl RagService {
	pub async fn list_notes(&self) -> Result<ListResponse> {
		let notes = queries::list_notes(&self.db).await?;
		let data = notes.into_iter().map(|note| NoteItem { id: note.id, text: note.text }).collect();

		Ok(ListResponse { data })
	}
}
