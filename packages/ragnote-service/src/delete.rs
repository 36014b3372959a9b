use serde::{Deserialize, Serialize};

use crate::{RagService, Result};
use ragnote_storage::queries;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
	pub id: i64,
	/// Whether a note row existed. The vector delete runs either way.
	pub deleted: bool,
}

impl RagService {
	/// Removes the note row, then its vector. The two stores are not linked, so a failure on the
	/// second delete leaves the first in place.
	pub async fn delete_note(&self, id: i64) -> Result<DeleteResponse> {
		let removed = queries::delete_note(&self.db, id).await?;

		self.qdrant.delete_note_vectors(&[id]).await?;

		tracing::info!(note_id = id, rows = removed, "Note deleted.");

		Ok(DeleteResponse { id, deleted: removed > 0 })
	}
}
