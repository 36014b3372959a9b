use std::{fmt, str::FromStr};

use time::OffsetDateTime;
use uuid::Uuid;

use crate::Error;

#[derive(Clone, Debug, PartialEq, Eq, sqlx::FromRow)]
pub struct Note {
	pub id: i64,
	pub text: String,
}

#[derive(Debug, sqlx::FromRow)]
pub struct IngestJob {
	pub job_id: Uuid,
	pub text: String,
	pub split_text: bool,
	pub chunk_count: Option<i32>,
	pub status: String,
	pub attempts: i32,
	pub last_error: Option<String>,
	pub available_at: OffsetDateTime,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}

#[derive(Debug, sqlx::FromRow)]
pub struct IngestJobChunk {
	pub job_id: Uuid,
	pub chunk_index: i32,
	pub text: String,
	pub stage: String,
	pub note_id: Option<i64>,
	pub embedding: Option<Vec<f32>>,
	pub updated_at: OffsetDateTime,
}
impl IngestJobChunk {
	pub fn stage(&self) -> Result<ChunkStage, Error> {
		self.stage.parse()
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobStatus {
	Pending,
	Failed,
	Done,
	Errored,
}
impl JobStatus {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Pending => "PENDING",
			Self::Failed => "FAILED",
			Self::Done => "DONE",
			Self::Errored => "ERRORED",
		}
	}
}
impl fmt::Display for JobStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Last completed sub-step of one chunk. Stages only move forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChunkStage {
	Pending,
	NoteCreated,
	Embedded,
	Indexed,
}
impl ChunkStage {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Pending => "PENDING",
			Self::NoteCreated => "NOTE_CREATED",
			Self::Embedded => "EMBEDDED",
			Self::Indexed => "INDEXED",
		}
	}
}
impl FromStr for ChunkStage {
	type Err = Error;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		match raw {
			"PENDING" => Ok(Self::Pending),
			"NOTE_CREATED" => Ok(Self::NoteCreated),
			"EMBEDDED" => Ok(Self::Embedded),
			"INDEXED" => Ok(Self::Indexed),
			other => Err(Error::InvalidArgument(format!("Unknown chunk stage {other:?}."))),
		}
	}
}
