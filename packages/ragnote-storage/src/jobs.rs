//! Durable ingestion job records.
//!
//! A job holds one submitted note. Its chunk rows remember the last completed sub-step, so a job
//! that is claimed again resumes where it stopped instead of repeating finished work.

use sqlx::{Executor, Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	Error, Result,
	db::Db,
	models::{ChunkStage, IngestJob, IngestJobChunk, JobStatus},
	queries,
};

const JOB_COLUMNS: &str = "\
job_id,
	text,
	split_text,
	chunk_count,
	status,
	attempts,
	last_error,
	available_at,
	created_at,
	updated_at";
const CHUNK_COLUMNS: &str = "job_id, chunk_index, text, stage, note_id, embedding, updated_at";

pub async fn enqueue_job(
	db: &Db,
	job_id: Uuid,
	text: &str,
	split_text: bool,
	now: OffsetDateTime,
) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO ingest_jobs (
	job_id,
	text,
	split_text,
	status,
	attempts,
	available_at,
	created_at,
	updated_at
)
VALUES ($1, $2, $3, $4, 0, $5, $5, $5)",
	)
	.bind(job_id)
	.bind(text)
	.bind(split_text)
	.bind(JobStatus::Pending.as_str())
	.bind(now)
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn fetch_job(db: &Db, job_id: Uuid) -> Result<Option<IngestJob>> {
	let sql = format!("SELECT {JOB_COLUMNS} FROM ingest_jobs WHERE job_id = $1");
	let job = sqlx::query_as::<_, IngestJob>(&sql).bind(job_id).fetch_optional(&db.pool).await?;

	Ok(job)
}

/// Claims the oldest due job and pushes its `available_at` to `lease_until`, so a worker that dies
/// mid-job releases it once the lease expires.
pub async fn claim_next_job(
	db: &Db,
	now: OffsetDateTime,
	lease_until: OffsetDateTime,
) -> Result<Option<IngestJob>> {
	let mut tx = db.pool.begin().await?;
	let sql = format!(
		"\
SELECT
	{JOB_COLUMNS}
FROM ingest_jobs
WHERE status IN ('PENDING', 'FAILED') AND available_at <= $1
ORDER BY available_at ASC
LIMIT 1
FOR UPDATE SKIP LOCKED"
	);
	let row = sqlx::query_as::<_, IngestJob>(&sql).bind(now).fetch_optional(&mut *tx).await?;
	let job = if let Some(mut job) = row {
		sqlx::query("UPDATE ingest_jobs SET available_at = $1, updated_at = $2 WHERE job_id = $3")
			.bind(lease_until)
			.bind(now)
			.bind(job.job_id)
			.execute(&mut *tx)
			.await?;

		job.available_at = lease_until;
		job.updated_at = now;

		Some(job)
	} else {
		None
	};

	tx.commit().await?;

	Ok(job)
}

/// Pushes the lease of a claimed job forward while it is still being worked on.
pub async fn renew_lease(
	db: &Db,
	job_id: Uuid,
	lease_until: OffsetDateTime,
	now: OffsetDateTime,
) -> Result<()> {
	sqlx::query(
		"\
UPDATE ingest_jobs
SET available_at = $1, updated_at = $2
WHERE job_id = $3 AND status IN ('PENDING', 'FAILED')",
	)
	.bind(lease_until)
	.bind(now)
	.bind(job_id)
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn fetch_job_chunks(db: &Db, job_id: Uuid) -> Result<Vec<IngestJobChunk>> {
	let sql = format!(
		"SELECT {CHUNK_COLUMNS} FROM ingest_job_chunks WHERE job_id = $1 ORDER BY chunk_index ASC"
	);
	let chunks = sqlx::query_as::<_, IngestJobChunk>(&sql).bind(job_id).fetch_all(&db.pool).await?;

	Ok(chunks)
}

/// Persists the split result once. Returns false when another run already recorded it.
pub async fn record_split(
	db: &Db,
	job_id: Uuid,
	chunks: &[String],
	now: OffsetDateTime,
) -> Result<bool> {
	let chunk_count = i32::try_from(chunks.len())
		.map_err(|_| Error::InvalidArgument("Chunk count exceeds i32 range.".to_string()))?;
	let mut tx = db.pool.begin().await?;
	let updated = sqlx::query(
		"\
UPDATE ingest_jobs
SET chunk_count = $1, updated_at = $2
WHERE job_id = $3 AND chunk_count IS NULL",
	)
	.bind(chunk_count)
	.bind(now)
	.bind(job_id)
	.execute(&mut *tx)
	.await?;

	if updated.rows_affected() == 0 {
		tx.rollback().await?;

		return Ok(false);
	}

	for (chunk_index, text) in chunks.iter().enumerate() {
		insert_chunk_exec(&mut *tx, job_id, chunk_index as i32, text, now).await?;
	}

	tx.commit().await?;

	Ok(true)
}

/// Inserts the note row and advances the chunk in one transaction, so the note is created at
/// most once per chunk.
pub async fn create_chunk_note(
	db: &Db,
	job_id: Uuid,
	chunk_index: i32,
	text: &str,
	now: OffsetDateTime,
) -> Result<Option<i64>> {
	let mut tx = db.pool.begin().await?;
	let Some(note) = queries::insert_note_tx(&mut tx, text).await? else {
		tx.rollback().await?;

		return Ok(None);
	};

	advance_chunk_tx(
		&mut tx,
		job_id,
		chunk_index,
		ChunkStage::Pending,
		ChunkStage::NoteCreated,
		now,
	)
	.await?;
	sqlx::query(
		"UPDATE ingest_job_chunks SET note_id = $1 WHERE job_id = $2 AND chunk_index = $3",
	)
	.bind(note.id)
	.bind(job_id)
	.bind(chunk_index)
	.execute(&mut *tx)
	.await?;

	tx.commit().await?;

	Ok(Some(note.id))
}

pub async fn record_chunk_embedding(
	db: &Db,
	job_id: Uuid,
	chunk_index: i32,
	embedding: &[f32],
	now: OffsetDateTime,
) -> Result<()> {
	let mut tx = db.pool.begin().await?;

	advance_chunk_tx(
		&mut tx,
		job_id,
		chunk_index,
		ChunkStage::NoteCreated,
		ChunkStage::Embedded,
		now,
	)
	.await?;
	sqlx::query(
		"UPDATE ingest_job_chunks SET embedding = $1 WHERE job_id = $2 AND chunk_index = $3",
	)
	.bind(embedding)
	.bind(job_id)
	.bind(chunk_index)
	.execute(&mut *tx)
	.await?;

	tx.commit().await?;

	Ok(())
}

pub async fn record_chunk_indexed(
	db: &Db,
	job_id: Uuid,
	chunk_index: i32,
	now: OffsetDateTime,
) -> Result<()> {
	let mut tx = db.pool.begin().await?;

	advance_chunk_tx(
		&mut tx,
		job_id,
		chunk_index,
		ChunkStage::Embedded,
		ChunkStage::Indexed,
		now,
	)
	.await?;

	tx.commit().await?;

	Ok(())
}

pub async fn mark_job_done(db: &Db, job_id: Uuid, now: OffsetDateTime) -> Result<()> {
	sqlx::query(
		"UPDATE ingest_jobs SET status = $1, last_error = NULL, updated_at = $2 WHERE job_id = $3",
	)
	.bind(JobStatus::Done.as_str())
	.bind(now)
	.bind(job_id)
	.execute(&db.pool)
	.await?;

	Ok(())
}

/// Records a failed run. `status` is either `Failed` (retried at `available_at`) or `Errored`.
pub async fn mark_job_failed(
	db: &Db,
	job_id: Uuid,
	status: JobStatus,
	attempts: i32,
	last_error: &str,
	available_at: OffsetDateTime,
	now: OffsetDateTime,
) -> Result<()> {
	if !matches!(status, JobStatus::Failed | JobStatus::Errored) {
		return Err(Error::InvalidArgument(format!("{status} is not a failure status.")));
	}

	sqlx::query(
		"\
UPDATE ingest_jobs
SET status = $1,
	attempts = $2,
	last_error = $3,
	available_at = $4,
	updated_at = $5
WHERE job_id = $6",
	)
	.bind(status.as_str())
	.bind(attempts)
	.bind(last_error)
	.bind(available_at)
	.bind(now)
	.bind(job_id)
	.execute(&db.pool)
	.await?;

	Ok(())
}

async fn advance_chunk_tx(
	tx: &mut Transaction<'_, Postgres>,
	job_id: Uuid,
	chunk_index: i32,
	from: ChunkStage,
	to: ChunkStage,
	now: OffsetDateTime,
) -> Result<()> {
	let result = sqlx::query(
		"\
UPDATE ingest_job_chunks
SET stage = $1, updated_at = $2
WHERE job_id = $3 AND chunk_index = $4 AND stage = $5",
	)
	.bind(to.as_str())
	.bind(now)
	.bind(job_id)
	.bind(chunk_index)
	.bind(from.as_str())
	.execute(&mut **tx)
	.await?;

	if result.rows_affected() == 0 {
		return Err(Error::NotFound(format!(
			"Chunk {chunk_index} of job {job_id} is not at stage {}.",
			from.as_str()
		)));
	}

	Ok(())
}

async fn insert_chunk_exec<'e, E>(
	executor: E,
	job_id: Uuid,
	chunk_index: i32,
	text: &str,
	now: OffsetDateTime,
) -> Result<()>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query(
		"\
INSERT INTO ingest_job_chunks (job_id, chunk_index, text, stage, updated_at)
VALUES ($1, $2, $3, $4, $5)",
	)
	.bind(job_id)
	.bind(chunk_index)
	.bind(text)
	.bind(ChunkStage::Pending.as_str())
	.bind(now)
	.execute(executor)
	.await?;

	Ok(())
}
