//! Ingestion job runner.
//!
//! Each job walks its chunks in order through three recorded stages. A step that keeps failing
//! after its retries fails the whole run; the job is then retried later with backoff, skipping
//! every stage that already completed.

use std::{future::Future, time::Duration as StdDuration};

use time::{Duration, OffsetDateTime};
use tokio::time as tokio_time;

use ragnote_chunking::ChunkingConfig;
use ragnote_config::{Backoff, EmbeddingProviderConfig, Ingest, StepRetry};
use ragnote_providers::embedding;
use ragnote_storage::{
	db::Db,
	jobs,
	models::{ChunkStage, IngestJob, IngestJobChunk, JobStatus},
	qdrant::QdrantStore,
};

use crate::{Error, Result};

const CLAIM_LEASE_SECONDS: i64 = 30;
const MAX_LEASE_MS: u64 = 3_600_000;
const BASE_BACKOFF_MS: i64 = 500;
const MAX_BACKOFF_MS: i64 = 30_000;
const MAX_JOB_ERROR_CHARS: usize = 1_024;
const REDACTED: &str = "[REDACTED]";
const SECRET_KEYS: [&str; 5] = ["x-api-key", "api_key", "apikey", "authorization", "password"];

pub struct WorkerState {
	pub db: Db,
	pub qdrant: QdrantStore,
	pub embedding: EmbeddingProviderConfig,
	pub ingest: Ingest,
}

#[derive(Debug, PartialEq, Eq)]
pub enum JobOutcome {
	Done { chunks: usize },
	Failed { attempts: i32 },
	Errored { attempts: i32 },
}

pub async fn run_worker(state: WorkerState) -> color_eyre::Result<()> {
	let poll_interval = StdDuration::from_millis(state.ingest.poll_interval_ms);

	loop {
		match process_next_job(&state).await {
			// Drain due jobs back to back.
			Ok(Some(_)) => continue,
			Ok(None) => {},
			Err(err) => {
				tracing::error!(error = %err, "Ingestion job processing failed.");
			},
		}

		tokio_time::sleep(poll_interval).await;
	}
}

/// Claims and runs at most one due job. Returns `None` when nothing was due.
pub async fn process_next_job(state: &WorkerState) -> Result<Option<JobOutcome>> {
	let now = OffsetDateTime::now_utc();
	let Some(job) = jobs::claim_next_job(&state.db, now, now + lease_duration(state)).await? else {
		return Ok(None);
	};

	tracing::info!(job_id = %job.job_id, attempts = job.attempts, "Ingestion job claimed.");

	let outcome = match run_job(state, &job).await {
		Ok(chunks) => {
			jobs::mark_job_done(&state.db, job.job_id, OffsetDateTime::now_utc()).await?;

			tracing::info!(job_id = %job.job_id, chunks, "Ingestion job finished.");

			JobOutcome::Done { chunks }
		},
		Err(err) => mark_failed(state, &job, &err).await?,
	};

	Ok(Some(outcome))
}

/// Splitting disabled means the submitted text is the only chunk.
pub fn split_job_text(text: &str, split_text: bool, cfg: &ChunkingConfig) -> Vec<String> {
	if !split_text {
		return vec![text.to_string()];
	}

	let chunks = ragnote_chunking::split_text(text, cfg);

	if chunks.is_empty() { vec![text.to_string()] } else { chunks }
}

/// Delay before retry number `retry` of a step, counting from 1.
pub fn step_delay(retry: &StepRetry, retry_number: u32) -> StdDuration {
	let retry_number = retry_number.max(1);
	let factor = match retry.backoff {
		Backoff::Constant => 1,
		Backoff::Linear => u64::from(retry_number),
		Backoff::Exponential => 1_u64.checked_shl(retry_number - 1).unwrap_or(u64::MAX),
	};

	StdDuration::from_millis(retry.delay_ms.saturating_mul(factor))
}

/// Job-level retry delay: 500 ms doubling per failed attempt, at most six doublings, capped at
/// 30 s.
pub fn backoff_for_attempt(attempt: i32) -> Duration {
	let doublings = attempt.clamp(1, 7) - 1;

	Duration::milliseconds((BASE_BACKOFF_MS << doublings).min(MAX_BACKOFF_MS))
}

/// Strips provider keys, bearer tokens and connection-string credentials before an error is
/// persisted on the job row.
pub fn sanitize_job_error(text: &str) -> String {
	let mut words = Vec::new();
	let mut hide_next = false;

	for word in text.split_whitespace() {
		let lowered = word.to_ascii_lowercase();

		if lowered == "bearer" {
			hide_next = true;

			words.push(word.to_string());

			continue;
		}
		if std::mem::take(&mut hide_next) {
			words.push(REDACTED.to_string());

			continue;
		}

		words.push(redact_word(word, &lowered, &mut hide_next));
	}

	truncate_chars(words.join(" "), MAX_JOB_ERROR_CHARS)
}

/// Runs one named unit of work, retrying it per `retry` before giving up.
pub async fn run_step<T, F, Fut>(retry: &StepRetry, step: &str, mut op: F) -> Result<T>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T>>,
{
	let mut attempt = 0_u32;

	loop {
		attempt += 1;

		match op().await {
			Ok(value) => {
				tracing::info!(step, attempt, "Step completed.");

				return Ok(value);
			},
			Err(err) if attempt <= retry.limit => {
				let delay = step_delay(retry, attempt);

				tracing::warn!(
					step,
					attempt,
					delay_ms = delay.as_millis() as u64,
					error = %err,
					"Step failed. Retrying."
				);
				tokio_time::sleep(delay).await;
			},
			Err(err) =>
				return Err(Error::StepExhausted {
					step: step.to_string(),
					attempts: attempt,
					message: err.to_string(),
				}),
		}
	}
}

fn redact_word(word: &str, lowered: &str, hide_next: &mut bool) -> String {
	if lowered.starts_with("sk-") {
		return REDACTED.to_string();
	}
	if let Some((scheme, rest)) = word.split_once("://")
		&& let Some((_, host)) = rest.rsplit_once('@')
	{
		return format!("{scheme}://{REDACTED}@{host}");
	}

	for key in SECRET_KEYS {
		let Some(at) = lowered.find(key) else { continue };
		let key_end = at + key.len();

		match word[key_end..].chars().next() {
			// `key:` alone means the value is the next word.
			Some('=' | ':') if word.len() == key_end + 1 => {
				*hide_next = true;

				return word.to_string();
			},
			Some('=' | ':') => return format!("{}{REDACTED}", &word[..=key_end]),
			_ => {},
		}
	}

	word.to_string()
}

fn truncate_chars(mut text: String, max_chars: usize) -> String {
	if let Some((cut, _)) = text.char_indices().nth(max_chars) {
		text.truncate(cut);
		text.push_str("...");
	}

	text
}

/// Long enough to cover one step with every retry, each call hitting the provider timeout.
fn lease_duration(state: &WorkerState) -> Duration {
	let retry = &state.ingest.step_retry;
	let waits = (1..=retry.limit)
		.map(|retry_number| step_delay(retry, retry_number).as_millis() as u64)
		.fold(0_u64, u64::saturating_add);
	let calls = u64::from(retry.limit).saturating_add(1).saturating_mul(state.embedding.timeout_ms);
	let budget_ms = waits.saturating_add(calls).min(MAX_LEASE_MS);

	Duration::seconds(CLAIM_LEASE_SECONDS) + Duration::milliseconds(budget_ms as i64)
}

async fn renew_lease(state: &WorkerState, job_id: uuid::Uuid) -> Result<()> {
	let now = OffsetDateTime::now_utc();

	jobs::renew_lease(&state.db, job_id, now + lease_duration(state), now).await?;

	Ok(())
}

async fn run_job(state: &WorkerState, job: &IngestJob) -> Result<usize> {
	let retry = &state.ingest.step_retry;

	if job.chunk_count.is_none() {
		let chunking = ChunkingConfig::new(
			state.ingest.chunk_size as usize,
			state.ingest.chunk_overlap as usize,
		);
		let db = &state.db;
		let job_id = job.job_id;
		let text = job.text.as_str();
		let split_text = job.split_text;
		let chunking = &chunking;

		renew_lease(state, job_id).await?;
		run_step(retry, "split text", || async move {
			let chunks = split_job_text(text, split_text, chunking);

			jobs::record_split(db, job_id, &chunks, OffsetDateTime::now_utc()).await?;

			Ok(())
		})
		.await?;
	}

	let chunks = jobs::fetch_job_chunks(&state.db, job.job_id).await?;
	let total = chunks.len();

	for chunk in &chunks {
		process_chunk(state, chunk, total).await?;
	}

	Ok(total)
}

async fn process_chunk(state: &WorkerState, chunk: &IngestJobChunk, total: usize) -> Result<()> {
	let retry = &state.ingest.step_retry;
	let position = format!("{}/{total}", chunk.chunk_index + 1);
	let db = &state.db;
	let job_id = chunk.job_id;
	let chunk_index = chunk.chunk_index;
	let text = chunk.text.as_str();
	let mut stage = chunk.stage()?;
	let mut note_id = chunk.note_id;
	let mut vector = chunk.embedding.clone();

	if stage < ChunkStage::NoteCreated {
		renew_lease(state, job_id).await?;

		let created = run_step(retry, &format!("create database record: {position}"), || async move {
			jobs::create_chunk_note(db, job_id, chunk_index, text, OffsetDateTime::now_utc())
				.await?
				.ok_or_else(|| Error::Message("Failed to create note".to_string()))
		})
		.await?;

		note_id = Some(created);
		stage = ChunkStage::NoteCreated;
	}

	let note_id = note_id.ok_or_else(|| {
		Error::Message(format!("Chunk {position} of job {job_id} has no note id."))
	})?;

	if stage < ChunkStage::Embedded {
		let embedding_cfg = &state.embedding;

		renew_lease(state, job_id).await?;

		let embedded = run_step(retry, &format!("generate embedding: {position}"), || async move {
			let texts = [text.to_string()];
			let embedded = embedding::embed(embedding_cfg, &texts)
				.await?
				.into_iter()
				.next()
				.ok_or_else(|| Error::Message("Failed to generate vector embedding".to_string()))?;

			jobs::record_chunk_embedding(
				db,
				job_id,
				chunk_index,
				&embedded,
				OffsetDateTime::now_utc(),
			)
			.await?;

			Ok(embedded)
		})
		.await?;

		vector = Some(embedded);
		stage = ChunkStage::Embedded;
	}
	if stage < ChunkStage::Indexed {
		let vector = vector.ok_or_else(|| {
			Error::Message(format!("Chunk {position} of job {job_id} has no stored embedding."))
		})?;
		let qdrant = &state.qdrant;

		renew_lease(state, job_id).await?;
		run_step(retry, &format!("insert vector: {position}"), move || {
			let vector = vector.clone();

			async move {
				qdrant.upsert_note_vector(note_id, vector).await?;
				jobs::record_chunk_indexed(db, job_id, chunk_index, OffsetDateTime::now_utc())
					.await?;

				Ok(())
			}
		})
		.await?;
	}

	Ok(())
}

async fn mark_failed(state: &WorkerState, job: &IngestJob, err: &Error) -> Result<JobOutcome> {
	let now = OffsetDateTime::now_utc();
	let attempts = job.attempts.saturating_add(1);
	let (status, outcome) = if attempts >= state.ingest.max_job_attempts {
		(JobStatus::Errored, JobOutcome::Errored { attempts })
	} else {
		(JobStatus::Failed, JobOutcome::Failed { attempts })
	};
	let error_text = sanitize_job_error(&err.to_string());

	jobs::mark_job_failed(
		&state.db,
		job.job_id,
		status,
		attempts,
		&error_text,
		now + backoff_for_attempt(attempts),
		now,
	)
	.await?;

	tracing::error!(
		job_id = %job.job_id,
		attempts,
		status = %status,
		error = %error_text,
		"Ingestion job failed."
	);

	Ok(outcome)
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicU32, Ordering};

	use super::*;

	fn retry(limit: u32, backoff: Backoff) -> StepRetry {
		StepRetry { limit, delay_ms: 1, backoff }
	}

	#[test]
	fn step_delays_follow_the_configured_backoff() {
		let base = StepRetry { limit: 5, delay_ms: 1_000, backoff: Backoff::Constant };
		let delays = |backoff| {
			let retry = StepRetry { backoff, ..base.clone() };

			(1..=4).map(|n| step_delay(&retry, n).as_millis() as u64).collect::<Vec<_>>()
		};

		assert_eq!(delays(Backoff::Constant), vec![1_000, 1_000, 1_000, 1_000]);
		assert_eq!(delays(Backoff::Linear), vec![1_000, 2_000, 3_000, 4_000]);
		assert_eq!(delays(Backoff::Exponential), vec![1_000, 2_000, 4_000, 8_000]);
	}

	#[test]
	fn huge_retry_numbers_saturate() {
		let retry = StepRetry { limit: 100, delay_ms: 1_000, backoff: Backoff::Exponential };

		assert_eq!(step_delay(&retry, 90), StdDuration::from_millis(u64::MAX));
	}

	#[test]
	fn job_backoff_doubles_until_the_cap() {
		assert_eq!(backoff_for_attempt(0), Duration::milliseconds(500));
		assert_eq!(backoff_for_attempt(1), Duration::milliseconds(500));
		assert_eq!(backoff_for_attempt(3), Duration::milliseconds(2_000));
		assert_eq!(backoff_for_attempt(7), Duration::milliseconds(30_000));
		assert_eq!(backoff_for_attempt(50), Duration::milliseconds(30_000));
	}

	#[test]
	fn sanitize_redacts_provider_credentials() {
		let sanitized =
			sanitize_job_error("Request failed: Authorization: Bearer abc123 api_key=xyz");

		assert_eq!(
			sanitized,
			"Request failed: Authorization: Bearer [REDACTED] api_key=[REDACTED]"
		);

		let sanitized = sanitize_job_error("Rejected x-api-key: sk-ant-secret by upstream.");

		assert_eq!(sanitized, "Rejected x-api-key: [REDACTED] by upstream.");
		assert!(!sanitize_job_error("key sk-ant-abc leaked").contains("sk-ant-abc"));
	}

	#[test]
	fn sanitize_redacts_connection_string_credentials() {
		let sanitized =
			sanitize_job_error("Failed to connect to postgres://ragnote:hunter2@db:5432/notes.");

		assert_eq!(sanitized, "Failed to connect to postgres://[REDACTED]@db:5432/notes.");
		assert_eq!(
			sanitize_job_error("GET http://qdrant:6334/ failed"),
			"GET http://qdrant:6334/ failed"
		);
	}

	#[test]
	fn sanitize_truncates_long_errors() {
		let sanitized = sanitize_job_error(&"x".repeat(MAX_JOB_ERROR_CHARS + 10));

		assert_eq!(sanitized.chars().count(), MAX_JOB_ERROR_CHARS + 3);
		assert!(sanitized.ends_with("..."));
	}

	#[test]
	fn unsplit_jobs_have_exactly_one_chunk() {
		let text = "First paragraph.\n\nSecond paragraph.";
		let cfg = ChunkingConfig::new(10, 2);

		assert_eq!(split_job_text(text, false, &cfg), vec![text.to_string()]);
		assert!(split_job_text(text, true, &cfg).len() > 1);
	}

	#[tokio::test]
	async fn step_succeeds_after_transient_failures() {
		let calls = AtomicU32::new(0);
		let calls = &calls;
		let value = run_step(&retry(3, Backoff::Linear), "generate embedding: 1/1", || async move {
			if calls.fetch_add(1, Ordering::SeqCst) < 2 {
				return Err(Error::Message("Upstream timed out.".to_string()));
			}

			Ok(7)
		})
		.await
		.expect("Step should recover.");

		assert_eq!(value, 7);
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn step_gives_up_after_its_retry_limit() {
		let calls = AtomicU32::new(0);
		let calls = &calls;
		let err = run_step(&retry(2, Backoff::Constant), "insert vector: 2/3", || async move {
			calls.fetch_add(1, Ordering::SeqCst);

			Err::<(), _>(Error::Message("Qdrant unavailable.".to_string()))
		})
		.await
		.expect_err("Step should be exhausted.");

		assert_eq!(calls.load(Ordering::SeqCst), 3);
		assert!(matches!(
			err,
			Error::StepExhausted { ref step, attempts: 3, .. } if step == "insert vector: 2/3"
		));
	}
}
