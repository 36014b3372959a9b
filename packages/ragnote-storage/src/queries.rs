use sqlx::{Executor, Postgres, Transaction};

use crate::{Result, db::Db, models::Note};

pub async fn list_notes(db: &Db) -> Result<Vec<Note>> {
	let notes = sqlx::query_as::<_, Note>("SELECT id, text FROM notes ORDER BY id ASC")
		.fetch_all(&db.pool)
		.await?;

	Ok(notes)
}

pub async fn fetch_notes_by_id(db: &Db, id: i64) -> Result<Vec<Note>> {
	let notes = sqlx::query_as::<_, Note>("SELECT id, text FROM notes WHERE id = $1")
		.bind(id)
		.fetch_all(&db.pool)
		.await?;

	Ok(notes)
}

/// Returns the number of removed rows. Zero is not an error.
pub async fn delete_note(db: &Db, id: i64) -> Result<u64> {
	delete_note_exec(&db.pool, id).await
}

pub async fn insert_note_tx(
	tx: &mut Transaction<'_, Postgres>,
	text: &str,
) -> Result<Option<Note>> {
	insert_note_exec(&mut **tx, text).await
}

async fn insert_note_exec<'e, E>(executor: E, text: &str) -> Result<Option<Note>>
where
	E: Executor<'e, Database = Postgres>,
{
	let note =
		sqlx::query_as::<_, Note>("INSERT INTO notes (text) VALUES ($1) RETURNING id, text")
			.bind(text)
			.fetch_optional(executor)
			.await?;

	Ok(note)
}

async fn delete_note_exec<'e, E>(executor: E, id: i64) -> Result<u64>
where
	E: Executor<'e, Database = Postgres>,
{
	let result = sqlx::query("DELETE FROM notes WHERE id = $1").bind(id).execute(executor).await?;

	Ok(result.rows_affected())
}
