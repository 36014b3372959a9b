use ragnote_service::QueryRequest;

use super::{build_service, recording_providers, seed_note, test_db};

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set RAGNOTE_PG_DSN and RAGNOTE_QDRANT_URL to run."]
async fn closest_note_becomes_the_only_context() {
	let Some(test_db) = test_db().await else {
		eprintln!("Skipping closest_note_becomes_the_only_context; set RAGNOTE_PG_DSN.");

		return;
	};
	let (providers, prompts) = recording_providers();
	let Some(service) = build_service(&test_db, providers).await else {
		eprintln!("Skipping closest_note_becomes_the_only_context; set RAGNOTE_QDRANT_URL.");

		return;
	};
	let lakers = seed_note(&service, "The Lakers traded for a new center in 2025.").await;

	seed_note(&service, "The Celtics won the 2024 title.").await;

	let response = service
		.query(QueryRequest { text: Some("Who did the Lakers trade for?".to_string()) })
		.await
		.expect("Query failed.");

	assert_eq!(response.answer, "They traded for a center.");
	assert_eq!(response.model_id, "stub-chat");
	assert_eq!(response.context_note_ids, vec![lakers]);

	let prompts = prompts.lock().expect("Prompt log poisoned.");

	assert_eq!(
		prompts[0].context.as_deref(),
		Some("Context:\n- The Lakers traded for a new center in 2025.")
	);
	assert_eq!(prompts[0].system, service.cfg.query.system_prompt);

	drop(prompts);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set RAGNOTE_PG_DSN and RAGNOTE_QDRANT_URL to run."]
async fn empty_index_answers_without_context() {
	let Some(test_db) = test_db().await else {
		eprintln!("Skipping empty_index_answers_without_context; set RAGNOTE_PG_DSN.");

		return;
	};
	let (providers, prompts) = recording_providers();
	let Some(service) = build_service(&test_db, providers).await else {
		eprintln!("Skipping empty_index_answers_without_context; set RAGNOTE_QDRANT_URL.");

		return;
	};
	let response = service
		.query(QueryRequest { text: Some("Who won the title?".to_string()) })
		.await
		.expect("Query over an empty index should still answer.");

	assert!(response.context_note_ids.is_empty());
	assert_eq!(prompts.lock().expect("Prompt log poisoned.")[0].context, None);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set RAGNOTE_PG_DSN and RAGNOTE_QDRANT_URL to run."]
async fn vector_without_a_row_reads_as_no_match() {
	let Some(test_db) = test_db().await else {
		eprintln!("Skipping vector_without_a_row_reads_as_no_match; set RAGNOTE_PG_DSN.");

		return;
	};
	let (providers, prompts) = recording_providers();
	let Some(service) = build_service(&test_db, providers).await else {
		eprintln!("Skipping vector_without_a_row_reads_as_no_match; set RAGNOTE_QDRANT_URL.");

		return;
	};
	let note_id = seed_note(&service, "The Lakers traded for a new center in 2025.").await;

	ragnote_storage::queries::delete_note(&service.db, note_id)
		.await
		.expect("Failed to delete row.");

	let response = service
		.query(QueryRequest { text: Some("Lakers trades?".to_string()) })
		.await
		.expect("Query failed.");

	assert!(response.context_note_ids.is_empty());
	assert_eq!(prompts.lock().expect("Prompt log poisoned.")[0].context, None);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
