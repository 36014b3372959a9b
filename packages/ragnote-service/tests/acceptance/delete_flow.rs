use ragnote_service::QueryRequest;

use super::{build_service, recording_providers, seed_note, test_db};

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set RAGNOTE_PG_DSN and RAGNOTE_QDRANT_URL to run."]
async fn deleted_notes_are_never_retrieved_again() {
	let Some(test_db) = test_db().await else {
		eprintln!("Skipping deleted_notes_are_never_retrieved_again; set RAGNOTE_PG_DSN.");

		return;
	};
	let (providers, _) = recording_providers();
	let Some(service) = build_service(&test_db, providers).await else {
		eprintln!("Skipping deleted_notes_are_never_retrieved_again; set RAGNOTE_QDRANT_URL.");

		return;
	};
	let lakers = seed_note(&service, "The Lakers traded for a new center in 2025.").await;
	let celtics = seed_note(&service, "The Celtics won the 2024 title.").await;
	let deleted = service.delete_note(lakers).await.expect("Delete failed.");

	assert!(deleted.deleted);

	let listed = service.list_notes().await.expect("List failed.");

	assert_eq!(listed.data.iter().map(|note| note.id).collect::<Vec<_>>(), vec![celtics]);

	let nearest = service
		.qdrant
		.nearest_note_ids(super::axis_vector("Lakers"), 3)
		.await
		.expect("Vector query failed.");

	assert!(!nearest.contains(&lakers));

	let response = service
		.query(QueryRequest { text: Some("Lakers?".to_string()) })
		.await
		.expect("Query failed.");

	assert!(!response.context_note_ids.contains(&lakers));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set RAGNOTE_PG_DSN and RAGNOTE_QDRANT_URL to run."]
async fn deleting_an_unknown_id_is_not_an_error() {
	let Some(test_db) = test_db().await else {
		eprintln!("Skipping deleting_an_unknown_id_is_not_an_error; set RAGNOTE_PG_DSN.");

		return;
	};
	let (providers, _) = recording_providers();
	let Some(service) = build_service(&test_db, providers).await else {
		eprintln!("Skipping deleting_an_unknown_id_is_not_an_error; set RAGNOTE_QDRANT_URL.");

		return;
	};
	let response = service.delete_note(987_654).await.expect("Delete of a missing id failed.");

	assert!(!response.deleted);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
