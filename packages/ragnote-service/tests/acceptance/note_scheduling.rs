use ragnote_service::CreateNoteRequest;
use ragnote_storage::{jobs, models::JobStatus};

use super::{build_service, recording_providers, test_db};

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set RAGNOTE_PG_DSN and RAGNOTE_QDRANT_URL to run."]
async fn created_notes_wait_as_pending_jobs() {
	let Some(test_db) = test_db().await else {
		eprintln!("Skipping created_notes_wait_as_pending_jobs; set RAGNOTE_PG_DSN.");

		return;
	};
	let (providers, _) = recording_providers();
	let Some(service) = build_service(&test_db, providers).await else {
		eprintln!("Skipping created_notes_wait_as_pending_jobs; set RAGNOTE_QDRANT_URL.");

		return;
	};
	let response = service
		.create_note(CreateNoteRequest {
			text: Some("The Lakers traded for a new center in 2025.".to_string()),
		})
		.await
		.expect("Create failed.");
	let job = jobs::fetch_job(&service.db, response.job_id)
		.await
		.expect("Failed to fetch job.")
		.expect("Job row missing.");

	assert_eq!(job.status, JobStatus::Pending.as_str());
	assert_eq!(job.text, "The Lakers traded for a new center in 2025.");
	assert!(!job.split_text);
	assert_eq!(job.chunk_count, None);
	assert!(service.list_notes().await.expect("List failed.").data.is_empty());

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
