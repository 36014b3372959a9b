use std::sync::Arc;

use ragnote_service::RagService;
use ragnote_storage::{db::Db, qdrant::QdrantStore};

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<RagService>,
}
impl AppState {
	pub async fn new(config: ragnote_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema(config.storage.qdrant.vector_dim).await?;

		let qdrant = QdrantStore::new(&config.storage.qdrant)?;

		qdrant.ensure_collection().await?;

		tracing::info!(
			chat_backend = ragnote_providers::chat::ChatBackend::select(&config.providers.chat)
				.provider_id(),
			text_splitting = config.ingest.enable_text_splitting,
			"Service state ready."
		);

		Ok(Self::from_service(RagService::new(config, db, qdrant)))
	}

	pub fn from_service(service: RagService) -> Self {
		Self { service: Arc::new(service) }
	}
}
