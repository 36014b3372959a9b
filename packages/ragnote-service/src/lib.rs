pub mod delete;
pub mod list;
pub mod notes;
pub mod query;

mod error;

pub use delete::DeleteResponse;
pub use error::{Error, Result};
pub use list::{ListResponse, NoteItem};
pub use notes::{CreateNoteRequest, CreateNoteResponse};
pub use query::{QueryRequest, QueryResponse};

use std::{future::Future, pin::Pin, sync::Arc};

use ragnote_config::{ChatProviders, Config, EmbeddingProviderConfig};
use ragnote_providers::{
	chat::{ChatBackend, ChatCompletion, ChatPrompt},
	embedding,
};
use ragnote_storage::{db::Db, qdrant::QdrantStore};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, ragnote_providers::Result<Vec<Vec<f32>>>>;
}

pub trait ChatProvider
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		cfg: &'a ChatProviders,
		prompt: &'a ChatPrompt,
	) -> BoxFuture<'a, ragnote_providers::Result<ChatCompletion>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub chat: Arc<dyn ChatProvider>,
}
impl Providers {
	pub fn new(embedding: Arc<dyn EmbeddingProvider>, chat: Arc<dyn ChatProvider>) -> Self {
		Self { embedding, chat }
	}
}

impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { embedding: provider.clone(), chat: provider }
	}
}

pub struct RagService {
	pub cfg: Config,
	pub db: Db,
	pub qdrant: QdrantStore,
	pub providers: Providers,
}
impl RagService {
	pub fn new(cfg: Config, db: Db, qdrant: QdrantStore) -> Self {
		Self { cfg, db, qdrant, providers: Providers::default() }
	}

	pub fn with_providers(cfg: Config, db: Db, qdrant: QdrantStore, providers: Providers) -> Self {
		Self { cfg, db, qdrant, providers }
	}
}

struct DefaultProviders;
impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, ragnote_providers::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}
impl ChatProvider for DefaultProviders {
	fn complete<'a>(
		&'a self,
		cfg: &'a ChatProviders,
		prompt: &'a ChatPrompt,
	) -> BoxFuture<'a, ragnote_providers::Result<ChatCompletion>> {
		Box::pin(ChatBackend::select(cfg).complete(prompt))
	}
}
