use qdrant_client::{
	Qdrant, QdrantError,
	client::Payload,
	qdrant::{
		CreateCollectionBuilder, DeletePointsBuilder, Distance, PointId, PointStruct,
		PointsIdsList, Query, QueryPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
		point_id::PointIdOptions,
	},
};

use crate::{Error, Result};

/// Vector index keyed by note id. Each note owns at most one point, whose id is the note id.
pub struct QdrantStore {
	pub client: Qdrant,
	pub collection: String,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &ragnote_config::Qdrant) -> Result<Self> {
		let client = Qdrant::from_url(&cfg.url).build()?;

		Ok(Self { client, collection: cfg.collection.clone(), vector_dim: cfg.vector_dim })
	}

	pub async fn ensure_collection(&self) -> Result<()> {
		if self.client.collection_exists(self.collection.clone()).await? {
			return Ok(());
		}

		let create = CreateCollectionBuilder::new(self.collection.clone())
			.vectors_config(VectorParamsBuilder::new(self.vector_dim.into(), Distance::Cosine));

		match self.client.create_collection(create).await {
			Ok(_) => {
				tracing::info!(collection = %self.collection, "Created Qdrant collection.");
			},
			// Another process won the race.
			Err(err) if is_already_exists_error(&err) => {},
			Err(err) => return Err(err.into()),
		}

		Ok(())
	}

	pub async fn upsert_note_vector(&self, note_id: i64, vector: Vec<f32>) -> Result<()> {
		if vector.len() != self.vector_dim as usize {
			return Err(Error::InvalidArgument(format!(
				"Embedding dimension {} does not match configured vector_dim {}.",
				vector.len(),
				self.vector_dim
			)));
		}

		let point = PointStruct::new(note_point_id(note_id)?, vector, Payload::new());
		let upsert = UpsertPointsBuilder::new(self.collection.clone(), vec![point]).wait(true);

		self.client.upsert_points(upsert).await?;

		Ok(())
	}

	/// Note ids of the `limit` nearest points, closest first. Ties keep Qdrant's order.
	pub async fn nearest_note_ids(&self, vector: Vec<f32>, limit: u64) -> Result<Vec<i64>> {
		let search = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(vector))
			.limit(limit);
		let response = self.client.query(search).await?;

		Ok(response
			.result
			.iter()
			.filter_map(|point| point.id.as_ref())
			.filter_map(point_id_to_note_id)
			.collect())
	}

	/// Missing points are not an error.
	pub async fn delete_note_vectors(&self, note_ids: &[i64]) -> Result<()> {
		let ids = note_ids.iter().map(|id| note_point_id(*id)).collect::<Result<Vec<_>>>()?;
		let delete = DeletePointsBuilder::new(self.collection.clone())
			.points(PointsIdsList { ids })
			.wait(true);

		match self.client.delete_points(delete).await {
			Ok(_) => {},
			Err(err) =>
				if is_not_found_error(&err) {
					tracing::info!(?note_ids, "Qdrant points missing during delete.");
				} else {
					return Err(err.into());
				},
		}

		Ok(())
	}
}

pub fn note_point_id(note_id: i64) -> Result<PointId> {
	let id = u64::try_from(note_id).map_err(|_| {
		Error::InvalidArgument(format!("Note id {note_id} cannot be used as a point id."))
	})?;

	Ok(PointId::from(id))
}

pub fn point_id_to_note_id(point_id: &PointId) -> Option<i64> {
	match &point_id.point_id_options {
		Some(PointIdOptions::Num(id)) => i64::try_from(*id).ok(),
		Some(PointIdOptions::Uuid(raw)) => raw.parse().ok(),
		None => None,
	}
}

fn is_not_found_error(err: &QdrantError) -> bool {
	let message = err.to_string().to_lowercase();
	let point_not_found =
		(message.contains("not found") || message.contains("404")) && message.contains("point");
	let no_point_found = message.contains("no point") && message.contains("found");

	point_not_found || no_point_found
}

fn is_already_exists_error(err: &QdrantError) -> bool {
	err.to_string().to_lowercase().contains("already exists")
}
