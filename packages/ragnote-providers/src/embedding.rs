use ragnote_config::{EmbeddingProviderConfig, EmbeddingSchema};
use serde_json::Value;

use crate::{Error, Result};

/// Embeds `texts` and returns one vector per input, in input order.
pub async fn embed(cfg: &EmbeddingProviderConfig, texts: &[String]) -> Result<Vec<Vec<f32>>> {
	let client = crate::http_client(cfg.timeout_ms)?;
	let body = match cfg.schema {
		EmbeddingSchema::OpenAi => serde_json::json!({
			"model": cfg.model,
			"input": texts,
			"dimensions": cfg.dimensions,
		}),
		EmbeddingSchema::WorkersAi => serde_json::json!({ "text": texts }),
	};
	let res = client
		.post(crate::endpoint(&cfg.api_base, &cfg.path))
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;
	let vectors = match cfg.schema {
		EmbeddingSchema::OpenAi => parse_openai_response(json)?,
		EmbeddingSchema::WorkersAi => parse_workers_ai_response(json)?,
	};

	if vectors.len() != texts.len() {
		return Err(Error::InvalidResponse {
			message: format!(
				"Embedding response returned {} vectors for {} inputs.",
				vectors.len(),
				texts.len()
			),
		});
	}
	if let Some(vector) = vectors.iter().find(|vector| vector.len() != cfg.dimensions as usize) {
		return Err(Error::InvalidResponse {
			message: format!(
				"Embedding has {} dimensions but {} are configured.",
				vector.len(),
				cfg.dimensions
			),
		});
	}

	Ok(vectors)
}

fn parse_openai_response(json: Value) -> Result<Vec<Vec<f32>>> {
	let data = json.get("data").and_then(Value::as_array).ok_or_else(|| Error::InvalidResponse {
		message: "Embedding response is missing data array.".to_string(),
	})?;
	let mut indexed = Vec::with_capacity(data.len());

	for (fallback_index, item) in data.iter().enumerate() {
		let index = item
			.get("index")
			.and_then(Value::as_u64)
			.map(|index| index as usize)
			.unwrap_or(fallback_index);
		let embedding = item.get("embedding").ok_or_else(|| Error::InvalidResponse {
			message: "Embedding item missing embedding array.".to_string(),
		})?;

		indexed.push((index, parse_vector(embedding)?));
	}

	indexed.sort_by_key(|(index, _)| *index);

	Ok(indexed.into_iter().map(|(_, vec)| vec).collect())
}

fn parse_workers_ai_response(json: Value) -> Result<Vec<Vec<f32>>> {
	let data = json
		.get("result")
		.unwrap_or(&json)
		.get("data")
		.and_then(Value::as_array)
		.ok_or_else(|| Error::InvalidResponse {
			message: "Embedding response is missing data array.".to_string(),
		})?;

	data.iter().map(parse_vector).collect()
}

fn parse_vector(value: &Value) -> Result<Vec<f32>> {
	let values = value.as_array().ok_or_else(|| Error::InvalidResponse {
		message: "Embedding must be an array.".to_string(),
	})?;

	if values.is_empty() {
		return Err(Error::InvalidResponse { message: "Embedding is empty.".to_string() });
	}

	values
		.iter()
		.map(|number| {
			number.as_f64().map(|number| number as f32).ok_or_else(|| Error::InvalidResponse {
				message: "Embedding value must be numeric.".to_string(),
			})
		})
		.collect()
}
