mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Backoff, ChatProviders, Config, DEFAULT_SYSTEM_PROMPT, EmbeddingProviderConfig,
	EmbeddingSchema, HostedChatConfig, Ingest, ManagedChatConfig, Postgres, Providers, Qdrant,
	Query, Service, StepRetry, Storage,
};

use std::{env, fs, path::Path};

/// Environment variable that supplies the hosted chat API key when the config leaves it blank.
pub const HOSTED_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;
	let hosted_api_key = env::var(HOSTED_API_KEY_ENV).ok();

	normalize(&mut cfg, hosted_api_key.as_deref());

	validate(&cfg)?;

	Ok(cfg)
}

/// Fills the hosted chat key from `hosted_api_key` when blank, and drops the hosted backend
/// entirely when no key remains.
pub fn normalize(cfg: &mut Config, hosted_api_key: Option<&str>) {
	let env_key = hosted_api_key.map(str::trim).filter(|key| !key.is_empty());

	match cfg.providers.chat.hosted.as_mut() {
		Some(hosted) =>
			if hosted.api_key.trim().is_empty()
				&& let Some(key) = env_key
			{
				hosted.api_key = key.to_string();
			},
		None =>
			if let Some(key) = env_key {
				cfg.providers.chat.hosted =
					Some(HostedChatConfig { api_key: key.to_string(), ..Default::default() });
			},
	}

	if cfg
		.providers
		.chat
		.hosted
		.as_ref()
		.map(|hosted| hosted.api_key.trim().is_empty())
		.unwrap_or(false)
	{
		cfg.providers.chat.hosted = None;
	}
	if cfg.service.log_level.trim().is_empty() {
		cfg.service.log_level = "info".to_string();
	}
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.postgres.dsn must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.storage.qdrant.collection.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.qdrant.collection must be non-empty.".to_string(),
		});
	}
	if cfg.storage.qdrant.vector_dim == 0 {
		return Err(Error::Validation {
			message: "storage.qdrant.vector_dim must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}

	for (label, api_base, model, timeout_ms) in [
		(
			"providers.embedding",
			&cfg.providers.embedding.api_base,
			&cfg.providers.embedding.model,
			cfg.providers.embedding.timeout_ms,
		),
		(
			"providers.chat.managed",
			&cfg.providers.chat.managed.api_base,
			&cfg.providers.chat.managed.model,
			cfg.providers.chat.managed.timeout_ms,
		),
	] {
		if api_base.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label}.api_base must be non-empty.") });
		}
		if model.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label}.model must be non-empty.") });
		}
		if timeout_ms == 0 {
			return Err(Error::Validation {
				message: format!("{label}.timeout_ms must be greater than zero."),
			});
		}
	}
	for (label, key) in [
		("embedding", &cfg.providers.embedding.api_key),
		("chat.managed", &cfg.providers.chat.managed.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	if let Some(hosted) = cfg.providers.chat.hosted.as_ref() {
		if hosted.model.trim().is_empty() {
			return Err(Error::Validation {
				message: "providers.chat.hosted.model must be non-empty.".to_string(),
			});
		}
		if hosted.max_tokens == 0 {
			return Err(Error::Validation {
				message: "providers.chat.hosted.max_tokens must be greater than zero.".to_string(),
			});
		}
		if hosted.timeout_ms == 0 {
			return Err(Error::Validation {
				message: "providers.chat.hosted.timeout_ms must be greater than zero.".to_string(),
			});
		}
	}

	if cfg.query.top_k == 0 {
		return Err(Error::Validation {
			message: "query.top_k must be greater than zero.".to_string(),
		});
	}
	if cfg.query.system_prompt.trim().is_empty() {
		return Err(Error::Validation {
			message: "query.system_prompt must be non-empty.".to_string(),
		});
	}
	if cfg.ingest.chunk_size == 0 {
		return Err(Error::Validation {
			message: "ingest.chunk_size must be greater than zero.".to_string(),
		});
	}
	if cfg.ingest.chunk_overlap >= cfg.ingest.chunk_size {
		return Err(Error::Validation {
			message: "ingest.chunk_overlap must be less than ingest.chunk_size.".to_string(),
		});
	}
	if cfg.ingest.max_job_attempts <= 0 {
		return Err(Error::Validation {
			message: "ingest.max_job_attempts must be greater than zero.".to_string(),
		});
	}
	if cfg.ingest.poll_interval_ms == 0 {
		return Err(Error::Validation {
			message: "ingest.poll_interval_ms must be greater than zero.".to_string(),
		});
	}

	Ok(())
}
