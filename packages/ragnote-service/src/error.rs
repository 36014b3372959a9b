pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	/// The chat backend answered without usable text.
	#[error("No usable completion from {model_id}.")]
	NoCompletion { model_id: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Qdrant error: {message}")]
	Qdrant { message: String },
}
impl From<sqlx::Error> for Error {
	fn from(err: sqlx::Error) -> Self {
		Self::Storage { message: err.to_string() }
	}
}

impl From<ragnote_storage::Error> for Error {
	fn from(err: ragnote_storage::Error) -> Self {
		match err {
			ragnote_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			ragnote_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			ragnote_storage::Error::NotFound(message) => Self::NotFound { message },
			ragnote_storage::Error::Qdrant(inner) => Self::Qdrant { message: inner.to_string() },
		}
	}
}

impl From<ragnote_providers::Error> for Error {
	fn from(err: ragnote_providers::Error) -> Self {
		match err {
			ragnote_providers::Error::EmptyCompletion { model_id } => Self::NoCompletion { model_id },
			other => Self::Provider { message: other.to_string() },
		}
	}
}
