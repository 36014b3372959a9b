pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("{0}")]
	Message(String),
	#[error("Step {step:?} failed after {attempts} attempts: {message}")]
	StepExhausted { step: String, attempts: u32, message: String },
	#[error(transparent)]
	Storage(#[from] ragnote_storage::Error),
	#[error(transparent)]
	Provider(#[from] ragnote_providers::Error),
}
