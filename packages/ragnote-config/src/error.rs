use std::{io, path::PathBuf};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Failed to read config file {path:?}.")]
	ReadConfig {
		path: PathBuf,
		#[source]
		source: io::Error,
	},
	#[error("Failed to parse config file {path:?}: {source}")]
	ParseConfig {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},
	/// The first rule the loaded config violates, named by its dotted field path.
	#[error("{message}")]
	Validation { message: String },
}
