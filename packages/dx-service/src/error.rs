use dx_domain::SchemaError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Failed to parse JSON reply: {message}")]
	JsonParse { message: String },
	#[error(transparent)]
	Provider(#[from] dx_providers::Error),
	#[error(transparent)]
	Schema(#[from] SchemaError),
}
