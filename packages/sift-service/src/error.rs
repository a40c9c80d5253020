pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Query {uid} could not be resolved: {message}")]
	QueryUnresolvable { uid: i64, message: String },
	#[error("Resolver error: {message}")]
	Resolver { message: String },
	#[error(transparent)]
	Encoder(#[from] sift_encoder::Error),
	#[error(transparent)]
	Index(#[from] sift_index::Error),
	#[error("Document {uid} was not scored against the query.")]
	Unscored { uid: i64 },
	#[error("Compute task failed: {message}")]
	Compute { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
}
impl From<tokio::task::JoinError> for Error {
	fn from(err: tokio::task::JoinError) -> Self {
		Self::Compute { message: err.to_string() }
	}
}

impl From<tokio::sync::AcquireError> for Error {
	fn from(err: tokio::sync::AcquireError) -> Self {
		Self::Compute { message: err.to_string() }
	}
}

impl From<sift_providers::Error> for Error {
	fn from(err: sift_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}

/// Failure reported by a [`crate::TextResolver`].
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
	/// The id is unknown or malformed upstream. Callers may degrade instead of failing.
	#[error("No text found for uid {uid}.")]
	NotFound { uid: i64 },
	#[error("{message}")]
	Transport { message: String },
}
impl From<sift_providers::Error> for ResolveError {
	fn from(err: sift_providers::Error) -> Self {
		match err {
			sift_providers::Error::NotFound { uid } => Self::NotFound { uid },
			other => Self::Transport { message: other.to_string() },
		}
	}
}
