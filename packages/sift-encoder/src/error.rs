pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Embedding oracle failed: {message}")]
	Oracle { message: String },
	#[error("Embedding oracle returned an unexpected shape: {message}")]
	Shape { message: String },
	#[error("Pooling task failed: {message}")]
	Join { message: String },
	#[error("{message}")]
	InvalidConfig { message: String },
	#[error(transparent)]
	Tokenizer(#[from] tokenizers::Error),
}
impl From<tokio::task::JoinError> for Error {
	fn from(err: tokio::task::JoinError) -> Self {
		Self::Join { message: err.to_string() }
	}
}
