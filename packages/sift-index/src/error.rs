#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Got {ids} ids but {vectors} vectors.")]
	LengthMismatch { ids: usize, vectors: usize },
	#[error("Vector has dimension {actual}, index expects {expected}.")]
	Dimension { expected: usize, actual: usize },
	#[error("Vector for id {id:?} contains a non-finite value.")]
	NonFinite { id: Option<i64> },
}
