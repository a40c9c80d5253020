use std::sync::Arc;

use crate::{
	EmbeddingOracle, Error, Pooling, Result,
	measure::{CharCount, LengthMeasure, length_order},
};

/// Order-preserving batched encoder over an [`EmbeddingOracle`].
///
/// Texts are sorted by length before batching so each oracle call pads to a similar sequence
/// length; the pooled vectors are scattered back to input order before returning.
#[derive(Clone)]
pub struct Encoder {
	oracle: Arc<dyn EmbeddingOracle>,
	pooling: Pooling,
	batch_size: usize,
	measure: Arc<dyn LengthMeasure>,
}
impl Encoder {
	pub fn new(oracle: Arc<dyn EmbeddingOracle>, pooling: Pooling, batch_size: usize) -> Self {
		Self { oracle, pooling, batch_size: batch_size.max(1), measure: Arc::new(CharCount) }
	}

	pub fn with_length_measure(mut self, measure: Arc<dyn LengthMeasure>) -> Self {
		self.measure = measure;

		self
	}

	pub fn dimension(&self) -> usize {
		self.oracle.hidden_size()
	}

	pub fn pooling(&self) -> Pooling {
		self.pooling
	}

	pub fn batch_size(&self) -> usize {
		self.batch_size
	}

	/// Returns one vector per input, `result[i]` belonging to `texts[i]`.
	///
	/// Any failing batch fails the whole call.
	pub async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
		if texts.is_empty() {
			return Ok(Vec::new());
		}

		let order = length_order(texts, self.measure.as_ref());
		let sorted: Vec<String> = order.iter().map(|&pos| texts[pos].clone()).collect();
		let dim = self.dimension();
		let mut pooled = Vec::with_capacity(texts.len());

		for chunk in sorted.chunks(self.batch_size) {
			let states = self
				.oracle
				.embed_batch(chunk)
				.await
				.map_err(|err| Error::Oracle { message: format!("{err:#}") })?;

			if states.rows() != chunk.len() {
				return Err(Error::Shape {
					message: format!("{} rows returned for {} texts.", states.rows(), chunk.len()),
				});
			}
			if states.dim() != dim {
				return Err(Error::Shape {
					message: format!("hidden size {} does not match {dim}.", states.dim()),
				});
			}

			let pooling = self.pooling;
			let vectors = tokio::task::spawn_blocking(move || pooling.pool(&states)).await?;

			pooled.extend(vectors);
		}

		tracing::debug!(
			texts = texts.len(),
			batches = texts.len().div_ceil(self.batch_size),
			"Encoded texts."
		);

		let mut restored = vec![Vec::new(); texts.len()];

		for (pos, vector) in order.into_iter().zip(pooled) {
			restored[pos] = vector;
		}

		Ok(restored)
	}
}
