//! Text to fixed-size vectors: batching, pooling, and the oracle seam they sit on.

pub mod batch;
pub mod measure;
pub mod pooling;
pub mod states;

mod error;

pub use batch::Encoder;
pub use error::{Error, Result};
pub use measure::{CharCount, LengthMeasure, TokenCount};
pub use pooling::Pooling;
pub use states::TokenStates;

use std::{future::Future, pin::Pin};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The model that maps a batch of texts to per-token hidden states.
pub trait EmbeddingOracle
where
	Self: Send + Sync,
{
	/// Width of each token's hidden state. Fixed for the lifetime of the oracle.
	fn hidden_size(&self) -> usize;

	fn embed_batch<'a>(
		&'a self,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<TokenStates>>;
}
