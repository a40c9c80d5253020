pub mod search;

mod error;

pub use error::{Error, ResolveError, Result};
pub use search::{Document, SearchRequest, TopMatch};
pub use sift_encoder::{BoxFuture, EmbeddingOracle};

use std::sync::Arc;

use tokio::sync::Semaphore;

use sift_config::Config;
use sift_encoder::{CharCount, Encoder, LengthMeasure, Pooling, TokenCount};
use sift_index::VectorIndex;
use sift_providers::{embedding::HttpOracle, pubmed::PubMedResolver};

/// Looks up the text of a document that arrived by id only.
pub trait TextResolver
where
	Self: Send + Sync,
{
	fn resolve<'a>(&'a self, uid: i64) -> BoxFuture<'a, Result<String, ResolveError>>;
}

impl TextResolver for PubMedResolver {
	fn resolve<'a>(&'a self, uid: i64) -> BoxFuture<'a, Result<String, ResolveError>> {
		Box::pin(async move { PubMedResolver::resolve(self, uid).await.map_err(ResolveError::from) })
	}
}

/// Search orchestration over one process-wide [`VectorIndex`].
///
/// The index is created once at startup with the oracle's hidden size and lives until the
/// service is dropped. Oracle calls and index work are bounded by `compute` permits.
pub struct SiftService {
	encoder: Encoder,
	index: Arc<VectorIndex>,
	resolver: Arc<dyn TextResolver>,
	compute: Arc<Semaphore>,
}
impl SiftService {
	pub fn new(
		encoder: Encoder,
		index: Arc<VectorIndex>,
		resolver: Arc<dyn TextResolver>,
		max_concurrency: usize,
	) -> Self {
		Self { encoder, index, resolver, compute: Arc::new(Semaphore::new(max_concurrency.max(1))) }
	}

	/// Wires the HTTP oracle, the PubMed resolver, and an empty index sized to the oracle.
	pub async fn from_config(cfg: &Config) -> Result<Self> {
		let pooling: Pooling = cfg.encoder.pooling.parse()?;
		let oracle = HttpOracle::connect(&cfg.providers.embedding, cfg.encoder.max_length).await?;
		let resolver = PubMedResolver::new(&cfg.providers.resolver)?;
		let measure: Arc<dyn LengthMeasure> = match cfg.encoder.tokenizer_repo.clone() {
			Some(repo) if cfg.encoder.length_measure == "tokens" => {
				let measure =
					tokio::task::spawn_blocking(move || TokenCount::from_pretrained(&repo)).await??;

				Arc::new(measure)
			},
			_ => Arc::new(CharCount),
		};
		let encoder = Encoder::new(Arc::new(oracle), pooling, cfg.encoder.batch_size as usize)
			.with_length_measure(measure);
		let index = Arc::new(VectorIndex::new(encoder.dimension()));

		tracing::info!(
			dim = index.dim(),
			batch_size = encoder.batch_size(),
			pooling = ?encoder.pooling(),
			"Search service ready."
		);

		Ok(Self::new(encoder, index, Arc::new(resolver), cfg.encoder.max_concurrency as usize))
	}

	pub fn index(&self) -> &Arc<VectorIndex> {
		&self.index
	}
}
