//! Deterministic stand-ins for the embedding oracle and the text resolver.

use std::sync::{
	Arc,
	atomic::{AtomicUsize, Ordering},
};

use ahash::{AHashMap, AHashSet};
use color_eyre::eyre;

use sift_encoder::{BoxFuture, EmbeddingOracle, Encoder, Pooling, TokenStates};
use sift_index::VectorIndex;
use sift_service::{ResolveError, SiftService, TextResolver};

pub const TEST_DIM: usize = 16;

/// Written into padded positions so a pooling bug shows up as a wrong score.
const PAD_VALUE: f32 = 1_000.0;

/// One token per whitespace-separated word, each word hashed to a fixed non-negative vector.
///
/// Identical texts embed identically and an empty text pools to the zero vector.
pub struct HashingOracle {
	dim: usize,
	batches: AtomicUsize,
	texts: AtomicUsize,
}
impl HashingOracle {
	pub fn new(dim: usize) -> Self {
		Self { dim, batches: AtomicUsize::new(0), texts: AtomicUsize::new(0) }
	}

	pub fn batches(&self) -> usize {
		self.batches.load(Ordering::SeqCst)
	}

	/// Total texts sent to the oracle so far.
	pub fn embedded_texts(&self) -> usize {
		self.texts.load(Ordering::SeqCst)
	}

	fn word_vector(&self, word: &str) -> Vec<f32> {
		(0..self.dim)
			.map(|component| {
				let hash = fnv1a(word.as_bytes(), component as u64);

				(hash % 1_000) as f32 / 1_000.0
			})
			.collect()
	}
}
impl Default for HashingOracle {
	fn default() -> Self {
		Self::new(TEST_DIM)
	}
}
impl EmbeddingOracle for HashingOracle {
	fn hidden_size(&self) -> usize {
		self.dim
	}

	fn embed_batch<'a>(
		&'a self,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<TokenStates>> {
		self.batches.fetch_add(1, Ordering::SeqCst);
		self.texts.fetch_add(texts.len(), Ordering::SeqCst);

		let words: Vec<Vec<&str>> = texts.iter().map(|text| text.split_whitespace().collect()).collect();
		let tokens = words.iter().map(Vec::len).max().unwrap_or(0).max(1);
		let mut hidden = Vec::with_capacity(texts.len() * tokens * self.dim);
		let mut mask = Vec::with_capacity(texts.len() * tokens);

		for row in &words {
			for position in 0..tokens {
				match row.get(position) {
					Some(word) => {
						hidden.extend(self.word_vector(word));
						mask.push(1);
					},
					None => {
						hidden.extend(std::iter::repeat_n(PAD_VALUE, self.dim));
						mask.push(0);
					},
				}
			}
		}

		let states = TokenStates::new(texts.len(), tokens, self.dim, hidden, mask);

		Box::pin(async move { Ok(states?) })
	}
}

/// Fails every batch.
pub struct FailingOracle {
	pub dim: usize,
}
impl EmbeddingOracle for FailingOracle {
	fn hidden_size(&self) -> usize {
		self.dim
	}

	fn embed_batch<'a>(
		&'a self,
		_texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<TokenStates>> {
		Box::pin(async move { Err(eyre::eyre!("model server unavailable")) })
	}
}

/// Resolves ids from a fixed table. Unknown ids are `NotFound`; `unreachable` ids are transport
/// failures.
#[derive(Default)]
pub struct StaticResolver {
	texts: AHashMap<i64, String>,
	unreachable: AHashSet<i64>,
	calls: AtomicUsize,
}
impl StaticResolver {
	pub fn new<I, S>(entries: I) -> Self
	where
		I: IntoIterator<Item = (i64, S)>,
		S: Into<String>,
	{
		Self {
			texts: entries.into_iter().map(|(uid, text)| (uid, text.into())).collect(),
			..Default::default()
		}
	}

	pub fn with_unreachable(mut self, uid: i64) -> Self {
		self.unreachable.insert(uid);

		self
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl TextResolver for StaticResolver {
	fn resolve<'a>(&'a self, uid: i64) -> BoxFuture<'a, Result<String, ResolveError>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let result = if self.unreachable.contains(&uid) {
			Err(ResolveError::Transport { message: format!("connection reset while fetching {uid}") })
		} else {
			self.texts.get(&uid).cloned().ok_or(ResolveError::NotFound { uid })
		};

		Box::pin(async move { result })
	}
}

/// A service over fresh doubles, returned with handles to inspect them.
pub struct TestService {
	pub service: SiftService,
	pub oracle: Arc<HashingOracle>,
	pub resolver: Arc<StaticResolver>,
}

pub fn test_service(resolver: StaticResolver) -> TestService {
	test_service_with_batch_size(resolver, 4)
}

pub fn test_service_with_batch_size(resolver: StaticResolver, batch_size: usize) -> TestService {
	let oracle = Arc::new(HashingOracle::default());
	let resolver = Arc::new(resolver);
	let encoder = Encoder::new(oracle.clone(), Pooling::Mean, batch_size);
	let index = Arc::new(VectorIndex::new(encoder.dimension()));
	let service = SiftService::new(encoder, index, resolver.clone(), 2);

	TestService { service, oracle, resolver }
}

fn fnv1a(bytes: &[u8], seed: u64) -> u64 {
	let mut hash = 0xcbf2_9ce4_8422_2325_u64 ^ seed.wrapping_mul(0x9e37_79b9_7f4a_7c15);

	for byte in bytes {
		hash ^= u64::from(*byte);
		hash = hash.wrapping_mul(0x0100_0000_01b3);
	}

	hash
}
