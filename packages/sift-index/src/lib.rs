//! Exact cosine-similarity index keyed by 64-bit document ids.
//!
//! Vectors are L2-normalized once on the way in, so a search is a single pass of inner products
//! against the stored rows. Mutation is insert-only.

mod error;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

use std::cmp::Ordering;

use ahash::AHashMap;
use parking_lot::RwLock;

/// One search result. Higher `score` is more similar.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hit {
	pub id: i64,
	pub score: f32,
}

pub struct VectorIndex {
	dim: usize,
	inner: RwLock<Rows>,
}

#[derive(Default)]
struct Rows {
	ids: Vec<i64>,
	slots: AHashMap<i64, usize>,
	data: Vec<f32>,
}
impl Rows {
	fn row(&self, slot: usize, dim: usize) -> &[f32] {
		&self.data[slot * dim..(slot + 1) * dim]
	}
}

impl VectorIndex {
	pub fn new(dim: usize) -> Self {
		Self { dim, inner: RwLock::new(Rows::default()) }
	}

	pub fn dim(&self) -> usize {
		self.dim
	}

	/// Number of distinct stored ids.
	pub fn len(&self) -> usize {
		self.inner.read().ids.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn contains(&self, id: i64) -> bool {
		self.inner.read().slots.contains_key(&id)
	}

	/// The stored (unit-length) vector for `id`.
	pub fn get(&self, id: i64) -> Option<Vec<f32>> {
		let rows = self.inner.read();

		rows.slots.get(&id).map(|&slot| rows.row(slot, self.dim).to_vec())
	}

	/// Stores each `(id, vector)` pair whose id is not yet present and returns how many were added.
	///
	/// Existing ids, including repeats earlier in the same call, are skipped. The whole call is
	/// validated before anything is written and readers never see a partial insert.
	pub fn insert_if_absent(&self, ids: &[i64], vectors: &[Vec<f32>]) -> Result<usize> {
		if ids.len() != vectors.len() {
			return Err(Error::LengthMismatch { ids: ids.len(), vectors: vectors.len() });
		}

		let mut normalized = Vec::with_capacity(vectors.len());

		for (&id, vector) in ids.iter().zip(vectors) {
			normalized.push(self.normalized(vector, Some(id))?);
		}

		let mut rows = self.inner.write();
		let mut added = 0;

		for (id, vector) in ids.iter().copied().zip(normalized) {
			if rows.slots.contains_key(&id) {
				continue;
			}

			let slot = rows.ids.len();

			rows.ids.push(id);
			rows.slots.insert(id, slot);
			rows.data.extend(vector);

			added += 1;
		}

		tracing::debug!(added, skipped = ids.len() - added, total = rows.ids.len(), "Indexed vectors.");

		Ok(added)
	}

	/// The `min(k, len())` stored ids most similar to `query`, by descending score.
	///
	/// Equal scores are ordered by ascending id.
	pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Hit>> {
		let query = self.normalized(query, None)?;
		let rows = self.inner.read();
		let k = k.min(rows.ids.len());

		if k == 0 {
			return Ok(Vec::new());
		}

		let mut hits: Vec<Hit> = rows
			.ids
			.iter()
			.enumerate()
			.map(|(slot, &id)| Hit { id, score: dot(&query, rows.row(slot, self.dim)) })
			.collect();

		drop(rows);

		if k < hits.len() {
			hits.select_nth_unstable_by(k - 1, by_score_then_id);
			hits.truncate(k);
		}

		hits.sort_unstable_by(by_score_then_id);

		Ok(hits)
	}

	fn normalized(&self, vector: &[f32], id: Option<i64>) -> Result<Vec<f32>> {
		if vector.len() != self.dim {
			return Err(Error::Dimension { expected: self.dim, actual: vector.len() });
		}
		if vector.iter().any(|value| !value.is_finite()) {
			return Err(Error::NonFinite { id });
		}

		Ok(l2_normalize(vector))
	}
}

/// Unit-length copy of `vector`. The zero vector is returned unchanged.
///
/// Components are first divided by the largest magnitude so squaring cannot overflow or
/// underflow for any finite input.
pub fn l2_normalize(vector: &[f32]) -> Vec<f32> {
	let scale = vector.iter().fold(0.0_f32, |max, value| max.max(value.abs()));

	if scale == 0.0 {
		return vector.to_vec();
	}

	let scaled: Vec<f32> = vector.iter().map(|value| value / scale).collect();
	let norm = dot(&scaled, &scaled).sqrt();

	scaled.into_iter().map(|value| value / norm).collect()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
	a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Descending score, then ascending id. The order every search result is returned in.
pub fn by_score_then_id(a: &Hit, b: &Hit) -> Ordering {
	b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn index_with(entries: &[(i64, [f32; 2])]) -> VectorIndex {
		let index = VectorIndex::new(2);
		let ids: Vec<i64> = entries.iter().map(|(id, _)| *id).collect();
		let vectors: Vec<Vec<f32>> = entries.iter().map(|(_, v)| v.to_vec()).collect();

		index.insert_if_absent(&ids, &vectors).expect("insert failed");

		index
	}

	#[test]
	fn stores_unit_vectors() {
		let index = index_with(&[(7, [3.0, 4.0])]);
		let stored = index.get(7).expect("id 7 must be stored");

		assert!((stored[0] - 0.6).abs() < 1e-6);
		assert!((stored[1] - 0.8).abs() < 1e-6);
	}

	#[test]
	fn insert_is_idempotent() {
		let index = index_with(&[(1, [1.0, 0.0]), (2, [0.0, 1.0])]);
		let before = index.search(&[1.0, 1.0], 5).expect("search failed");
		let added =
			index.insert_if_absent(&[1, 2], &[vec![1.0, 0.0], vec![0.0, 1.0]]).expect("insert failed");

		assert_eq!(added, 0);
		assert_eq!(index.len(), 2);
		assert_eq!(index.search(&[1.0, 1.0], 5).expect("search failed"), before);
	}

	#[test]
	fn existing_vector_wins() {
		let index = index_with(&[(1, [1.0, 0.0])]);

		index.insert_if_absent(&[1], &[vec![0.0, 1.0]]).expect("insert failed");

		assert_eq!(index.get(1), Some(vec![1.0, 0.0]));
	}

	#[test]
	fn first_duplicate_in_call_wins() {
		let index = VectorIndex::new(2);
		let added = index
			.insert_if_absent(&[5, 5], &[vec![0.0, 2.0], vec![2.0, 0.0]])
			.expect("insert failed");

		assert_eq!(added, 1);
		assert_eq!(index.get(5), Some(vec![0.0, 1.0]));
	}

	#[test]
	fn search_orders_by_score_then_id() {
		let index = index_with(&[(3, [1.0, 0.0]), (1, [1.0, 0.0]), (2, [0.0, 1.0]), (4, [1.0, 1.0])]);
		let hits = index.search(&[2.0, 0.0], 4).expect("search failed");
		let ids: Vec<i64> = hits.iter().map(|hit| hit.id).collect();

		assert_eq!(ids, vec![1, 3, 4, 2]);
		assert!((hits[0].score - 1.0).abs() < 1e-6);
		assert!((hits[2].score - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
		assert!(hits[3].score.abs() < 1e-6);
	}

	#[test]
	fn search_width_is_capped_by_len() {
		let index = index_with(&[(1, [1.0, 0.0]), (2, [0.0, 1.0])]);

		assert_eq!(index.search(&[1.0, 0.0], 10).expect("search failed").len(), 2);
		assert_eq!(index.search(&[1.0, 0.0], 1).expect("search failed")[0].id, 1);
		assert!(index.search(&[1.0, 0.0], 0).expect("search failed").is_empty());
		assert!(VectorIndex::new(2).search(&[1.0, 0.0], 3).expect("search failed").is_empty());
	}

	#[test]
	fn partial_selection_matches_full_sort() {
		let entries: Vec<(i64, [f32; 2])> =
			(0..50).map(|i| (i, [(i % 7) as f32 + 0.5, (i % 5) as f32])).collect();
		let index = index_with(&entries);
		let full = index.search(&[1.0, 0.3], 50).expect("search failed");
		let top = index.search(&[1.0, 0.3], 9).expect("search failed");

		assert_eq!(top, full[..9].to_vec());

		for pair in full.windows(2) {
			assert_ne!(by_score_then_id(&pair[0], &pair[1]), Ordering::Greater);
		}
	}

	#[test]
	fn zero_vector_scores_zero() {
		let index = index_with(&[(1, [0.0, 0.0]), (2, [1.0, 0.0])]);
		let hits = index.search(&[1.0, 0.0], 2).expect("search failed");

		assert_eq!(hits[1], Hit { id: 1, score: 0.0 });
	}

	#[test]
	fn extreme_magnitudes_are_stored_at_unit_length() {
		let index = index_with(&[(1, [1e-25, 0.0]), (2, [1e20, 1e20])]);
		let hits = index.search(&[1.0, 0.0], 2).expect("search failed");

		assert_eq!(hits[0].id, 1);
		assert!((hits[0].score - 1.0).abs() < 1e-6);
		assert_eq!(hits[1].id, 2);
		assert!((hits[1].score - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);

		for id in [1, 2] {
			let stored = index.get(id).expect("id must be stored");
			let norm = dot(&stored, &stored).sqrt();

			assert!((norm - 1.0).abs() < 1e-6);
		}
	}

	#[test]
	fn tiny_query_is_normalized() {
		let index = index_with(&[(1, [0.0, 1.0])]);
		let hits = index.search(&[0.0, 1e-30], 1).expect("search failed");

		assert!((hits[0].score - 1.0).abs() < 1e-6);
	}

	#[test]
	fn rejects_bad_input_without_writing() {
		let index = VectorIndex::new(2);

		assert!(matches!(
			index.insert_if_absent(&[1, 2], &[vec![1.0, 0.0]]),
			Err(Error::LengthMismatch { ids: 2, vectors: 1 })
		));
		assert!(matches!(
			index.insert_if_absent(&[1, 2], &[vec![1.0, 0.0], vec![1.0]]),
			Err(Error::Dimension { expected: 2, actual: 1 })
		));
		assert!(matches!(
			index.insert_if_absent(&[1], &[vec![f32::NAN, 0.0]]),
			Err(Error::NonFinite { id: Some(1) })
		));
		assert!(index.is_empty());
		assert!(index.search(&[1.0, 0.0, 0.0], 1).is_err());
	}
}
