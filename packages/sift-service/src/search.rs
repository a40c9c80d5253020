use ahash::{AHashMap, AHashSet};

use sift_index::{Hit, by_score_then_id};

use crate::{Error, ResolveError, Result, SiftService};

/// A query or candidate document, either carrying its text or known only by id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Document {
	WithText { uid: i64, text: String },
	ById(i64),
}
impl Document {
	pub fn uid(&self) -> i64 {
		match self {
			Self::WithText { uid, .. } | Self::ById(uid) => *uid,
		}
	}
}

#[derive(Clone, Debug)]
pub struct SearchRequest {
	pub query: Document,
	pub documents: Vec<Document>,
	pub top_k: usize,
	/// Score only the ids in `documents` instead of ranking the whole index.
	pub docs_only: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TopMatch {
	pub uid: i64,
	pub score: f32,
}

enum QueryInput {
	Text(String),
	Indexed,
}

impl SiftService {
	/// Indexes any unseen candidates, then ranks the index against the query.
	///
	/// The query's own id never appears in the result.
	#[tracing::instrument(
		skip_all,
		fields(query_uid = req.query.uid(), top_k = req.top_k, docs_only = req.docs_only)
	)]
	pub async fn search(&self, req: SearchRequest) -> Result<Vec<TopMatch>> {
		if req.top_k == 0 {
			return Err(Error::InvalidRequest { message: "top_k must be greater than 0.".to_string() });
		}

		let query_uid = req.query.uid();
		let query = self.resolve_query(&req.query).await?;
		let candidates = self.resolve_candidates(&req.documents).await?;
		let permit = self.compute.acquire().await?;

		self.index_candidates(candidates).await?;

		let query_vector = match query {
			QueryInput::Text(text) => self.encoder.encode(&[text]).await?.pop(),
			QueryInput::Indexed => self.index.get(query_uid),
		}
		.ok_or_else(|| Error::QueryUnresolvable {
			uid: query_uid,
			message: "no query vector was produced.".to_string(),
		})?;
		let available = self.index.len();
		let width =
			if req.docs_only { available } else { available.min(req.top_k.saturating_add(1)) };
		let index = self.index.clone();
		let hits =
			tokio::task::spawn_blocking(move || index.search(&query_vector, width)).await??;

		drop(permit);

		let hits = if req.docs_only {
			score_requested(hits, &req.documents, query_uid)?
		} else {
			exclude_query(hits, query_uid, req.top_k)
		};

		tracing::debug!(available, width, returned = hits.len(), "Search completed.");

		Ok(hits.into_iter().map(|hit| TopMatch { uid: hit.id, score: hit.score }).collect())
	}

	async fn resolve_query(&self, query: &Document) -> Result<QueryInput> {
		match query {
			Document::WithText { text, .. } => Ok(QueryInput::Text(text.clone())),
			Document::ById(uid) if self.index.contains(*uid) => Ok(QueryInput::Indexed),
			Document::ById(uid) => match self.resolver.resolve(*uid).await {
				Ok(text) => Ok(QueryInput::Text(text)),
				Err(err @ ResolveError::NotFound { .. }) =>
					Err(Error::QueryUnresolvable { uid: *uid, message: err.to_string() }),
				Err(ResolveError::Transport { message }) => Err(Error::Resolver { message }),
			},
		}
	}

	/// Text for every candidate that will need embedding. Already indexed ids map to `None`.
	async fn resolve_candidates(&self, documents: &[Document]) -> Result<Vec<(i64, Option<String>)>> {
		let mut resolved = Vec::with_capacity(documents.len());
		let mut degraded = 0_usize;

		for document in documents {
			let entry = match document {
				Document::WithText { uid, text } => (*uid, Some(text.clone())),
				Document::ById(uid) if self.index.contains(*uid) => (*uid, None),
				Document::ById(uid) => match self.resolver.resolve(*uid).await {
					Ok(text) => (*uid, Some(text)),
					Err(ResolveError::NotFound { .. }) => {
						tracing::warn!(uid, "Candidate text could not be resolved. Embedding empty text.");

						degraded += 1;

						(*uid, Some(String::new()))
					},
					Err(ResolveError::Transport { message }) =>
						return Err(Error::Resolver { message }),
				},
			};

			resolved.push(entry);
		}

		if degraded > 0 {
			tracing::debug!(degraded, total = documents.len(), "Some candidates were degraded.");
		}

		Ok(resolved)
	}

	/// Embeds and inserts the candidates the index has not seen. Existing vectors are kept.
	async fn index_candidates(&self, candidates: Vec<(i64, Option<String>)>) -> Result<()> {
		let mut seen = AHashSet::with_capacity(candidates.len());
		let mut ids = Vec::new();
		let mut texts = Vec::new();

		for (uid, text) in candidates {
			let Some(text) = text else {
				continue;
			};

			if !seen.insert(uid) || self.index.contains(uid) {
				continue;
			}

			ids.push(uid);
			texts.push(text);
		}

		if ids.is_empty() {
			return Ok(());
		}

		let vectors = self.encoder.encode(&texts).await?;
		let index = self.index.clone();
		let added =
			tokio::task::spawn_blocking(move || index.insert_if_absent(&ids, &vectors)).await??;

		tracing::debug!(embedded = texts.len(), added, "Indexed new candidates.");

		Ok(())
	}
}

/// Drops the query's own hit, or the trailing extra hit when there was none, down to `top_k`.
fn exclude_query(mut hits: Vec<Hit>, query_uid: i64, top_k: usize) -> Vec<Hit> {
	if let Some(pos) = hits.iter().position(|hit| hit.id == query_uid) {
		hits.remove(pos);
	}

	hits.truncate(top_k);

	hits
}

/// One hit per distinct requested id, except the query's own, by descending score.
fn score_requested(hits: Vec<Hit>, documents: &[Document], query_uid: i64) -> Result<Vec<Hit>> {
	let scores: AHashMap<i64, f32> = hits.into_iter().map(|hit| (hit.id, hit.score)).collect();
	let mut seen = AHashSet::with_capacity(documents.len());
	let mut picked = Vec::with_capacity(documents.len());

	for uid in documents.iter().map(Document::uid) {
		if uid == query_uid || !seen.insert(uid) {
			continue;
		}

		let score = scores.get(&uid).copied().ok_or(Error::Unscored { uid })?;

		picked.push(Hit { id: uid, score });
	}

	picked.sort_unstable_by(by_score_then_id);

	Ok(picked)
}
