use tokenizers::Tokenizer;

/// Cost proxy used to group texts of similar size into the same oracle batch.
pub trait LengthMeasure
where
	Self: Send + Sync,
{
	fn measure(&self, text: &str) -> usize;
}

/// Unicode scalar count. Cheap, and only a proxy for the model's sequence length.
#[derive(Clone, Copy, Debug, Default)]
pub struct CharCount;
impl LengthMeasure for CharCount {
	fn measure(&self, text: &str) -> usize {
		text.chars().count()
	}
}

/// Token count under the model's own tokenizer.
pub struct TokenCount {
	tokenizer: Tokenizer,
}
impl TokenCount {
	pub fn new(tokenizer: Tokenizer) -> Self {
		Self { tokenizer }
	}

	pub fn from_pretrained(repo: &str) -> crate::Result<Self> {
		Ok(Self::new(Tokenizer::from_pretrained(repo, None)?))
	}
}
impl LengthMeasure for TokenCount {
	fn measure(&self, text: &str) -> usize {
		match self.tokenizer.encode(text, true) {
			Ok(encoding) => encoding.len(),
			Err(err) => {
				tracing::warn!(error = %err, "Tokenizer failed to encode text. Falling back to char count.");

				CharCount.measure(text)
			},
		}
	}
}

/// Positions of `texts` ordered by ascending measured length, ties kept in input order.
pub fn length_order(texts: &[String], measure: &dyn LengthMeasure) -> Vec<usize> {
	let lengths: Vec<usize> = texts.iter().map(|text| measure.measure(text)).collect();
	let mut order: Vec<usize> = (0..texts.len()).collect();

	order.sort_by_key(|&pos| (lengths[pos], pos));

	order
}

#[cfg(test)]
mod tests {
	use super::*;

	fn owned(texts: &[&str]) -> Vec<String> {
		texts.iter().map(|text| text.to_string()).collect()
	}

	#[test]
	fn orders_by_length_not_content() {
		let texts = owned(&["zz", "aaaa", "b", "ccc"]);

		assert_eq!(length_order(&texts, &CharCount), vec![2, 0, 3, 1]);
	}

	#[test]
	fn ties_keep_input_order() {
		let texts = owned(&["bb", "aa", "c", "dd"]);

		assert_eq!(length_order(&texts, &CharCount), vec![2, 0, 1, 3]);
	}

	#[test]
	fn counts_chars_not_bytes() {
		assert_eq!(CharCount.measure("naïve"), 5);
	}
}
