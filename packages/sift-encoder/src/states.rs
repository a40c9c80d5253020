use crate::{Error, Result};

/// Per-token hidden states for one oracle batch, with the matching attention mask.
///
/// Layout is row-major: `hidden[(row * tokens + token) * dim + d]` and `mask[row * tokens + token]`.
#[derive(Clone, Debug, PartialEq)]
pub struct TokenStates {
	rows: usize,
	tokens: usize,
	dim: usize,
	hidden: Vec<f32>,
	mask: Vec<u8>,
}
impl TokenStates {
	pub fn new(
		rows: usize,
		tokens: usize,
		dim: usize,
		hidden: Vec<f32>,
		mask: Vec<u8>,
	) -> Result<Self> {
		if hidden.len() != rows * tokens * dim {
			return Err(Error::Shape {
				message: format!(
					"hidden states hold {} values, expected {rows}x{tokens}x{dim}.",
					hidden.len()
				),
			});
		}
		if mask.len() != rows * tokens {
			return Err(Error::Shape {
				message: format!(
					"attention mask holds {} values, expected {rows}x{tokens}.",
					mask.len()
				),
			});
		}

		Ok(Self { rows, tokens, dim, hidden, mask })
	}

	/// Flattens `batch x tokens x dim` hidden states and a `batch x tokens` mask.
	///
	/// Every row must be padded to the same token count and every token must carry `dim` values.
	pub fn from_nested(hidden: Vec<Vec<Vec<f32>>>, mask: Vec<Vec<u8>>, dim: usize) -> Result<Self> {
		let rows = hidden.len();

		if mask.len() != rows {
			return Err(Error::Shape {
				message: format!("{rows} hidden state rows but {} mask rows.", mask.len()),
			});
		}

		let tokens = hidden.first().map(Vec::len).unwrap_or(0);
		let mut flat = Vec::with_capacity(rows * tokens * dim);
		let mut flat_mask = Vec::with_capacity(rows * tokens);

		for (row, (states, row_mask)) in hidden.into_iter().zip(mask).enumerate() {
			if states.len() != tokens || row_mask.len() != tokens {
				return Err(Error::Shape {
					message: format!("row {row} is not padded to {tokens} tokens."),
				});
			}

			for token in states {
				if token.len() != dim {
					return Err(Error::Shape {
						message: format!(
							"row {row} has a token of width {}, expected {dim}.",
							token.len()
						),
					});
				}

				flat.extend(token);
			}

			flat_mask.extend(row_mask);
		}

		Self::new(rows, tokens, dim, flat, flat_mask)
	}

	pub fn rows(&self) -> usize {
		self.rows
	}

	pub fn tokens(&self) -> usize {
		self.tokens
	}

	pub fn dim(&self) -> usize {
		self.dim
	}

	pub(crate) fn token(&self, row: usize, token: usize) -> &[f32] {
		let start = (row * self.tokens + token) * self.dim;

		&self.hidden[start..start + self.dim]
	}

	pub(crate) fn mask(&self, row: usize, token: usize) -> u8 {
		self.mask[row * self.tokens + token]
	}
}
