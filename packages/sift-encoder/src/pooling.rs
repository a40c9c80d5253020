use std::str::FromStr;

use crate::{Error, TokenStates};

/// Lower bound on the mask sum, so a fully padded row pools to zeros instead of NaN.
pub const MASK_EPSILON: f32 = 1e-9;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pooling {
	/// Mask-weighted mean over all tokens.
	Mean,
	/// The first position, regardless of the mask.
	FirstToken,
}
impl Pooling {
	/// Reduces every row of `states` to one `dim`-wide vector.
	pub fn pool(self, states: &TokenStates) -> Vec<Vec<f32>> {
		(0..states.rows())
			.map(|row| match self {
				Self::Mean => mean_row(states, row),
				Self::FirstToken => first_token_row(states, row),
			})
			.collect()
	}
}
impl FromStr for Pooling {
	type Err = Error;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		match raw {
			"mean" => Ok(Self::Mean),
			"first_token" => Ok(Self::FirstToken),
			other => Err(Error::InvalidConfig { message: format!("Unknown pooling mode {other:?}.") }),
		}
	}
}

fn mean_row(states: &TokenStates, row: usize) -> Vec<f32> {
	let mut sum = vec![0.0_f32; states.dim()];
	let mut count = 0.0_f32;

	for token in 0..states.tokens() {
		let weight = f32::from(states.mask(row, token));

		if weight == 0.0 {
			continue;
		}

		for (acc, value) in sum.iter_mut().zip(states.token(row, token)) {
			*acc += value * weight;
		}

		count += weight;
	}

	let denom = count.max(MASK_EPSILON);

	for acc in &mut sum {
		*acc /= denom;
	}

	sum
}

fn first_token_row(states: &TokenStates, row: usize) -> Vec<f32> {
	if states.tokens() == 0 {
		return vec![0.0; states.dim()];
	}

	states.token(row, 0).to_vec()
}
