use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use sift_config::EmbeddingProviderConfig;
use sift_encoder::{BoxFuture, EmbeddingOracle, TokenStates};

use crate::{Error, Result};

/// Remote model server returning last-layer hidden states for a batch of texts.
pub struct HttpOracle {
	client: Client,
	url: String,
	model: String,
	max_length: Option<u32>,
	hidden_size: usize,
}

#[derive(Debug, Deserialize)]
struct HiddenStatesResponse {
	hidden_states: Vec<Vec<Vec<f32>>>,
	attention_mask: Vec<Vec<u8>>,
}

impl HttpOracle {
	/// Builds the client and settles the hidden size, asking the server when it is not configured.
	pub async fn connect(cfg: &EmbeddingProviderConfig, max_length: Option<u32>) -> Result<Self> {
		let client = Client::builder()
			.timeout(Duration::from_millis(cfg.timeout_ms))
			.default_headers(crate::auth_headers(cfg.api_key.as_deref(), &cfg.default_headers)?)
			.build()?;
		let hidden_size = match cfg.hidden_size {
			Some(size) => size as usize,
			None => {
				let url = format!("{}{}", cfg.api_base, cfg.info_path);
				let json: Value = client.get(url).send().await?.error_for_status()?.json().await?;

				parse_info_response(&json)?
			},
		};

		tracing::info!(model = %cfg.model, hidden_size, "Embedding oracle ready.");

		Ok(Self {
			client,
			url: format!("{}{}", cfg.api_base, cfg.path),
			model: cfg.model.clone(),
			max_length,
			hidden_size,
		})
	}

	pub async fn embed(&self, texts: &[String]) -> Result<TokenStates> {
		let mut body = serde_json::json!({ "model": self.model, "inputs": texts });

		if let Some(max_length) = self.max_length {
			body["max_length"] = max_length.into();
		}

		let res = self.client.post(&self.url).json(&body).send().await?;
		let json: Value = res.error_for_status()?.json().await?;

		parse_hidden_states_response(json, self.hidden_size)
	}
}
impl EmbeddingOracle for HttpOracle {
	fn hidden_size(&self) -> usize {
		self.hidden_size
	}

	fn embed_batch<'a>(
		&'a self,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<TokenStates>> {
		Box::pin(async move { Ok(self.embed(texts).await?) })
	}
}

fn parse_info_response(json: &Value) -> Result<usize> {
	let size = json
		.get("hidden_size")
		.and_then(Value::as_u64)
		.ok_or_else(|| Error::InvalidResponse {
			message: "Oracle info response is missing hidden_size.".to_string(),
		})?;

	if size == 0 {
		return Err(Error::InvalidResponse {
			message: "Oracle reported a hidden_size of zero.".to_string(),
		});
	}

	Ok(size as usize)
}

fn parse_hidden_states_response(json: Value, hidden_size: usize) -> Result<TokenStates> {
	let parsed: HiddenStatesResponse = serde_json::from_value(json)?;

	Ok(TokenStates::from_nested(parsed.hidden_states, parsed.attention_mask, hidden_size)?)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_padded_batch() {
		let json = serde_json::json!({
			"hidden_states": [
				[[1.0, 2.0], [3.0, 4.0]],
				[[5.0, 6.0], [0.0, 0.0]]
			],
			"attention_mask": [[1, 1], [1, 0]]
		});
		let states = parse_hidden_states_response(json, 2).expect("parse failed");

		assert_eq!((states.rows(), states.tokens(), states.dim()), (2, 2, 2));
	}

	#[test]
	fn rejects_hidden_size_mismatch() {
		let json = serde_json::json!({
			"hidden_states": [[[1.0, 2.0, 3.0]]],
			"attention_mask": [[1]]
		});
		let err = parse_hidden_states_response(json, 2).expect_err("Expected shape error.");

		assert!(matches!(err, Error::InvalidResponse { .. }));
	}

	#[test]
	fn rejects_missing_mask() {
		let json = serde_json::json!({ "hidden_states": [[[1.0]]] });

		assert!(matches!(parse_hidden_states_response(json, 1), Err(Error::SerdeJson(_))));
	}

	#[test]
	fn reads_hidden_size() {
		assert_eq!(
			parse_info_response(&serde_json::json!({ "hidden_size": 768 })).expect("parse failed"),
			768
		);
		assert!(parse_info_response(&serde_json::json!({ "hidden_size": 0 })).is_err());
		assert!(parse_info_response(&serde_json::json!({})).is_err());
	}
}
