mod error;
mod types;

pub use error::{Error, Result};
pub use types::{Config, EmbeddingProviderConfig, Encoder, Providers, ResolverProviderConfig, Service};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.encoder.batch_size == 0 {
		return Err(Error::Validation {
			message: "encoder.batch_size must be greater than zero.".to_string(),
		});
	}
	if !matches!(cfg.encoder.pooling.as_str(), "mean" | "first_token") {
		return Err(Error::Validation {
			message: "encoder.pooling must be one of mean or first_token.".to_string(),
		});
	}
	if cfg.encoder.max_length == Some(0) {
		return Err(Error::Validation {
			message: "encoder.max_length must be greater than zero.".to_string(),
		});
	}
	if cfg.encoder.max_concurrency == 0 {
		return Err(Error::Validation {
			message: "encoder.max_concurrency must be greater than zero.".to_string(),
		});
	}

	match cfg.encoder.length_measure.as_str() {
		"chars" => {},
		"tokens" =>
			if cfg.encoder.tokenizer_repo.is_none() {
				return Err(Error::Validation {
					message: "encoder.tokenizer_repo must be set when encoder.length_measure is tokens."
						.to_string(),
				});
			},
		_ => {
			return Err(Error::Validation {
				message: "encoder.length_measure must be one of chars or tokens.".to_string(),
			});
		},
	}

	let embedding = &cfg.providers.embedding;

	if embedding.hidden_size == Some(0) {
		return Err(Error::Validation {
			message: "providers.embedding.hidden_size must be greater than zero.".to_string(),
		});
	}

	for (label, api_base, timeout_ms) in [
		("embedding", &embedding.api_base, embedding.timeout_ms),
		("resolver", &cfg.providers.resolver.api_base, cfg.providers.resolver.timeout_ms),
	] {
		if api_base.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("providers.{label}.api_base must be non-empty."),
			});
		}
		if timeout_ms == 0 {
			return Err(Error::Validation {
				message: format!("providers.{label}.timeout_ms must be greater than zero."),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	for value in [
		&mut cfg.encoder.tokenizer_repo,
		&mut cfg.providers.embedding.api_key,
		&mut cfg.providers.resolver.api_key,
	] {
		if value.as_deref().map(|raw| raw.trim().is_empty()).unwrap_or(false) {
			*value = None;
		}
	}
}
