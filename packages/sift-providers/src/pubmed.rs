use std::time::Duration;

use reqwest::Client;

use sift_config::ResolverProviderConfig;

use crate::{Error, Result, medline};

/// Resolves PubMed ids to title and abstract text through NCBI E-utilities `efetch`.
pub struct PubMedResolver {
	client: Client,
	url: String,
	api_key: Option<String>,
}
impl PubMedResolver {
	pub fn new(cfg: &ResolverProviderConfig) -> Result<Self> {
		let client = Client::builder()
			.timeout(Duration::from_millis(cfg.timeout_ms))
			.user_agent(user_agent(cfg))
			.build()?;

		Ok(Self {
			client,
			url: format!("{}{}", cfg.api_base, cfg.efetch_path),
			api_key: cfg.api_key.clone(),
		})
	}

	/// Fails with [`Error::NotFound`] when E-utilities has no usable record for `uid`.
	pub async fn resolve(&self, uid: i64) -> Result<String> {
		let mut params = vec![
			("db", "pubmed".to_string()),
			("id", uid.to_string()),
			("retstart", "0".to_string()),
			("retmode", "text".to_string()),
			("rettype", "medline".to_string()),
		];

		if let Some(api_key) = &self.api_key {
			params.push(("api_key", api_key.clone()));
		}

		let res = self.client.post(&self.url).form(&params).send().await?;
		let body = res.error_for_status()?.text().await?;

		record_text(&body, uid)
	}
}

fn user_agent(cfg: &ResolverProviderConfig) -> String {
	format!(
		"{}/{} ({};mailto:{})",
		cfg.app_name, cfg.app_version, cfg.app_url, cfg.admin_email
	)
}

fn record_text(body: &str, uid: i64) -> Result<String> {
	let wanted = uid.to_string();

	medline::parse(body)
		.into_iter()
		.find(|record| record.pmid() == Some(wanted.as_str()))
		.map(|record| record.text())
		.ok_or(Error::NotFound { uid })
}
