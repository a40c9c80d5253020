use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub encoder: Encoder,
	pub providers: Providers,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	#[serde(default = "default_log_level")]
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Encoder {
	#[serde(default = "default_batch_size")]
	pub batch_size: u32,
	/// One of "mean" or "first_token".
	#[serde(default = "default_pooling")]
	pub pooling: String,
	/// Forwarded to the embedding oracle for truncation.
	pub max_length: Option<u32>,
	/// Number of requests allowed to run oracle and index work at the same time.
	#[serde(default = "default_max_concurrency")]
	pub max_concurrency: u32,
	/// One of "chars" or "tokens". Decides the key texts are sorted by before batching.
	#[serde(default = "default_length_measure")]
	pub length_measure: String,
	/// Required when `length_measure` is "tokens".
	pub tokenizer_repo: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub resolver: ResolverProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub api_base: String,
	pub path: String,
	#[serde(default = "default_info_path")]
	pub info_path: String,
	pub model: String,
	pub api_key: Option<String>,
	/// Skips the startup `info_path` lookup when set.
	pub hidden_size: Option<u32>,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolverProviderConfig {
	pub api_base: String,
	#[serde(default = "default_efetch_path")]
	pub efetch_path: String,
	pub api_key: Option<String>,
	pub timeout_ms: u64,
	pub app_name: String,
	pub app_version: String,
	pub app_url: String,
	pub admin_email: String,
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_batch_size() -> u32 {
	64
}

fn default_pooling() -> String {
	"mean".to_string()
}

fn default_max_concurrency() -> u32 {
	1
}

fn default_length_measure() -> String {
	"chars".to_string()
}

fn default_info_path() -> String {
	"/v1/info".to_string()
}

fn default_efetch_path() -> String {
	"efetch.fcgi".to_string()
}
