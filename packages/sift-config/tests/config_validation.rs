use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::Value;

use sift_config::{Config, Error};

const SAMPLE_CONFIG_TEMPLATE_TOML: &str = include_str!("fixtures/sample_config.template.toml");

fn sample_toml_with_encoder(key: &str, value: Value) -> String {
	let mut root: Value =
		toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.");
	let encoder = root
		.as_table_mut()
		.expect("Template config must be a table.")
		.get_mut("encoder")
		.and_then(Value::as_table_mut)
		.expect("Template config must include [encoder].");

	encoder.insert(key.to_string(), value);

	toml::to_string(&root).expect("Failed to render template config.")
}

fn write_temp_config(payload: String) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be valid.")
		.as_nanos();
	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
	let pid = std::process::id();
	let mut path = env::temp_dir();

	path.push(format!("sift_config_test_{nanos}_{pid}_{ordinal}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn load_payload(payload: String) -> sift_config::Result<Config> {
	let path = write_temp_config(payload);
	let result = sift_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	result
}

fn base_config() -> Config {
	load_payload(SAMPLE_CONFIG_TEMPLATE_TOML.to_string()).expect("Sample config must load.")
}

#[test]
fn sample_config_loads_and_blanks_become_none() {
	let cfg = base_config();

	assert_eq!(cfg.encoder.batch_size, 64);
	assert_eq!(cfg.encoder.pooling, "mean");
	assert_eq!(cfg.providers.embedding.hidden_size, Some(768));
	assert!(cfg.providers.embedding.api_key.is_none());
	assert!(cfg.providers.resolver.api_key.is_none());
	assert!(cfg.encoder.tokenizer_repo.is_none());
	assert!(cfg.providers.embedding.default_headers.is_empty());
}

#[test]
fn encoder_defaults_apply_when_omitted() {
	let mut root: Value =
		toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.");
	let table = root.as_table_mut().expect("Template config must be a table.");

	table.insert("encoder".to_string(), Value::Table(Default::default()));

	let cfg = load_payload(toml::to_string(&root).expect("Failed to render config."))
		.expect("Config with empty [encoder] must load.");

	assert_eq!(cfg.encoder.batch_size, 64);
	assert_eq!(cfg.encoder.pooling, "mean");
	assert_eq!(cfg.encoder.max_concurrency, 1);
	assert_eq!(cfg.encoder.length_measure, "chars");
	assert_eq!(cfg.encoder.max_length, None);
}

#[test]
fn batch_size_must_be_positive() {
	let err = load_payload(sample_toml_with_encoder("batch_size", Value::Integer(0)))
		.expect_err("Expected batch_size validation error.");

	assert!(matches!(err, Error::Validation { .. }));
	assert!(
		err.to_string().contains("encoder.batch_size must be greater than zero."),
		"Unexpected error: {err}"
	);
}

#[test]
fn pooling_must_be_known() {
	let err = load_payload(sample_toml_with_encoder("pooling", Value::String("max".to_string())))
		.expect_err("Expected pooling validation error.");

	assert!(
		err.to_string().contains("encoder.pooling must be one of mean or first_token."),
		"Unexpected error: {err}"
	);
}

#[test]
fn token_length_measure_requires_tokenizer_repo() {
	let err = load_payload(sample_toml_with_encoder(
		"length_measure",
		Value::String("tokens".to_string()),
	))
	.expect_err("Expected tokenizer_repo validation error.");

	assert!(
		err.to_string().contains("encoder.tokenizer_repo must be set"),
		"Unexpected error: {err}"
	);

	let mut cfg = base_config();

	cfg.encoder.length_measure = "tokens".to_string();
	cfg.encoder.tokenizer_repo = Some("johngiorgi/declutr-sci-base".to_string());

	assert!(sift_config::validate(&cfg).is_ok());
}

#[test]
fn provider_timeouts_must_be_positive() {
	let mut cfg = base_config();

	cfg.providers.resolver.timeout_ms = 0;

	let err = sift_config::validate(&cfg).expect_err("Expected timeout validation error.");

	assert!(
		err.to_string().contains("providers.resolver.timeout_ms must be greater than zero."),
		"Unexpected error: {err}"
	);
}

#[test]
fn hidden_size_override_must_be_positive() {
	let mut cfg = base_config();

	cfg.providers.embedding.hidden_size = Some(0);

	assert!(sift_config::validate(&cfg).is_err());

	cfg.providers.embedding.hidden_size = None;

	assert!(sift_config::validate(&cfg).is_ok());
}

#[test]
fn missing_file_reports_path() {
	let path = PathBuf::from("/nonexistent/sift.toml");
	let err = sift_config::load(&path).expect_err("Expected read error.");

	assert!(matches!(err, Error::ReadConfig { .. }));
}
