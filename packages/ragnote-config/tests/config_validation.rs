use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::{Table, Value};

use ragnote_config::{Backoff, Config, DEFAULT_SYSTEM_PROMPT, EmbeddingSchema, Error};

const SAMPLE_CONFIG_TEMPLATE_TOML: &str = include_str!("fixtures/sample_config.template.toml");

fn sample_table() -> Table {
	toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.")
}

fn section<'a>(root: &'a mut Table, path: &[&str]) -> &'a mut Table {
	let mut table = root;

	for key in path {
		table = table
			.entry(key.to_string())
			.or_insert(Value::Table(Table::new()))
			.as_table_mut()
			.expect("Template section must be a table.");
	}

	table
}

fn render(table: &Table) -> String {
	toml::to_string(table).expect("Failed to render template config.")
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

	path.push(format!("ragnote_config_test_{nanos}_{pid}_{ordinal}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn parse(table: &Table) -> Config {
	toml::from_str(&render(table)).expect("Failed to parse test config.")
}

fn validation_message(table: &Table) -> String {
	let cfg = parse(table);
	let err = ragnote_config::validate(&cfg).expect_err("Expected validation error.");

	assert!(matches!(err, Error::Validation { .. }), "Unexpected error: {err:?}");

	err.to_string()
}

#[test]
fn sample_config_loads_from_disk() {
	let path = write_temp_config(SAMPLE_CONFIG_TEMPLATE_TOML.to_string());
	let result = ragnote_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	let cfg = result.expect("Expected sample config to load.");

	assert_eq!(cfg.storage.qdrant.vector_dim, 768);
	assert_eq!(cfg.providers.embedding.schema, EmbeddingSchema::WorkersAi);
	assert_eq!(cfg.query.top_k, 3);
	assert_eq!(cfg.ingest.step_retry.backoff, Backoff::Exponential);
}

#[test]
fn missing_file_reports_read_error() {
	let path = env::temp_dir().join("ragnote_config_test_missing_file.toml");
	let err = ragnote_config::load(&path).expect_err("Expected read error.");

	assert!(matches!(err, Error::ReadConfig { .. }), "Unexpected error: {err:?}");
}

#[test]
fn malformed_toml_reports_parse_error() {
	let path = write_temp_config("[service\nhttp_bind = ".to_string());
	let result = ragnote_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	let err = result.expect_err("Expected parse error.");

	assert!(matches!(err, Error::ParseConfig { .. }), "Unexpected error: {err:?}");
}

#[test]
fn optional_sections_fall_back_to_defaults() {
	let mut table = sample_table();

	table.remove("query");
	table.remove("ingest");

	let cfg = parse(&table);

	assert_eq!(cfg.query.top_k, 3);
	assert_eq!(cfg.query.system_prompt, DEFAULT_SYSTEM_PROMPT);
	assert!(!cfg.ingest.enable_text_splitting);
	assert_eq!(cfg.ingest.chunk_size, 1_000);
	assert_eq!(cfg.ingest.chunk_overlap, 200);
	assert_eq!(cfg.ingest.step_retry.limit, 5);
	assert_eq!(cfg.ingest.step_retry.delay_ms, 1_000);
}

#[test]
fn embedding_dimensions_must_match_vector_dim() {
	let mut table = sample_table();

	section(&mut table, &["providers", "embedding"])
		.insert("dimensions".to_string(), Value::Integer(1_024));

	let message = validation_message(&table);

	assert!(
		message.contains("providers.embedding.dimensions must match storage.qdrant.vector_dim."),
		"Unexpected error message: {message}"
	);
}

#[test]
fn chunk_overlap_must_be_smaller_than_chunk_size() {
	let mut table = sample_table();
	let ingest = section(&mut table, &["ingest"]);

	ingest.insert("chunk_size".to_string(), Value::Integer(100));
	ingest.insert("chunk_overlap".to_string(), Value::Integer(100));

	let message = validation_message(&table);

	assert!(
		message.contains("ingest.chunk_overlap must be less than ingest.chunk_size."),
		"Unexpected error message: {message}"
	);
}

#[test]
fn top_k_must_be_positive() {
	let mut table = sample_table();

	section(&mut table, &["query"]).insert("top_k".to_string(), Value::Integer(0));

	let message = validation_message(&table);

	assert!(
		message.contains("query.top_k must be greater than zero."),
		"Unexpected error message: {message}"
	);
}

#[test]
fn managed_api_key_is_required() {
	let mut table = sample_table();

	section(&mut table, &["providers", "chat", "managed"])
		.insert("api_key".to_string(), Value::String("  ".to_string()));

	let message = validation_message(&table);

	assert!(
		message.contains("Provider chat.managed api_key must be non-empty."),
		"Unexpected error message: {message}"
	);
}

#[test]
fn hosted_backend_is_dropped_without_a_key() {
	let mut table = sample_table();

	section(&mut table, &["providers", "chat", "hosted"])
		.insert("api_key".to_string(), Value::String(String::new()));

	let mut cfg = parse(&table);

	assert!(cfg.providers.chat.hosted.is_some());

	ragnote_config::normalize(&mut cfg, None);

	assert!(cfg.providers.chat.hosted.is_none());
}

#[test]
fn hosted_key_is_filled_from_environment_value() {
	let mut cfg = parse(&sample_table());

	assert!(cfg.providers.chat.hosted.is_none());

	ragnote_config::normalize(&mut cfg, Some("sk-ant-test"));

	let hosted = cfg.providers.chat.hosted.expect("Expected hosted backend.");

	assert_eq!(hosted.api_key, "sk-ant-test");
	assert_eq!(hosted.model, "claude-3-5-sonnet-latest");
	assert_eq!(hosted.max_tokens, 1_024);
	assert_eq!(hosted.path, "/v1/messages");
}

#[test]
fn configured_hosted_key_wins_over_environment_value() {
	let mut table = sample_table();
	let hosted = section(&mut table, &["providers", "chat", "hosted"]);

	hosted.insert("api_key".to_string(), Value::String("from-config".to_string()));
	hosted.insert("model".to_string(), Value::String("claude-custom".to_string()));

	let mut cfg = parse(&table);

	ragnote_config::normalize(&mut cfg, Some("from-env"));

	let hosted = cfg.providers.chat.hosted.expect("Expected hosted backend.");

	assert_eq!(hosted.api_key, "from-config");
	assert_eq!(hosted.model, "claude-custom");
}
