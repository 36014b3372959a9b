use serde::Deserialize;
use serde_json::{Map, Value};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert NBA analyst that stays up to date with NBA-related news, trades, and information across all sources. When answering the question or responding, use the context provided, if it is provided and relevant. Your responsibility is to answer only basketball and NBA related queries. If the query has been asked before, be sure to refer to the existing knowledge base. The year is 2025, so be sure to calculate dates and times accordingly. If you are unsure of the answer, simply state that you don't know. Do not make up an answer. Be concise with your answers.";

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub query: Query,
	#[serde(default)]
	pub ingest: Ingest,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	#[serde(default = "default_log_level")]
	pub log_level: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub qdrant: Qdrant,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub chat: ChatProviders,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	#[serde(default = "default_embedding_model")]
	pub model: String,
	pub dimensions: u32,
	#[serde(default)]
	pub schema: EmbeddingSchema,
	#[serde(default = "default_timeout_ms")]
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

/// Wire shape spoken by the embedding endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub enum EmbeddingSchema {
	/// `{model, input, dimensions}` in, `{data: [{index, embedding}]}` out.
	#[default]
	#[serde(rename = "openai")]
	OpenAi,
	/// `{text}` in, `{result: {data: [[..]]}}` out.
	#[serde(rename = "workers_ai")]
	WorkersAi,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChatProviders {
	pub managed: ManagedChatConfig,
	/// Present only when a hosted API key is available after normalization.
	pub hosted: Option<HostedChatConfig>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ManagedChatConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	#[serde(default = "default_managed_model")]
	pub model: String,
	#[serde(default = "default_timeout_ms")]
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct HostedChatConfig {
	#[serde(default = "default_hosted_provider_id")]
	pub provider_id: String,
	#[serde(default = "default_hosted_api_base")]
	pub api_base: String,
	#[serde(default)]
	pub api_key: String,
	#[serde(default = "default_hosted_path")]
	pub path: String,
	#[serde(default = "default_hosted_model")]
	pub model: String,
	#[serde(default = "default_hosted_max_tokens")]
	pub max_tokens: u32,
	#[serde(default = "default_hosted_api_version")]
	pub api_version: String,
	#[serde(default = "default_timeout_ms")]
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}
impl Default for HostedChatConfig {
	fn default() -> Self {
		Self {
			provider_id: default_hosted_provider_id(),
			api_base: default_hosted_api_base(),
			api_key: String::new(),
			path: default_hosted_path(),
			model: default_hosted_model(),
			max_tokens: default_hosted_max_tokens(),
			api_version: default_hosted_api_version(),
			timeout_ms: default_timeout_ms(),
			default_headers: Map::new(),
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct Query {
	#[serde(default = "default_top_k")]
	pub top_k: u32,
	#[serde(default = "default_system_prompt")]
	pub system_prompt: String,
}
impl Default for Query {
	fn default() -> Self {
		Self { top_k: default_top_k(), system_prompt: default_system_prompt() }
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct Ingest {
	#[serde(default)]
	pub enable_text_splitting: bool,
	#[serde(default = "default_chunk_size")]
	pub chunk_size: u32,
	#[serde(default = "default_chunk_overlap")]
	pub chunk_overlap: u32,
	#[serde(default = "default_max_job_attempts")]
	pub max_job_attempts: i32,
	#[serde(default = "default_poll_interval_ms")]
	pub poll_interval_ms: u64,
	#[serde(default)]
	pub step_retry: StepRetry,
}
impl Default for Ingest {
	fn default() -> Self {
		Self {
			enable_text_splitting: false,
			chunk_size: default_chunk_size(),
			chunk_overlap: default_chunk_overlap(),
			max_job_attempts: default_max_job_attempts(),
			poll_interval_ms: default_poll_interval_ms(),
			step_retry: StepRetry::default(),
		}
	}
}

/// Retry policy applied to each ingestion step independently.
#[derive(Clone, Debug, Deserialize)]
pub struct StepRetry {
	/// Retries after the first attempt.
	#[serde(default = "default_step_retry_limit")]
	pub limit: u32,
	#[serde(default = "default_step_retry_delay_ms")]
	pub delay_ms: u64,
	#[serde(default)]
	pub backoff: Backoff,
}
impl Default for StepRetry {
	fn default() -> Self {
		Self {
			limit: default_step_retry_limit(),
			delay_ms: default_step_retry_delay_ms(),
			backoff: Backoff::default(),
		}
	}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
	Constant,
	Linear,
	#[default]
	Exponential,
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_timeout_ms() -> u64 {
	30_000
}

fn default_embedding_model() -> String {
	"@cf/baai/bge-base-en-v1.5".to_string()
}

fn default_managed_model() -> String {
	"@cf/meta/llama-3.3-70b-instruct-fp8-fast".to_string()
}

fn default_hosted_provider_id() -> String {
	"anthropic".to_string()
}

fn default_hosted_api_base() -> String {
	"https://api.anthropic.com".to_string()
}

fn default_hosted_path() -> String {
	"/v1/messages".to_string()
}

fn default_hosted_model() -> String {
	"claude-3-5-sonnet-latest".to_string()
}

fn default_hosted_max_tokens() -> u32 {
	1_024
}

fn default_hosted_api_version() -> String {
	"2023-06-01".to_string()
}

fn default_top_k() -> u32 {
	3
}

fn default_system_prompt() -> String {
	DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_chunk_size() -> u32 {
	1_000
}

fn default_chunk_overlap() -> u32 {
	200
}

fn default_max_job_attempts() -> i32 {
	10
}

fn default_poll_interval_ms() -> u64 {
	500
}

fn default_step_retry_limit() -> u32 {
	5
}

fn default_step_retry_delay_ms() -> u64 {
	1_000
}
