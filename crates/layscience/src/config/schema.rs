use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::orchestrator::{PipelineSettings, RetryPolicy, StepTimeouts};
use crate::source::upload::DEFAULT_MAX_UPLOAD_BYTES;
use crate::source::remote::DEFAULT_DOI_RESOLVER;
use crate::summarize::openai::{DEFAULT_BASE_URL, DEFAULT_MODEL};

pub const CONFIG_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub summarizer: SummarizerConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            database_path: default_database_path(),
            upload_dir: default_upload_dir(),
            server: ServerConfig::default(),
            pipeline: PipelineConfig::default(),
            summarizer: SummarizerConfig::default(),
            source: SourceConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_version() -> String {
    CONFIG_VERSION.to_string()
}

fn default_database_path() -> PathBuf {
    crate::db::default_database_path()
        .unwrap_or_else(|| PathBuf::from(".layscience/data/jobs.db"))
}

fn default_upload_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".layscience").join("uploads"))
        .unwrap_or_else(|| PathBuf::from(".layscience/uploads"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_max_upload_bytes() -> usize {
    DEFAULT_MAX_UPLOAD_BYTES
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_max_source_chars")]
    pub max_source_chars: usize,
    #[serde(default = "default_min_text_chars")]
    pub min_text_chars: usize,
    #[serde(default = "default_min_summary_chars")]
    pub min_summary_chars: usize,
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_max_source_chars() -> usize {
    120_000
}

fn default_min_text_chars() -> usize {
    50
}

fn default_min_summary_chars() -> usize {
    20
}

fn default_max_concurrent_jobs() -> usize {
    num_cpus::get()
}

fn default_event_capacity() -> usize {
    256
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_source_chars: default_max_source_chars(),
            min_text_chars: default_min_text_chars(),
            min_summary_chars: default_min_summary_chars(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            event_capacity: default_event_capacity(),
            timeouts: TimeoutsConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn settings(&self) -> PipelineSettings {
        PipelineSettings {
            max_source_chars: self.max_source_chars,
            min_text_chars: self.min_text_chars,
            min_summary_chars: self.min_summary_chars,
            timeouts: StepTimeouts {
                resolve: Duration::from_secs(self.timeouts.resolve_secs),
                extract: Duration::from_secs(self.timeouts.extract_secs),
                summarize: Duration::from_secs(self.timeouts.summarize_secs),
            },
            retry: RetryPolicy {
                max_retries: self.retry.max_retries,
                initial_backoff: Duration::from_millis(self.retry.initial_backoff_ms),
                max_backoff: Duration::from_millis(self.retry.max_backoff_ms),
            },
            max_concurrent_jobs: self.max_concurrent_jobs,
            event_capacity: self.event_capacity,
        }
    }
}

/// Per-step time budgets in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    #[serde(default = "default_resolve_secs")]
    pub resolve_secs: u64,
    #[serde(default = "default_extract_secs")]
    pub extract_secs: u64,
    #[serde(default = "default_summarize_secs")]
    pub summarize_secs: u64,
}

fn default_resolve_secs() -> u64 {
    30
}

fn default_extract_secs() -> u64 {
    60
}

fn default_summarize_secs() -> u64 {
    120
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            resolve_secs: default_resolve_secs(),
            extract_secs: default_extract_secs(),
            summarize_secs: default_summarize_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_retries() -> u32 {
    2
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    8_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Summarizer backend selection.
///
/// The API key may be given inline, as a file path or as the name of an
/// environment variable; see [`crate::secrets::SecretSource`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    /// Use the deterministic offline summarizer instead of the API.
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: Option<String>,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_api_key_env() -> Option<String> {
    Some("OPENAI_API_KEY".to_string())
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            model: default_model(),
            base_url: default_base_url(),
            api_key: None,
            api_key_file: None,
            api_key_env: default_api_key_env(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_doi_resolver_url")]
    pub doi_resolver_url: String,
}

fn default_doi_resolver_url() -> String {
    DEFAULT_DOI_RESOLVER.to_string()
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            doi_resolver_url: default_doi_resolver_url(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    #[default]
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `layscience=debug,info`.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}
