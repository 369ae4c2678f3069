use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use reqwest::Url;
use tracing_subscriber::EnvFilter;

use crate::config::schema::{Config, LogFormat, CONFIG_VERSION};
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

/// Loads the effective configuration: defaults, then the file (if any),
/// then the process environment.
pub fn load_effective_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

pub(crate) fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != CONFIG_VERSION {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.server.bind.parse::<SocketAddr>().is_err() {
        return Err(ConfigError::Validation {
            message: format!("server.bind is not a socket address: {}", config.server.bind),
        });
    }

    let pipeline = &config.pipeline;
    if pipeline.max_source_chars == 0 {
        return Err(ConfigError::Validation {
            message: "pipeline.max_source_chars must be positive".to_string(),
        });
    }
    if pipeline.min_text_chars > pipeline.max_source_chars {
        return Err(ConfigError::Validation {
            message: format!(
                "pipeline.min_text_chars ({}) exceeds max_source_chars ({})",
                pipeline.min_text_chars, pipeline.max_source_chars
            ),
        });
    }
    if pipeline.max_concurrent_jobs == 0 {
        return Err(ConfigError::Validation {
            message: "pipeline.max_concurrent_jobs must be at least 1".to_string(),
        });
    }
    if pipeline.retry.initial_backoff_ms > pipeline.retry.max_backoff_ms {
        return Err(ConfigError::Validation {
            message: format!(
                "pipeline.retry.initial_backoff_ms ({}) exceeds max_backoff_ms ({})",
                pipeline.retry.initial_backoff_ms, pipeline.retry.max_backoff_ms
            ),
        });
    }

    validate_http_url("summarizer.base_url", &config.summarizer.base_url)?;
    validate_http_url("source.doi_resolver_url", &config.source.doi_resolver_url)?;

    if let Err(e) = EnvFilter::try_new(&config.logging.level) {
        return Err(ConfigError::Validation {
            message: format!("logging.level '{}' is invalid: {}", config.logging.level, e),
        });
    }

    Ok(())
}

fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => Err(ConfigError::Validation {
            message: format!("{} must be an http(s) URL: {}", field, value),
        }),
    }
}

/// Overlays environment variables on `config`.
///
/// `lookup` returns the value of a variable, if set. Where a variable has
/// an alias, the `LAYSCIENCE_` name wins.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = first_set(&lookup, &["LAYSCIENCE_DATABASE_PATH", "JOBS_DB_PATH"]) {
        config.database_path = PathBuf::from(path);
    }
    if let Some(dir) = first_set(&lookup, &["LAYSCIENCE_UPLOAD_DIR", "LOCAL_UPLOAD_DIR"]) {
        config.upload_dir = PathBuf::from(dir);
    }
    if let Some(bind) = first_set(&lookup, &["LAYSCIENCE_BIND"]) {
        config.server.bind = bind;
    }
    if let Some(key) = first_set(&lookup, &["OPENAI_API_KEY"]) {
        config.summarizer.api_key = Some(key.trim().to_string());
    }
    if let Some(model) = first_set(&lookup, &["OPENAI_MODEL"]) {
        config.summarizer.model = model;
    }
    if let Some(url) = first_set(&lookup, &["OPENAI_BASE_URL"]) {
        config.summarizer.base_url = url;
    }
    if let Some(value) = first_set(&lookup, &["MAX_SOURCE_CHARS"]) {
        config.pipeline.max_source_chars =
            value.trim().parse::<usize>().map_err(|_| ConfigError::InvalidEnv {
                name: "MAX_SOURCE_CHARS".to_string(),
                value: value.clone(),
            })?;
    }
    if let Some(value) = lookup("DRY_RUN") {
        config.summarizer.dry_run = parse_flag(&value).ok_or(ConfigError::InvalidEnv {
            name: "DRY_RUN".to_string(),
            value,
        })?;
    }
    if let Some(level) = first_set(&lookup, &["LAYSCIENCE_LOG_LEVEL"]) {
        config.logging.level = level;
    }
    if let Some(value) = first_set(&lookup, &["LAYSCIENCE_LOG_FORMAT"]) {
        config.logging.format =
            value
                .parse::<LogFormat>()
                .map_err(|_| ConfigError::InvalidEnv {
                    name: "LAYSCIENCE_LOG_FORMAT".to_string(),
                    value: value.clone(),
                })?;
    }

    Ok(())
}

fn first_set<F>(lookup: &F, names: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    names
        .iter()
        .find_map(|&name| lookup(name).filter(|v| !v.trim().is_empty()))
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
