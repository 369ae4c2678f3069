pub mod loader;
pub mod schema;

pub use loader::{apply_env_overrides, load_config, load_config_from_str, load_effective_config};
pub use schema::{
    Config, LogFormat, LoggingConfig, PipelineConfig, RetryConfig, ServerConfig, SourceConfig,
    SummarizerConfig, TimeoutsConfig,
};
