pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod extract;
pub mod http;
pub mod job;
pub mod orchestrator;
pub mod sanitize;
pub mod secrets;
pub mod service;
pub mod source;
pub mod store;
pub mod summarize;
pub mod telemetry;
pub mod translate;

pub use api::{JobStatus, StatusApi};
pub use config::{load_config, load_effective_config, Config};
pub use error::{
    ConfigError, ExtractError, InputError, LayscienceError, ResolveError, Result, ResultError,
    StoreError, SummarizeError, TranslateError, UploadError,
};
pub use events::{JobEvent, JobEventBroadcaster};
pub use job::{
    ErrorKind, FailureCause, Job, JobError, JobId, JobInput, JobOptions, JobResult, JobState,
    SummaryLength, SummaryStyle, UploadId,
};
pub use orchestrator::{
    Collaborators, ExecutionOutcome, Orchestrator, PipelineSettings, RecoveryReport, RetryPolicy,
};
pub use secrets::{SecretError, SecretSource};
pub use service::Service;
pub use store::{JobStore, MemoryJobStore, SqliteJobStore};
pub use translate::{SummaryTranslator, Translation};
