use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::job::{FailureCause, JobError, JobId, JobState};

#[derive(Error, Debug)]
pub enum LayscienceError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid input: {0}")]
    Input(#[from] InputError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("Result unavailable: {0}")]
    Result(#[from] ResultError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Secret error: {0}")]
    Secret(#[from] crate::secrets::SecretError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Invalid value '{value}' for environment variable {name}")]
    InvalidEnv { name: String, value: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

/// Rejections raised before a job is created.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("one of doi, url or file_id is required")]
    Missing,

    #[error("only one of doi, url or file_id may be given")]
    Ambiguous,

    #[error("invalid DOI '{0}'")]
    InvalidDoi(String),

    #[error("invalid URL {0}")]
    InvalidUrl(String),

    #[error("invalid file id '{0}'")]
    InvalidUploadId(String),

    #[error("invalid language tag '{0}'")]
    InvalidLanguage(String),

    #[error("unknown job state '{0}'")]
    InvalidState(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Job {id} is {actual}, expected {expected}")]
    Conflict {
        id: JobId,
        expected: JobState,
        actual: JobState,
    },

    #[error("Invalid transition {from} -> {to}: {reason}")]
    InvalidTransition {
        from: JobState,
        to: JobState,
        reason: String,
    },

    #[error("Stored job '{id}' is unreadable: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("Storage failure: {0}")]
    Storage(#[from] crate::db::DatabaseError),
}

/// Failures of [`crate::source::DocumentSource::resolve`].
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("document not found: {0}")]
    NotFound(String),

    #[error("fetch failed: {message}")]
    Fetch {
        message: String,
        status: Option<u16>,
        transient: bool,
        retry_after: Option<Duration>,
    },

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
}

impl ResolveError {
    pub fn cause(&self) -> FailureCause {
        match self {
            ResolveError::NotFound(_) => FailureCause::NotFound,
            ResolveError::Fetch { .. } => FailureCause::Fetch,
            ResolveError::UnsupportedFormat(_) => FailureCause::UnsupportedFormat,
        }
    }
}

/// Failures of [`crate::extract::TextExtractor::extract`].
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("failed to parse document: {0}")]
    Parse(String),

    #[error("cannot extract text from {0}")]
    UnsupportedFormat(String),

    #[error("extracted text too short ({chars} characters, need {min})")]
    InsufficientText { chars: usize, min: usize },
}

impl ExtractError {
    pub fn cause(&self) -> FailureCause {
        match self {
            ExtractError::Parse(_) => FailureCause::Parse,
            ExtractError::UnsupportedFormat(_) => FailureCause::UnsupportedFormat,
            ExtractError::InsufficientText { .. } => FailureCause::InsufficientText,
        }
    }
}

/// Failures of [`crate::summarize::Summarizer`] calls.
#[derive(Error, Debug)]
pub enum SummarizeError {
    #[error("upstream returned HTTP {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("rate limited by upstream")]
    RateLimited { retry_after: Option<Duration> },

    #[error("upstream request timeout")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("malformed upstream response: {0}")]
    Malformed(String),
}

impl SummarizeError {
    pub fn cause(&self) -> FailureCause {
        match self {
            SummarizeError::Upstream { .. } | SummarizeError::Network(_) => FailureCause::Upstream,
            SummarizeError::RateLimited { .. } => FailureCause::RateLimited,
            SummarizeError::Timeout => FailureCause::Timeout,
            SummarizeError::Malformed(_) => FailureCause::Malformed,
        }
    }
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("only PDF uploads are supported")]
    UnsupportedFormat,

    #[error("upload of {size} bytes exceeds the {max} byte limit")]
    TooLarge { size: usize, max: usize },

    #[error("Failed to write upload '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Reasons a result cannot be returned for a job.
#[derive(Error, Debug)]
pub enum ResultError {
    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Job is {0}")]
    NotReady(JobState),

    #[error("Job failed: {0}")]
    Failed(JobError),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ResultError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => ResultError::NotFound(id),
            other => ResultError::Store(other),
        }
    }
}

/// Reasons a finished summary cannot be translated.
#[derive(Error, Debug)]
pub enum TranslateError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Result(#[from] ResultError),

    #[error("translation failed: {0}")]
    Upstream(#[from] SummarizeError),
}

pub type Result<T> = std::result::Result<T, LayscienceError>;
