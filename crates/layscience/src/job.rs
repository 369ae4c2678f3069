//! Job model: identifiers, lifecycle states, inputs, options and outcomes.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::InputError;

/// Prefix of every generated job identifier.
pub const JOB_ID_PREFIX: &str = "sum_";

/// Fixed note attached to every completed summary.
pub const SUMMARY_DISCLAIMER: &str =
    "LLM-generated summary. Verify critical claims with the original source.";

/// Maximum length of a target language tag.
const MAX_LANGUAGE_LEN: usize = 35;

static RE_DOI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^10\.\d{4,9}/[-._;()/:A-Z0-9]+$").unwrap());

/// Prefixes stripped from DOIs pasted as links or citations.
const DOI_PREFIXES: &[&str] = &[
    "https://doi.org/",
    "http://doi.org/",
    "https://dx.doi.org/",
    "http://dx.doi.org/",
    "doi:",
];

// ─── Identifiers ────────────────────────────────────────────────────────────

/// Opaque, immutable job identifier (`sum_<32 hex>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Allocates a fresh identifier.
    pub fn generate() -> Self {
        Self(format!("{}{}", JOB_ID_PREFIX, uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to a document previously stored by the upload endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploadId(String);

impl UploadId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Parses an upload reference. Only UUIDs are accepted so the id can be
    /// used as a file name without further escaping.
    pub fn parse(value: &str) -> Result<Self, InputError> {
        let trimmed = value.trim();
        uuid::Uuid::parse_str(trimmed)
            .map(|u| Self(u.to_string()))
            .map_err(|_| InputError::InvalidUploadId(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ─── State machine ──────────────────────────────────────────────────────────

/// Lifecycle state of a job.
///
/// The only legal edges are `queued → running`, `running → done` and
/// `running → failed`. `done` and `failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Done,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Done => "done",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }

    /// Returns true if `next` directly follows `self` in the state machine.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Queued, JobState::Running)
                | (JobState::Running, JobState::Done)
                | (JobState::Running, JobState::Failed)
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobState::Queued),
            "running" => Ok(JobState::Running),
            "done" => Ok(JobState::Done),
            "failed" => Ok(JobState::Failed),
            other => Err(InputError::InvalidState(other.to_string())),
        }
    }
}

// ─── Input ──────────────────────────────────────────────────────────────────

/// The paper to summarise. Exactly one reference kind per job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum JobInput {
    Doi(String),
    Url(String),
    Upload(UploadId),
}

impl JobInput {
    /// Builds an input from the loosely-typed request fields, requiring
    /// exactly one of them to be present.
    pub fn from_parts(
        doi: Option<&str>,
        url: Option<&str>,
        upload: Option<&str>,
    ) -> Result<Self, InputError> {
        fn present(v: Option<&str>) -> Option<&str> {
            v.map(str::trim).filter(|s| !s.is_empty())
        }
        let doi = present(doi);
        let url = present(url);
        let upload = present(upload);

        let provided = [doi.is_some(), url.is_some(), upload.is_some()]
            .iter()
            .filter(|p| **p)
            .count();

        match provided {
            0 => Err(InputError::Missing),
            1 => {
                if let Some(doi) = doi {
                    Self::doi(doi)
                } else if let Some(url) = url {
                    Self::url(url)
                } else {
                    upload
                        .map(|id| UploadId::parse(id).map(JobInput::Upload))
                        .unwrap_or(Err(InputError::Missing))
                }
            }
            _ => Err(InputError::Ambiguous),
        }
    }

    /// Validates and normalises a DOI (`doi:` and resolver prefixes are stripped).
    pub fn doi(value: &str) -> Result<Self, InputError> {
        let mut doi = value.trim();
        for prefix in DOI_PREFIXES {
            let matches = doi
                .get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix));
            if matches {
                doi = doi[prefix.len()..].trim();
                break;
            }
        }

        if RE_DOI.is_match(doi) {
            Ok(JobInput::Doi(doi.to_string()))
        } else {
            Err(InputError::InvalidDoi(value.trim().to_string()))
        }
    }

    /// Validates an absolute http(s) URL.
    pub fn url(value: &str) -> Result<Self, InputError> {
        let trimmed = value.trim();
        let parsed = reqwest::Url::parse(trimmed)
            .map_err(|e| InputError::InvalidUrl(format!("{}: {}", trimmed, e)))?;

        match parsed.scheme() {
            "http" | "https" if parsed.host_str().is_some() => {
                Ok(JobInput::Url(parsed.to_string()))
            }
            scheme => Err(InputError::InvalidUrl(format!(
                "{}: unsupported scheme '{}'",
                trimmed, scheme
            ))),
        }
    }

    /// Short label for logs and metadata.
    pub fn kind(&self) -> &'static str {
        match self {
            JobInput::Doi(_) => "doi",
            JobInput::Url(_) => "url",
            JobInput::Upload(_) => "upload",
        }
    }
}

// ─── Options ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryStyle {
    #[default]
    Default,
    Detailed,
    Funny,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryLength {
    #[default]
    Default,
    Extended,
}

impl SummaryLength {
    /// Label used in prompts and dry-run output.
    pub fn label(&self) -> &'static str {
        match self {
            SummaryLength::Default => "Default",
            SummaryLength::Extended => "Extended",
        }
    }
}

fn default_language() -> String {
    "en".to_string()
}

/// Summary configuration captured at submission and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOptions {
    #[serde(default)]
    pub style: SummaryStyle,
    #[serde(default)]
    pub length: SummaryLength,
    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            style: SummaryStyle::Default,
            length: SummaryLength::Default,
            language: default_language(),
        }
    }
}

impl JobOptions {
    /// Checks the language tag and normalises it to lowercase.
    pub fn validated(mut self) -> Result<Self, InputError> {
        self.language = normalize_language(&self.language)?;
        Ok(self)
    }
}

/// Trims and lowercases a language tag such as `pt-BR`.
///
/// Tags are 2 to 35 ASCII letters, digits or hyphens.
pub fn normalize_language(raw: &str) -> Result<String, InputError> {
    let language = raw.trim().to_ascii_lowercase();
    let valid = (2..=MAX_LANGUAGE_LEN).contains(&language.len())
        && language
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-');
    if !valid {
        return Err(InputError::InvalidLanguage(raw.to_string()));
    }
    Ok(language)
}

// ─── Outcomes ───────────────────────────────────────────────────────────────

/// Where the summarised text ultimately came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// A file uploaded by the user.
    Upload,
    /// The reference pointed directly at a PDF.
    FetchedPdf,
    /// A PDF link found on a landing page.
    ResolvedPdf,
    /// No PDF was reachable; the landing page description was used.
    HtmlMeta,
    /// No PDF or description; the landing page paragraphs were used.
    HtmlText,
}

/// Best-effort metadata about the summarised document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub source: SourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
}

impl DocumentMetadata {
    pub fn new(source: SourceKind) -> Self {
        Self {
            title: None,
            source,
            resolved_url: None,
            doi: None,
        }
    }
}

/// Payload of a `done` job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    pub summary: String,
    pub metadata: DocumentMetadata,
    pub reading_time_min: u32,
    pub disclaimer: String,
}

impl JobResult {
    /// Builds a result, estimating reading time of the source at 200 words
    /// per minute (at least one minute).
    pub fn new(summary: String, metadata: DocumentMetadata, source_text: &str) -> Self {
        let words = source_text.split_whitespace().count();
        let reading_time_min = u32::try_from(words / 200).unwrap_or(u32::MAX).max(1);
        Self {
            summary,
            metadata,
            reading_time_min,
            disclaimer: SUMMARY_DISCLAIMER.to_string(),
        }
    }
}

/// Pipeline step that terminated a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    ResolutionError,
    ExtractionError,
    SummarizationError,
    /// The process stopped while the job was running.
    Interrupted,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ResolutionError => "ResolutionError",
            ErrorKind::ExtractionError => "ExtractionError",
            ErrorKind::SummarizationError => "SummarizationError",
            ErrorKind::Interrupted => "Interrupted",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ResolutionError" => Ok(ErrorKind::ResolutionError),
            "ExtractionError" => Ok(ErrorKind::ExtractionError),
            "SummarizationError" => Ok(ErrorKind::SummarizationError),
            "Interrupted" => Ok(ErrorKind::Interrupted),
            other => Err(format!("unknown error kind '{}'", other)),
        }
    }
}

/// Finer-grained reason behind an [`ErrorKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
    Timeout,
    RateLimited,
    Upstream,
    Malformed,
    NotFound,
    Fetch,
    UnsupportedFormat,
    Parse,
    InsufficientText,
}

impl FailureCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCause::Timeout => "timeout",
            FailureCause::RateLimited => "rate_limited",
            FailureCause::Upstream => "upstream",
            FailureCause::Malformed => "malformed",
            FailureCause::NotFound => "not_found",
            FailureCause::Fetch => "fetch",
            FailureCause::UnsupportedFormat => "unsupported_format",
            FailureCause::Parse => "parse",
            FailureCause::InsufficientText => "insufficient_text",
        }
    }
}

impl FromStr for FailureCause {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "timeout" => Ok(FailureCause::Timeout),
            "rate_limited" => Ok(FailureCause::RateLimited),
            "upstream" => Ok(FailureCause::Upstream),
            "malformed" => Ok(FailureCause::Malformed),
            "not_found" => Ok(FailureCause::NotFound),
            "fetch" => Ok(FailureCause::Fetch),
            "unsupported_format" => Ok(FailureCause::UnsupportedFormat),
            "parse" => Ok(FailureCause::Parse),
            "insufficient_text" => Ok(FailureCause::InsufficientText),
            other => Err(format!("unknown failure cause '{}'", other)),
        }
    }
}

/// Payload of a `failed` job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    pub kind: ErrorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<FailureCause>,
    pub message: String,
    /// Number of attempts made by the failing step.
    #[serde(default)]
    pub attempts: u32,
}

impl JobError {
    pub fn new(kind: ErrorKind, cause: Option<FailureCause>, message: impl Into<String>) -> Self {
        Self {
            kind,
            cause,
            message: message.into(),
            attempts: 1,
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Data written alongside a state transition.
#[derive(Debug, Clone, PartialEq)]
pub enum JobPatch {
    /// No payload (used when claiming a job).
    Empty,
    Done(JobResult),
    Failed(JobError),
}

// ─── Job ────────────────────────────────────────────────────────────────────

/// One summarisation request and its lifecycle record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub state: JobState,
    pub input: JobInput,
    pub options: JobOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Creates a fresh `queued` job.
    pub fn new(input: JobInput, options: JobOptions) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::generate(),
            state: JobState::Queued,
            input,
            options,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Moves the job to `state`, applying `patch`. Callers are expected to
    /// have validated the edge (see [`crate::store::validate_transition`]).
    pub fn apply(&mut self, state: JobState, patch: JobPatch, at: DateTime<Utc>) {
        self.state = state;
        self.updated_at = at;
        match patch {
            JobPatch::Empty => {}
            JobPatch::Done(result) => {
                self.result = Some(result);
                self.error = None;
            }
            JobPatch::Failed(error) => {
                self.error = Some(error);
                self.result = None;
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_format() {
        let id = JobId::generate();
        assert!(id.as_str().starts_with(JOB_ID_PREFIX));
        assert_eq!(id.as_str().len(), JOB_ID_PREFIX.len() + 32);
        assert_ne!(id, JobId::generate());
    }

    #[test]
    fn test_state_machine_edges() {
        assert!(JobState::Queued.can_transition_to(JobState::Running));
        assert!(JobState::Running.can_transition_to(JobState::Done));
        assert!(JobState::Running.can_transition_to(JobState::Failed));

        assert!(!JobState::Queued.can_transition_to(JobState::Done));
        assert!(!JobState::Running.can_transition_to(JobState::Queued));
        assert!(!JobState::Done.can_transition_to(JobState::Running));
        assert!(!JobState::Failed.can_transition_to(JobState::Done));
        assert!(!JobState::Done.can_transition_to(JobState::Done));
    }

    #[test]
    fn test_state_round_trip_through_str() {
        for state in [
            JobState::Queued,
            JobState::Running,
            JobState::Done,
            JobState::Failed,
        ] {
            assert_eq!(state.as_str().parse::<JobState>().unwrap(), state);
        }
        assert!("error".parse::<JobState>().is_err());
    }

    #[test]
    fn test_input_requires_exactly_one_reference() {
        assert!(matches!(
            JobInput::from_parts(None, None, None),
            Err(InputError::Missing)
        ));
        assert!(matches!(
            JobInput::from_parts(Some("  "), Some(""), None),
            Err(InputError::Missing)
        ));
        assert!(matches!(
            JobInput::from_parts(
                Some("10.1038/s41586-020-2649-2"),
                Some("https://example.com/paper.pdf"),
                None
            ),
            Err(InputError::Ambiguous)
        ));
    }

    #[test]
    fn test_doi_normalisation() {
        let input = JobInput::from_parts(
            Some("https://doi.org/10.1038/s41586-020-2649-2"),
            None,
            None,
        )
        .unwrap();
        assert_eq!(input, JobInput::Doi("10.1038/s41586-020-2649-2".to_string()));

        let input = JobInput::doi("doi:10.1000/XYZ123").unwrap();
        assert_eq!(input, JobInput::Doi("10.1000/XYZ123".to_string()));

        assert!(matches!(
            JobInput::doi("not-a-doi"),
            Err(InputError::InvalidDoi(_))
        ));
    }

    #[test]
    fn test_non_ascii_doi_is_rejected_not_panicking() {
        for raw in ["€€", "€€€€€€€€€€€€€€€€€€", "https://döi.org/10.1000/x", "10.1000/ünïcode"] {
            assert!(
                matches!(
                    JobInput::from_parts(Some(raw), None, None),
                    Err(InputError::InvalidDoi(_))
                ),
                "{raw}"
            );
        }
    }

    #[test]
    fn test_url_validation() {
        let input = JobInput::url("https://example.com/paper.pdf").unwrap();
        assert_eq!(input.kind(), "url");
        assert!(matches!(
            JobInput::url("ftp://example.com/paper.pdf"),
            Err(InputError::InvalidUrl(_))
        ));
        assert!(matches!(
            JobInput::url("example.com/paper.pdf"),
            Err(InputError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_upload_reference_must_be_uuid() {
        let id = UploadId::generate();
        let input = JobInput::from_parts(None, None, Some(id.as_str())).unwrap();
        assert_eq!(input, JobInput::Upload(id));

        assert!(matches!(
            JobInput::from_parts(None, None, Some("../../etc/passwd")),
            Err(InputError::InvalidUploadId(_))
        ));
    }

    #[test]
    fn test_options_language_validation() {
        let opts = JobOptions {
            language: " PT-br ".to_string(),
            ..Default::default()
        }
        .validated()
        .unwrap();
        assert_eq!(opts.language, "pt-br");

        let bad = JobOptions {
            language: "e".to_string(),
            ..Default::default()
        };
        assert!(matches!(bad.validated(), Err(InputError::InvalidLanguage(_))));

        let bad = JobOptions {
            language: "en; drop".to_string(),
            ..Default::default()
        };
        assert!(bad.validated().is_err());
    }

    #[test]
    fn test_options_deserialize_defaults() {
        let opts: JobOptions = serde_json::from_str(r#"{"style":"funny"}"#).unwrap();
        assert_eq!(opts.style, SummaryStyle::Funny);
        assert_eq!(opts.length, SummaryLength::Default);
        assert_eq!(opts.language, "en");
    }

    #[test]
    fn test_reading_time_has_floor_of_one_minute() {
        let meta = DocumentMetadata::new(SourceKind::Upload);
        let result = JobResult::new("s".to_string(), meta.clone(), "few words");
        assert_eq!(result.reading_time_min, 1);

        let long_text = "word ".repeat(1000);
        let result = JobResult::new("s".to_string(), meta, &long_text);
        assert_eq!(result.reading_time_min, 5);
        assert_eq!(result.disclaimer, SUMMARY_DISCLAIMER);
    }

    #[test]
    fn test_apply_keeps_result_and_error_exclusive() {
        let mut job = Job::new(
            JobInput::Url("https://example.com/a.pdf".to_string()),
            JobOptions::default(),
        );
        job.apply(JobState::Running, JobPatch::Empty, Utc::now());
        assert!(job.result.is_none() && job.error.is_none());

        let err = JobError::new(ErrorKind::ExtractionError, None, "bad pdf");
        job.apply(JobState::Failed, JobPatch::Failed(err.clone()), Utc::now());
        assert_eq!(job.error, Some(err));
        assert!(job.result.is_none());
        assert!(job.is_finished());
    }

    #[test]
    fn test_error_kind_serializes_as_pascal_case() {
        let err = JobError::new(
            ErrorKind::ResolutionError,
            Some(FailureCause::Fetch),
            "HTTP 500",
        );
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "ResolutionError");
        assert_eq!(json["cause"], "fetch");
    }
}
