//! Summarizers: turn extracted paper text into a lay summary.

use async_trait::async_trait;

use crate::error::SummarizeError;
use crate::job::{DocumentMetadata, JobOptions};

pub mod dry_run;
pub mod openai;
pub mod prompt;

pub use dry_run::DryRunSummarizer;
pub use openai::OpenAiSummarizer;

/// Produces summary text for a document.
///
/// Implementations may fail, time out, or return malformed output; callers
/// wrap every call in a timeout and retry transient failures.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(
        &self,
        text: &str,
        metadata: &DocumentMetadata,
        options: &JobOptions,
    ) -> Result<String, SummarizeError>;

    /// Rewrites a finished summary in `language`, a normalised tag.
    async fn translate(&self, summary: &str, language: &str) -> Result<String, SummarizeError>;
}
