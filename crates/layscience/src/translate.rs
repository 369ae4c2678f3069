//! On-demand translation of finished summaries.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::api::StatusApi;
use crate::error::{SummarizeError, TranslateError};
use crate::job::{normalize_language, JobId};
use crate::summarize::Summarizer;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub id: JobId,
    pub target_language: String,
    pub summary: String,
}

/// Translates the summary of a `done` job through the configured summarizer.
///
/// Translations are not stored; each call asks the summarizer again.
#[derive(Clone)]
pub struct SummaryTranslator {
    status: StatusApi,
    summarizer: Arc<dyn Summarizer>,
    timeout: Duration,
}

impl SummaryTranslator {
    pub fn new(status: StatusApi, summarizer: Arc<dyn Summarizer>, timeout: Duration) -> Self {
        Self {
            status,
            summarizer,
            timeout,
        }
    }

    pub async fn translate(
        &self,
        id: &JobId,
        target_language: &str,
    ) -> Result<Translation, TranslateError> {
        let language = normalize_language(target_language)?;
        let result = self.status.get_result(id)?;

        let summary = tokio::time::timeout(
            self.timeout,
            self.summarizer.translate(&result.summary, &language),
        )
        .await
        .map_err(|_| SummarizeError::Timeout)??;

        tracing::info!(job_id = %id, %language, "Summary translated");
        Ok(Translation {
            id: id.clone(),
            target_language: language,
            summary,
        })
    }
}
