//! Offline summarizer returning a fixed, deterministic summary.

use async_trait::async_trait;

use crate::error::SummarizeError;
use crate::job::{DocumentMetadata, JobOptions};

use super::prompt::word_limit;
use super::Summarizer;

/// Mock summarizer for local runs and demos; never calls the network.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunSummarizer;

#[async_trait]
impl Summarizer for DryRunSummarizer {
    async fn summarize(
        &self,
        text: &str,
        metadata: &DocumentMetadata,
        options: &JobOptions,
    ) -> Result<String, SummarizeError> {
        let title = metadata.title.as_deref().unwrap_or("(unknown title)");
        let link = metadata
            .doi
            .as_deref()
            .or(metadata.resolved_url.as_deref())
            .unwrap_or("");

        Ok(format!(
            "Title: {}\n\
             Authors: (unknown authors)\n\
             Venue/Year: (unknown venue)\n\
             Link/DOI: {}\n\n\
             **Lay Summary - {}**\n\
             Problem: Example problem statement (mock).\n\
             Solution: Example solution summary (mock, {} source words, limit {} words, language {}).\n\
             Impact: Example impact summary and at least one limitation (mock).",
            title,
            link,
            options.length.label(),
            text.split_whitespace().count(),
            word_limit(options.length),
            options.language,
        ))
    }

    /// Tags every non-empty line with `[<language>]`.
    async fn translate(&self, summary: &str, language: &str) -> Result<String, SummarizeError> {
        Ok(summary
            .lines()
            .map(|line| {
                if line.trim().is_empty() {
                    String::new()
                } else {
                    format!("[{}] {}", language, line)
                }
            })
            .collect::<Vec<_>>()
            .join("\n"))
    }
}
