//! Scripted collaborators with call counters.
//!
//! Each mock takes a closure receiving the zero-based call index, so a test
//! can fail the first N calls and succeed afterwards.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use layscience::error::{ExtractError, ResolveError, SummarizeError};
use layscience::extract::{ExtractedText, TextExtractor};
use layscience::job::{DocumentMetadata, JobInput, JobOptions, SourceKind};
use layscience::source::{DocumentSource, ResolvedDocument, TEXT_MIME};
use layscience::summarize::Summarizer;

/// Long enough to pass the default minimum-text check.
pub const PAPER_TEXT: &str = "We measured the effect of coffee on the reading speed of \
     graduate students across three universities and found a small but consistent \
     improvement that vanished after the second cup.";

pub const SUMMARY: &str = "This paper shows X.";

type ScriptFn<T, E> = Box<dyn Fn(u32) -> Result<T, E> + Send + Sync>;

#[derive(Default)]
pub struct CallCounter(AtomicU32);

impl CallCounter {
    fn next(&self) -> u32 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }

    pub fn get(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }
}

pub fn document(text: &str) -> ResolvedDocument {
    let mut metadata = DocumentMetadata::new(SourceKind::FetchedPdf);
    metadata.title = Some("Coffee and Reading".to_string());
    metadata.resolved_url = Some("https://example.org/paper.pdf".to_string());
    ResolvedDocument {
        bytes: text.as_bytes().to_vec(),
        content_type: TEXT_MIME.to_string(),
        metadata,
    }
}

pub struct MockSource {
    pub calls: CallCounter,
    script: ScriptFn<ResolvedDocument, ResolveError>,
}

impl MockSource {
    pub fn new<F>(script: F) -> Arc<Self>
    where
        F: Fn(u32) -> Result<ResolvedDocument, ResolveError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            calls: CallCounter::default(),
            script: Box::new(script),
        })
    }

    pub fn ok() -> Arc<Self> {
        Self::new(|_| Ok(document(PAPER_TEXT)))
    }

    pub fn with_text(text: &'static str) -> Arc<Self> {
        Self::new(move |_| Ok(document(text)))
    }
}

#[async_trait]
impl DocumentSource for MockSource {
    async fn resolve(&self, _input: &JobInput) -> Result<ResolvedDocument, ResolveError> {
        let call = self.calls.next();
        (self.script)(call)
    }
}

/// Passes the document bytes through as UTF-8 and truncates.
#[derive(Default)]
pub struct MockExtractor {
    pub calls: CallCounter,
    delay: Option<Duration>,
    title: Option<String>,
}

impl MockExtractor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every call takes `delay` before answering.
    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    /// Reports `title` as the document's embedded title.
    pub fn titled(title: &str) -> Arc<Self> {
        Arc::new(Self {
            title: Some(title.to_string()),
            ..Self::default()
        })
    }
}

#[async_trait]
impl TextExtractor for MockExtractor {
    async fn extract(
        &self,
        bytes: &[u8],
        max_chars: usize,
    ) -> Result<ExtractedText, ExtractError> {
        self.calls.next();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let text = std::str::from_utf8(bytes)
            .map_err(|e| ExtractError::Parse(e.to_string()))?;
        Ok(ExtractedText {
            text: text.chars().take(max_chars).collect(),
            title: self.title.clone(),
        })
    }
}

pub struct MockSummarizer {
    pub calls: CallCounter,
    script: ScriptFn<String, SummarizeError>,
    delay: Option<Duration>,
    gate: Option<Arc<Notify>>,
}

impl MockSummarizer {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(u32) -> Result<String, SummarizeError> + Send + Sync + 'static,
    {
        Self {
            calls: CallCounter::default(),
            script: Box::new(script),
            delay: None,
            gate: None,
        }
    }

    pub fn ok() -> Arc<Self> {
        Arc::new(Self::new(|_| Ok(SUMMARY.to_string())))
    }

    /// Sleeps before answering; longer than the step timeout means a timeout.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Blocks every call until the gate is notified.
    pub fn with_gate(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl Summarizer for MockSummarizer {
    async fn summarize(
        &self,
        _text: &str,
        _metadata: &DocumentMetadata,
        _options: &JobOptions,
    ) -> Result<String, SummarizeError> {
        let call = self.calls.next();
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.script)(call)
    }

    async fn translate(&self, summary: &str, language: &str) -> Result<String, SummarizeError> {
        Ok(format!("({}) {}", language, summary))
    }
}
