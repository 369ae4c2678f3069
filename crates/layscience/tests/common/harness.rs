//! Orchestrator wired to mock collaborators and an in-memory store.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use layscience::job::{Job, JobId, JobInput, JobOptions, JobState};
use layscience::orchestrator::{
    Collaborators, Orchestrator, PipelineSettings, RetryPolicy, StepTimeouts,
};
use layscience::store::{JobStore, MemoryJobStore};
use layscience::StatusApi;

use super::mocks::{MockExtractor, MockSource, MockSummarizer};

/// Settings tuned for tests: short timeouts and a permissive summary length.
pub fn test_settings() -> PipelineSettings {
    PipelineSettings {
        min_summary_chars: 10,
        timeouts: StepTimeouts {
            resolve: Duration::from_secs(5),
            extract: Duration::from_secs(5),
            summarize: Duration::from_secs(5),
        },
        retry: RetryPolicy {
            max_retries: 2,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(100),
        },
        max_concurrent_jobs: 4,
        ..PipelineSettings::default()
    }
}

pub struct TestHarness {
    pub store: Arc<dyn JobStore>,
    pub orchestrator: Orchestrator,
    pub status: StatusApi,
    pub source: Arc<MockSource>,
    pub extractor: Arc<MockExtractor>,
    pub summarizer: Arc<MockSummarizer>,
}

impl TestHarness {
    /// Every collaborator succeeds.
    pub fn new() -> Self {
        Self::build(MockSource::ok(), MockSummarizer::ok(), test_settings())
    }

    pub fn with_source(source: Arc<MockSource>) -> Self {
        Self::build(source, MockSummarizer::ok(), test_settings())
    }

    pub fn with_summarizer(summarizer: Arc<MockSummarizer>) -> Self {
        Self::build(MockSource::ok(), summarizer, test_settings())
    }

    pub fn build(
        source: Arc<MockSource>,
        summarizer: Arc<MockSummarizer>,
        settings: PipelineSettings,
    ) -> Self {
        Self::build_with_store(Arc::new(MemoryJobStore::new()), source, summarizer, settings)
    }

    pub fn build_with_store(
        store: Arc<dyn JobStore>,
        source: Arc<MockSource>,
        summarizer: Arc<MockSummarizer>,
        settings: PipelineSettings,
    ) -> Self {
        Self::assemble(store, source, MockExtractor::new(), summarizer, settings)
    }

    pub fn with_extractor(
        source: Arc<MockSource>,
        extractor: Arc<MockExtractor>,
        settings: PipelineSettings,
    ) -> Self {
        Self::assemble(
            Arc::new(MemoryJobStore::new()),
            source,
            extractor,
            MockSummarizer::ok(),
            settings,
        )
    }

    fn assemble(
        store: Arc<dyn JobStore>,
        source: Arc<MockSource>,
        extractor: Arc<MockExtractor>,
        summarizer: Arc<MockSummarizer>,
        settings: PipelineSettings,
    ) -> Self {
        let collaborators = Collaborators {
            source: source.clone(),
            extractor: extractor.clone(),
            summarizer: summarizer.clone(),
        };
        let orchestrator = Orchestrator::new(Arc::clone(&store), collaborators, settings);
        Self {
            status: StatusApi::new(Arc::clone(&store)),
            store,
            orchestrator,
            source,
            extractor,
            summarizer,
        }
    }

    pub fn url_input() -> JobInput {
        JobInput::url("https://example.org/paper.pdf").unwrap()
    }

    /// Creates a `queued` job without scheduling it.
    pub fn create_queued(&self) -> Job {
        self.store
            .create(Self::url_input(), JobOptions::default())
            .unwrap()
    }

    /// Polls until the job is terminal or `limit` elapses.
    pub async fn wait_terminal(&self, id: &JobId, limit: Duration) -> Job {
        let deadline = tokio::time::Instant::now() + limit;
        loop {
            let job = self.store.get(id).unwrap();
            if job.state.is_terminal() {
                return job;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "job {} still {} after {:?}",
                id,
                job.state,
                limit
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Polls until the job reaches `state`.
    pub async fn wait_state(&self, id: &JobId, state: JobState, limit: Duration) {
        let deadline = tokio::time::Instant::now() + limit;
        while self.store.get(id).unwrap().state != state {
            assert!(
                tokio::time::Instant::now() < deadline,
                "job {} never reached {}",
                id,
                state
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}
