//! Job orchestrator: owns the state machine and runs the
//! resolve → extract → summarize pipeline as background work.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinHandle;
use tracing::{info_span, Instrument};

use crate::error::{ExtractError, ResolveError, StoreError, SummarizeError};
use crate::events::{JobEvent, JobEventBroadcaster};
use crate::extract::{meaningful_chars, TextExtractor};
use crate::job::{
    ErrorKind, FailureCause, Job, JobError, JobId, JobInput, JobOptions, JobPatch, JobResult,
    JobState,
};
use crate::source::DocumentSource;
use crate::store::JobStore;
use crate::summarize::Summarizer;

pub mod retry;

pub use retry::{OnTimeout, RetryPolicy, StepError, StepFailure, Transient};

use retry::run_step;

/// Per-step time budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepTimeouts {
    pub resolve: Duration,
    pub extract: Duration,
    pub summarize: Duration,
}

impl Default for StepTimeouts {
    fn default() -> Self {
        Self {
            resolve: Duration::from_secs(30),
            extract: Duration::from_secs(60),
            summarize: Duration::from_secs(120),
        }
    }
}

/// Tunables for pipeline execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Character budget handed to the extractor.
    pub max_source_chars: usize,
    /// Fewer non-whitespace characters than this is an extraction failure.
    pub min_text_chars: usize,
    /// Shorter summaries are treated as malformed output.
    pub min_summary_chars: usize,
    pub timeouts: StepTimeouts,
    pub retry: RetryPolicy,
    /// Upper bound on concurrently executing pipelines.
    pub max_concurrent_jobs: usize,
    pub event_capacity: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_source_chars: 120_000,
            min_text_chars: 50,
            min_summary_chars: 20,
            timeouts: StepTimeouts::default(),
            retry: RetryPolicy::default(),
            max_concurrent_jobs: num_cpus::get(),
            event_capacity: 256,
        }
    }
}

/// The three pipeline collaborators.
#[derive(Clone)]
pub struct Collaborators {
    pub source: Arc<dyn DocumentSource>,
    pub extractor: Arc<dyn TextExtractor>,
    pub summarizer: Arc<dyn Summarizer>,
}

/// What a single execution trigger ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// This trigger ran the pipeline and the job is `done`.
    Completed,
    /// This trigger ran the pipeline and the job is `failed`.
    Failed(ErrorKind),
    /// Another trigger owns the job (or it could not be claimed); nothing ran.
    Skipped,
}

/// Counts from [`Orchestrator::recover`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub rescheduled: usize,
    pub interrupted: usize,
}

struct Inner {
    store: Arc<dyn JobStore>,
    collaborators: Collaborators,
    settings: PipelineSettings,
    permits: Arc<Semaphore>,
    events: JobEventBroadcaster,
}

/// Cheaply cloneable handle; clones share the store, permits and events.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

fn step_error<E: std::fmt::Display>(
    kind: ErrorKind,
    failure: StepFailure<E>,
    cause_of: impl Fn(&E) -> FailureCause,
) -> JobError {
    let cause = match &failure.error {
        StepError::Timeout(_) => FailureCause::Timeout,
        StepError::Failed(e) => cause_of(e),
    };
    JobError::new(kind, Some(cause), failure.error.to_string()).with_attempts(failure.attempts)
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn JobStore>,
        collaborators: Collaborators,
        settings: PipelineSettings,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(settings.max_concurrent_jobs.max(1)));
        let events = JobEventBroadcaster::new(settings.event_capacity);
        Self {
            inner: Arc::new(Inner {
                store,
                collaborators,
                settings,
                permits,
                events,
            }),
        }
    }

    pub fn store(&self) -> Arc<dyn JobStore> {
        Arc::clone(&self.inner.store)
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.inner.settings
    }

    /// Subscribes to state transitions of all jobs.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.inner.events.subscribe()
    }

    fn publish(&self, job: &Job) {
        self.inner.events.send(JobEvent::from_job(job));
    }

    /// Creates a `queued` job, schedules its execution and returns at once.
    pub async fn submit(&self, input: JobInput, options: JobOptions) -> Result<Job, StoreError> {
        let job = self.inner.store.create(input, options)?;
        tracing::info!(job_id = %job.id, input = job.input.kind(), "Job submitted");
        self.publish(&job);
        self.spawn(job.id.clone());
        Ok(job)
    }

    /// Schedules one execution trigger for `id` on the Tokio runtime.
    pub fn spawn(&self, id: JobId) -> JoinHandle<ExecutionOutcome> {
        let this = self.clone();
        let span = info_span!("job", job_id = %id);
        tokio::spawn(async move { this.execute(&id).await }.instrument(span))
    }

    /// Runs the pipeline for `id` if this call wins the `queued → running`
    /// claim. Losing the claim is silent: another trigger owns the job.
    pub async fn execute(&self, id: &JobId) -> ExecutionOutcome {
        // Waiting for a permit leaves the job queued.
        let _permit = match Arc::clone(&self.inner.permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                tracing::warn!("Concurrency limiter closed, not running job");
                return ExecutionOutcome::Skipped;
            }
        };

        let job = match self.inner.store.transition(
            id,
            JobState::Queued,
            JobState::Running,
            JobPatch::Empty,
        ) {
            Ok(job) => job,
            Err(StoreError::Conflict { actual, .. }) => {
                tracing::debug!(state = %actual, "Job already claimed");
                return ExecutionOutcome::Skipped;
            }
            Err(e) => {
                tracing::error!("Failed to claim job: {}", e);
                return ExecutionOutcome::Skipped;
            }
        };
        self.publish(&job);

        let outcome = self.run_pipeline(&job).await;

        let (state, patch, result) = match outcome {
            Ok(result) => (
                JobState::Done,
                JobPatch::Done(result),
                ExecutionOutcome::Completed,
            ),
            Err(error) => {
                let kind = error.kind;
                (
                    JobState::Failed,
                    JobPatch::Failed(error),
                    ExecutionOutcome::Failed(kind),
                )
            }
        };

        match self
            .inner
            .store
            .transition(id, JobState::Running, state, patch)
        {
            Ok(job) => {
                tracing::info!(state = %job.state, "Job finished");
                self.publish(&job);
            }
            Err(StoreError::Conflict { actual, .. }) => {
                tracing::debug!(state = %actual, "Job finished elsewhere, dropping outcome");
            }
            Err(e) => {
                tracing::error!("Failed to record job outcome: {}", e);
            }
        }

        result
    }

    async fn run_pipeline(&self, job: &Job) -> Result<JobResult, JobError> {
        let settings = &self.inner.settings;
        let source = &self.inner.collaborators.source;
        let extractor = &self.inner.collaborators.extractor;
        let summarizer = &self.inner.collaborators.summarizer;

        let document = {
            let input = &job.input;
            run_step(
                "resolve",
                &settings.retry,
                settings.timeouts.resolve,
                OnTimeout::Retry,
                move || source.resolve(input),
            )
            .instrument(info_span!("resolve", input = input.kind()))
            .await
            .map_err(|f| step_error(ErrorKind::ResolutionError, f, ResolveError::cause))?
        };

        let extracted = {
            let bytes = document.bytes.as_slice();
            let max_chars = settings.max_source_chars;
            run_step(
                "extract",
                &settings.retry,
                settings.timeouts.extract,
                OnTimeout::GiveUp,
                move || extractor.extract(bytes, max_chars),
            )
            .instrument(info_span!("extract", bytes = bytes.len()))
            .await
            .map_err(|f| step_error(ErrorKind::ExtractionError, f, ExtractError::cause))?
        };
        let text = extracted.text;
        let mut metadata = document.metadata;
        if metadata.title.is_none() {
            metadata.title = extracted.title;
        }

        let chars = meaningful_chars(&text);
        if chars < settings.min_text_chars {
            let err = ExtractError::InsufficientText {
                chars,
                min: settings.min_text_chars,
            };
            return Err(JobError::new(
                ErrorKind::ExtractionError,
                Some(err.cause()),
                err.to_string(),
            ));
        }

        let summary = {
            let text = text.as_str();
            let metadata = &metadata;
            let options = &job.options;
            let min_chars = settings.min_summary_chars;
            run_step(
                "summarize",
                &settings.retry,
                settings.timeouts.summarize,
                OnTimeout::Retry,
                move || async move {
                    let summary = summarizer.summarize(text, metadata, options).await?;
                    let summary = summary.trim();
                    if summary.chars().count() < min_chars {
                        return Err(SummarizeError::Malformed(format!(
                            "summary shorter than {} characters",
                            min_chars
                        )));
                    }
                    Ok(summary.to_string())
                },
            )
            .instrument(info_span!("summarize", chars = text.len()))
            .await
            .map_err(|f| step_error(ErrorKind::SummarizationError, f, SummarizeError::cause))?
        };

        Ok(JobResult::new(summary, metadata, &text))
    }

    /// Start-up recovery after a restart.
    ///
    /// Jobs left `running` lost their executor and are failed as
    /// `Interrupted`; jobs left `queued` are scheduled again.
    pub async fn recover(&self) -> Result<RecoveryReport, StoreError> {
        let mut report = RecoveryReport::default();

        for job in self.inner.store.list(JobState::Running, u32::MAX)? {
            let error = JobError::new(
                ErrorKind::Interrupted,
                None,
                "the service restarted while this job was running",
            );
            match self.inner.store.transition(
                &job.id,
                JobState::Running,
                JobState::Failed,
                JobPatch::Failed(error),
            ) {
                Ok(job) => {
                    report.interrupted += 1;
                    self.publish(&job);
                }
                Err(StoreError::Conflict { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        for job in self.inner.store.list(JobState::Queued, u32::MAX)? {
            self.spawn(job.id);
            report.rescheduled += 1;
        }

        if report.interrupted > 0 || report.rescheduled > 0 {
            tracing::info!(
                interrupted = report.interrupted,
                rescheduled = report.rescheduled,
                "Recovered jobs from previous run"
            );
        }
        Ok(report)
    }
}
