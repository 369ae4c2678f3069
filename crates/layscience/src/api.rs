//! Read-only status and result queries over the job store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ResultError, StoreError};
use crate::job::{Job, JobError, JobId, JobResult, JobState};
use crate::store::JobStore;

/// Snapshot returned to pollers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub id: JobId,
    pub state: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Job> for JobStatus {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.clone(),
            state: job.state,
            error: job.error.clone(),
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

/// Query surface for clients. Every call is a single store read.
#[derive(Clone)]
pub struct StatusApi {
    store: Arc<dyn JobStore>,
}

impl StatusApi {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    pub fn get_status(&self, id: &JobId) -> Result<JobStatus, StoreError> {
        self.store.get(id).map(|job| JobStatus::from(&job))
    }

    /// Returns the result of a `done` job.
    pub fn get_result(&self, id: &JobId) -> Result<JobResult, ResultError> {
        let job = self.store.get(id)?;
        match (job.state, job.result, job.error) {
            (JobState::Done, Some(result), _) => Ok(result),
            (JobState::Failed, _, Some(error)) => Err(ResultError::Failed(error)),
            (state, _, _) => Err(ResultError::NotReady(state)),
        }
    }

    /// Status snapshots of jobs in `state`, oldest first.
    pub fn list(&self, state: JobState, limit: u32) -> Result<Vec<JobStatus>, StoreError> {
        Ok(self
            .store
            .list(state, limit)?
            .iter()
            .map(JobStatus::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{
        DocumentMetadata, ErrorKind, JobInput, JobOptions, JobPatch, SourceKind,
    };
    use crate::store::MemoryJobStore;

    fn setup() -> (Arc<MemoryJobStore>, StatusApi) {
        let store = Arc::new(MemoryJobStore::new());
        let api = StatusApi::new(store.clone());
        (store, api)
    }

    fn create(store: &MemoryJobStore) -> Job {
        store
            .create(
                JobInput::Url("https://example.com/a.pdf".to_string()),
                JobOptions::default(),
            )
            .unwrap()
    }

    #[test]
    fn test_unknown_id() {
        let (_, api) = setup();
        let id = JobId::from("sum_missing");
        assert!(matches!(api.get_status(&id), Err(StoreError::NotFound(_))));
        assert!(matches!(api.get_result(&id), Err(ResultError::NotFound(_))));
    }

    #[test]
    fn test_result_not_ready_while_queued_or_running() {
        let (store, api) = setup();
        let job = create(&store);
        assert!(matches!(
            api.get_result(&job.id),
            Err(ResultError::NotReady(JobState::Queued))
        ));

        store
            .transition(&job.id, JobState::Queued, JobState::Running, JobPatch::Empty)
            .unwrap();
        assert!(matches!(
            api.get_result(&job.id),
            Err(ResultError::NotReady(JobState::Running))
        ));
    }

    #[test]
    fn test_result_for_done_and_failed() {
        let (store, api) = setup();
        let done = create(&store);
        store
            .transition(&done.id, JobState::Queued, JobState::Running, JobPatch::Empty)
            .unwrap();
        let result = JobResult::new(
            "This paper shows X.".to_string(),
            DocumentMetadata::new(SourceKind::Upload),
            "text",
        );
        store
            .transition(
                &done.id,
                JobState::Running,
                JobState::Done,
                JobPatch::Done(result.clone()),
            )
            .unwrap();
        assert_eq!(api.get_result(&done.id).unwrap(), result);

        let failed = create(&store);
        store
            .transition(&failed.id, JobState::Queued, JobState::Running, JobPatch::Empty)
            .unwrap();
        let error = JobError::new(ErrorKind::ResolutionError, None, "HTTP 500");
        store
            .transition(
                &failed.id,
                JobState::Running,
                JobState::Failed,
                JobPatch::Failed(error.clone()),
            )
            .unwrap();
        match api.get_result(&failed.id) {
            Err(ResultError::Failed(e)) => assert_eq!(e, error),
            other => panic!("unexpected: {:?}", other),
        }

        let status = api.get_status(&failed.id).unwrap();
        assert_eq!(status.state, JobState::Failed);
        assert_eq!(status.error, Some(error));
    }

    #[test]
    fn test_status_of_terminal_job_is_stable() {
        let (store, api) = setup();
        let job = create(&store);
        store
            .transition(&job.id, JobState::Queued, JobState::Running, JobPatch::Empty)
            .unwrap();
        store
            .transition(
                &job.id,
                JobState::Running,
                JobState::Failed,
                JobPatch::Failed(JobError::new(ErrorKind::ExtractionError, None, "bad")),
            )
            .unwrap();

        let first = api.get_status(&job.id).unwrap();
        for _ in 0..5 {
            assert_eq!(api.get_status(&job.id).unwrap(), first);
        }
    }

    #[test]
    fn test_list() {
        let (store, api) = setup();
        create(&store);
        create(&store);
        assert_eq!(api.list(JobState::Queued, 10).unwrap().len(), 2);
        assert!(api.list(JobState::Done, 10).unwrap().is_empty());
    }
}
