//! In-memory job store, used by tests and ephemeral deployments.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use crate::error::StoreError;
use crate::job::{Job, JobId, JobInput, JobOptions, JobPatch, JobState};

use super::{validate_transition, JobStore};

/// Job store backed by a `RwLock<HashMap>`.
///
/// The write lock is held only while the compare-and-set runs.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<JobId, Job>> {
        match self.jobs.read() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Memory job store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<JobId, Job>> {
        match self.jobs.write() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Memory job store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl JobStore for MemoryJobStore {
    fn create(&self, input: JobInput, options: JobOptions) -> Result<Job, StoreError> {
        let mut job = Job::new(input, options);
        let mut jobs = self.write();
        while jobs.contains_key(&job.id) {
            job.id = JobId::generate();
        }
        jobs.insert(job.id.clone(), job.clone());
        Ok(job)
    }

    fn get(&self, id: &JobId) -> Result<Job, StoreError> {
        self.read()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    fn transition(
        &self,
        id: &JobId,
        expected: JobState,
        new: JobState,
        patch: JobPatch,
    ) -> Result<Job, StoreError> {
        validate_transition(expected, new, &patch)?;

        let mut jobs = self.write();
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        if job.state != expected {
            return Err(StoreError::Conflict {
                id: id.clone(),
                expected,
                actual: job.state,
            });
        }

        // Keep updated_at monotonic even if the wall clock steps back.
        let now = Utc::now().max(job.updated_at);
        job.apply(new, patch, now);
        Ok(job.clone())
    }

    fn list(&self, state: JobState, limit: u32) -> Result<Vec<Job>, StoreError> {
        let mut jobs: Vec<Job> = self
            .read()
            .values()
            .filter(|j| j.state == state)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        jobs.truncate(limit as usize);
        Ok(jobs)
    }
}
