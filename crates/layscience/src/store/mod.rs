//! Job store: the single shared mutable resource of the service.
//!
//! Every mutation goes through [`JobStore::create`] or
//! [`JobStore::transition`]. Transitions are compare-and-set on the current
//! state, so concurrent writers can never both win the same edge.

use crate::error::StoreError;
use crate::job::{Job, JobId, JobInput, JobOptions, JobPatch, JobState};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryJobStore;
pub use sqlite::SqliteJobStore;

/// Default page size for [`JobStore::list`] callers that have no opinion.
pub const DEFAULT_LIST_LIMIT: u32 = 100;

/// Durable mapping from job id to job record.
///
/// Implementations hold their internal lock only for the duration of a
/// single operation; none of these methods block on I/O other than local
/// storage.
pub trait JobStore: Send + Sync {
    /// Persists a fresh `queued` job with a new unique id.
    fn create(&self, input: JobInput, options: JobOptions) -> Result<Job, StoreError>;

    /// Returns the job or [`StoreError::NotFound`].
    fn get(&self, id: &JobId) -> Result<Job, StoreError>;

    /// Atomically moves `id` from `expected` to `new`, applying `patch` and
    /// bumping `updated_at`. Returns [`StoreError::Conflict`] if the job is
    /// not currently in `expected`.
    fn transition(
        &self,
        id: &JobId,
        expected: JobState,
        new: JobState,
        patch: JobPatch,
    ) -> Result<Job, StoreError>;

    /// Jobs in `state`, oldest first, at most `limit` of them.
    fn list(&self, state: JobState, limit: u32) -> Result<Vec<Job>, StoreError>;
}

/// Rejects anything that is not an edge of the state machine or whose patch
/// does not fit the target state.
pub fn validate_transition(
    expected: JobState,
    new: JobState,
    patch: &JobPatch,
) -> Result<(), StoreError> {
    let invalid = |reason: &str| StoreError::InvalidTransition {
        from: expected,
        to: new,
        reason: reason.to_string(),
    };

    if !expected.can_transition_to(new) {
        return Err(invalid("not an edge of the job state machine"));
    }

    match (new, patch) {
        (JobState::Running, JobPatch::Empty) => Ok(()),
        (JobState::Running, _) => Err(invalid("claiming a job carries no payload")),
        (JobState::Done, JobPatch::Done(_)) => Ok(()),
        (JobState::Done, _) => Err(invalid("a done job requires a result")),
        (JobState::Failed, JobPatch::Failed(_)) => Ok(()),
        (JobState::Failed, _) => Err(invalid("a failed job requires an error")),
        (JobState::Queued, _) => Err(invalid("jobs never re-enter queued")),
    }
}
