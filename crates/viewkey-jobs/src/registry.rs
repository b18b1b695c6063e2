//! In-memory job registry.

use crate::error::{JobError, Result};
use crate::job::{lock_job, Job, JobSnapshot, SharedJob};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tracing::debug;
use viewkey_core::{JobId, Timestamp};

/// Registry of live jobs, shared between the request side and the workers.
///
/// Terminal jobs are removed on the first poll that observes them, so each
/// result is handed out exactly once.
#[derive(Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<JobId, SharedJob>>>,
}

impl JobRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job and return its shared cell.
    ///
    /// # Errors
    /// Returns [`JobError::DuplicateId`] if the ID is already registered.
    pub fn insert(&self, job: Job) -> Result<SharedJob> {
        let mut jobs = self.jobs.write().expect("acquire write lock on jobs");
        if jobs.contains_key(&job.id) {
            return Err(JobError::DuplicateId(job.id));
        }
        let id = job.id.clone();
        let cell = Arc::new(Mutex::new(job));
        jobs.insert(id, Arc::clone(&cell));
        Ok(cell)
    }

    /// The shared cell of a job, if registered.
    #[must_use]
    pub fn get(&self, id: &JobId) -> Option<SharedJob> {
        let jobs = self.jobs.read().expect("acquire read lock on jobs");
        jobs.get(id).cloned()
    }

    /// Snapshot a job and, if it is terminal, remove it in the same step.
    ///
    /// The write lock is held across both, so of several concurrent pollers
    /// exactly one sees the terminal state.
    pub fn observe(&self, id: &JobId, now: &Timestamp) -> Option<JobSnapshot> {
        let mut jobs = self.jobs.write().expect("acquire write lock on jobs");
        let snapshot = lock_job(jobs.get(id)?).snapshot(now);
        if snapshot.status.is_terminal() {
            jobs.remove(id);
            debug!(job_id = %id, status = ?snapshot.status, "removed finished job");
        }
        Some(snapshot)
    }

    /// Number of registered jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.read().expect("acquire read lock on jobs").len()
    }

    /// Whether no jobs are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobStatus;
    use std::thread;

    fn job(seed: &str) -> Job {
        Job::new(JobId::derive(seed.as_bytes()))
    }

    #[test]
    fn test_insert_rejects_duplicate() {
        let registry = JobRegistry::new();
        registry.insert(job("a")).expect("first insert");
        let err = registry.insert(job("a")).expect_err("duplicate");
        assert!(matches!(err, JobError::DuplicateId(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_observe_unknown_is_none() {
        let registry = JobRegistry::new();
        assert!(registry
            .observe(&JobId::derive(b"missing"), &Timestamp::now())
            .is_none());
    }

    #[test]
    fn test_pending_job_stays_registered() {
        let registry = JobRegistry::new();
        let cell = registry.insert(job("pending")).expect("insert");
        let id = lock_job(&cell).id.clone();

        let first = registry.observe(&id, &Timestamp::now()).expect("registered");
        assert_eq!(first.status, JobStatus::Queued);
        assert!(registry.get(&id).is_some());
    }

    #[test]
    fn test_terminal_job_removed_after_observe() {
        let registry = JobRegistry::new();
        let cell = registry.insert(job("done")).expect("insert");
        let id = {
            let mut job = lock_job(&cell);
            job.status = JobStatus::Failed;
            job.error = Some("Sync failed.".to_string());
            job.id.clone()
        };

        let snapshot = registry.observe(&id, &Timestamp::now()).expect("registered");
        assert_eq!(snapshot.status, JobStatus::Failed);
        assert!(registry.observe(&id, &Timestamp::now()).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_observers_see_terminal_once() {
        let registry = JobRegistry::new();
        let cell = registry.insert(job("race")).expect("insert");
        let id = {
            let mut job = lock_job(&cell);
            job.status = JobStatus::Done;
            job.id.clone()
        };

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                let id = id.clone();
                thread::spawn(move || registry.observe(&id, &Timestamp::now()))
            })
            .collect();

        let terminal = handles
            .into_iter()
            .filter_map(|h| h.join().expect("observer thread"))
            .filter(|s| s.status == JobStatus::Done)
            .count();
        assert_eq!(terminal, 1);
    }
}
