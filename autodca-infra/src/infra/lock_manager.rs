//! Per-job mutual exclusion for the sweep critical section.

use crate::infra::contracts::JobId;
use parking_lot::{Condvar, Mutex};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    #[error("Lock timeout for job: {0}")]
    Timeout(JobId),
}

/// Jobs currently inside their critical section. An id is in the set exactly
/// while a [`JobLock`] for it is alive.
#[derive(Default)]
struct HeldJobs {
    jobs: Mutex<HashSet<JobId>>,
    released: Condvar,
}

/// Hands out one [`JobLock`] per job id at a time. Locks on different jobs
/// never wait on each other, and released ids leave no residue behind.
#[derive(Clone)]
pub struct LockManager {
    held: Arc<HeldJobs>,
    timeout: Duration,
}

impl LockManager {
    pub fn new(timeout: Duration) -> Self {
        Self {
            held: Arc::new(HeldJobs::default()),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Take the job if nobody holds it right now.
    pub fn try_acquire(&self, job_id: JobId) -> Option<JobLock> {
        if !self.held.jobs.lock().insert(job_id) {
            return None;
        }
        debug!("Locked job {} without waiting", job_id);
        Some(self.guard(job_id))
    }

    /// Take the job, blocking until the current holder drops its lock or the
    /// timeout runs out.
    pub fn acquire(&self, job_id: JobId) -> Result<JobLock, LockError> {
        let started = Instant::now();
        let deadline = started + self.timeout;

        let mut jobs = self.held.jobs.lock();
        while jobs.contains(&job_id) {
            let expired = self.held.released.wait_until(&mut jobs, deadline).timed_out();
            if expired && jobs.contains(&job_id) {
                warn!(
                    "Job {} still held after {:?}, giving up",
                    job_id, self.timeout
                );
                return Err(LockError::Timeout(job_id));
            }
        }
        jobs.insert(job_id);
        drop(jobs);

        debug!("Locked job {} after {:?}", job_id, started.elapsed());
        Ok(self.guard(job_id))
    }

    /// Number of jobs currently locked.
    pub fn held_count(&self) -> usize {
        self.held.jobs.lock().len()
    }

    fn guard(&self, job_id: JobId) -> JobLock {
        JobLock {
            held: Arc::clone(&self.held),
            job_id,
        }
    }
}

/// Owned hold on one job. It does not borrow the manager, so it can cross
/// threads and tasks; dropping it (on return, unwind or cancellation of the
/// owner) frees the job and wakes waiters.
pub struct JobLock {
    held: Arc<HeldJobs>,
    job_id: JobId,
}

impl JobLock {
    pub fn job_id(&self) -> JobId {
        self.job_id
    }
}

impl Drop for JobLock {
    fn drop(&mut self) {
        self.held.jobs.lock().remove(&self.job_id);
        // Waiters for every job share the condvar; each re-checks its own id.
        self.held.released.notify_all();
    }
}
