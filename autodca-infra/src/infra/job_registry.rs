use crate::infra::contracts::{Address, Amount, Job, JobDefinition, JobId, JobStatus, Timestamp};
use crate::infra::validity::ValidityWindow;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("Invalid job window: valid_after {valid_after} must be before valid_until {valid_until}")]
    InvalidWindow {
        valid_after: Timestamp,
        valid_until: Timestamp,
    },
    #[error("Invalid initial job state: {0}")]
    InvalidInitialState(String),
    #[error("Job not found: {0}")]
    NotFound(JobId),
    #[error("Job {job_id} not yet active (starts at {valid_after})")]
    NotYetActive { job_id: JobId, valid_after: Timestamp },
    #[error("Job {job_id} expired at {valid_until}")]
    Expired { job_id: JobId, valid_until: Timestamp },
    #[error("Job {job_id} cooling down until {ready_at}")]
    Cooling { job_id: JobId, ready_at: Timestamp },
    #[error("Job {job_id} exhausted its limit of {limit_amount}")]
    Exhausted { job_id: JobId, limit_amount: Amount },
    #[error("Job {job_id} cannot take {amount}: only {remaining} left")]
    LimitExceeded {
        job_id: JobId,
        amount: Amount,
        remaining: Amount,
    },
    #[error("Job {job_id} has nothing to sweep")]
    NothingToSweep { job_id: JobId },
}

impl JobError {
    /// Short label for metrics and audit lines.
    pub fn reason(&self) -> &'static str {
        match self {
            JobError::InvalidWindow { .. } => "invalid_window",
            JobError::InvalidInitialState(_) => "invalid_initial_state",
            JobError::NotFound(_) => "not_found",
            JobError::NotYetActive { .. } => "not_yet_active",
            JobError::Expired { .. } => "expired",
            JobError::Cooling { .. } => "cooling",
            JobError::Exhausted { .. } => "exhausted",
            JobError::LimitExceeded { .. } => "limit_exceeded",
            JobError::NothingToSweep { .. } => "nothing_to_sweep",
        }
    }
}

impl Job {
    /// Map the derived status onto the rejection an execution at `now` gets.
    pub fn check_eligibility(&self, now: Timestamp) -> Result<(), JobError> {
        match self.status(now) {
            JobStatus::Eligible => Ok(()),
            JobStatus::Pending => Err(JobError::NotYetActive {
                job_id: self.id,
                valid_after: self.valid_after,
            }),
            JobStatus::Expired => Err(JobError::Expired {
                job_id: self.id,
                valid_until: self.valid_until,
            }),
            JobStatus::Cooling => Err(JobError::Cooling {
                job_id: self.id,
                ready_at: self.next_eligible_at(),
            }),
            JobStatus::Exhausted => Err(JobError::Exhausted {
                job_id: self.id,
                limit_amount: self.limit_amount,
            }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRegistrySnapshot {
    pub next_id: JobId,
    pub jobs: Vec<Job>,
}

pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, Job>>,
    next_id: Mutex<JobId>,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            next_id: Mutex::new(0),
        }
    }

    pub fn create(&self, account: &Address, definition: JobDefinition) -> Result<Job, JobError> {
        let window = ValidityWindow::new(definition.valid_after, definition.valid_until);
        if !window.is_well_formed() {
            return Err(JobError::InvalidWindow {
                valid_after: definition.valid_after,
                valid_until: definition.valid_until,
            });
        }
        if definition.used_amount != 0 {
            return Err(JobError::InvalidInitialState(format!(
                "used_amount must start at 0, got {}",
                definition.used_amount
            )));
        }
        if definition.last_executed != 0 {
            return Err(JobError::InvalidInitialState(format!(
                "last_executed must start at 0, got {}",
                definition.last_executed
            )));
        }

        let mut next_id = self.next_id.lock();
        let id = *next_id;
        *next_id += 1;

        let job = Job {
            id,
            account: account.clone(),
            source_token: definition.source_token,
            destination_token: definition.destination_token,
            destination_vault: definition.destination_vault,
            limit_amount: definition.limit_amount,
            used_amount: 0,
            valid_after: definition.valid_after,
            valid_until: definition.valid_until,
            last_executed: 0,
            refresh_interval: definition.refresh_interval,
        };
        self.jobs.write().insert(id, job.clone());
        drop(next_id);

        info!(
            "Created job {} for account {}: {} -> {} (limit {}, window [{}, {}), refresh {}s)",
            id,
            account,
            job.source_token,
            job.destination_vault,
            job.limit_amount,
            job.valid_after,
            job.valid_until,
            job.refresh_interval
        );
        Ok(job)
    }

    pub fn get(&self, job_id: JobId) -> Result<Job, JobError> {
        self.jobs
            .read()
            .get(&job_id)
            .cloned()
            .ok_or(JobError::NotFound(job_id))
    }

    pub fn jobs_for(&self, account: &Address) -> Vec<Job> {
        let mut jobs: Vec<_> = self
            .jobs
            .read()
            .values()
            .filter(|job| &job.account == account)
            .cloned()
            .collect();
        jobs.sort_by_key(|job| job.id);
        jobs
    }

    /// Commit a completed run. Eligibility and the limit are checked again
    /// under the write lock; on any error the record is left untouched.
    pub fn record_execution(
        &self,
        job_id: JobId,
        amount: Amount,
        now: Timestamp,
    ) -> Result<Job, JobError> {
        let mut jobs = self.jobs.write();
        let job = jobs.get_mut(&job_id).ok_or(JobError::NotFound(job_id))?;

        job.check_eligibility(now)?;
        if amount == 0 {
            return Err(JobError::NothingToSweep { job_id });
        }
        let remaining = job.remaining_allowance();
        if amount > remaining {
            return Err(JobError::LimitExceeded {
                job_id,
                amount,
                remaining,
            });
        }

        job.used_amount += amount;
        job.last_executed = now;
        Ok(job.clone())
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }

    pub fn snapshot(&self) -> JobRegistrySnapshot {
        let next_id = *self.next_id.lock();
        let mut jobs: Vec<_> = self.jobs.read().values().cloned().collect();
        jobs.sort_by_key(|job| job.id);
        JobRegistrySnapshot { next_id, jobs }
    }

    /// Replace the registry contents. The id counter never moves backwards:
    /// not below a restored job, and not below an id this registry already
    /// handed out, even when the snapshot is older than the live state.
    pub fn restore(&self, snapshot: JobRegistrySnapshot) {
        let mut next_id = self.next_id.lock();
        let mut jobs = self.jobs.write();
        jobs.clear();

        let mut floor = (*next_id).max(snapshot.next_id);
        for job in snapshot.jobs {
            floor = floor.max(job.id.saturating_add(1));
            jobs.insert(job.id, job);
        }
        *next_id = floor;
    }
}
