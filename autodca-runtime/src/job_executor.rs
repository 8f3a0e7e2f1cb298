//! Job executor - the sweep kernel.

use crate::interfaces::{DepositRequest, EngineError, LockManager, TokenLedger, Vault};
use crate::metrics::{self, MetricTimer};
use crate::types::ExecutionReceipt;
use autodca::infra::contracts::{Amount, Job, JobId, Timestamp};
use autodca::infra::job_registry::{JobError, JobRegistry};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Amount a sweep moves: the whole balance, clamped to what the job may
/// still spend.
pub fn sweep_amount(balance: Amount, remaining: Amount) -> Amount {
    balance.min(remaining)
}

/// Executes jobs: moves the account's source balance into the job's vault
/// within its limit, window and cooldown.
///
/// Each job runs under its own lock for the whole read, transfer and commit
/// sequence, so two triggers for one job never interleave.
pub struct JobExecutor {
    registry: Arc<JobRegistry>,
    lock_manager: Arc<dyn LockManager>,
    token: Arc<dyn TokenLedger>,
    vault: Arc<dyn Vault>,
}

impl JobExecutor {
    pub fn new(
        registry: Arc<JobRegistry>,
        lock_manager: Arc<dyn LockManager>,
        token: Arc<dyn TokenLedger>,
        vault: Arc<dyn Vault>,
    ) -> Self {
        Self {
            registry,
            lock_manager,
            token,
            vault,
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Run one sweep of `job_id` at `now`.
    ///
    /// Rejections (`NotYetActive`, `Expired`, `Cooling`, `Exhausted`,
    /// `NothingToSweep`) leave the job and all balances untouched.
    pub async fn execute_job(
        &self,
        job_id: JobId,
        now: Timestamp,
    ) -> Result<ExecutionReceipt, EngineError> {
        let _timer = MetricTimer::new("execution_duration");

        // Unknown ids never get a lock slot.
        self.registry.get(job_id)?;

        debug!("Acquiring lock for job: {}", job_id);
        let guard = self.lock_manager.acquire(job_id).await?;

        // The guard lives across every await below. If this future is
        // dropped mid-sweep the job is still released.
        let result = self.execute_locked(job_id, now).await;

        debug!("Releasing lock for job: {}", guard.job_id());
        drop(guard);

        match &result {
            Ok(receipt) => metrics::record_execution(receipt.amount),
            Err(e) => {
                warn!("Job {} rejected at {}: {}", job_id, now, e);
                metrics::record_rejection(e.reason());
            }
        }
        result
    }

    async fn execute_locked(
        &self,
        job_id: JobId,
        now: Timestamp,
    ) -> Result<ExecutionReceipt, EngineError> {
        let job = self.registry.get(job_id)?;
        job.check_eligibility(now)?;

        let balance = self
            .token
            .balance_of(&job.source_token, &job.account)
            .await?;
        let amount = sweep_amount(balance, job.remaining_allowance());
        if amount == 0 {
            return Err(JobError::NothingToSweep { job_id }.into());
        }

        debug!(
            "Job {}: balance {}, remaining {}, sweeping {}",
            job_id,
            balance,
            job.remaining_allowance(),
            amount
        );

        let shares = self.vault.deposit(deposit_request(&job, amount)).await?;

        let updated = self
            .registry
            .record_execution(job_id, amount, now)
            .map_err(|e| {
                error!(
                    "Job {} deposited {} but the commit failed: {}",
                    job_id, amount, e
                );
                e
            })?;

        info!(
            "Job {} swept {} of {} into {} ({} / {} used)",
            job_id,
            amount,
            updated.source_token,
            updated.destination_vault,
            updated.used_amount,
            updated.limit_amount
        );

        Ok(ExecutionReceipt {
            job_id,
            account: updated.account,
            source_token: updated.source_token,
            destination_vault: updated.destination_vault,
            amount,
            shares,
            executed_at: now,
            used_amount: updated.used_amount,
            limit_amount: updated.limit_amount,
        })
    }
}

fn deposit_request(job: &Job, amount: Amount) -> DepositRequest {
    DepositRequest {
        vault: job.destination_vault.clone(),
        owner: job.account.clone(),
        source_token: job.source_token.clone(),
        destination_token: job.destination_token.clone(),
        amount,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_takes_whole_balance_under_limit() {
        assert_eq!(sweep_amount(400, 1000), 400);
    }

    #[test]
    fn test_sweep_clamps_to_remaining() {
        assert_eq!(sweep_amount(5000, 600), 600);
        assert_eq!(sweep_amount(5000, 0), 0);
    }
}
