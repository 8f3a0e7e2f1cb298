use crate::interfaces::{AuditSink, EngineError, JobGuard, LockManager as LockManagerTrait};
use crate::metrics::MetricTimer;
use async_trait::async_trait;
use autodca::infra::audit_logger::AuditLogger;
use autodca::infra::contracts::{AuditEntry, JobId};
use autodca::infra::lock_manager::LockManager;
use std::sync::Arc;
use tracing::warn;

/// Async front for the blocking per-job LockManager. An uncontended job is
/// taken inline; a contended one waits on the blocking pool.
pub struct AsyncLockManager {
    inner: Arc<LockManager>,
}

impl AsyncLockManager {
    pub fn new(inner: Arc<LockManager>) -> Self {
        Self { inner }
    }

    pub fn held(&self) -> usize {
        self.inner.held_count()
    }
}

#[async_trait]
impl LockManagerTrait for AsyncLockManager {
    async fn acquire(&self, job_id: JobId) -> Result<JobGuard, EngineError> {
        let _timer = MetricTimer::new("lock_wait_duration");

        if let Some(lock) = self.inner.try_acquire(job_id) {
            return Ok(JobGuard::new(job_id, lock));
        }

        // If this future is dropped while waiting, the lock the blocking
        // task eventually takes is dropped with its unclaimed output.
        let inner = Arc::clone(&self.inner);
        let lock = tokio::task::spawn_blocking(move || inner.acquire(job_id))
            .await
            .map_err(|e| EngineError::LockError(e.to_string()))?
            .map_err(|e| EngineError::LockError(e.to_string()))?;

        Ok(JobGuard::new(job_id, lock))
    }
}

/// Async wrapper for the JSONL AuditLogger.
pub struct AsyncAuditLogger {
    inner: Arc<AuditLogger>,
}

impl AsyncAuditLogger {
    pub fn new(inner: Arc<AuditLogger>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl AuditSink for AsyncAuditLogger {
    async fn record(&self, entry: AuditEntry) {
        let inner = self.inner.clone();
        let result = tokio::task::spawn_blocking(move || inner.log(&entry)).await;

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Audit log write failed: {}", e),
            Err(e) => warn!("Audit log task failed: {}", e),
        }
    }
}
