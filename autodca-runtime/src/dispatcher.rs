//! Account dispatcher - validates and routes signed operations.

use crate::gateway::{resolve_nonce_key, NonceNamespace};
use crate::interfaces::{AuditSink, Clock, EngineError, SignatureVerifier};
use crate::job_executor::JobExecutor;
use crate::metrics::{self, MetricTimer};
use crate::types::{decode_execute_job, ExecutionReceipt, UserOperation};
use autodca::infra::contracts::{Address, AuditDecision, AuditEntry, Selector, Timestamp};
use autodca::infra::job_registry::JobError;
use autodca::infra::nonce_manager::NonceManager;
use autodca::infra::session_validator::{
    AuthorizationDecision, AuthorizationRequest, SessionValidator,
};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Where executable calls must point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRouting {
    pub executor_address: Address,
    pub execute_selector: Selector,
}

/// Reference account-side entry point.
///
/// For every operation: recover the signer, check the nonce namespace,
/// authorize session-key calls against their grant, consume the nonce,
/// then route `executeJob` to the executor. Owner-signed operations skip the
/// grant check; everything else about them is the same.
pub struct AccountDispatcher {
    validator: Arc<SessionValidator>,
    nonces: Arc<NonceManager>,
    executor: Arc<JobExecutor>,
    verifier: Arc<dyn SignatureVerifier>,
    clock: Arc<dyn Clock>,
    routing: CallRouting,
    audit_sink: Option<Arc<dyn AuditSink>>,
    concurrency_limiter: Arc<Semaphore>,
}

impl AccountDispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        validator: Arc<SessionValidator>,
        nonces: Arc<NonceManager>,
        executor: Arc<JobExecutor>,
        verifier: Arc<dyn SignatureVerifier>,
        clock: Arc<dyn Clock>,
        routing: CallRouting,
        max_concurrent_ops: usize,
    ) -> Self {
        Self {
            validator,
            nonces,
            executor,
            verifier,
            clock,
            routing,
            audit_sink: None,
            concurrency_limiter: Arc::new(Semaphore::new(max_concurrent_ops)),
        }
    }

    pub fn with_audit_sink(mut self, audit_sink: Arc<dyn AuditSink>) -> Self {
        self.audit_sink = Some(audit_sink);
        self
    }

    pub fn routing(&self) -> &CallRouting {
        &self.routing
    }

    /// Validate and execute one operation.
    pub async fn handle_op(&self, op: &UserOperation) -> Result<ExecutionReceipt, EngineError> {
        let _permit = self
            .concurrency_limiter
            .acquire()
            .await
            .map_err(|e| EngineError::StateError(format!("Concurrency limit error: {}", e)))?;
        let _timer = MetricTimer::new("operation_duration");

        let now = self.clock.now();
        let mut entry = AuditEntry::new(op.sender.clone(), AuditDecision::Deny);
        entry.target = Some(op.call.target.clone());
        entry.selector = op.call.selector();

        let result = self.handle_inner(op, now, &mut entry).await;

        match &result {
            Ok(receipt) => {
                entry.decision = AuditDecision::Allow;
                entry.amount = Some(receipt.amount);
            }
            Err(e) => {
                debug!("Operation from {} failed: {}", op.sender, e);
                entry.error = Some(e.to_string());
            }
        }
        self.record_audit(entry).await;

        result
    }

    /// Process a batch in order. One result per operation; a failure does not
    /// stop the rest of the batch.
    pub async fn handle_ops(
        &self,
        ops: &[UserOperation],
    ) -> Vec<Result<ExecutionReceipt, EngineError>> {
        let mut results = Vec::with_capacity(ops.len());
        for op in ops {
            results.push(self.handle_op(op).await);
        }
        results
    }

    async fn handle_inner(
        &self,
        op: &UserOperation,
        now: Timestamp,
        entry: &mut AuditEntry,
    ) -> Result<ExecutionReceipt, EngineError> {
        op.validate_version().map_err(EngineError::UnsupportedCall)?;

        let signer = self
            .verifier
            .recover(&op.hash(), &op.signature)
            .ok_or_else(|| EngineError::Unauthorized("invalid signature".to_string()))?;
        entry.signer = Some(signer.clone());

        let expected_key = resolve_nonce_key(&op.sender, &signer)?;
        if op.nonce.key != expected_key {
            return Err(EngineError::Unauthorized(format!(
                "nonce key {} does not belong to signer {}",
                op.nonce.key, signer
            )));
        }

        let selector = op
            .call
            .selector()
            .ok_or_else(|| EngineError::UnsupportedCall("call data has no selector".to_string()))?;

        if let NonceNamespace::SessionKey(key) = NonceNamespace::for_signer(&op.sender, &signer) {
            let request = AuthorizationRequest {
                account: op.sender.clone(),
                key,
                target: op.call.target.clone(),
                selector,
                now,
            };
            if let AuthorizationDecision::Deny(reason) = self.validator.check(&request) {
                metrics::record_denial(reason.as_str());
                warn!(
                    "Session key {} denied on account {}: {}",
                    signer, op.sender, reason
                );
                return Err(EngineError::Unauthorized(format!(
                    "session key {} denied: {}",
                    signer, reason
                )));
            }
        }

        self.nonces
            .consume(&op.sender, &op.nonce.key, op.nonce.sequence)?;

        if op.call.target != self.routing.executor_address
            || selector != self.routing.execute_selector
        {
            return Err(EngineError::UnsupportedCall(format!(
                "no route for {} on {}",
                selector, op.call.target
            )));
        }
        if op.call.value != 0 {
            return Err(EngineError::UnsupportedCall(
                "executeJob does not accept value".to_string(),
            ));
        }

        let job_id = decode_execute_job(self.routing.execute_selector, &op.call.call_data)?;
        entry.job_id = Some(job_id);

        // Accounts may only trigger their own jobs; others look absent.
        let job = self.executor.registry().get(job_id)?;
        if job.account != op.sender {
            return Err(JobError::NotFound(job_id).into());
        }

        info!(
            "Dispatching job {} for account {} (signer {})",
            job_id, op.sender, signer
        );
        self.executor.execute_job(job_id, now).await
    }

    async fn record_audit(&self, entry: AuditEntry) {
        if let Some(sink) = &self.audit_sink {
            sink.record(entry).await;
        }
    }
}
