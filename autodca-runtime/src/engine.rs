//! Engine - wires registries, executor and dispatcher from configuration.

use crate::async_adapters::{AsyncAuditLogger, AsyncLockManager};
use crate::config::EngineConfig;
use crate::dispatcher::{AccountDispatcher, CallRouting};
use crate::interfaces::{Clock, EngineError, SignatureVerifier, TokenLedger, Vault};
use crate::job_executor::JobExecutor;
use crate::types::{ExecutionReceipt, UserOperation};
use autodca::infra::audit_logger::AuditLogger;
use autodca::infra::contracts::{
    Address, Amount, GrantScope, Job, JobDefinition, JobId, JobStatus, Selector, SessionKeyGrant,
    Timestamp,
};
use autodca::infra::job_registry::JobRegistry;
use autodca::infra::lock_manager::LockManager;
use autodca::infra::nonce_manager::NonceManager;
use autodca::infra::session_registry::SessionKeyRegistry;
use autodca::infra::session_validator::SessionValidator;
use autodca::infra::state_store::{EngineState, StateStore};
use std::sync::Arc;
use tracing::info;

/// External systems the engine talks to.
pub struct Collaborators {
    pub token: Arc<dyn TokenLedger>,
    pub vault: Arc<dyn Vault>,
    pub verifier: Arc<dyn SignatureVerifier>,
    pub clock: Arc<dyn Clock>,
}

/// Owner-facing management interface plus the trigger entry points.
pub struct Engine {
    config: EngineConfig,
    sessions: Arc<SessionKeyRegistry>,
    jobs: Arc<JobRegistry>,
    nonces: Arc<NonceManager>,
    validator: Arc<SessionValidator>,
    executor: Arc<JobExecutor>,
    dispatcher: AccountDispatcher,
    vault: Arc<dyn Vault>,
    state_store: Option<StateStore>,
}

impl Engine {
    pub fn new(config: EngineConfig, collaborators: Collaborators) -> Result<Self, EngineError> {
        config.validate()?;

        let sessions = Arc::new(SessionKeyRegistry::new());
        let jobs = Arc::new(JobRegistry::new());
        let nonces = Arc::new(NonceManager::new());
        let validator = Arc::new(SessionValidator::new(sessions.clone()));

        let lock_manager = Arc::new(AsyncLockManager::new(Arc::new(LockManager::new(
            config.lock_timeout(),
        ))));
        let vault = collaborators.vault;
        let executor = Arc::new(JobExecutor::new(
            jobs.clone(),
            lock_manager,
            collaborators.token,
            vault.clone(),
        ));

        let routing = CallRouting {
            executor_address: config.executor_address.clone(),
            execute_selector: config.execute_selector(),
        };
        let mut dispatcher = AccountDispatcher::new(
            validator.clone(),
            nonces.clone(),
            executor.clone(),
            collaborators.verifier,
            collaborators.clock,
            routing,
            config.max_concurrent_ops,
        );

        if let Some(path) = &config.audit_log {
            let logger =
                AuditLogger::new(path).map_err(|e| EngineError::StateError(e.to_string()))?;
            dispatcher = dispatcher.with_audit_sink(Arc::new(AsyncAuditLogger::new(Arc::new(
                logger,
            ))));
        }

        let state_store = config
            .state_file
            .as_ref()
            .map(StateStore::new)
            .transpose()
            .map_err(|e| EngineError::StateError(e.to_string()))?;

        info!(
            "Engine ready: executor {}, selector {}",
            config.executor_address,
            config.execute_selector()
        );

        Ok(Self {
            config,
            sessions,
            jobs,
            nonces,
            validator,
            executor,
            dispatcher,
            vault,
            state_store,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &AccountDispatcher {
        &self.dispatcher
    }

    pub fn executor(&self) -> &Arc<JobExecutor> {
        &self.executor
    }

    // Owner management. `owner` is the calling account; everything created
    // here belongs to it.

    pub fn create_job(&self, owner: &Address, definition: JobDefinition) -> Result<Job, EngineError> {
        require_caller(owner)?;
        Ok(self.jobs.create(owner, definition)?)
    }

    pub fn enable_session_key(
        &self,
        owner: &Address,
        key: &Address,
        scope: GrantScope,
    ) -> Result<SessionKeyGrant, EngineError> {
        require_caller(owner)?;
        if key.is_empty() {
            return Err(EngineError::Unauthorized(
                "session key must be non-empty".to_string(),
            ));
        }
        Ok(self.sessions.enable(owner, key, scope)?)
    }

    pub fn disable_session_key(&self, owner: &Address, key: &Address) -> Result<(), EngineError> {
        require_caller(owner)?;
        Ok(self.sessions.disable(owner, key)?)
    }

    // Queries.

    pub fn get_job(&self, job_id: JobId) -> Result<Job, EngineError> {
        Ok(self.jobs.get(job_id)?)
    }

    pub fn jobs_for(&self, owner: &Address) -> Vec<Job> {
        self.jobs.jobs_for(owner)
    }

    pub fn job_status(&self, job_id: JobId, now: Timestamp) -> Result<JobStatus, EngineError> {
        Ok(self.jobs.get(job_id)?.status(now))
    }

    /// Shares the job's account holds in the job's destination vault.
    pub async fn vault_position(&self, job_id: JobId) -> Result<Amount, EngineError> {
        let job = self.jobs.get(job_id)?;
        self.vault
            .balance_of(&job.destination_vault, &job.account)
            .await
    }

    pub fn session_key(&self, owner: &Address, key: &Address) -> Option<SessionKeyGrant> {
        self.sessions.get(owner, key)
    }

    pub fn authorize(
        &self,
        account: &Address,
        key: &Address,
        target: &Address,
        selector: Selector,
        now: Timestamp,
    ) -> bool {
        self.validator.authorize(account, key, target, selector, now)
    }

    pub fn get_nonce(&self, account: &Address, key: &str) -> u64 {
        self.nonces.get_nonce(account, key)
    }

    // Triggers.

    /// Run a job directly, bypassing operation validation.
    pub async fn execute_job(
        &self,
        job_id: JobId,
        now: Timestamp,
    ) -> Result<ExecutionReceipt, EngineError> {
        self.executor.execute_job(job_id, now).await
    }

    pub async fn handle_op(&self, op: &UserOperation) -> Result<ExecutionReceipt, EngineError> {
        self.dispatcher.handle_op(op).await
    }

    pub async fn handle_ops(
        &self,
        ops: &[UserOperation],
    ) -> Vec<Result<ExecutionReceipt, EngineError>> {
        self.dispatcher.handle_ops(ops).await
    }

    // Persistence.

    pub fn snapshot(&self) -> EngineState {
        EngineState::new(
            self.sessions.snapshot(),
            self.jobs.snapshot(),
            self.nonces.snapshot(),
        )
    }

    pub fn restore(&self, state: EngineState) {
        info!(
            "Restoring {} grants, {} jobs, {} nonce counters",
            state.grants.len(),
            state.jobs.jobs.len(),
            state.nonces.len()
        );
        self.sessions.restore(state.grants);
        self.jobs.restore(state.jobs);
        self.nonces.restore(state.nonces);
    }

    /// Write a snapshot to the configured state file.
    pub fn save_state(&self) -> Result<(), EngineError> {
        let store = self.require_store()?;
        store
            .save(&self.snapshot())
            .map_err(|e| EngineError::StateError(e.to_string()))?;
        info!("Saved engine state to {}", store.path().display());
        Ok(())
    }

    /// Load the configured state file if it exists. Returns whether
    /// anything was restored.
    pub fn restore_state(&self) -> Result<bool, EngineError> {
        let store = self.require_store()?;
        match store
            .load()
            .map_err(|e| EngineError::StateError(e.to_string()))?
        {
            Some(state) => {
                self.restore(state);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn require_store(&self) -> Result<&StateStore, EngineError> {
        self.state_store
            .as_ref()
            .ok_or_else(|| EngineError::ConfigError("no state_file configured".to_string()))
    }
}

fn require_caller(owner: &Address) -> Result<(), EngineError> {
    if owner.is_empty() {
        return Err(EngineError::Unauthorized(
            "owner account must be non-empty".to_string(),
        ));
    }
    Ok(())
}
