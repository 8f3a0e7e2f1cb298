//! Abstract interfaces for runtime collaborators.

use async_trait::async_trait;
use autodca::infra::contracts::{Address, Amount, AuditEntry, JobId, Timestamp};
use autodca::infra::job_registry::JobError;
use autodca::infra::nonce_manager::NonceError;
use autodca::infra::session_registry::SessionKeyError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Runtime errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    SessionKey(#[from] SessionKeyError),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error(transparent)]
    InvalidNonce(#[from] NonceError),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Unsupported call: {0}")]
    UnsupportedCall(String),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("Collaborator error: {0}")]
    Collaborator(String),

    #[error("State error: {0}")]
    StateError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl EngineError {
    /// Short label for metrics and audit lines.
    pub fn reason(&self) -> &'static str {
        match self {
            EngineError::SessionKey(SessionKeyError::InvalidWindow { .. }) => "invalid_window",
            EngineError::SessionKey(SessionKeyError::NotFound { .. }) => "not_found",
            EngineError::Job(e) => e.reason(),
            EngineError::InvalidNonce(_) => "invalid_nonce",
            EngineError::Unauthorized(_) => "unauthorized",
            EngineError::UnsupportedCall(_) => "unsupported_call",
            EngineError::LockError(_) => "lock",
            EngineError::Collaborator(_) => "collaborator",
            EngineError::StateError(_) => "state",
            EngineError::ConfigError(_) => "config",
            EngineError::IoError(_) => "io",
            EngineError::SerializationError(_) => "serialization",
        }
    }
}

/// Value handed to the vault: move `amount` of `source_token` out of `owner`
/// into `vault`, which credits shares of `destination_token` exposure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositRequest {
    pub vault: Address,
    pub owner: Address,
    pub source_token: Address,
    pub destination_token: Address,
    pub amount: Amount,
}

/// Fungible token balances and transfers.
#[async_trait]
pub trait TokenLedger: Send + Sync {
    async fn balance_of(&self, token: &Address, account: &Address) -> Result<Amount, EngineError>;

    /// The engine never moves tokens itself. Vault implementations pull the
    /// swept amount out of the account through this.
    async fn transfer(
        &self,
        token: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), EngineError>;
}

/// Destination vault. Opaque value sink with a queryable share balance.
#[async_trait]
pub trait Vault: Send + Sync {
    /// Deposit and return the shares minted.
    async fn deposit(&self, request: DepositRequest) -> Result<Amount, EngineError>;

    /// Shares `account` holds in `vault`.
    async fn balance_of(&self, vault: &Address, account: &Address) -> Result<Amount, EngineError>;
}

/// Exclusive hold on one job's critical section. The job is released when
/// the guard drops, including when the future holding it is cancelled.
pub struct JobGuard {
    job_id: JobId,
    _hold: Box<dyn Send + Sync>,
}

impl JobGuard {
    /// Wrap whatever value keeps the job locked until it is dropped.
    pub fn new<H: Send + Sync + 'static>(job_id: JobId, hold: H) -> Self {
        Self {
            job_id,
            _hold: Box::new(hold),
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }
}

impl fmt::Debug for JobGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobGuard").field("job_id", &self.job_id).finish()
    }
}

/// Per-job locking interface.
#[async_trait]
pub trait LockManager: Send + Sync {
    /// Acquire the lock for a job. It is held for as long as the returned
    /// guard lives.
    async fn acquire(&self, job_id: JobId) -> Result<JobGuard, EngineError>;
}

/// Signature recovery. Treated as a correct black box.
pub trait SignatureVerifier: Send + Sync {
    /// Signer of `digest`, or `None` if the signature is not valid for it.
    fn recover(&self, digest: &[u8; 32], signature: &[u8]) -> Option<Address>;
}

/// Audit sink. Recording never fails the operation being audited.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: AuditEntry);
}

/// Source of the execution environment's current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock in unix seconds.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
    }
}
