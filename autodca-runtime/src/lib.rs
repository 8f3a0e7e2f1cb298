//! AutoDCA runtime
//!
//! Session-key authorization and trigger-driven job execution for smart accounts.

pub mod async_adapters;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod gateway;
pub mod interfaces;
pub mod job_executor;
pub mod metrics;
pub mod types;

pub use async_adapters::{AsyncAuditLogger, AsyncLockManager};
pub use config::{load_engine_config, EngineConfig};
pub use dispatcher::{AccountDispatcher, CallRouting};
pub use engine::{Collaborators, Engine};
pub use gateway::{resolve_nonce_key, NonceNamespace, OWNER_NONCE_KEY};
pub use interfaces::{
    AuditSink, Clock, DepositRequest, EngineError, JobGuard, LockManager, SignatureVerifier,
    SystemClock, TokenLedger, Vault,
};
pub use job_executor::{sweep_amount, JobExecutor};
pub use types::{
    decode_execute_job, encode_execute_job, Call, ExecutionReceipt, OperationNonce,
    UserOperation, EXECUTE_JOB_SIGNATURE, SCHEMA_VERSION,
};

pub use autodca::infra::contracts::{
    Address, Amount, GrantScope, Job, JobDefinition, JobId, JobStatus, Selector,
    SessionKeyGrant, Timestamp,
};
