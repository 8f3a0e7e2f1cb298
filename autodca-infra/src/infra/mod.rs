pub mod audit_logger;
pub mod contracts;
pub mod job_registry;
pub mod lock_manager;
pub mod nonce_manager;
pub mod session_registry;
pub mod session_validator;
pub mod state_store;
pub mod validity;
