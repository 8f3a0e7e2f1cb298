//! Gateway for nonce namespace resolution.

use crate::interfaces::EngineError;
use autodca::infra::contracts::Address;

/// Nonce key for operations the account owner signs directly.
pub const OWNER_NONCE_KEY: &str = "owner";

/// Who an operation speaks for, as far as nonces are concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NonceNamespace {
    Owner,
    SessionKey(Address),
}

impl NonceNamespace {
    /// Owner when the signer is the account itself, otherwise the signer's
    /// own session namespace.
    pub fn for_signer(account: &Address, signer: &Address) -> Self {
        if account == signer {
            NonceNamespace::Owner
        } else {
            NonceNamespace::SessionKey(signer.clone())
        }
    }
}

/// Resolve the nonce key an operation from `signer` on `account` must use.
///
/// # Returns
/// `"owner"` for the account itself, `"session:<key>"` for a session key
///
/// # Errors
/// Returns error if either address is empty
pub fn resolve_nonce_key(account: &Address, signer: &Address) -> Result<String, EngineError> {
    if account.is_empty() || signer.is_empty() {
        return Err(EngineError::Unauthorized(
            "account and signer must be non-empty".to_string(),
        ));
    }

    Ok(match NonceNamespace::for_signer(account, signer) {
        NonceNamespace::Owner => OWNER_NONCE_KEY.to_string(),
        NonceNamespace::SessionKey(key) => format!("session:{}", key),
    })
}
