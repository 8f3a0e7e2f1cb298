//! Core type definitions for the AutoDCA runtime.

use crate::interfaces::EngineError;
use autodca::infra::contracts::{Address, Amount, JobId, Selector, Timestamp};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

/// Schema version for persisted and exchanged operations.
pub const SCHEMA_VERSION: u32 = 1;

/// Canonical signature of the executor's trigger entrypoint.
pub const EXECUTE_JOB_SIGNATURE: &str = "executeJob(uint256)";

const WORD: usize = 32;

/// A single call an account is asked to make.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Call {
    pub target: Address,
    #[serde(default)]
    pub value: Amount,
    #[serde(with = "hex_bytes")]
    pub call_data: Vec<u8>,
}

impl Call {
    pub fn new(target: Address, call_data: Vec<u8>) -> Self {
        Self {
            target,
            value: 0,
            call_data,
        }
    }

    /// Leading 4 bytes of the call data, if present.
    pub fn selector(&self) -> Option<Selector> {
        Selector::from_calldata(&self.call_data)
    }
}

/// Nonce with an explicit namespace key. Each (account, key) pair keeps its
/// own strictly increasing sequence.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct OperationNonce {
    pub key: String,
    pub sequence: u64,
}

/// A signed request for `sender` to perform `call`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct UserOperation {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub sender: Address,
    pub nonce: OperationNonce,
    pub call: Call,
    #[serde(with = "hex_bytes", default)]
    pub signature: Vec<u8>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl UserOperation {
    /// Unsigned operation.
    pub fn new(sender: Address, nonce: OperationNonce, call: Call) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            sender,
            nonce,
            call,
            signature: Vec::new(),
        }
    }

    pub fn with_signature(mut self, signature: Vec<u8>) -> Self {
        self.signature = signature;
        self
    }

    /// Keccak-256 digest the signer commits to. Every variable-length field
    /// is length-prefixed so distinct operations never share an encoding.
    /// The signature itself is excluded.
    pub fn hash(&self) -> [u8; 32] {
        let mut hasher = Keccak256::new();
        hasher.update(self.schema_version.to_be_bytes());
        update_prefixed(&mut hasher, self.sender.as_str().as_bytes());
        update_prefixed(&mut hasher, self.nonce.key.as_bytes());
        hasher.update(self.nonce.sequence.to_be_bytes());
        update_prefixed(&mut hasher, self.call.target.as_str().as_bytes());
        hasher.update(self.call.value.to_be_bytes());
        update_prefixed(&mut hasher, &self.call.call_data);

        let mut digest = [0u8; 32];
        digest.copy_from_slice(&hasher.finalize());
        digest
    }

    /// Validate schema version.
    pub fn validate_version(&self) -> Result<(), String> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(format!(
                "Schema version mismatch: expected {}, got {}",
                SCHEMA_VERSION, self.schema_version
            ));
        }
        Ok(())
    }
}

fn update_prefixed(hasher: &mut Keccak256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}

/// Encode `executeJob(uint256 jobId)` call data: selector then one
/// big-endian 32-byte word.
pub fn encode_execute_job(selector: Selector, job_id: JobId) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + WORD);
    data.extend_from_slice(selector.as_bytes());
    data.extend_from_slice(&[0u8; WORD - 8]);
    data.extend_from_slice(&job_id.to_be_bytes());
    data
}

/// Decode call data produced by [`encode_execute_job`].
pub fn decode_execute_job(selector: Selector, data: &[u8]) -> Result<JobId, EngineError> {
    if data.len() != 4 + WORD {
        return Err(EngineError::UnsupportedCall(format!(
            "executeJob call data must be {} bytes, got {}",
            4 + WORD,
            data.len()
        )));
    }

    let found = Selector::from_calldata(data)
        .ok_or_else(|| EngineError::UnsupportedCall("call data has no selector".to_string()))?;
    if found != selector {
        return Err(EngineError::UnsupportedCall(format!(
            "expected selector {}, got {}",
            selector, found
        )));
    }

    let word = &data[4..];
    if word[..WORD - 8].iter().any(|b| *b != 0) {
        return Err(EngineError::UnsupportedCall(
            "job id does not fit in 64 bits".to_string(),
        ));
    }

    let mut id = [0u8; 8];
    id.copy_from_slice(&word[WORD - 8..]);
    Ok(u64::from_be_bytes(id))
}

/// Outcome of a successful sweep.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ExecutionReceipt {
    pub job_id: JobId,
    pub account: Address,
    pub source_token: Address,
    pub destination_vault: Address,
    /// Source tokens moved into the vault.
    pub amount: Amount,
    /// Vault shares credited to the account.
    pub shares: Amount,
    pub executed_at: Timestamp,
    pub used_amount: Amount,
    pub limit_amount: Amount,
}

impl ExecutionReceipt {
    pub fn remaining_allowance(&self) -> Amount {
        self.limit_amount.saturating_sub(self.used_amount)
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let digits = raw.strip_prefix("0x").unwrap_or(&raw);
        hex::decode(digits).map_err(serde::de::Error::custom)
    }
}
