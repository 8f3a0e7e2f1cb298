use crate::infra::contracts::Address;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NonceError {
    #[error("Invalid nonce for account {account} key {key}: expected {expected}, got {got}")]
    Mismatch {
        account: Address,
        key: String,
        expected: u64,
        got: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceEntry {
    pub account: Address,
    pub key: String,
    pub next: u64,
}

/// Sequential nonces, one independent counter per (account, nonce key).
/// Operations in different key namespaces never wait on each other.
pub struct NonceManager {
    nonces: Mutex<HashMap<(Address, String), u64>>,
}

impl Default for NonceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl NonceManager {
    pub fn new() -> Self {
        Self {
            nonces: Mutex::new(HashMap::new()),
        }
    }

    /// Next sequence number the given namespace will accept.
    pub fn get_nonce(&self, account: &Address, key: &str) -> u64 {
        self.nonces
            .lock()
            .get(&(account.clone(), key.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Accept `sequence` if it is exactly the next one, and advance.
    pub fn consume(&self, account: &Address, key: &str, sequence: u64) -> Result<(), NonceError> {
        let mut nonces = self.nonces.lock();
        let next = nonces.entry((account.clone(), key.to_string())).or_insert(0);

        if *next != sequence {
            return Err(NonceError::Mismatch {
                account: account.clone(),
                key: key.to_string(),
                expected: *next,
                got: sequence,
            });
        }
        *next += 1;
        Ok(())
    }

    pub fn snapshot(&self) -> Vec<NonceEntry> {
        let mut entries: Vec<_> = self
            .nonces
            .lock()
            .iter()
            .map(|((account, key), next)| NonceEntry {
                account: account.clone(),
                key: key.clone(),
                next: *next,
            })
            .collect();
        entries.sort_by(|a, b| (&a.account, &a.key).cmp(&(&b.account, &b.key)));
        entries
    }

    pub fn restore(&self, entries: Vec<NonceEntry>) {
        let mut nonces = self.nonces.lock();
        nonces.clear();
        for entry in entries {
            nonces.insert((entry.account, entry.key), entry.next);
        }
    }
}
