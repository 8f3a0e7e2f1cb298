use crate::infra::validity::{cooldown_elapsed, next_eligible_at, ValidityWindow, WindowPosition};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Opaque job identity, assigned in creation order and never reused.
pub type JobId = u64;

/// Seconds since the unix epoch.
pub type Timestamp = u64;

/// Token amount in the token's smallest unit.
pub type Amount = u128;

/// Address-like identifier for accounts, session keys, tokens, vaults and call targets.
///
/// Stored lowercased so `0xAB..` and `0xab..` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Address(String);

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

impl Address {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectorParseError {
    #[error("Invalid selector hex: {0}")]
    InvalidHex(String),
    #[error("Selector must be 4 bytes, got {0}")]
    InvalidLength(usize),
}

/// Four-byte function identifier, the first four bytes of a call's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Selector([u8; 4]);

impl Selector {
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Derive the selector of a canonical function signature such as
    /// `executeJob(uint256)`: the leading four bytes of its Keccak-256 digest.
    pub fn from_signature(signature: &str) -> Self {
        let digest = Keccak256::digest(signature.as_bytes());
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&digest[..4]);
        Self(bytes)
    }

    pub fn from_calldata(data: &[u8]) -> Option<Self> {
        let head: [u8; 4] = data.get(..4)?.try_into().ok()?;
        Some(Self(head))
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Selector {
    type Err = SelectorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits).map_err(|_| SelectorParseError::InvalidHex(s.to_string()))?;
        let bytes: [u8; 4] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| SelectorParseError::InvalidLength(bytes.len()))?;
        Ok(Self(bytes))
    }
}

impl Serialize for Selector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Selector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// What the owner hands to `enable_session_key`: the one call a key may make
/// and the time it may make it in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantScope {
    pub target: Address,
    pub selector: Selector,
    pub valid_after: Timestamp,
    pub valid_until: Timestamp,
}

impl GrantScope {
    pub fn window(&self) -> ValidityWindow {
        ValidityWindow::new(self.valid_after, self.valid_until)
    }
}

/// Installed grant for one (account, session key) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionKeyGrant {
    pub account: Address,
    pub key: Address,
    pub target: Address,
    pub selector: Selector,
    pub valid_after: Timestamp,
    pub valid_until: Timestamp,
    pub active: bool,
}

impl SessionKeyGrant {
    pub fn window(&self) -> ValidityWindow {
        ValidityWindow::new(self.valid_after, self.valid_until)
    }

    /// Usable at `now`: active and inside `[valid_after, valid_until)`.
    pub fn is_usable(&self, now: Timestamp) -> bool {
        self.active && self.window().contains(now)
    }
}

/// Owner-supplied job definition. Usage fields must start at zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDefinition {
    pub source_token: Address,
    pub destination_token: Address,
    pub destination_vault: Address,
    pub limit_amount: Amount,
    #[serde(default)]
    pub used_amount: Amount,
    pub valid_after: Timestamp,
    pub valid_until: Timestamp,
    #[serde(default)]
    pub last_executed: Timestamp,
    #[serde(default)]
    pub refresh_interval: u64,
}

/// Stored job record. Status is never stored; see [`Job::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub account: Address,
    pub source_token: Address,
    pub destination_token: Address,
    pub destination_vault: Address,
    pub limit_amount: Amount,
    pub used_amount: Amount,
    pub valid_after: Timestamp,
    pub valid_until: Timestamp,
    /// Time of the last successful run, 0 if the job never ran.
    pub last_executed: Timestamp,
    /// Minimum seconds between runs, 0 for no cooldown.
    pub refresh_interval: u64,
}

/// Execution state derived from a job record and the current time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Eligible,
    Cooling,
    Exhausted,
    Expired,
}

impl Job {
    pub fn window(&self) -> ValidityWindow {
        ValidityWindow::new(self.valid_after, self.valid_until)
    }

    pub fn remaining_allowance(&self) -> Amount {
        self.limit_amount.saturating_sub(self.used_amount)
    }

    /// Earliest time the cooldown allows another run.
    pub fn next_eligible_at(&self) -> Timestamp {
        next_eligible_at(self.last_executed, self.refresh_interval)
    }

    /// Pure status derivation. Checks run in the same order executions are
    /// rejected in: window start, window end, cooldown, limit.
    pub fn status(&self, now: Timestamp) -> JobStatus {
        match self.window().position(now) {
            WindowPosition::NotYetValid => JobStatus::Pending,
            WindowPosition::Closed => JobStatus::Expired,
            WindowPosition::Open => {
                if !cooldown_elapsed(self.last_executed, self.refresh_interval, now) {
                    JobStatus::Cooling
                } else if self.used_amount >= self.limit_amount {
                    JobStatus::Exhausted
                } else {
                    JobStatus::Eligible
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditDecision {
    Allow,
    Deny,
}

/// One line of the audit trail, written for every dispatched operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: uuid::Uuid,
    pub timestamp: String,
    pub account: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signer: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<Selector>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    pub decision: AuditDecision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Amount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditEntry {
    pub fn new(account: Address, decision: AuditDecision) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            account,
            signer: None,
            target: None,
            selector: None,
            job_id: None,
            decision,
            amount: None,
            error: None,
        }
    }
}
