#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Shared test doubles: in-memory token and vault, a settable clock and a
//! plain signer whose signatures are the digest followed by the signer.

use async_trait::async_trait;
use autodca_runtime::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

pub const ACCOUNT: &str = "0xsafe";
pub const OTHER_ACCOUNT: &str = "0xothersafe";
pub const BOT: &str = "0xbot";
pub const USDC: &str = "0xusdc";
pub const WMATIC: &str = "0xwmatic";
pub const VAULT: &str = "0xvault";
pub const EXECUTOR: &str = "0xexecutor";

pub fn addr(value: &str) -> Address {
    Address::from(value)
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub struct InMemoryToken {
    balances: Mutex<HashMap<(Address, Address), Amount>>,
}

impl InMemoryToken {
    pub fn new() -> Self {
        Self {
            balances: Mutex::new(HashMap::new()),
        }
    }

    pub fn mint(&self, token: &str, account: &str, amount: Amount) {
        *self
            .balances
            .lock()
            .unwrap()
            .entry((addr(token), addr(account)))
            .or_insert(0) += amount;
    }

    pub fn balance(&self, token: &str, account: &str) -> Amount {
        self.balances
            .lock()
            .unwrap()
            .get(&(addr(token), addr(account)))
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl TokenLedger for InMemoryToken {
    async fn balance_of(&self, token: &Address, account: &Address) -> Result<Amount, EngineError> {
        // Give concurrent callers a chance to interleave.
        tokio::task::yield_now().await;
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(&(token.clone(), account.clone()))
            .copied()
            .unwrap_or(0))
    }

    async fn transfer(
        &self,
        token: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), EngineError> {
        let mut balances = self.balances.lock().unwrap();
        let from_balance = balances
            .get(&(token.clone(), from.clone()))
            .copied()
            .unwrap_or(0);
        if from_balance < amount {
            return Err(EngineError::Collaborator(format!(
                "insufficient {} balance: {} < {}",
                token, from_balance, amount
            )));
        }
        balances.insert((token.clone(), from.clone()), from_balance - amount);
        *balances.entry((token.clone(), to.clone())).or_insert(0) += amount;
        Ok(())
    }
}

/// Pulls source tokens from the owner and mints shares 1:1.
pub struct InMemoryVault {
    token: Arc<InMemoryToken>,
    shares: Mutex<HashMap<(Address, Address), Amount>>,
    deposits: AtomicU64,
    fail_deposits: AtomicBool,
}

impl InMemoryVault {
    pub fn new(token: Arc<InMemoryToken>) -> Self {
        Self {
            token,
            shares: Mutex::new(HashMap::new()),
            deposits: AtomicU64::new(0),
            fail_deposits: AtomicBool::new(false),
        }
    }

    pub fn shares(&self, vault: &str, account: &str) -> Amount {
        self.shares
            .lock()
            .unwrap()
            .get(&(addr(vault), addr(account)))
            .copied()
            .unwrap_or(0)
    }

    pub fn deposit_count(&self) -> u64 {
        self.deposits.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_deposits.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Vault for InMemoryVault {
    async fn deposit(&self, request: DepositRequest) -> Result<Amount, EngineError> {
        if self.fail_deposits.load(Ordering::SeqCst) {
            return Err(EngineError::Collaborator("vault paused".to_string()));
        }
        self.token
            .transfer(
                &request.source_token,
                &request.owner,
                &request.vault,
                request.amount,
            )
            .await?;
        *self
            .shares
            .lock()
            .unwrap()
            .entry((request.vault, request.owner))
            .or_insert(0) += request.amount;
        self.deposits.fetch_add(1, Ordering::SeqCst);
        Ok(request.amount)
    }

    async fn balance_of(&self, vault: &Address, account: &Address) -> Result<Amount, EngineError> {
        Ok(self
            .shares
            .lock()
            .unwrap()
            .get(&(vault.clone(), account.clone()))
            .copied()
            .unwrap_or(0))
    }
}

pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(now: Timestamp) -> Self {
        Self {
            now: AtomicU64::new(now),
        }
    }

    pub fn set(&self, now: Timestamp) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: u64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}

pub struct PlainVerifier;

impl SignatureVerifier for PlainVerifier {
    fn recover(&self, digest: &[u8; 32], signature: &[u8]) -> Option<Address> {
        if signature.len() <= 32 || &signature[..32] != digest {
            return None;
        }
        let signer = std::str::from_utf8(&signature[32..]).ok()?;
        Some(addr(signer))
    }
}

pub fn sign(op: UserOperation, signer: &str) -> UserOperation {
    let mut signature = op.hash().to_vec();
    signature.extend_from_slice(addr(signer).as_str().as_bytes());
    op.with_signature(signature)
}

pub fn execute_selector() -> Selector {
    Selector::from_signature(EXECUTE_JOB_SIGNATURE)
}

pub fn bot_scope(valid_after: Timestamp, valid_until: Timestamp) -> GrantScope {
    GrantScope {
        target: addr(EXECUTOR),
        selector: execute_selector(),
        valid_after,
        valid_until,
    }
}

pub fn definition(
    limit_amount: Amount,
    valid_after: Timestamp,
    valid_until: Timestamp,
    refresh_interval: u64,
) -> JobDefinition {
    JobDefinition {
        source_token: addr(USDC),
        destination_token: addr(WMATIC),
        destination_vault: addr(VAULT),
        limit_amount,
        used_amount: 0,
        valid_after,
        valid_until,
        last_executed: 0,
        refresh_interval,
    }
}

/// Signed `executeJob(job_id)` from `signer` on behalf of `sender`.
pub fn execute_op(sender: &str, signer: &str, job_id: JobId, sequence: u64) -> UserOperation {
    let key = resolve_nonce_key(&addr(sender), &addr(signer)).unwrap();
    let op = UserOperation::new(
        addr(sender),
        OperationNonce { key, sequence },
        Call::new(addr(EXECUTOR), encode_execute_job(execute_selector(), job_id)),
    );
    sign(op, signer)
}

pub struct Harness {
    pub engine: Engine,
    pub token: Arc<InMemoryToken>,
    pub vault: Arc<InMemoryVault>,
    pub clock: Arc<ManualClock>,
}

pub fn harness(now: Timestamp) -> Harness {
    harness_with(EngineConfig::new(addr(EXECUTOR)), now)
}

pub fn harness_with(config: EngineConfig, now: Timestamp) -> Harness {
    init_tracing();
    let token = Arc::new(InMemoryToken::new());
    let vault = Arc::new(InMemoryVault::new(token.clone()));
    let clock = Arc::new(ManualClock::new(now));

    let engine = Engine::new(
        config,
        Collaborators {
            token: token.clone(),
            vault: vault.clone(),
            verifier: Arc::new(PlainVerifier),
            clock: clock.clone(),
        },
    )
    .unwrap();

    Harness {
        engine,
        token,
        vault,
        clock,
    }
}
