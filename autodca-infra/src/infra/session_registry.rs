use crate::infra::contracts::{Address, GrantScope, SessionKeyGrant, Timestamp};
use parking_lot::RwLock;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionKeyError {
    #[error("Invalid grant window: valid_after {valid_after} must be before valid_until {valid_until}")]
    InvalidWindow {
        valid_after: Timestamp,
        valid_until: Timestamp,
    },
    #[error("No session key {key} for account {account}")]
    NotFound { account: Address, key: Address },
}

/// Grants keyed by (account, session key). At most one grant per pair;
/// enabling again replaces whatever was there.
pub struct SessionKeyRegistry {
    grants: RwLock<HashMap<(Address, Address), SessionKeyGrant>>,
}

impl Default for SessionKeyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionKeyRegistry {
    pub fn new() -> Self {
        Self {
            grants: RwLock::new(HashMap::new()),
        }
    }

    pub fn enable(
        &self,
        account: &Address,
        key: &Address,
        scope: GrantScope,
    ) -> Result<SessionKeyGrant, SessionKeyError> {
        if !scope.window().is_well_formed() {
            return Err(SessionKeyError::InvalidWindow {
                valid_after: scope.valid_after,
                valid_until: scope.valid_until,
            });
        }

        let grant = SessionKeyGrant {
            account: account.clone(),
            key: key.clone(),
            target: scope.target,
            selector: scope.selector,
            valid_after: scope.valid_after,
            valid_until: scope.valid_until,
            active: true,
        };

        let replaced = self
            .grants
            .write()
            .insert((account.clone(), key.clone()), grant.clone());

        info!(
            "Enabled session key {} for account {} (target {}, selector {}, window [{}, {}), replaced: {})",
            key,
            account,
            grant.target,
            grant.selector,
            grant.valid_after,
            grant.valid_until,
            replaced.is_some()
        );
        Ok(grant)
    }

    /// Deactivate without removing. Disabling an inactive grant is a no-op.
    pub fn disable(&self, account: &Address, key: &Address) -> Result<(), SessionKeyError> {
        let mut grants = self.grants.write();
        let grant = grants
            .get_mut(&(account.clone(), key.clone()))
            .ok_or_else(|| SessionKeyError::NotFound {
                account: account.clone(),
                key: key.clone(),
            })?;

        if grant.active {
            grant.active = false;
            info!("Disabled session key {} for account {}", key, account);
        } else {
            debug!("Session key {} for account {} already disabled", key, account);
        }
        Ok(())
    }

    pub fn get(&self, account: &Address, key: &Address) -> Option<SessionKeyGrant> {
        self.grants
            .read()
            .get(&(account.clone(), key.clone()))
            .cloned()
    }

    pub fn grants_for(&self, account: &Address) -> Vec<SessionKeyGrant> {
        let mut grants: Vec<_> = self
            .grants
            .read()
            .values()
            .filter(|grant| &grant.account == account)
            .cloned()
            .collect();
        grants.sort_by(|a, b| a.key.cmp(&b.key));
        grants
    }

    pub fn len(&self) -> usize {
        self.grants.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.read().is_empty()
    }

    pub fn snapshot(&self) -> Vec<SessionKeyGrant> {
        let mut grants: Vec<_> = self.grants.read().values().cloned().collect();
        grants.sort_by(|a, b| (&a.account, &a.key).cmp(&(&b.account, &b.key)));
        grants
    }

    /// Replace the registry contents with a previously taken snapshot.
    pub fn restore(&self, snapshot: Vec<SessionKeyGrant>) {
        let mut grants = self.grants.write();
        grants.clear();
        for grant in snapshot {
            grants.insert((grant.account.clone(), grant.key.clone()), grant);
        }
    }
}
