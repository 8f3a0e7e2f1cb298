use crate::infra::contracts::{Address, Selector, Timestamp};
use crate::infra::session_registry::SessionKeyRegistry;
use crate::infra::validity::WindowPosition;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A delegated key asking to make one call at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    pub account: Address,
    pub key: Address,
    pub target: Address,
    pub selector: Selector,
    pub now: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    NoGrant,
    Inactive,
    NotYetValid,
    Expired,
    TargetMismatch,
    SelectorMismatch,
}

impl DenialReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenialReason::NoGrant => "no_grant",
            DenialReason::Inactive => "inactive",
            DenialReason::NotYetValid => "not_yet_valid",
            DenialReason::Expired => "expired",
            DenialReason::TargetMismatch => "target_mismatch",
            DenialReason::SelectorMismatch => "selector_mismatch",
        }
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorizationDecision {
    Allow,
    Deny(DenialReason),
}

impl AuthorizationDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AuthorizationDecision::Allow)
    }
}

/// Gatekeeper for delegated calls. Holds no state of its own; every check
/// reads the registry again, so disables and window edges apply immediately.
pub struct SessionValidator {
    registry: Arc<SessionKeyRegistry>,
}

impl SessionValidator {
    pub fn new(registry: Arc<SessionKeyRegistry>) -> Self {
        Self { registry }
    }

    pub fn check(&self, request: &AuthorizationRequest) -> AuthorizationDecision {
        let decision = self.evaluate(request);
        if let AuthorizationDecision::Deny(reason) = decision {
            debug!(
                "Denied session key {} on account {}: {}",
                request.key, request.account, reason
            );
        }
        decision
    }

    /// Boolean form: true iff the grant exists, is active, `now` is inside its
    /// window and target and selector match exactly.
    pub fn authorize(
        &self,
        account: &Address,
        key: &Address,
        target: &Address,
        selector: Selector,
        now: Timestamp,
    ) -> bool {
        self.check(&AuthorizationRequest {
            account: account.clone(),
            key: key.clone(),
            target: target.clone(),
            selector,
            now,
        })
        .is_allowed()
    }

    fn evaluate(&self, request: &AuthorizationRequest) -> AuthorizationDecision {
        let Some(grant) = self.registry.get(&request.account, &request.key) else {
            return AuthorizationDecision::Deny(DenialReason::NoGrant);
        };

        if !grant.active {
            return AuthorizationDecision::Deny(DenialReason::Inactive);
        }

        match grant.window().position(request.now) {
            WindowPosition::NotYetValid => {
                return AuthorizationDecision::Deny(DenialReason::NotYetValid)
            }
            WindowPosition::Closed => return AuthorizationDecision::Deny(DenialReason::Expired),
            WindowPosition::Open => {}
        }

        if grant.target != request.target {
            return AuthorizationDecision::Deny(DenialReason::TargetMismatch);
        }

        if grant.selector != request.selector {
            return AuthorizationDecision::Deny(DenialReason::SelectorMismatch);
        }

        AuthorizationDecision::Allow
    }
}
