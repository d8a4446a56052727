//! Back-end account registry
//!
//! Recovery capacity is spread across multiple capacity-constrained back-end
//! accounts. Each account carries an explicit capability token that the
//! recovery client presents on every cross-account call; credentials are
//! never ambient.

use crate::client::context::{AccountContext, CapabilityToken};
use serde::{Deserialize, Serialize};

/// One back-end account the partitioner can place batches into
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountProfile {
    pub account_id: String,
    pub region: String,
    /// Maximum servers per StartJob call against this account
    pub per_call_limit: usize,
    /// Maximum servers that may be in flight in this account at once
    pub capacity_ceiling: usize,
    /// Capability token resolved for cross-account calls
    pub capability: CapabilityToken,
}

impl AccountProfile {
    /// Build the explicit call context for this account
    pub fn context(&self) -> AccountContext {
        AccountContext {
            account_id: self.account_id.clone(),
            region: self.region.clone(),
            capability: self.capability.clone(),
        }
    }
}

/// Ordered registry of back-end accounts
///
/// Ordering is significant: the partitioner fills accounts in registry order
/// so that assignment is deterministic for a given input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountRegistry {
    accounts: Vec<AccountProfile>,
}

impl AccountRegistry {
    pub fn new(accounts: Vec<AccountProfile>) -> Self {
        Self { accounts }
    }

    pub fn accounts(&self) -> &[AccountProfile] {
        &self.accounts
    }

    pub fn get(&self, account_id: &str) -> Option<&AccountProfile> {
        self.accounts.iter().find(|a| a.account_id == account_id)
    }

    /// Resolve the call context for an account id, if registered
    pub fn context_for(&self, account_id: &str) -> Option<AccountContext> {
        self.get(account_id).map(AccountProfile::context)
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}
