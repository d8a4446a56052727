//! # Account Partitioner
//!
//! Splits a wave's servers into per-account batches against a registry of
//! capacity-constrained back-end accounts. Assignment is pure and
//! deterministic for a given input — accounts are filled in registry order,
//! servers in input order — so a retried launch produces identical batches.
//!
//! Servers that no account can accept are returned as unplaced; the wave
//! coordinator surfaces them as a failed batch, never as a crash.

use crate::client::AccountContext;
use crate::models::AccountRegistry;
use std::collections::HashMap;
use tracing::warn;

/// One batch bound for one StartJob call against one account
#[derive(Debug, Clone)]
pub struct PlannedBatch {
    pub context: AccountContext,
    pub server_ids: Vec<String>,
}

/// Result of partitioning one wave's servers
#[derive(Debug, Clone, Default)]
pub struct PartitionOutcome {
    /// Batches in deterministic launch order
    pub batches: Vec<PlannedBatch>,
    /// Servers no account had capacity for
    pub unplaced: Vec<String>,
}

impl PartitionOutcome {
    /// No account could accept any of the requested servers
    pub fn is_no_capacity(&self) -> bool {
        self.batches.is_empty() && !self.unplaced.is_empty()
    }
}

/// Deterministic partitioner over an account registry
#[derive(Debug, Clone)]
pub struct AccountPartitioner {
    registry: AccountRegistry,
}

impl AccountPartitioner {
    pub fn new(registry: AccountRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &AccountRegistry {
        &self.registry
    }

    /// Partition `server_ids` into per-account batches.
    ///
    /// `in_flight` is the current non-terminal server count per account; an
    /// account never receives more servers than
    /// `capacity_ceiling - in_flight` to avoid overcommitting a
    /// capacity-constrained backend. Each batch stays within the account's
    /// per-call limit.
    pub fn partition(
        &self,
        server_ids: &[String],
        in_flight: &HashMap<String, usize>,
    ) -> PartitionOutcome {
        let mut remaining: Vec<String> = server_ids.to_vec();
        let mut batches = Vec::new();

        for account in self.registry.accounts() {
            if remaining.is_empty() {
                break;
            }
            let used = in_flight.get(&account.account_id).copied().unwrap_or(0);
            let mut headroom = account.capacity_ceiling.saturating_sub(used);
            if headroom == 0 || account.per_call_limit == 0 {
                continue;
            }

            while !remaining.is_empty() && headroom > 0 {
                let take = remaining
                    .len()
                    .min(account.per_call_limit)
                    .min(headroom);
                let batch: Vec<String> = remaining.drain(..take).collect();
                headroom -= batch.len();
                batches.push(PlannedBatch {
                    context: account.context(),
                    server_ids: batch,
                });
            }
        }

        if !remaining.is_empty() {
            warn!(
                unplaced = remaining.len(),
                requested = server_ids.len(),
                "no account capacity for remaining servers"
            );
        }

        PartitionOutcome {
            batches,
            unplaced: remaining,
        }
    }
}
