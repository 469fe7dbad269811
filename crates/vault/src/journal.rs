//! Vault journal
//!
//! Bounded in-memory log of everything the vault did. Oldest entries are
//! dropped once `capacity` is reached.

use keel_core::{AccountId, Amount, Bps, Role, StrategyId, Timestamp};
use serde::Serialize;
use std::collections::VecDeque;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeKind {
    Performance,
    Management,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VaultEvent {
    StrategyAdded {
        id: StrategyId,
        name: String,
        risk_score: Bps,
        max_allocation_bps: Bps,
    },
    StrategyRemoved {
        id: StrategyId,
        recovered: Amount,
    },
    StrategyUpgraded {
        id: StrategyId,
        name: String,
        recovered: Amount,
    },
    AllocationUpdated {
        id: StrategyId,
        target_bps: Bps,
    },
    Deposited {
        account: AccountId,
        amount: Amount,
        shares: Amount,
    },
    Withdrawn {
        account: AccountId,
        amount: Amount,
        shares: Amount,
    },
    Rebalanced {
        rebalanced: usize,
        skipped: usize,
        failed: usize,
    },
    Harvested {
        harvested: usize,
        failed: usize,
        total_yield: Amount,
    },
    FeeCollected {
        recipient: String,
        kind: FeeKind,
        amount: Amount,
    },
    EmergencyActivated {
        reason: String,
    },
    EmergencyDeactivated,
    StrategyExited {
        id: StrategyId,
        reason: String,
        /// None if the exit call itself failed
        recovered: Option<Amount>,
        unrecovered: Amount,
    },
    ConfigUpdated,
    RoleGranted {
        account: AccountId,
        role: Role,
    },
    RoleRevoked {
        account: AccountId,
        role: Role,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct JournalEntry {
    pub id: Uuid,
    pub timestamp: Timestamp,
    pub event: VaultEvent,
}

#[derive(Debug, Clone)]
pub struct Journal {
    entries: VecDeque<JournalEntry>,
    capacity: usize,
}

impl Journal {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1_024)),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&mut self, timestamp: Timestamp, event: VaultEvent) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(JournalEntry {
            id: Uuid::new_v4(),
            timestamp,
            event,
        });
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &JournalEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&JournalEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
