//! Types of the balance index.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use zledger_primitives::{
    Asset, BlockNumber, Category, Currency, DEFAULT_CONFIRMATION_DEPTH, Nullifier, OutState, Root,
    TrackingKey,
};

/// Balance aggregate of one tracking key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Chain head when the key was registered. Only blocks above it are applied.
    pub registered_at: BlockNumber,
    /// Unspent token amount per currency.
    pub token: BTreeMap<Currency, u128>,
    /// Roots of the unspent ticket outputs per category.
    pub ticket: BTreeMap<Category, Vec<Root>>,
}

impl Account {
    pub fn new(registered_at: BlockNumber) -> Self {
        Self {
            registered_at,
            ..Default::default()
        }
    }

    /// Token balance of the currency with the given symbol.
    pub fn token_balance(&self, symbol: &str) -> u128 {
        self.token
            .get(&Currency::from_symbol(symbol))
            .copied()
            .unwrap_or_default()
    }
}

/// An output received by a registered tracking key, as stored by the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedOut {
    pub out: OutState,
    pub owner: TrackingKey,
    /// Height of the block that created the output.
    pub height: BlockNumber,
    /// Position of the output within its block.
    pub position: u32,
    /// Nullifier revealed when the output is spent.
    pub nil: Nullifier,
    pub spent_at: Option<BlockNumber>,
}

impl IndexedOut {
    pub fn root(&self) -> &Root {
        &self.out.root
    }

    pub fn asset(&self) -> &Asset {
        &self.out.asset
    }

    pub fn is_spent(&self) -> bool {
        self.spent_at.is_some()
    }
}

/// Counters of one committed scan batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub blocks: u64,
    pub received: u64,
    pub spent: u64,
}

/// Result of one scan iteration, used by the loop driver to pick the next sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The checkpoint advanced to `next`.
    Progressed { next: BlockNumber },
    /// No confirmed block beyond the checkpoint.
    Stalled,
    /// The iteration failed and nothing was committed.
    Fault,
}

impl ScanOutcome {
    /// Sleep before the next iteration.
    pub fn cadence(&self, config: &SyncConfig) -> Duration {
        match self {
            Self::Progressed { .. } => config.busy_interval,
            Self::Stalled | Self::Fault => config.idle_interval,
        }
    }
}

/// Balance sync settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Number of blocks below the head that are not scanned yet.
    pub confirmation_depth: u64,
    /// Maximum number of blocks committed by one iteration.
    pub max_batch_blocks: u64,
    /// Sleep after an iteration that made progress.
    pub busy_interval: Duration,
    /// Sleep after an iteration that was stalled or failed.
    pub idle_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            confirmation_depth: DEFAULT_CONFIRMATION_DEPTH,
            max_batch_blocks: 1000,
            busy_interval: Duration::from_millis(10),
            idle_interval: Duration::from_secs(8),
        }
    }
}
