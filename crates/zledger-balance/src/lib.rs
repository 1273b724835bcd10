//! Per tracking key balance index fed by a background scan of confirmed blocks.
//!
//! ## Architecture
//!
//! - [`AccountsDb`]: RocksDB storage of accounts, indexed outputs and the scan checkpoint.
//! - [`BalanceSync`]: the only writer of the index, one iteration at a time.
//! - [`Balance`]: read access for the rest of the node, never blocked by a running scan.

mod db;
mod error;
mod sync;
mod types;

pub use db::AccountsDb;
pub use error::Error;
pub use sync::BalanceSync;
pub use types::{Account, BatchStats, IndexedOut, ScanOutcome, SyncConfig};

use std::sync::Arc;
use zledger_primitives::{BlockNumber, Root, TrackingKey};

/// Result type for balance index operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Column family names for RocksDB.
mod cf {
    /// Key: tracking key (64 bytes)
    /// Value: Account (bincode)
    pub const ACCOUNTS: &str = "accounts";

    /// Key: root (32 bytes)
    /// Value: IndexedOut (bincode), kept after the output is spent
    pub const OUTS: &str = "outs";

    /// Key: tk || height (u64, big-endian) || position (u32, big-endian) || root
    /// Value: empty, removed on spend
    pub const OWNED: &str = "owned";

    /// Same keys as [`OWNED`], never removed.
    pub const HISTORY: &str = "history";

    /// Key: nullifier (32 bytes)
    /// Value: tk || root of the output it spends
    pub const NILS: &str = "nils";

    /// Column family for metadata.
    pub const META: &str = "meta";
}

/// Metadata keys.
mod meta_keys {
    /// Next block height to scan (u64, little-endian).
    pub const NEXT: &[u8] = b"next";
}

/// Read handle over the balance index.
#[derive(Clone)]
pub struct Balance {
    db: Arc<AccountsDb>,
}

impl Balance {
    pub fn new(db: Arc<AccountsDb>) -> Self {
        Self { db }
    }

    /// Starts tracking `tk` from the block after `head`.
    ///
    /// Returns `false` if the key is already registered.
    pub fn register_account(&self, tk: &TrackingKey, head: BlockNumber) -> Result<bool> {
        self.db.register(tk, head)
    }

    pub fn get_account(&self, tk: &TrackingKey) -> Option<Account> {
        self.db.account(tk)
    }

    pub fn get_out(&self, root: &Root) -> Result<Option<IndexedOut>> {
        self.db.get_out(root)
    }

    /// Unspent outputs of `tk` in chain order.
    pub fn get_outs(&self, tk: &TrackingKey) -> Result<Vec<IndexedOut>> {
        self.db.owned_outs(tk)
    }

    /// Outputs received by `tk` in blocks `begin..=end`, including spent ones.
    pub fn get_records(
        &self,
        tk: &TrackingKey,
        begin: BlockNumber,
        end: BlockNumber,
    ) -> Result<Vec<IndexedOut>> {
        self.db.history(tk, begin, end)
    }

    /// Last block applied to the index.
    pub fn scanned_height(&self) -> BlockNumber {
        self.db.next_height().saturating_sub(1)
    }

    pub fn account_count(&self) -> usize {
        self.db.account_count()
    }
}
