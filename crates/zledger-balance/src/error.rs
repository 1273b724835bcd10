//! Error types for the balance index.

use zledger_primitives::{BlockNumber, ChainError, Currency, TrackingKey};

/// Errors that can occur while indexing or querying balances.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// RocksDB error.
    #[error("RocksDB error: {0}")]
    Rocksdb(#[from] rocksdb::Error),

    /// Bincode serialization/deserialization error.
    #[error("Bincode error: {0}")]
    Bincode(#[from] bincode::Error),

    /// The chain source failed to serve a block.
    #[error("Failed to read block #{height}: {source}")]
    Chain {
        height: BlockNumber,
        source: ChainError,
    },

    /// A block at or below the confirmed tip is unavailable.
    #[error("Block #{0} is missing")]
    BlockMissing(BlockNumber),

    /// A spend exceeds the indexed balance.
    #[error("Balance underflow for {tk} in {currency}: balance {balance}, spent {spent}")]
    BalanceUnderflow {
        tk: TrackingKey,
        currency: Currency,
        balance: u128,
        spent: u128,
    },

    #[error("Balance overflow for {tk} in {currency}")]
    BalanceOverflow { tk: TrackingKey, currency: Currency },

    /// Stored value with an unexpected shape or a dangling reference.
    #[error("Corrupted entry in {cf}: {reason}")]
    Corrupted { cf: &'static str, reason: String },

    /// Storage not initialized.
    #[error("Storage not initialized")]
    NotInitialized,

    /// Failure while applying the block at `height`.
    #[error("Block #{height}: {source}")]
    AtBlock {
        height: BlockNumber,
        source: Box<Error>,
    },
}

impl Error {
    /// Whether the error signals an unrecoverable consistency violation.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::AtBlock { source, .. } => source.is_fatal(),
            Self::BalanceUnderflow { .. } | Self::BalanceOverflow { .. } | Self::Corrupted { .. } => {
                true
            }
            _ => false,
        }
    }

    /// Block the error happened at, if known.
    pub fn height(&self) -> Option<BlockNumber> {
        match self {
            Self::Chain { height, .. } | Self::AtBlock { height, .. } => Some(*height),
            Self::BlockMissing(height) => Some(*height),
            _ => None,
        }
    }

    pub(crate) fn at_block(self, height: BlockNumber) -> Self {
        match self {
            Self::AtBlock { .. } | Self::Chain { .. } | Self::BlockMissing(_) => self,
            source => Self::AtBlock {
                height,
                source: Box::new(source),
            },
        }
    }
}
