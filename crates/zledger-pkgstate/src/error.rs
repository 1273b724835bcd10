use zledger_primitives::Uint256;

/// Errors that can occur during package store operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// RocksDB error.
    #[error("RocksDB error: {0}")]
    Rocksdb(#[from] rocksdb::Error),

    /// Bincode serialization/deserialization error.
    #[error("Bincode error: {0}")]
    Bincode(#[from] bincode::Error),

    /// A payload was requested to be persisted for a hash the in-memory index does not know.
    #[error("Package hash {0} is not indexed, id and payload indexes diverged")]
    HashNotIndexed(Uint256),

    /// A dirty id has no hash in memory or on disk.
    #[error("Dirty package id {0} has no hash")]
    DirtyIdWithoutHash(Uint256),

    /// Stored value with an unexpected shape.
    #[error("Corrupted entry in {cf}: {reason}")]
    Corrupted { cf: &'static str, reason: String },

    /// Storage not initialized.
    #[error("Storage not initialized")]
    NotInitialized,
}

impl Error {
    /// Whether the error signals an unrecoverable consistency violation.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::HashNotIndexed(_) | Self::DirtyIdWithoutHash(_) | Self::Corrupted { .. }
        )
    }
}
