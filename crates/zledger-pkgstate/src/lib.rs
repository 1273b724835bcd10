//! Content-addressed package store.
//!
//! Packages are opaque payloads produced while applying block state. Each one is reachable
//! through two keyspaces: a sequential id mapped to the content hash, and the content hash
//! mapped to the payload. Ids touched since the last persistence cycle are tracked in a
//! dirty set so that every cycle writes each changed id exactly once.

mod error;
mod storage;

pub use error::Error;
pub use storage::PkgState;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zledger_primitives::Uint256;

/// Result type for package store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Column family names for RocksDB.
mod cf {
    /// Key: package id (32 bytes)
    /// Value: content hash (32 bytes), all zeroes once the package is closed
    pub const ID2HASH: &str = "id2hash";

    /// Key: content hash (32 bytes)
    /// Value: Package (bincode)
    pub const HASH2PKG: &str = "hash2pkg";
}

/// Opaque payload addressed by id and content hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub id: Uint256,
    pub payload: Vec<u8>,
}

impl Package {
    pub fn new(id: Uint256, payload: Vec<u8>) -> Self {
        Self { id, payload }
    }

    /// SHA-256 of the bincode encoding.
    pub fn content_hash(&self) -> Result<Uint256> {
        let encoded = bincode::serialize(self)?;
        Ok(Uint256(Sha256::digest(&encoded).into()))
    }
}
