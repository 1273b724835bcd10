//! Primitives shared by the zledger crates.
//!
//! This crate only holds data types and the contracts of the collaborators the ledger
//! core relies on but does not implement itself: the chain height source, the key
//! oracle that recognises owned outputs, the input proof verifier and the asset
//! commitment primitive.

mod asset;
mod bytes;
mod chain;
mod zk;

pub use asset::{Asset, Category, Currency, FlatAsset, Ticket, Token};
pub use bytes::{PKr, Signature, TrackingKey, Uint256};
pub use chain::{ChainBlock, ChainError, ChainSource, KeyOracle, OutState};
pub use zk::{AssetCommitter, AssetDesc, InputVerifier, VerifierError, VerifyInputDesc};

/// Root commitment identifying a shielded output.
pub type Root = Uint256;

/// One-time value revealed when an output is spent.
pub type Nullifier = Uint256;

/// Block height.
pub type BlockNumber = u64;

/// Blocks below the head that are not yet considered confirmed.
pub const DEFAULT_CONFIRMATION_DEPTH: u64 = 12;
