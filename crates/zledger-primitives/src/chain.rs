use crate::{Asset, BlockNumber, Nullifier, PKr, Root, TrackingKey};
use serde::{Deserialize, Serialize};

/// A shielded output as seen by the ledger core.
///
/// Outputs are immutable once created; whether one has been spent is tracked
/// through the nullifier set, never inside this struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutState {
    /// Root commitment, the identity of the output.
    pub root: Root,
    /// Owner's randomized public key.
    pub pkr: PKr,
    pub asset: Asset,
}

/// State changes of one confirmed block relevant to balance tracking.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainBlock {
    pub number: BlockNumber,
    /// Outputs created in this block, in block order.
    pub outs: Vec<OutState>,
    /// Nullifiers revealed in this block.
    pub nils: Vec<Nullifier>,
}

/// Error reported by a [`ChainSource`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChainError {
    #[error("Block #{0} not found")]
    BlockNotFound(BlockNumber),
    #[error("Chain backend error: {0}")]
    Backend(String),
}

/// Read-only access to the chain this ledger follows.
pub trait ChainSource: Send + Sync {
    /// Height of the current chain head.
    fn best_number(&self) -> BlockNumber;

    /// Returns the state changes of the block at `number`.
    ///
    /// Returns `Ok(None)` if the height is above the head.
    fn block(&self, number: BlockNumber) -> Result<Option<ChainBlock>, ChainError>;

    /// Resolves any output on the chain by its root.
    fn out_state(&self, root: &Root) -> Result<Option<OutState>, ChainError>;
}

/// Key primitives needed to attribute outputs and spends to tracking keys.
pub trait KeyOracle: Send + Sync {
    /// Whether `pkr` was derived for the holder of `tk`.
    fn is_my_pkr(&self, tk: &TrackingKey, pkr: &PKr) -> bool;

    /// Nullifier that will be revealed when `out`, owned by `tk`, is spent.
    fn nullifier(&self, tk: &TrackingKey, out: &OutState) -> Nullifier;
}
