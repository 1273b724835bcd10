use crate::{Nullifier, PKr, Root, Signature, Uint256};

/// Everything the proof/signature verifier needs to check one spent input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyInputDesc {
    /// Hash of the transaction body the input signs over.
    pub ehash: Uint256,
    pub nil: Nullifier,
    pub root_cm: Root,
    pub sign: Signature,
    /// Owner key of the referenced output.
    pub pkr: PKr,
}

/// Flat asset descriptor consumed by the commitment primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AssetDesc {
    pub tkn_currency: Uint256,
    pub tkn_value: Uint256,
    pub tkt_category: Uint256,
    pub tkt_value: Uint256,
}

/// Reason given by an [`InputVerifier`] for rejecting an input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct VerifierError(pub String);

/// Opaque input proof and signature verifier.
///
/// Implementations must be pure and safe to call from many threads at once.
pub trait InputVerifier: Send + Sync {
    fn verify_input(&self, desc: &VerifyInputDesc) -> Result<(), VerifierError>;
}

/// Opaque asset commitment primitive, deterministic for equal descriptors.
pub trait AssetCommitter: Send + Sync {
    fn asset_cc(&self, desc: &AssetDesc) -> Uint256;
}
