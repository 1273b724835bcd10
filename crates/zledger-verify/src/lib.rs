//! Verification of shielded transaction inputs.
//!
//! Each spent input becomes an [`InputVerifyJob`], a pure function of the input and the
//! immutable output it references. Jobs share no mutable state, which is what allows the
//! [`VerifyPool`] to evaluate a whole batch concurrently on a fixed number of threads.

mod job;
mod pool;

pub use job::{InputS, InputVerifyJob};
pub use pool::{VerifyPool, default_verify_threads};

use zledger_primitives::{Nullifier, Root, VerifierError};

/// Input verification error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The proof or signature of an input was rejected.
    #[error("Input (nil: {nil}, root: {root}) failed verification: {reason}")]
    InvalidInput {
        nil: Nullifier,
        root: Root,
        reason: VerifierError,
    },
    #[error("Verification batch is empty")]
    EmptyBatch,
    #[error("Batch contains duplicate nullifier {nil} at index {index}")]
    DuplicateNullifier { index: usize, nil: Nullifier },
    #[error("Failed to build verification thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, Error>;
