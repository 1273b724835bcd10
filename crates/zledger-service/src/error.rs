use zledger_primitives::{ChainError, Root};

/// Ledger service error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Balance(#[from] zledger_balance::Error),

    #[error(transparent)]
    PkgState(#[from] zledger_pkgstate::Error),

    #[error(transparent)]
    Verify(#[from] zledger_verify::Error),

    #[error(transparent)]
    Chain(#[from] ChainError),

    /// A transaction input references an output the chain does not know.
    #[error("Unknown output {0}")]
    UnknownOutput(Root),

    #[error("Balance sync is already running")]
    AlreadyStarted,

    #[error("No tokio runtime to run the balance sync on")]
    NoRuntime,

    #[error("Balance sync task failed: {0}")]
    SyncTask(String),

    #[error("Failed to initialize logger: {0}")]
    Logger(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the error signals an unrecoverable consistency violation.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Balance(err) => err.is_fatal(),
            Self::PkgState(err) => err.is_fatal(),
            _ => false,
        }
    }
}
