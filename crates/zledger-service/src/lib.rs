//! Ledger service: configuration, logging and the [`Ledger`] facade.

mod config;
mod error;
mod ledger;
pub mod logging;
#[cfg(feature = "cli")]
mod params;

pub use config::Config;
pub use error::Error;
pub use ledger::{Ledger, LedgerHandle, SyncStatus, TxInput};
#[cfg(feature = "cli")]
pub use params::LedgerParams;

pub type Result<T> = std::result::Result<T, Error>;
