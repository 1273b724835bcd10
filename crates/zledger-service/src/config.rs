use std::path::{Path, PathBuf};
use zledger_balance::SyncConfig;
use zledger_verify::default_verify_threads;

/// Ledger configuration, fixed at start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory holding the `balance` and `pkgstate` databases.
    pub base_path: PathBuf,
    /// Size of the input verification pool.
    pub verify_threads: usize,
    pub sync: SyncConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("./zledger-data"),
            verify_threads: default_verify_threads(),
            sync: SyncConfig::default(),
        }
    }
}

impl Config {
    /// Default configuration rooted at `base_path`.
    pub fn with_base_path(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            ..Default::default()
        }
    }

    pub fn balance_path(&self) -> PathBuf {
        self.base_path.join("balance")
    }

    pub fn pkgstate_path(&self) -> PathBuf {
        self.base_path.join("pkgstate")
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.base_path(), Path::new("./zledger-data"));
        assert!(config.verify_threads >= 1);
        assert_eq!(config.sync.confirmation_depth, 12);
        assert_eq!(config.sync.max_batch_blocks, 1000);
        assert_eq!(config.sync.busy_interval, Duration::from_millis(10));
        assert_eq!(config.sync.idle_interval, Duration::from_secs(8));
    }

    #[test]
    fn test_store_paths_live_under_base_path() {
        let config = Config::with_base_path("/tmp/ledger");
        assert_eq!(config.balance_path(), PathBuf::from("/tmp/ledger/balance"));
        assert_eq!(config.pkgstate_path(), PathBuf::from("/tmp/ledger/pkgstate"));
    }
}
