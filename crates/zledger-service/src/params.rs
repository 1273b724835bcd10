use crate::Config;
use std::path::PathBuf;
use std::time::Duration;
use zledger_balance::SyncConfig;
use zledger_primitives::DEFAULT_CONFIRMATION_DEPTH;

/// Ledger params.
#[derive(Debug, Clone, clap::Args)]
pub struct LedgerParams {
    /// Specify custom base path.
    #[arg(long, short = 'd', value_name = "PATH")]
    pub base_path: Option<PathBuf>,

    /// Number of threads verifying transaction inputs.
    ///
    /// Defaults to the available parallelism.
    #[arg(long, value_name = "COUNT")]
    pub verify_threads: Option<usize>,

    /// Number of blocks below the chain head that are not indexed yet.
    #[arg(long, default_value_t = DEFAULT_CONFIRMATION_DEPTH)]
    pub confirmation_depth: u64,

    /// Maximum number of blocks indexed in one batch.
    #[arg(long, default_value_t = 1000)]
    pub max_batch_blocks: u64,

    /// Pause in milliseconds between scans while the index is catching up.
    #[arg(long, default_value_t = 10)]
    pub busy_interval_ms: u64,

    /// Pause in milliseconds between scans while there is nothing to index.
    #[arg(long, default_value_t = 8000)]
    pub idle_interval_ms: u64,

    /// Sets a custom logging filter (syntax: `<target>=<level>`).
    ///
    /// *Example*: `--log info,zledger_balance=debug`.
    #[arg(short = 'l', long, value_name = "LOG_PATTERN", num_args = 1..)]
    pub log: Vec<String>,
}

impl LedgerParams {
    pub fn config(&self) -> Config {
        let mut config = Config {
            sync: SyncConfig {
                confirmation_depth: self.confirmation_depth,
                max_batch_blocks: self.max_batch_blocks,
                busy_interval: Duration::from_millis(self.busy_interval_ms),
                idle_interval: Duration::from_millis(self.idle_interval_ms),
            },
            ..Default::default()
        };
        if let Some(base_path) = &self.base_path {
            config.base_path = base_path.clone();
        }
        if let Some(verify_threads) = self.verify_threads {
            config.verify_threads = verify_threads;
        }
        config
    }

    /// Logging filter for [`crate::logging::init_logger`].
    pub fn log_pattern(&self) -> String {
        if self.log.is_empty() {
            "info".to_string()
        } else {
            self.log.join(",")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        ledger: LedgerParams,
    }

    #[test]
    fn test_defaults_match_config() {
        let cli = Cli::parse_from(["zledger"]);
        let config = cli.ledger.config();
        assert_eq!(config.sync, SyncConfig::default());
        assert_eq!(config, Config::default());
        assert_eq!(cli.ledger.log_pattern(), "info");
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from([
            "zledger",
            "-d",
            "/var/lib/zledger",
            "--verify-threads",
            "3",
            "--confirmation-depth",
            "0",
            "--idle-interval-ms",
            "250",
            "-l",
            "info",
            "zledger_balance=debug",
        ]);
        let config = cli.ledger.config();
        assert_eq!(config.base_path, PathBuf::from("/var/lib/zledger"));
        assert_eq!(config.verify_threads, 3);
        assert_eq!(config.sync.confirmation_depth, 0);
        assert_eq!(config.sync.idle_interval, Duration::from_millis(250));
        assert_eq!(cli.ledger.log_pattern(), "info,zledger_balance=debug");
    }
}
