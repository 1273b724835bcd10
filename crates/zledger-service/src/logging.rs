use crate::{Error, Result};
use tracing_subscriber::EnvFilter;

/// Installs the global fmt subscriber filtered by `pattern`.
///
/// `pattern` uses the `<target>=<level>` directive syntax, e.g. `info,zledger_balance=debug`.
/// `RUST_LOG` overrides it when set.
pub fn init_logger(pattern: &str) -> Result<()> {
    let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(env) if !env.is_empty() => EnvFilter::try_new(env),
        _ => EnvFilter::try_new(pattern),
    }
    .map_err(|err| Error::Logger(err.to_string()))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|err| Error::Logger(err.to_string()))
}
