//! Background scan of confirmed blocks into the balance index.

use crate::db::AccountsDb;
use crate::types::{ScanOutcome, SyncConfig};
use crate::{Error, Result};
use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::watch;
use zledger_primitives::{BlockNumber, ChainSource, KeyOracle};

/// Incremental scanner keeping [`AccountsDb`] in line with the confirmed chain.
///
/// Each iteration commits at most [`SyncConfig::max_batch_blocks`] blocks together with
/// the checkpoint, so progress is resumable at block granularity. Iterations never
/// overlap: [`BalanceSync::run`] awaits one before scheduling the next.
pub struct BalanceSync<Chain, Keys> {
    db: Arc<AccountsDb>,
    chain: Arc<Chain>,
    keys: Arc<Keys>,
    config: SyncConfig,
    /// Block the current or latest iteration is working on.
    scanning: AtomicU64,
}

impl<Chain, Keys> BalanceSync<Chain, Keys>
where
    Chain: ChainSource + 'static,
    Keys: KeyOracle + 'static,
{
    pub fn new(db: Arc<AccountsDb>, chain: Arc<Chain>, keys: Arc<Keys>, config: SyncConfig) -> Self {
        Self {
            db,
            chain,
            keys,
            config,
            scanning: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Height of the block the latest iteration read or applied last.
    ///
    /// Survives a panicking iteration, so it names the block that caused it.
    pub fn scanning_height(&self) -> BlockNumber {
        self.scanning.load(Ordering::SeqCst)
    }

    /// Highest block eligible for scanning.
    pub fn confirmed_height(&self) -> BlockNumber {
        self.chain
            .best_number()
            .saturating_sub(self.config.confirmation_depth)
    }

    /// Runs one scan iteration.
    ///
    /// Errors are logged here and reported as [`ScanOutcome::Fault`]; nothing of a failed
    /// iteration is committed.
    pub fn scan_once(&self) -> ScanOutcome {
        match self.try_scan() {
            Ok(Some(next)) => ScanOutcome::Progressed { next },
            Ok(None) => ScanOutcome::Stalled,
            Err(err) => {
                let height = err.height().unwrap_or_else(|| self.scanning_height());
                tracing::error!(height, fatal = err.is_fatal(), ?err, "Balance scan failed");
                ScanOutcome::Fault
            }
        }
    }

    fn try_scan(&self) -> Result<Option<BlockNumber>> {
        let confirmed = self.confirmed_height();
        let next = self.db.next_height();
        self.scanning.store(next, Ordering::SeqCst);

        if confirmed <= 1 || next > confirmed {
            return Ok(None);
        }

        let accounts = self.db.accounts_snapshot();

        // Blocks at or below every registration height can not change any account.
        let start = match accounts.values().map(|account| account.registered_at).min() {
            Some(min_registered) => next.max(min_registered.saturating_add(1)),
            None => confirmed + 1,
        };

        if start > confirmed {
            let new_next = confirmed + 1;
            self.db.apply_blocks(accounts, &[], self.keys.as_ref(), new_next)?;
            tracing::debug!(from = next, to = new_next, "Skipped blocks below registrations");
            return Ok(Some(new_next));
        }

        let end = confirmed.min(start.saturating_add(self.config.max_batch_blocks.max(1) - 1));
        let started = Instant::now();

        let mut blocks = Vec::with_capacity((end - start + 1) as usize);
        for height in start..=end {
            self.scanning.store(height, Ordering::SeqCst);
            let block = self
                .chain
                .block(height)
                .map_err(|source| Error::Chain { height, source })?
                .ok_or(Error::BlockMissing(height))?;
            blocks.push(block);
        }

        let stats = self.db.apply_blocks(accounts, &blocks, self.keys.as_ref(), end + 1)?;

        if stats.received > 0 || stats.spent > 0 {
            tracing::info!(
                from = start,
                to = end,
                received = stats.received,
                spent = stats.spent,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Indexed confirmed blocks"
            );
        } else {
            tracing::debug!(from = start, to = end, "Scanned confirmed blocks");
        }

        Ok(Some(end + 1))
    }

    /// Runs the scan loop until `shutdown` turns true.
    ///
    /// Every iteration runs on the blocking pool; a panicking iteration is contained at
    /// the join and treated as a fault. Dropping the sender does not stop the loop.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut detached = false;

        tracing::info!(
            next = self.db.next_height(),
            confirmation_depth = self.config.confirmation_depth,
            "Balance sync started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let this = self.clone();
            let outcome = match tokio::task::spawn_blocking(move || this.scan_once()).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    let reason = if err.is_panic() {
                        panic_message(err.into_panic())
                    } else {
                        err.to_string()
                    };
                    tracing::error!(
                        height = self.scanning_height(),
                        %reason,
                        "Balance scan panicked"
                    );
                    ScanOutcome::Fault
                }
            };

            let pause = tokio::time::sleep(outcome.cadence(&self.config));
            if detached {
                pause.await;
                continue;
            }

            tokio::select! {
                _ = pause => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        tracing::debug!("Shutdown handle dropped, balance sync keeps running");
                        detached = true;
                    }
                }
            }
        }

        tracing::info!(next = self.db.next_height(), "Balance sync stopped");
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
