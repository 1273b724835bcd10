//! Ledger facade composing the balance index, the package store and the verification pool.

use crate::{Config, Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use zledger_balance::{Account, AccountsDb, Balance, BalanceSync, IndexedOut};
use zledger_pkgstate::PkgState;
use zledger_primitives::{
    AssetCommitter, BlockNumber, ChainSource, InputVerifier, KeyOracle, OutState, Root,
    TrackingKey, Uint256,
};
use zledger_verify::{InputS, InputVerifyJob, VerifyPool};

/// Sync progress as seen by one tracking key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncStatus {
    pub registered_at: BlockNumber,
    /// Last block applied to the index.
    pub scanned_height: BlockNumber,
    /// Highest block eligible for scanning.
    pub confirmed_height: BlockNumber,
    pub head: BlockNumber,
    pub confirmation_depth: u64,
    pub unspent_outputs: usize,
}

/// Spent input of a transaction under validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxInput {
    /// Root of the output being spent.
    pub root: Root,
    pub input: InputS,
}

/// Handle of the running balance sync task.
///
/// Dropping it detaches the task, which then runs for the rest of the process.
#[must_use = "the sync task can only be stopped through its handle"]
pub struct LedgerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl LedgerHandle {
    /// Signals the sync loop to stop after its current iteration and waits for it.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown.send(true);
        self.task
            .await
            .map_err(|err| Error::SyncTask(err.to_string()))
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Process wide ledger context.
///
/// Built once by the node bootstrap and passed to every consumer. Queries are synchronous
/// reads over state owned by the background sync; none of them waits for or triggers a scan.
pub struct Ledger<Chain, Keys> {
    config: Config,
    chain: Arc<Chain>,
    balance: Balance,
    sync: Arc<BalanceSync<Chain, Keys>>,
    pkg_state: PkgState,
    pool: VerifyPool,
    started: AtomicBool,
}

impl<Chain, Keys> Ledger<Chain, Keys>
where
    Chain: ChainSource + 'static,
    Keys: KeyOracle + 'static,
{
    /// Opens the stores under [`Config::base_path`] and builds the verification pool.
    pub fn open(
        config: Config,
        chain: Arc<Chain>,
        keys: Arc<Keys>,
        verifier: Arc<dyn InputVerifier>,
        committer: Arc<dyn AssetCommitter>,
    ) -> Result<Self> {
        std::fs::create_dir_all(config.balance_path())?;
        std::fs::create_dir_all(config.pkgstate_path())?;

        let accounts = Arc::new(AccountsDb::open(&config.balance_path())?);
        let pkg_state = PkgState::open(&config.pkgstate_path())?;
        let pool = VerifyPool::new(config.verify_threads, verifier, committer)?;

        let sync = Arc::new(BalanceSync::new(
            accounts.clone(),
            chain.clone(),
            keys,
            config.sync.clone(),
        ));

        tracing::info!(
            base_path = %config.base_path.display(),
            verify_threads = pool.threads(),
            "Ledger opened"
        );

        Ok(Self {
            balance: Balance::new(accounts),
            chain,
            sync,
            pkg_state,
            pool,
            config,
            started: AtomicBool::new(false),
        })
    }

    /// Spawns the balance sync loop on the current tokio runtime.
    ///
    /// The loop runs once per ledger; a second call fails.
    #[must_use = "dropping the handle detaches the sync task"]
    pub fn start(&self) -> Result<LedgerHandle> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| Error::NoRuntime)?;

        if self.started.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyStarted);
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = runtime.spawn(self.sync.clone().run(shutdown_rx));

        Ok(LedgerHandle { shutdown, task })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The scanner behind the background loop.
    pub fn sync(&self) -> &Arc<BalanceSync<Chain, Keys>> {
        &self.sync
    }

    pub fn balance(&self) -> &Balance {
        &self.balance
    }

    pub fn pkg_state(&self) -> &PkgState {
        &self.pkg_state
    }

    pub fn pool(&self) -> &VerifyPool {
        &self.pool
    }

    /// Resolves an output by root, from the index first and then from the chain.
    pub fn get_out(&self, root: &Root) -> Result<Option<OutState>> {
        if let Some(indexed) = self.balance.get_out(root)? {
            return Ok(Some(indexed.out));
        }
        Ok(self.chain.out_state(root)?)
    }

    /// Unspent outputs of `tk` in chain order.
    pub fn get_outs(&self, tk: &TrackingKey) -> Result<Vec<IndexedOut>> {
        Ok(self.balance.get_outs(tk)?)
    }

    /// Registers `tk` at the current chain head.
    ///
    /// Returns `false` if it was registered before; its account is left untouched.
    pub fn register_account(&self, tk: &TrackingKey) -> Result<bool> {
        let head = self.chain.best_number();
        Ok(self.balance.register_account(tk, head)?)
    }

    pub fn get_account(&self, tk: &TrackingKey) -> Option<Account> {
        self.balance.get_account(tk)
    }

    pub fn get_records(
        &self,
        tk: &TrackingKey,
        begin: BlockNumber,
        end: BlockNumber,
    ) -> Result<Vec<IndexedOut>> {
        Ok(self.balance.get_records(tk, begin, end)?)
    }

    /// Returns `None` for an unregistered key.
    pub fn sync_status(&self, tk: &TrackingKey) -> Result<Option<SyncStatus>> {
        let Some(account) = self.balance.get_account(tk) else {
            return Ok(None);
        };

        Ok(Some(SyncStatus {
            registered_at: account.registered_at,
            scanned_height: self.balance.scanned_height(),
            confirmed_height: self.sync.confirmed_height(),
            head: self.chain.best_number(),
            confirmation_depth: self.config.sync.confirmation_depth,
            unspent_outputs: self.balance.get_outs(tk)?.len(),
        }))
    }

    /// Verifies every input of a transaction and returns their asset checksums in order.
    ///
    /// Referenced outputs are resolved from the chain before any verification runs. The
    /// transaction is rejected as a whole if one input fails.
    pub fn verify_inputs(&self, hash_z: Uint256, inputs: &[TxInput]) -> Result<Vec<Uint256>> {
        if inputs.is_empty() {
            return Err(zledger_verify::Error::EmptyBatch.into());
        }

        let jobs = inputs
            .iter()
            .map(|tx_input| -> Result<InputVerifyJob> {
                let src = self
                    .chain
                    .out_state(&tx_input.root)?
                    .ok_or(Error::UnknownOutput(tx_input.root))?;
                Ok(InputVerifyJob::new(hash_z, tx_input.input, src))
            })
            .collect::<Result<Vec<_>>>()?;

        self.pool.verify_inputs(jobs).map_err(|err| {
            tracing::debug!(%hash_z, ?err, "Transaction inputs rejected");
            err.into()
        })
    }
}
