use crate::{Error, InputVerifyJob, Result};
use rayon::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use zledger_primitives::{AssetCommitter, InputVerifier, Uint256};

/// Number of verification threads used when none is configured.
pub fn default_verify_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Fixed-size worker pool evaluating [`InputVerifyJob`]s.
///
/// No more than [`VerifyPool::threads`] jobs run at the same time, and results of
/// a batch are returned in submission order whatever order they complete in.
pub struct VerifyPool {
    pool: rayon::ThreadPool,
    verifier: Arc<dyn InputVerifier>,
    committer: Arc<dyn AssetCommitter>,
}

impl VerifyPool {
    /// Creates a pool with `threads` workers, at least one.
    pub fn new(
        threads: usize,
        verifier: Arc<dyn InputVerifier>,
        committer: Arc<dyn AssetCommitter>,
    ) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|index| format!("zledger-verify-{index}"))
            .build()?;

        tracing::debug!(threads = pool.current_num_threads(), "Verification pool started");

        Ok(Self {
            pool,
            verifier,
            committer,
        })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Runs every job of the batch, returning one result per job in the same order.
    ///
    /// A failing job has no effect on the others.
    pub fn submit(&self, jobs: Vec<InputVerifyJob>) -> Vec<Result<Uint256>> {
        let verifier = self.verifier.as_ref();
        let committer = self.committer.as_ref();

        self.pool.install(|| {
            jobs.par_iter()
                .map(|job| job.run(verifier, committer))
                .collect()
        })
    }

    /// Verifies all inputs of one transaction.
    ///
    /// The batch is rejected before any verification runs if it is empty or spends the
    /// same nullifier twice. Otherwise returns the checksums in input order, or the error
    /// of the first input that failed.
    pub fn verify_inputs(&self, jobs: Vec<InputVerifyJob>) -> Result<Vec<Uint256>> {
        check_batch_sanity(&jobs)?;

        let total = jobs.len();
        let results = self.submit(jobs);

        let mut checksums = Vec::with_capacity(total);
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(checksum) => checksums.push(checksum),
                Err(err) => {
                    tracing::debug!(index, total, ?err, "Input rejected");
                    return Err(err);
                }
            }
        }

        Ok(checksums)
    }
}

fn check_batch_sanity(jobs: &[InputVerifyJob]) -> Result<()> {
    if jobs.is_empty() {
        return Err(Error::EmptyBatch);
    }

    let mut seen = HashSet::with_capacity(jobs.len());
    for (index, job) in jobs.iter().enumerate() {
        if !seen.insert(job.input.nil) {
            return Err(Error::DuplicateNullifier {
                index,
                nil: job.input.nil,
            });
        }
    }

    Ok(())
}
