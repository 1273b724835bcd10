//! Test doubles for the zledger collaborators.
//!
//! None of these are cryptographically meaningful: ownership is a byte prefix match
//! and signatures are plain SHA-256 digests. They exist so the ledger core can be
//! exercised end to end without the real proof system.

use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use zledger_primitives::{
    Asset, AssetCommitter, AssetDesc, BlockNumber, Category, ChainBlock, ChainError, ChainSource,
    Currency, InputVerifier, KeyOracle, Nullifier, OutState, PKr, Root, Signature, TrackingKey, Uint256,
    VerifierError, VerifyInputDesc,
};

fn sha256(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Tracking key with every byte set to `seed`.
pub fn tracking_key(seed: u8) -> TrackingKey {
    TrackingKey([seed; 64])
}

/// Root derived from a counter.
pub fn root(n: u64) -> Root {
    let mut bytes = [0u8; 32];
    bytes[..8].copy_from_slice(&n.to_be_bytes());
    bytes[31] = 0xaa;
    Uint256(bytes)
}

/// One-time key owned by `tk` according to [`MockKeys`].
pub fn pkr_for(tk: &TrackingKey, salt: u64) -> PKr {
    let mut bytes = [0u8; 96];
    bytes[..64].copy_from_slice(&tk.0);
    bytes[64..72].copy_from_slice(&salt.to_be_bytes());
    PKr(bytes)
}

/// Token output of `value` units of `symbol` paid to `tk`.
pub fn token_out(tk: &TrackingKey, root: Root, symbol: &str, value: u128) -> OutState {
    OutState {
        root,
        pkr: pkr_for(tk, u64::from_be_bytes(root.0[..8].try_into().expect("8 bytes; qed"))),
        asset: Asset::token(Currency::from_symbol(symbol), value),
    }
}

/// Ticket of `category` paid to `tk`, valued by its own root.
pub fn ticket_out(tk: &TrackingKey, root: Root, category: &str) -> OutState {
    OutState {
        root,
        pkr: pkr_for(tk, u64::from_be_bytes(root.0[..8].try_into().expect("8 bytes; qed"))),
        asset: Asset::ticket(Category::from_symbol(category), root),
    }
}

#[derive(Default)]
struct ChainInner {
    head: BlockNumber,
    blocks: BTreeMap<BlockNumber, ChainBlock>,
    outs: HashMap<Root, OutState>,
    fail_at: Option<BlockNumber>,
    panic_once_at: Option<BlockNumber>,
}

/// In-memory chain with fault injection.
///
/// Heights up to the head without an explicit block are empty blocks.
#[derive(Default)]
pub struct MockChain {
    inner: RwLock<ChainInner>,
    block_reads: AtomicUsize,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_head(head: BlockNumber) -> Self {
        let chain = Self::default();
        chain.set_head(head);
        chain
    }

    pub fn set_head(&self, head: BlockNumber) {
        self.inner.write().head = head;
    }

    /// Adds a block, moving the head up to it if needed.
    pub fn push_block(&self, block: ChainBlock) {
        let mut inner = self.inner.write();
        inner.head = inner.head.max(block.number);
        for out in &block.outs {
            inner.outs.insert(out.root, out.clone());
        }
        inner.blocks.insert(block.number, block);
    }

    /// Makes every read of block `number` fail until cleared with `None`.
    pub fn fail_at(&self, number: Option<BlockNumber>) {
        self.inner.write().fail_at = number;
    }

    /// Panics on the next read of block `number`.
    pub fn panic_once_at(&self, number: BlockNumber) {
        self.inner.write().panic_once_at = Some(number);
    }

    /// Number of `block()` calls served so far.
    pub fn block_reads(&self) -> usize {
        self.block_reads.load(Ordering::SeqCst)
    }
}

impl ChainSource for MockChain {
    fn best_number(&self) -> BlockNumber {
        self.inner.read().head
    }

    fn block(&self, number: BlockNumber) -> Result<Option<ChainBlock>, ChainError> {
        self.block_reads.fetch_add(1, Ordering::SeqCst);

        let should_panic = {
            let mut inner = self.inner.write();
            if inner.panic_once_at == Some(number) {
                inner.panic_once_at = None;
                true
            } else {
                false
            }
        };
        if should_panic {
            panic!("injected panic at block #{number}");
        }

        let inner = self.inner.read();
        if inner.fail_at == Some(number) {
            return Err(ChainError::Backend(format!(
                "injected fault at block #{number}"
            )));
        }
        if number > inner.head {
            return Ok(None);
        }
        Ok(Some(inner.blocks.get(&number).cloned().unwrap_or(ChainBlock {
            number,
            ..Default::default()
        })))
    }

    fn out_state(&self, root: &Root) -> Result<Option<OutState>, ChainError> {
        Ok(self.inner.read().outs.get(root).cloned())
    }
}

/// Ownership by prefix: a `PKr` belongs to `tk` if it starts with the key bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockKeys;

impl KeyOracle for MockKeys {
    fn is_my_pkr(&self, tk: &TrackingKey, pkr: &PKr) -> bool {
        pkr.0[..64] == tk.0
    }

    fn nullifier(&self, tk: &TrackingKey, out: &OutState) -> Nullifier {
        Uint256(sha256(&[b"nil", &tk.0, &out.root.0]))
    }
}

/// Accepts inputs whose signature was produced by [`MockVerifier::sign`].
///
/// Also records how many verifications ran at the same time.
#[derive(Default)]
pub struct MockVerifier {
    max_delay: Option<Duration>,
    active: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl MockVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Each verification sleeps for a random time up to `max_delay`.
    pub fn with_jitter(max_delay: Duration) -> Self {
        Self {
            max_delay: Some(max_delay),
            ..Default::default()
        }
    }

    /// Signature accepted for the given input.
    pub fn sign(ehash: &Uint256, nil: &Nullifier, root: &Root, pkr: &PKr) -> Signature {
        let first = sha256(&[&ehash.0, &nil.0, &root.0, &pkr.0]);
        let second = sha256(&[&first]);
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&first);
        bytes[32..].copy_from_slice(&second);
        Signature(bytes)
    }

    /// Highest number of concurrent `verify_input` calls observed.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl InputVerifier for MockVerifier {
    fn verify_input(&self, desc: &VerifyInputDesc) -> Result<(), VerifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);

        if let Some(max_delay) = self.max_delay {
            let millis = fastrand::u64(0..=max_delay.as_millis() as u64);
            std::thread::sleep(Duration::from_millis(millis));
        }

        let expected = Self::sign(&desc.ehash, &desc.nil, &desc.root_cm, &desc.pkr);
        self.active.fetch_sub(1, Ordering::SeqCst);

        if desc.sign == expected {
            Ok(())
        } else {
            Err(VerifierError("signature mismatch".into()))
        }
    }
}

/// Commitment as a SHA-256 digest over the flat asset descriptor.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Committer;

impl AssetCommitter for Sha256Committer {
    fn asset_cc(&self, desc: &AssetDesc) -> Uint256 {
        Uint256(sha256(&[
            &desc.tkn_currency.0,
            &desc.tkn_value.0,
            &desc.tkt_category.0,
            &desc.tkt_value.0,
        ]))
    }
}
