//! RocksDB storage of the balance index.

use crate::types::{Account, BatchStats, IndexedOut};
use crate::{Error, Result, cf, meta_keys};
use parking_lot::RwLock;
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch,
};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use zledger_primitives::{
    BlockNumber, ChainBlock, KeyOracle, Nullifier, OutState, Root, TrackingKey, Uint256,
};

/// Length of the `owned` and `history` keys: tk || height || position || root.
const OUT_KEY_LEN: usize = TrackingKey::LEN + 8 + 4 + Uint256::LEN;

fn out_key(out: &IndexedOut) -> [u8; OUT_KEY_LEN] {
    let mut key = [0u8; OUT_KEY_LEN];
    key[..64].copy_from_slice(out.owner.as_bytes());
    key[64..72].copy_from_slice(&out.height.to_be_bytes());
    key[72..76].copy_from_slice(&out.position.to_be_bytes());
    key[76..].copy_from_slice(out.out.root.as_bytes());
    key
}

fn height_prefix(tk: &TrackingKey, height: BlockNumber) -> [u8; 72] {
    let mut key = [0u8; 72];
    key[..64].copy_from_slice(tk.as_bytes());
    key[64..].copy_from_slice(&height.to_be_bytes());
    key
}

/// Root at the end of an `owned`/`history` key.
fn root_of_key(key: &[u8], cf: &'static str) -> Result<Root> {
    key.get(76..)
        .and_then(Root::from_slice)
        .ok_or_else(|| Error::Corrupted {
            cf,
            reason: format!("key of {} bytes", key.len()),
        })
}

fn encode_spend_ref(tk: &TrackingKey, root: &Root) -> [u8; 96] {
    let mut value = [0u8; 96];
    value[..64].copy_from_slice(tk.as_bytes());
    value[64..].copy_from_slice(root.as_bytes());
    value
}

fn decode_spend_ref(value: &[u8]) -> Result<(TrackingKey, Root)> {
    let corrupted = || Error::Corrupted {
        cf: cf::NILS,
        reason: format!("spend reference of {} bytes", value.len()),
    };
    if value.len() != 96 {
        return Err(corrupted());
    }
    let tk = TrackingKey::from_slice(&value[..64]).ok_or_else(corrupted)?;
    let root = Root::from_slice(&value[64..]).ok_or_else(corrupted)?;
    Ok((tk, root))
}

/// Changes of one scan batch, staged before the atomic write.
struct StagedBatch {
    accounts: HashMap<TrackingKey, Account>,
    batch: WriteBatch,
    stats: BatchStats,
    touched: BTreeSet<TrackingKey>,
    /// Outputs created or spent within this batch, not yet in the database.
    pending_outs: HashMap<Root, IndexedOut>,
    pending_nils: HashMap<Nullifier, (TrackingKey, Root)>,
}

/// Per tracking key balance index and scan checkpoint.
///
/// Accounts are cached in memory and replaced only after the batch that changed them
/// has been written, so readers never observe a partially applied batch.
pub struct AccountsDb {
    db: DB,
    accounts: RwLock<HashMap<TrackingKey, Account>>,
    /// Next block height to scan.
    next: RwLock<BlockNumber>,
}

impl AccountsDb {
    /// Open or create the index at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_descriptors = [
            cf::ACCOUNTS,
            cf::OUTS,
            cf::OWNED,
            cf::HISTORY,
            cf::NILS,
            cf::META,
        ]
        .into_iter()
        .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
        .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        let accounts = Self::load_accounts(&db)?;
        let next = Self::load_next(&db)?;

        tracing::info!(
            "Opened balance index at {}, {} accounts, next block #{next}",
            path.display(),
            accounts.len()
        );

        Ok(Self {
            db,
            accounts: RwLock::new(accounts),
            next: RwLock::new(next),
        })
    }

    fn load_accounts(db: &DB) -> Result<HashMap<TrackingKey, Account>> {
        let cf = db.cf_handle(cf::ACCOUNTS).ok_or(Error::NotInitialized)?;

        let mut accounts = HashMap::new();
        for entry in db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = entry?;
            let tk = TrackingKey::from_slice(&key).ok_or_else(|| Error::Corrupted {
                cf: cf::ACCOUNTS,
                reason: format!("tracking key of {} bytes", key.len()),
            })?;
            accounts.insert(tk, bincode::deserialize(&value)?);
        }

        Ok(accounts)
    }

    fn load_next(db: &DB) -> Result<BlockNumber> {
        let cf = db.cf_handle(cf::META).ok_or(Error::NotInitialized)?;
        match db.get_cf(cf, meta_keys::NEXT)? {
            Some(bytes) => {
                let bytes: [u8; 8] = bytes.as_slice().try_into().map_err(|_| Error::Corrupted {
                    cf: cf::META,
                    reason: format!("checkpoint of {} bytes", bytes.len()),
                })?;
                Ok(u64::from_le_bytes(bytes))
            }
            None => Ok(1),
        }
    }

    fn cf(&self, name: &'static str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or(Error::NotInitialized)
    }

    /// Next block height the scan will read.
    pub fn next_height(&self) -> BlockNumber {
        *self.next.read()
    }

    pub fn account(&self, tk: &TrackingKey) -> Option<Account> {
        self.accounts.read().get(tk).cloned()
    }

    pub fn account_count(&self) -> usize {
        self.accounts.read().len()
    }

    /// Copy of all accounts.
    pub fn accounts_snapshot(&self) -> HashMap<TrackingKey, Account> {
        self.accounts.read().clone()
    }

    /// Registers `tk` with the chain at `head`.
    ///
    /// Returns `false` without touching the existing account if `tk` is known.
    pub fn register(&self, tk: &TrackingKey, head: BlockNumber) -> Result<bool> {
        let mut accounts = self.accounts.write();
        if accounts.contains_key(tk) {
            return Ok(false);
        }

        // Blocks below the checkpoint were scanned without this key.
        let registered_at = head.max(self.next_height().saturating_sub(1));
        let account = Account::new(registered_at);

        self.db
            .put_cf(self.cf(cf::ACCOUNTS)?, tk.as_bytes(), bincode::serialize(&account)?)?;
        accounts.insert(*tk, account);

        tracing::info!(%tk, registered_at, "Registered tracking key");

        Ok(true)
    }

    /// Any output indexed for a registered key, spent or not.
    pub fn get_out(&self, root: &Root) -> Result<Option<IndexedOut>> {
        self.db
            .get_cf(self.cf(cf::OUTS)?, root.as_bytes())?
            .map(|bytes| bincode::deserialize(&bytes))
            .transpose()
            .map_err(Into::into)
    }

    fn expect_out(&self, root: &Root) -> Result<IndexedOut> {
        self.get_out(root)?.ok_or_else(|| Error::Corrupted {
            cf: cf::OUTS,
            reason: format!("indexed output {root} is missing"),
        })
    }

    /// Unspent outputs of `tk` ordered by creation height and position in block.
    pub fn owned_outs(&self, tk: &TrackingKey) -> Result<Vec<IndexedOut>> {
        let cf_owned = self.cf(cf::OWNED)?;
        let mut iter = self.db.raw_iterator_cf(cf_owned);
        iter.seek(tk.as_bytes());

        let mut outs = Vec::new();
        while iter.valid() {
            let Some(key) = iter.key() else { break };
            if !key.starts_with(tk.as_bytes()) {
                break;
            }
            outs.push(self.expect_out(&root_of_key(key, cf::OWNED)?)?);
            iter.next();
        }
        iter.status()?;

        Ok(outs)
    }

    /// Every output received by `tk` created within `[begin, end]`, ordered by height.
    pub fn history(
        &self,
        tk: &TrackingKey,
        begin: BlockNumber,
        end: BlockNumber,
    ) -> Result<Vec<IndexedOut>> {
        if begin > end {
            return Ok(Vec::new());
        }

        let cf_history = self.cf(cf::HISTORY)?;
        let start = height_prefix(tk, begin);
        let mut records = Vec::new();

        for entry in self
            .db
            .iterator_cf(cf_history, IteratorMode::From(&start, Direction::Forward))
        {
            let (key, _) = entry?;
            if !key.starts_with(tk.as_bytes()) || key.len() != OUT_KEY_LEN {
                break;
            }
            let height =
                u64::from_be_bytes(key[64..72].try_into().expect("key has 108 bytes; qed"));
            if height > end {
                break;
            }
            records.push(self.expect_out(&root_of_key(&key, cf::HISTORY)?)?);
        }

        Ok(records)
    }

    /// Applies confirmed blocks to `accounts` and commits them with the new checkpoint
    /// in a single write.
    ///
    /// `accounts` is the snapshot the batch was planned with. Keys registered while the
    /// batch ran are not in it; their registration height is moved past the batch so the
    /// blocks they missed never count for them.
    pub fn apply_blocks<K: KeyOracle + ?Sized>(
        &self,
        accounts: HashMap<TrackingKey, Account>,
        blocks: &[ChainBlock],
        keys: &K,
        next: BlockNumber,
    ) -> Result<BatchStats> {
        let cf_accounts = self.cf(cf::ACCOUNTS)?;
        let cf_outs = self.cf(cf::OUTS)?;
        let cf_meta = self.cf(cf::META)?;

        let mut staged = StagedBatch {
            accounts,
            batch: WriteBatch::default(),
            stats: BatchStats::default(),
            touched: BTreeSet::new(),
            pending_outs: HashMap::new(),
            pending_nils: HashMap::new(),
        };

        for block in blocks {
            self.stage_block(&mut staged, block, keys)
                .map_err(|err| err.at_block(block.number))?;
        }

        let StagedBatch {
            mut accounts,
            mut batch,
            stats,
            touched,
            pending_outs,
            ..
        } = staged;

        for (root, indexed) in &pending_outs {
            batch.put_cf(cf_outs, root.as_bytes(), bincode::serialize(indexed)?);
        }

        let mut updated = Vec::with_capacity(touched.len());
        for tk in touched {
            if let Some(account) = accounts.remove(&tk) {
                batch.put_cf(cf_accounts, tk.as_bytes(), bincode::serialize(&account)?);
                updated.push((tk, account));
            }
        }

        batch.put_cf(cf_meta, meta_keys::NEXT, next.to_le_bytes());

        let last_scanned = next.saturating_sub(1);
        let mut live = self.accounts.write();

        for (tk, account) in live.iter() {
            let planned = accounts.contains_key(tk) || updated.iter().any(|(t, _)| t == tk);
            if !planned && account.registered_at < last_scanned {
                tracing::debug!(
                    %tk,
                    registered_at = account.registered_at,
                    last_scanned,
                    "Registration raced with the scan, moving start height"
                );
                let mut moved = account.clone();
                moved.registered_at = last_scanned;
                batch.put_cf(cf_accounts, tk.as_bytes(), bincode::serialize(&moved)?);
                updated.push((*tk, moved));
            }
        }

        // Atomic write
        self.db.write(batch)?;

        for (tk, account) in updated {
            live.insert(tk, account);
        }
        *self.next.write() = next;

        Ok(stats)
    }

    /// Stages the outputs and then the spends of one block.
    fn stage_block<K: KeyOracle + ?Sized>(
        &self,
        staged: &mut StagedBatch,
        block: &ChainBlock,
        keys: &K,
    ) -> Result<()> {
        let cf_owned = self.cf(cf::OWNED)?;
        let cf_history = self.cf(cf::HISTORY)?;
        let cf_nils = self.cf(cf::NILS)?;

        let height = block.number;
        staged.stats.blocks += 1;

        for (position, out) in block.outs.iter().enumerate() {
            let owner = staged.accounts.iter_mut().find(|(tk, account)| {
                height > account.registered_at && keys.is_my_pkr(tk, &out.pkr)
            });
            let Some((tk, account)) = owner else {
                continue;
            };

            credit(tk, account, out)?;

            let indexed = IndexedOut {
                out: out.clone(),
                owner: *tk,
                height,
                position: position as u32,
                nil: keys.nullifier(tk, out),
                spent_at: None,
            };

            let key = out_key(&indexed);
            staged.batch.put_cf(cf_owned, key, b"");
            staged.batch.put_cf(cf_history, key, b"");
            staged
                .batch
                .put_cf(cf_nils, indexed.nil.as_bytes(), encode_spend_ref(tk, &out.root));

            staged.touched.insert(*tk);
            staged.pending_nils.insert(indexed.nil, (*tk, out.root));
            staged.pending_outs.insert(out.root, indexed);
            staged.stats.received += 1;
        }

        for nil in &block.nils {
            let spend_ref = match staged.pending_nils.remove(nil) {
                Some(spend_ref) => Some(spend_ref),
                None => self
                    .db
                    .get_cf(cf_nils, nil.as_bytes())?
                    .map(|value| decode_spend_ref(&value))
                    .transpose()?,
            };
            let Some((tk, root)) = spend_ref else {
                continue;
            };

            let mut indexed = match staged.pending_outs.remove(&root) {
                Some(indexed) => indexed,
                None => self.expect_out(&root)?,
            };
            if indexed.is_spent() {
                tracing::warn!(%nil, %root, height, "Nullifier revealed twice, ignored");
                staged.pending_outs.insert(root, indexed);
                continue;
            }

            let account = staged.accounts.get_mut(&tk).ok_or_else(|| Error::Corrupted {
                cf: cf::NILS,
                reason: format!("spent output {root} belongs to unknown key {tk}"),
            })?;
            debit(&tk, account, &indexed)?;

            staged.batch.delete_cf(cf_owned, out_key(&indexed));
            staged.batch.delete_cf(cf_nils, nil.as_bytes());

            indexed.spent_at = Some(height);
            staged.pending_outs.insert(root, indexed);
            staged.touched.insert(tk);
            staged.stats.spent += 1;
        }

        Ok(())
    }
}

fn credit(tk: &TrackingKey, account: &mut Account, out: &OutState) -> Result<()> {
    if let Some(token) = out.asset.tkn {
        let balance = account.token.entry(token.currency).or_default();
        *balance = balance
            .checked_add(token.value)
            .ok_or(Error::BalanceOverflow {
                tk: *tk,
                currency: token.currency,
            })?;
    }
    if let Some(ticket) = out.asset.tkt {
        account
            .ticket
            .entry(ticket.category)
            .or_default()
            .push(out.root);
    }
    Ok(())
}

fn debit(tk: &TrackingKey, account: &mut Account, indexed: &IndexedOut) -> Result<()> {
    if let Some(token) = indexed.out.asset.tkn {
        let balance = account.token.get(&token.currency).copied().unwrap_or_default();
        let remaining = balance.checked_sub(token.value).ok_or_else(|| {
            tracing::error!(
                %tk,
                currency = %token.currency,
                balance,
                spent = token.value,
                "Balance underflow"
            );
            Error::BalanceUnderflow {
                tk: *tk,
                currency: token.currency,
                balance,
                spent: token.value,
            }
        })?;
        if remaining == 0 {
            account.token.remove(&token.currency);
        } else {
            account.token.insert(token.currency, remaining);
        }
    }
    if let Some(ticket) = indexed.out.asset.tkt {
        if let Some(roots) = account.ticket.get_mut(&ticket.category) {
            roots.retain(|root| root != indexed.root());
            if roots.is_empty() {
                account.ticket.remove(&ticket.category);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use zledger_primitives::Category;
    use zledger_test_utils::{MockKeys, root, ticket_out, token_out, tracking_key};

    fn open() -> (tempfile::TempDir, AccountsDb) {
        let temp_dir = tempfile::tempdir().unwrap();
        let db = AccountsDb::open(temp_dir.path()).unwrap();
        (temp_dir, db)
    }

    #[test]
    fn test_register_twice_keeps_account() {
        let (_dir, db) = open();
        let tk = tracking_key(1);

        assert!(db.register(&tk, 100).unwrap());
        let block = ChainBlock {
            number: 101,
            outs: vec![token_out(&tk, root(1), "SERO", 50)],
            nils: vec![],
        };
        db.apply_blocks(db.accounts_snapshot(), &[block], &MockKeys, 102)
            .unwrap();

        assert!(!db.register(&tk, 200).unwrap());
        let account = db.account(&tk).unwrap();
        assert_eq!(account.registered_at, 100);
        assert_eq!(account.token_balance("SERO"), 50);
    }

    #[test]
    fn test_state_survives_reopen() {
        let temp_dir = tempfile::tempdir().unwrap();
        let tk = tracking_key(2);

        {
            let db = AccountsDb::open(temp_dir.path()).unwrap();
            assert_eq!(db.next_height(), 1);
            db.register(&tk, 10).unwrap();
            let block = ChainBlock {
                number: 11,
                outs: vec![token_out(&tk, root(1), "SERO", 7)],
                nils: vec![],
            };
            db.apply_blocks(db.accounts_snapshot(), &[block], &MockKeys, 12)
                .unwrap();
        }

        let db = AccountsDb::open(temp_dir.path()).unwrap();
        assert_eq!(db.next_height(), 12);
        assert_eq!(db.account(&tk).unwrap().token_balance("SERO"), 7);
        assert_eq!(db.owned_outs(&tk).unwrap().len(), 1);
    }

    #[test]
    fn test_output_created_and_spent_in_one_batch() {
        let (_dir, db) = open();
        let tk = tracking_key(3);
        db.register(&tk, 0).unwrap();

        let out = token_out(&tk, root(1), "SERO", 30);
        let nil = MockKeys.nullifier(&tk, &out);
        let blocks = vec![
            ChainBlock {
                number: 1,
                outs: vec![out, token_out(&tk, root(2), "SERO", 5)],
                nils: vec![],
            },
            ChainBlock {
                number: 2,
                outs: vec![],
                nils: vec![nil],
            },
        ];

        let stats = db
            .apply_blocks(db.accounts_snapshot(), &blocks, &MockKeys, 3)
            .unwrap();
        assert_eq!(stats.received, 2);
        assert_eq!(stats.spent, 1);

        assert_eq!(db.account(&tk).unwrap().token_balance("SERO"), 5);
        let owned = db.owned_outs(&tk).unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].out.root, root(2));

        let spent = db.get_out(&root(1)).unwrap().unwrap();
        assert_eq!(spent.spent_at, Some(2));
        assert_eq!(db.history(&tk, 1, 2).unwrap().len(), 2);
    }

    #[test]
    fn test_late_registration_moves_start_height() {
        let (_dir, db) = open();
        let early = tracking_key(4);
        let late = tracking_key(5);
        db.register(&early, 0).unwrap();

        let snapshot = db.accounts_snapshot();
        db.register(&late, 2).unwrap();

        let blocks = (1..=5)
            .map(|number| ChainBlock {
                number,
                outs: vec![token_out(&late, root(number), "SERO", 1)],
                nils: vec![],
            })
            .collect::<Vec<_>>();
        db.apply_blocks(snapshot, &blocks, &MockKeys, 6).unwrap();

        let account = db.account(&late).unwrap();
        assert_eq!(account.registered_at, 5);
        assert!(account.token.is_empty());
    }

    #[test]
    fn test_history_respects_height_bounds() {
        let (_dir, db) = open();
        let tk = tracking_key(6);
        let other = tracking_key(7);
        db.register(&tk, 0).unwrap();
        db.register(&other, 0).unwrap();

        let blocks = (1..=6)
            .map(|number| ChainBlock {
                number,
                outs: vec![
                    token_out(&tk, root(number), "SERO", number as u128),
                    token_out(&other, root(100 + number), "SERO", 1),
                ],
                nils: vec![],
            })
            .collect::<Vec<_>>();
        db.apply_blocks(db.accounts_snapshot(), &blocks, &MockKeys, 7)
            .unwrap();

        let heights = db
            .history(&tk, 2, 4)
            .unwrap()
            .iter()
            .map(|out| out.height)
            .collect::<Vec<_>>();
        assert_eq!(heights, vec![2, 3, 4]);
        assert!(db.history(&tk, 5, 4).unwrap().is_empty());
        assert!(db.history(&tk, 7, 100).unwrap().is_empty());
    }

    #[test]
    fn test_ticket_index_follows_spends() {
        let (_dir, db) = open();
        let tk = tracking_key(8);
        db.register(&tk, 0).unwrap();

        let vote = Category::from_symbol("VOTE");
        let pass = Category::from_symbol("PASS");
        let outs = vec![
            ticket_out(&tk, root(1), "VOTE"),
            ticket_out(&tk, root(2), "VOTE"),
            ticket_out(&tk, root(3), "PASS"),
        ];
        let nils = vec![
            MockKeys.nullifier(&tk, &outs[0]),
            MockKeys.nullifier(&tk, &outs[2]),
        ];

        let block = ChainBlock {
            number: 1,
            outs,
            nils: vec![],
        };
        db.apply_blocks(db.accounts_snapshot(), &[block], &MockKeys, 2)
            .unwrap();

        let account = db.account(&tk).unwrap();
        assert_eq!(account.ticket[&vote], vec![root(1), root(2)]);
        assert_eq!(account.ticket[&pass], vec![root(3)]);
        assert!(account.token.is_empty());

        let block = ChainBlock {
            number: 2,
            outs: vec![],
            nils,
        };
        let stats = db
            .apply_blocks(db.accounts_snapshot(), &[block], &MockKeys, 3)
            .unwrap();
        assert_eq!(stats.spent, 2);

        let account = db.account(&tk).unwrap();
        assert_eq!(account.ticket[&vote], vec![root(2)]);
        // Emptied categories are dropped.
        assert!(!account.ticket.contains_key(&pass));
        let owned = db.owned_outs(&tk).unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].out.root, root(2));
    }

    #[test]
    fn test_nullifier_revealed_twice_is_ignored() {
        let (_dir, db) = open();
        let tk = tracking_key(9);
        db.register(&tk, 0).unwrap();

        let first = token_out(&tk, root(1), "SERO", 10);
        let first_nil = MockKeys.nullifier(&tk, &first);
        let block = ChainBlock {
            number: 1,
            outs: vec![first, token_out(&tk, root(2), "SERO", 4)],
            nils: vec![],
        };
        db.apply_blocks(db.accounts_snapshot(), &[block], &MockKeys, 2)
            .unwrap();

        // Twice within one block.
        let block = ChainBlock {
            number: 2,
            outs: vec![],
            nils: vec![first_nil, first_nil],
        };
        let stats = db
            .apply_blocks(db.accounts_snapshot(), &[block], &MockKeys, 3)
            .unwrap();
        assert_eq!(stats.spent, 1);
        assert_eq!(db.account(&tk).unwrap().token_balance("SERO"), 4);
        assert_eq!(db.get_out(&root(1)).unwrap().unwrap().spent_at, Some(2));

        // Again in a later batch.
        let block = ChainBlock {
            number: 3,
            outs: vec![],
            nils: vec![first_nil],
        };
        let stats = db
            .apply_blocks(db.accounts_snapshot(), &[block], &MockKeys, 4)
            .unwrap();
        assert_eq!(stats.spent, 0);
        assert_eq!(db.account(&tk).unwrap().token_balance("SERO"), 4);
        assert_eq!(db.get_out(&root(1)).unwrap().unwrap().spent_at, Some(2));

        // Created and then spent twice within one batch.
        let fresh = token_out(&tk, root(5), "SERO", 7);
        let fresh_nil = MockKeys.nullifier(&tk, &fresh);
        let blocks = vec![
            ChainBlock {
                number: 4,
                outs: vec![fresh],
                nils: vec![],
            },
            ChainBlock {
                number: 5,
                outs: vec![],
                nils: vec![fresh_nil],
            },
            ChainBlock {
                number: 6,
                outs: vec![],
                nils: vec![fresh_nil],
            },
        ];
        let stats = db
            .apply_blocks(db.accounts_snapshot(), &blocks, &MockKeys, 7)
            .unwrap();
        assert_eq!(stats.received, 1);
        assert_eq!(stats.spent, 1);
        assert_eq!(db.account(&tk).unwrap().token_balance("SERO"), 4);
        assert_eq!(db.get_out(&root(5)).unwrap().unwrap().spent_at, Some(5));
    }

    #[test]
    fn test_failed_block_is_named_and_nothing_committed() {
        let (_dir, db) = open();
        let tk = tracking_key(10);
        db.register(&tk, 0).unwrap();

        let blocks = vec![
            ChainBlock {
                number: 3,
                outs: vec![token_out(&tk, root(3), "SERO", u128::MAX)],
                nils: vec![],
            },
            ChainBlock {
                number: 4,
                outs: vec![token_out(&tk, root(4), "SERO", 1)],
                nils: vec![],
            },
        ];
        let err = db
            .apply_blocks(db.accounts_snapshot(), &blocks, &MockKeys, 5)
            .unwrap_err();
        assert_eq!(err.height(), Some(4));
        assert!(err.is_fatal());
        assert_eq!(db.next_height(), 1);
        assert!(db.account(&tk).unwrap().token.is_empty());
        assert!(db.get_out(&root(3)).unwrap().is_none());
    }
}
