mod account_entry;
mod dump;

pub use self::account_entry::AccountEntry;

use crate::{
    error::{Error, ErrorKind, Result},
    executive::{Executed, Executive},
    genesis,
    ledger::Ledger,
    parameters::{BLOCK_REWARD, GENESIS_DIFFICULTY},
    pow::{self, MineInfo, ProofOfWorkProblem},
    statedb::StateDb,
    storage::{ChangeSet, MerkleHash, SharedTrieStorage},
    transaction_pool::TransactionPool,
    verification::VerificationConfig,
    vm::EnvInfo,
    vm_factory::VmFactory,
};
use bytes::Bytes;
use ethereum_types::{Address, H256, U256, U512};
use hash::{keccak, KECCAK_EMPTY, KECCAK_NULL_RLP};
use primitives::{Account, Block, BlockHeader, BlockHeaderBuilder, Transaction};
use rlp::RlpStream;
use std::{
    cell::RefCell,
    cmp,
    collections::{HashMap, HashSet},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// Which stage of block playback the state is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackPhase {
    Idle,
    Replaying,
    Finalized,
    Failed,
}

/// The world state on top of a committed trie root: a cache of touched
/// accounts, the transactions pending for the next block, and the frozen
/// candidate once mining has started.
///
/// All block-building mutations live in the cache until `commit` folds them
/// into a fresh trie version; reads fall through the cache to the store.
#[derive(Clone)]
pub struct State {
    storage: SharedTrieStorage,
    root: MerkleHash,
    cache: RefCell<HashMap<Address, AccountEntry>>,
    checkpoints: Vec<HashMap<Address, AccountEntry>>,
    pending_transactions: Vec<Transaction>,
    pending_hashes: HashSet<H256>,
    previous_header: BlockHeader,
    current_header: BlockHeader,
    /// RLP list of the candidate's transactions. Non-empty exactly when a
    /// candidate is frozen; that is the latch making `commit_to_mine`
    /// idempotent.
    current_txs: Bytes,
    /// RLP list of the candidate's uncle headers.
    current_uncles: Bytes,
    /// Full RLP of the sealed block after a successful `mine`.
    current_bytes: Bytes,
    coinbase: Address,
    block_reward: U256,
    phase: PlaybackPhase,
    verification: VerificationConfig,
    vm_factory: VmFactory,
}

impl State {
    /// Open the world state at genesis, materializing the genesis
    /// allocation if this store has never seen it.
    pub fn new(
        storage: SharedTrieStorage, coinbase: Address,
    ) -> Result<State> {
        let genesis =
            genesis::genesis_block(&storage, U256::from(GENESIS_DIFFICULTY))?;
        Ok(State::open(storage, genesis.block_header, coinbase))
    }

    /// Open the state pinned to an already-committed header.
    pub fn open(
        storage: SharedTrieStorage, previous_header: BlockHeader,
        coinbase: Address,
    ) -> State
    {
        let mut state = State {
            root: *previous_header.state_root(),
            storage,
            cache: RefCell::new(HashMap::new()),
            checkpoints: Vec::new(),
            pending_transactions: Vec::new(),
            pending_hashes: HashSet::new(),
            previous_header,
            current_header: BlockHeader::default(),
            current_txs: Bytes::new(),
            current_uncles: Bytes::new(),
            current_bytes: Bytes::new(),
            coinbase,
            block_reward: U256::from(BLOCK_REWARD),
            phase: PlaybackPhase::Idle,
            verification: VerificationConfig::new(false),
            vm_factory: VmFactory::new(),
        };
        state.reset_current();
        state
    }

    pub fn with_verification(
        mut self, verification: VerificationConfig,
    ) -> Self {
        self.verification = verification;
        self
    }

    pub fn with_vm_factory(mut self, vm_factory: VmFactory) -> Self {
        self.vm_factory = vm_factory;
        self
    }

    pub fn root_hash(&self) -> MerkleHash { self.root }

    pub fn phase(&self) -> PlaybackPhase { self.phase }

    pub fn previous_header(&self) -> &BlockHeader { &self.previous_header }

    pub fn current_header(&self) -> &BlockHeader { &self.current_header }

    pub fn coinbase(&self) -> &Address { &self.coinbase }

    /// Change the author credited by future candidates. Abandons the
    /// pending block.
    pub fn set_coinbase(&mut self, coinbase: Address) {
        self.coinbase = coinbase;
        self.reset_current();
    }

    pub fn pending(&self) -> &[Transaction] { &self.pending_transactions }

    pub(crate) fn transaction_is_pending(&self, hash: &H256) -> bool {
        self.pending_hashes.contains(hash)
    }

    pub(crate) fn append_pending(&mut self, transaction: Transaction) {
        self.pending_hashes.insert(transaction.hash());
        self.pending_transactions.push(transaction);
    }

    /// Load `address` into the cache. With `require_code` the code blob is
    /// pulled in as well; with `force_create` a missing account
    /// materializes as a dead placeholder. Returns whether the account
    /// exists.
    fn ensure_cached(
        &self, address: &Address, require_code: bool, force_create: bool,
    ) -> Result<bool>
    {
        let needs_fill = {
            let cache = self.cache.borrow();
            match cache.get(address) {
                Some(entry) => {
                    if !require_code || entry.code_is_loaded() {
                        return Ok(entry.alive);
                    }
                    false
                }
                None => true,
            }
        };

        let db = StateDb::new(&*self.storage, self.root);
        if needs_fill {
            let loaded = match db.get_account(address)? {
                Some(account) => Some(AccountEntry::from_account(account)),
                None if force_create => Some(AccountEntry::new_dead()),
                None => None,
            };
            match loaded {
                Some(entry) => {
                    self.cache.borrow_mut().insert(*address, entry);
                }
                None => return Ok(false),
            }
        }

        let mut cache = self.cache.borrow_mut();
        match cache.get_mut(address) {
            Some(entry) => {
                if require_code && entry.alive && !entry.code_is_loaded() {
                    entry.code =
                        Some(db.get_code(address, &entry.code_hash)?);
                }
                Ok(entry.alive)
            }
            None => Ok(false),
        }
    }

    /// Run `f` on the forcibly materialized cache entry for `address`.
    fn with_entry<F, T>(&mut self, address: &Address, f: F) -> Result<T>
    where F: FnOnce(&mut AccountEntry) -> Result<T> {
        self.ensure_cached(address, false, true)?;
        let mut cache = self.cache.borrow_mut();
        let entry =
            cache.entry(*address).or_insert_with(AccountEntry::new_dead);
        f(entry)
    }

    /// Balance of `address`, zero when the account does not exist.
    pub fn balance(&self, address: &Address) -> Result<U256> {
        self.ensure_cached(address, false, false)?;
        Ok(self
            .cache
            .borrow()
            .get(address)
            .map_or_else(U256::zero, |entry| entry.balance))
    }

    /// Number of transactions ever sent from `address`.
    pub fn transactions_from(&self, address: &Address) -> Result<U256> {
        self.ensure_cached(address, false, false)?;
        Ok(self
            .cache
            .borrow()
            .get(address)
            .map_or_else(U256::zero, |entry| entry.nonce))
    }

    pub fn address_in_use(&self, address: &Address) -> Result<bool> {
        self.ensure_cached(address, false, false)
    }

    pub fn address_has_code(&self, address: &Address) -> Result<bool> {
        self.ensure_cached(address, false, false)?;
        Ok(self.cache.borrow().get(address).map_or(false, |entry| {
            entry.alive
                && (entry.code_fresh || entry.code_hash != KECCAK_EMPTY)
        }))
    }

    /// Code deployed at `address`, empty when there is none.
    pub fn code(&self, address: &Address) -> Result<Bytes> {
        self.ensure_cached(address, true, false)?;
        Ok(self
            .cache
            .borrow()
            .get(address)
            .and_then(|entry| entry.code.clone())
            .unwrap_or_default())
    }

    pub fn add_balance(&mut self, address: &Address, by: &U256) -> Result<()> {
        self.with_entry(address, |entry| {
            entry.balance = entry
                .balance
                .checked_add(*by)
                .ok_or_else(|| Error::from(ErrorKind::ArithmeticOverflow))?;
            entry.alive = true;
            Ok(())
        })
    }

    /// Atomic: when the balance does not cover `by` nothing changes.
    pub fn sub_balance(&mut self, address: &Address, by: &U256) -> Result<()> {
        if by.is_zero() {
            return Ok(());
        }
        self.ensure_cached(address, false, false)?;
        let mut cache = self.cache.borrow_mut();
        let entry = match cache.get_mut(address) {
            Some(entry) if entry.alive => entry,
            _ => {
                bail!(ErrorKind::InsufficientBalance(
                    *address,
                    U512::from(*by),
                    U256::zero(),
                ));
            }
        };
        entry.balance = entry.balance.checked_sub(*by).ok_or_else(|| {
            Error::from(ErrorKind::InsufficientBalance(
                *address,
                U512::from(*by),
                entry.balance,
            ))
        })?;
        Ok(())
    }

    /// Advance the sender's transaction count.
    pub fn note_sending(&mut self, address: &Address) -> Result<()> {
        self.with_entry(address, |entry| {
            entry.nonce = entry.nonce.saturating_add(U256::one());
            entry.alive = true;
            Ok(())
        })
    }

    /// One storage word, zero when unset.
    pub fn storage_at(&self, address: &Address, key: &H256) -> Result<U256> {
        self.ensure_cached(address, false, false)?;
        let storage_root = {
            let cache = self.cache.borrow();
            let entry = match cache.get(address) {
                Some(entry) => entry,
                None => return Ok(U256::zero()),
            };
            if let Some(value) = entry.storage.get(key) {
                return Ok(*value);
            }
            if !entry.alive {
                return Ok(U256::zero());
            }
            entry.storage_root
        };
        if storage_root == KECCAK_NULL_RLP {
            return Ok(U256::zero());
        }
        let db = StateDb::new(&*self.storage, storage_root);
        Ok(db.get::<U256>(key.as_bytes())?.unwrap_or_default())
    }

    /// Write a storage word. The write is always recorded; zero is the
    /// deletion marker applied at commit.
    pub fn set_storage(
        &mut self, address: &Address, key: H256, value: U256,
    ) -> Result<()> {
        self.with_entry(address, |entry| {
            entry.storage.insert(key, value);
            entry.alive = true;
            Ok(())
        })
    }

    pub fn set_code(&mut self, address: &Address, code: Bytes) -> Result<()> {
        self.with_entry(address, |entry| {
            entry.set_code(code);
            Ok(())
        })
    }

    /// The full storage of an account, committed words overlaid with dirty
    /// ones. Walks the whole storage trie; inspection grade.
    pub fn storage_map(
        &self, address: &Address,
    ) -> Result<HashMap<H256, U256>> {
        self.ensure_cached(address, false, false)?;
        let cache = self.cache.borrow();
        let entry = match cache.get(address) {
            Some(entry) if entry.alive => entry,
            _ => return Ok(HashMap::new()),
        };
        let mut map = HashMap::new();
        if entry.storage_root != KECCAK_NULL_RLP {
            for (key, value) in self.storage.entries_at(&entry.storage_root)? {
                if key.len() != 32 {
                    continue;
                }
                map.insert(H256::from_slice(&key), ::rlp::decode(&value)?);
            }
        }
        for (key, value) in &entry.storage {
            if value.is_zero() {
                map.remove(key);
            } else {
                map.insert(*key, *value);
            }
        }
        Ok(map)
    }

    /// Zero the account and mark it dead; it drops out of the trie at the
    /// next commit.
    pub fn kill_account(&mut self, address: &Address) -> Result<()> {
        self.with_entry(address, |entry| {
            entry.kill();
            Ok(())
        })
    }

    /// Balances of every account, committed and cached. Inspection grade.
    pub fn accounts(&self) -> Result<HashMap<Address, U256>> {
        let mut all = HashMap::new();
        for (key, value) in self.storage.entries_at(&self.root)? {
            if key.len() != 20 {
                continue;
            }
            let account: Account = ::rlp::decode(&value)?;
            all.insert(Address::from_slice(&key), account.balance);
        }
        for (address, entry) in self.cache.borrow().iter() {
            if entry.alive {
                all.insert(*address, entry.balance);
            } else {
                all.remove(address);
            }
        }
        Ok(all)
    }

    /// Snapshot the cache. Checkpoints nest.
    pub fn checkpoint(&mut self) {
        let snapshot = self.cache.borrow().clone();
        self.checkpoints.push(snapshot);
    }

    pub fn discard_checkpoint(&mut self) { self.checkpoints.pop(); }

    /// Restore the cache to the most recent checkpoint.
    pub fn revert_to_checkpoint(&mut self) {
        if let Some(snapshot) = self.checkpoints.pop() {
            self.cache.replace(snapshot);
        }
    }

    /// Fold the cache into account-trie change sets. With `persist` the
    /// storage sub-tries and fresh code blobs are written through; without
    /// it the fold is pure and only the would-be root comes back.
    fn fold_cache(&self, persist: bool) -> Result<MerkleHash> {
        let cache = self.cache.borrow();
        let mut changes = ChangeSet::new();
        for (address, entry) in cache.iter() {
            if !entry.alive {
                changes.insert(address.as_bytes().to_vec(), None);
                continue;
            }

            let storage_root = if entry.storage.is_empty() {
                entry.storage_root
            } else {
                let mut slots = ChangeSet::new();
                for (key, value) in &entry.storage {
                    let slot_value = if value.is_zero() {
                        None
                    } else {
                        Some(::rlp::encode(value).to_vec())
                    };
                    slots.insert(key.as_bytes().to_vec(), slot_value);
                }
                if persist {
                    self.storage.apply(&entry.storage_root, &slots)?
                } else {
                    self.storage.derive(&entry.storage_root, &slots)?
                }
            };

            let code_hash = if entry.code_fresh {
                let code = entry.code.clone().unwrap_or_default();
                if persist {
                    self.storage.insert_code(code)
                } else {
                    keccak(&code)
                }
            } else {
                entry.code_hash
            };

            let account = Account {
                balance: entry.balance,
                nonce: entry.nonce,
                storage_root,
                code_hash,
            };
            changes.insert(
                address.as_bytes().to_vec(),
                Some(::rlp::encode(&account).to_vec()),
            );
        }
        if persist {
            Ok(self.storage.apply(&self.root, &changes)?)
        } else {
            Ok(self.storage.derive(&self.root, &changes)?)
        }
    }

    /// The root the cache would commit to, computed without touching the
    /// store.
    fn compute_state_root(&self) -> Result<MerkleHash> {
        self.fold_cache(false)
    }

    /// Persist the cache into a new trie version and clear it.
    fn commit(&mut self) -> Result<MerkleHash> {
        let root = self.fold_cache(true)?;
        trace!("commit: {:?} -> {:?}", self.root, root);
        self.root = root;
        self.cache.borrow_mut().clear();
        self.checkpoints.clear();
        Ok(root)
    }

    /// Credit the block's author and the given uncle authors.
    pub fn apply_rewards(&mut self, uncle_authors: &[Address]) -> Result<()> {
        let reward = self.block_reward;
        let uncle_reward = reward * U256::from(3) / U256::from(4);
        let author_bonus = reward / U256::from(8);
        let mut author_reward = reward;
        for uncle_author in uncle_authors {
            self.add_balance(uncle_author, &uncle_reward)?;
            author_reward = author_reward + author_bonus;
        }
        let author = *self.current_header.author();
        self.add_balance(&author, &author_reward)
    }

    /// Exact inverse of `apply_rewards`.
    pub fn unapply_rewards(
        &mut self, uncle_authors: &[Address],
    ) -> Result<()> {
        let reward = self.block_reward;
        let uncle_reward = reward * U256::from(3) / U256::from(4);
        let author_bonus = reward / U256::from(8);
        let mut author_reward = reward;
        for uncle_author in uncle_authors {
            self.sub_balance(uncle_author, &uncle_reward)?;
            author_reward = author_reward + author_bonus;
        }
        let author = *self.current_header.author();
        self.sub_balance(&author, &author_reward)
    }

    fn mining_env(&self) -> EnvInfo {
        EnvInfo {
            number: self.current_header.number(),
            author: *self.current_header.author(),
            timestamp: self.current_header.timestamp(),
            difficulty: *self.current_header.difficulty(),
        }
    }

    /// Decode and execute one raw transaction against the pending block.
    pub fn execute(&mut self, raw: &[u8]) -> Result<Executed> {
        let transaction: Transaction = ::rlp::decode(raw)?;
        self.execute_transaction(&transaction)
    }

    pub fn execute_transaction(
        &mut self, transaction: &Transaction,
    ) -> Result<Executed> {
        let env = self.mining_env();
        let vm_factory = self.vm_factory.clone();
        Executive::new(self, &env, &vm_factory).transact(transaction)
    }

    /// Replay a complete block on top of `parent`. Returns the total
    /// difficulty the block contributes, its own plus its uncles'. The
    /// pending block is abandoned first. With `full_commit` the result is
    /// persisted and this state moves onto the new head; without it the
    /// store is left exactly as found.
    pub fn playback(
        &mut self, block_bytes: &[u8], header: &BlockHeader,
        parent: &BlockHeader, grandparent: Option<&BlockHeader>,
        full_commit: bool,
    ) -> Result<U256>
    {
        // Replay starts from the parent state, never from speculated
        // cache entries or a frozen candidate's committed root.
        self.previous_header = parent.clone();
        self.root = *parent.state_root();
        self.reset_current();
        self.phase = PlaybackPhase::Replaying;
        let outcome =
            self.playback_inner(block_bytes, header, grandparent, full_commit);
        self.phase = match outcome {
            Ok(_) => PlaybackPhase::Finalized,
            Err(_) => PlaybackPhase::Failed,
        };
        outcome
    }

    fn playback_inner(
        &mut self, block_bytes: &[u8], header: &BlockHeader,
        grandparent: Option<&BlockHeader>, full_commit: bool,
    ) -> Result<U256>
    {
        self.verification
            .verify_header_extends(header, &self.previous_header)?;
        self.verification.verify_pow(header)?;

        let block: Block = ::rlp::decode(block_bytes)?;
        if block.block_header != *header {
            bail!(ErrorKind::HeaderInconsistency(
                "block body carries a different header".into(),
            ));
        }
        self.verification.verify_block_integrity(&block)?;

        self.current_header = header.clone();
        let env = EnvInfo {
            number: header.number(),
            author: *header.author(),
            timestamp: header.timestamp(),
            difficulty: *header.difficulty(),
        };
        let vm_factory = self.vm_factory.clone();
        for transaction in &block.transactions {
            Executive::new(self, &env, &vm_factory).transact(transaction)?;
        }

        let mut td = *header.difficulty();
        let mut known_uncles = HashSet::new();
        let mut uncle_authors = Vec::new();
        for uncle in &block.uncles {
            self.verification.verify_uncle(
                uncle,
                &self.previous_header,
                grandparent,
                &mut known_uncles,
            )?;
            td = td + *uncle.difficulty();
            uncle_authors.push(*uncle.author());
        }
        self.apply_rewards(&uncle_authors)?;

        let computed = self.compute_state_root()?;
        if computed != *header.state_root() {
            bail!(ErrorKind::RootMismatch(*header.state_root(), computed));
        }

        if full_commit {
            self.commit()?;
            self.previous_header = header.clone();
            self.reset_current();
            debug!(
                "playback: committed block {:?} at number {}",
                header.hash(),
                header.number()
            );
        }
        Ok(td)
    }

    /// Align onto the ledger's best block and pull ready transactions from
    /// the pool into the pending block. Returns whether the head moved. A
    /// frozen candidate is left alone so a mining retry keeps sealing the
    /// same block.
    pub fn sync(
        &mut self, ledger: &Ledger, pool: &TransactionPool,
    ) -> Result<bool> {
        let best = ledger.best_header();
        let moved = best.hash() != self.previous_header.hash();
        if moved {
            debug!(
                "sync: moving head {:?} -> {:?}",
                self.previous_header.hash(),
                best.hash()
            );
            self.root = *best.state_root();
            self.previous_header = best;
            self.reset_current();
            pool.cull(&*self);
        }

        if self.current_txs.is_empty() {
            for transaction in pool.ready_transactions(&*self) {
                if let Err(e) = self.execute_transaction(&transaction) {
                    debug!(
                        "sync: skipping pooled transaction {:?}: {}",
                        transaction.hash(),
                        e
                    );
                }
            }
        }
        Ok(moved)
    }

    /// Freeze the pending block for mining: gather uncles, pay rewards,
    /// commit, and fix the candidate header over the frozen body. Further
    /// calls are no-ops until `reset_current` or `sync` clears the
    /// candidate.
    pub fn commit_to_mine(&mut self, ledger: &Ledger) -> Result<()> {
        if !self.current_txs.is_empty() {
            return Ok(());
        }

        let mut uncles = Vec::new();
        if self.previous_header.number() > 0 {
            let grandparent = *self.previous_header.parent_hash();
            for hash in ledger.children_of(&grandparent) {
                if hash == self.previous_header.hash() {
                    continue;
                }
                if let Some(uncle) = ledger.block_header(&hash) {
                    uncles.push(uncle);
                }
            }
        }
        let uncle_authors: Vec<Address> =
            uncles.iter().map(|uncle| *uncle.author()).collect();
        self.apply_rewards(&uncle_authors)?;

        let mut txs_stream =
            RlpStream::new_list(self.pending_transactions.len());
        for transaction in &self.pending_transactions {
            txs_stream.append(transaction);
        }
        let mut uncles_stream = RlpStream::new_list(uncles.len());
        for uncle in &uncles {
            uncles_stream.append(uncle);
        }
        self.current_txs = txs_stream.out().to_vec();
        self.current_uncles = uncles_stream.out().to_vec();

        self.current_header
            .set_transactions_root(keccak(&self.current_txs));
        self.current_header.set_uncles_root(keccak(&self.current_uncles));

        let root = self.commit()?;
        self.current_header.set_state_root(root);

        debug!(
            "commit_to_mine: candidate on {:?}, {} transactions, {} uncles",
            self.previous_header.hash(),
            self.pending_transactions.len(),
            uncles.len()
        );
        Ok(())
    }

    /// Search for a sealing nonce until one is found or `timeout_ms`
    /// elapses. On success the sealed block is serialized and exposed by
    /// `block_data`.
    pub fn mine(&mut self, timeout_ms: u64) -> MineInfo {
        assert!(!self.current_txs.is_empty(), "What are you mining?");

        let problem = ProofOfWorkProblem {
            block_hash: self.current_header.problem_hash(),
            difficulty: *self.current_header.difficulty(),
            boundary: pow::difficulty_to_boundary(
                self.current_header.difficulty(),
            ),
        };
        let (info, solution) =
            pow::mine(&problem, Duration::from_millis(timeout_ms));
        match solution {
            Some(solution) => {
                self.current_header.set_nonce(solution.nonce);
                let hash = self.current_header.compute_hash();
                let mut stream = RlpStream::new_list(3);
                stream.append(&self.current_header);
                stream.append_raw(&self.current_txs, 1);
                stream.append_raw(&self.current_uncles, 1);
                self.current_bytes = stream.out().to_vec();
                debug!(
                    "mine: sealed block {:?} after {} attempts",
                    hash, info.attempts
                );
            }
            None => {
                self.current_bytes.clear();
            }
        }
        info
    }

    /// The sealed block from the last successful `mine`, empty otherwise.
    pub fn block_data(&self) -> &[u8] { &self.current_bytes }

    /// Drop speculative changes made since the last commit. The frozen
    /// candidate, if any, stays in place.
    pub fn rollback(&mut self) {
        self.cache.borrow_mut().clear();
        self.checkpoints.clear();
    }

    /// Abandon the pending block and start a fresh candidate on top of
    /// `previous_header`.
    pub fn reset_current(&mut self) {
        self.pending_transactions.clear();
        self.pending_hashes.clear();
        self.current_txs.clear();
        self.current_uncles.clear();
        self.current_bytes.clear();
        self.cache.borrow_mut().clear();
        self.checkpoints.clear();
        self.phase = PlaybackPhase::Idle;

        let timestamp = cmp::max(
            unix_timestamp_now(),
            self.previous_header.timestamp() + 1,
        );
        self.current_header = BlockHeaderBuilder::new()
            .with_parent_hash(self.previous_header.hash())
            .with_number(self.previous_header.number() + 1)
            .with_timestamp(timestamp)
            .with_author(self.coinbase)
            .with_state_root(self.root)
            .with_difficulty(pow::calculate_difficulty(
                &self.previous_header,
                timestamp,
            ))
            .build();
    }
}

fn unix_timestamp_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}
