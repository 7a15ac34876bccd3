mod ready;

pub use self::ready::{Readiness, Ready};

use crate::state::State;
use ethereum_types::{Address, H256, U256};
use parking_lot::RwLock;
use primitives::Transaction;
use std::{
    cmp::Ordering, collections::HashMap, ops::DerefMut, sync::Arc,
};

pub const DEFAULT_MIN_TRANSACTION_GAS_PRICE: u64 = 1;
pub const DEFAULT_MAX_TRANSACTION_GAS_LIMIT: u64 = 100_000;

/// Nonce view over a `State` that advances as transactions are declared
/// ready, so chained nonces from one sender line up.
pub struct AccountCache<'a> {
    pub nonces: HashMap<Address, U256>,
    pub state: &'a State,
}

impl<'a> AccountCache<'a> {
    pub fn new(state: &'a State) -> Self {
        AccountCache {
            nonces: HashMap::new(),
            state,
        }
    }

    fn next_nonce(&mut self, address: &Address) -> Option<U256> {
        if !self.nonces.contains_key(address) {
            let nonce = self.state.transactions_from(address).ok()?;
            self.nonces.insert(*address, nonce);
        }
        self.nonces.get(address).copied()
    }
}

impl<'a> Ready<Transaction> for AccountCache<'a> {
    fn is_ready(&mut self, tx: &Transaction) -> Readiness {
        let nonce = match self.next_nonce(&tx.sender) {
            Some(nonce) => nonce,
            None => return Readiness::Future,
        };
        match tx.nonce.cmp(&nonce) {
            Ordering::Greater => Readiness::Future,
            Ordering::Less => Readiness::Stale,
            Ordering::Equal => {
                self.nonces.insert(tx.sender, nonce + U256::one());
                Readiness::Ready
            }
        }
    }
}

/// Pool entry ordered by sender, then nonce, then hash, so one sender's
/// chain drains in executable order and ties break deterministically.
#[derive(Debug, Clone)]
pub struct OrderedTransaction {
    transaction: Transaction,
}

impl OrderedTransaction {
    pub fn new(transaction: Transaction) -> Self {
        OrderedTransaction { transaction }
    }
}

impl Ord for OrderedTransaction {
    fn cmp(&self, other: &Self) -> Ordering {
        self.transaction
            .sender
            .cmp(&other.transaction.sender)
            .then_with(|| {
                self.transaction.nonce.cmp(&other.transaction.nonce)
            })
            .then_with(|| {
                self.transaction.hash().cmp(&other.transaction.hash())
            })
    }
}

impl PartialOrd for OrderedTransaction {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for OrderedTransaction {
    fn eq(&self, other: &Self) -> bool {
        self.transaction.hash() == other.transaction.hash()
    }
}

impl Eq for OrderedTransaction {}

pub struct TransactionPoolInner {
    transactions: HashMap<H256, OrderedTransaction>,
}

impl TransactionPoolInner {
    pub fn new() -> Self {
        TransactionPoolInner {
            transactions: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize { self.transactions.len() }
}

pub struct TransactionPool {
    capacity: usize,
    inner: RwLock<TransactionPoolInner>,
}

pub type SharedTransactionPool = Arc<TransactionPool>;

impl TransactionPool {
    pub fn with_capacity(capacity: usize) -> Self {
        TransactionPool {
            capacity,
            inner: RwLock::new(TransactionPoolInner::new()),
        }
    }

    pub fn len(&self) -> usize { self.inner.read().len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn contains(&self, hash: &H256) -> bool {
        self.inner.read().transactions.contains_key(hash)
    }

    // Verification that has nothing to do with readiness.
    pub fn verify_transaction(&self, transaction: &Transaction) -> bool {
        if transaction.gas > DEFAULT_MAX_TRANSACTION_GAS_LIMIT.into() {
            warn!(
                "Transaction discarded due to above gas limit: {} > {}",
                transaction.gas, DEFAULT_MAX_TRANSACTION_GAS_LIMIT
            );
            return false;
        }
        if transaction.gas_price < DEFAULT_MIN_TRANSACTION_GAS_PRICE.into() {
            warn!(
                "Transaction {:?} discarded due to below minimal gas price: \
                 {}",
                transaction.hash(),
                transaction.gas_price
            );
            return false;
        }
        true
    }

    pub fn insert(&self, transaction: Transaction) -> bool {
        if !self.verify_transaction(&transaction) {
            return false;
        }
        let mut inner = self.inner.write();
        let inner = inner.deref_mut();
        if self.capacity <= inner.transactions.len() {
            debug!(
                "Rejected transaction {:?} because of insufficient \
                 transaction pool capacity",
                transaction.hash()
            );
            return false;
        }
        let hash = transaction.hash();
        if inner.transactions.contains_key(&hash) {
            debug!("Rejected transaction {:?} because it already exists", hash);
            return false;
        }
        inner
            .transactions
            .insert(hash, OrderedTransaction::new(transaction));
        true
    }

    pub fn remove(&self, hash: &H256) -> Option<Transaction> {
        self.inner
            .write()
            .transactions
            .remove(hash)
            .map(|ordered| ordered.transaction)
    }

    /// Everything in the pool, in deterministic order.
    pub fn pending_transactions(&self) -> Vec<Transaction> {
        let inner = self.inner.read();
        let mut ordered: Vec<&OrderedTransaction> =
            inner.transactions.values().collect();
        ordered.sort();
        ordered
            .into_iter()
            .map(|entry| entry.transaction.clone())
            .collect()
    }

    /// The transactions executable on top of `state`, nonce-chained per
    /// sender. Stale entries found along the way are dropped.
    pub fn ready_transactions(&self, state: &State) -> Vec<Transaction> {
        let mut inner = self.inner.write();
        let inner = inner.deref_mut();
        let mut ordered: Vec<OrderedTransaction> =
            inner.transactions.values().cloned().collect();
        ordered.sort();

        let mut cache = AccountCache::new(state);
        let mut ready = Vec::new();
        for entry in ordered {
            match cache.is_ready(&entry.transaction) {
                Readiness::Ready => ready.push(entry.transaction),
                Readiness::Stale => {
                    warn!(
                        "Transaction {:?} is discarded due to stale nonce",
                        entry.transaction.hash()
                    );
                    inner.transactions.remove(&entry.transaction.hash());
                }
                Readiness::Future => {}
            }
        }
        ready
    }

    /// Drop every transaction `state` has already moved past. Returns how
    /// many went.
    pub fn cull(&self, state: &State) -> usize {
        let mut inner = self.inner.write();
        let inner = inner.deref_mut();
        let mut cache = AccountCache::new(state);
        let stale: Vec<H256> = inner
            .transactions
            .values()
            .filter_map(|entry| {
                let tx = &entry.transaction;
                match cache.next_nonce(&tx.sender) {
                    Some(nonce) if tx.nonce < nonce => Some(tx.hash()),
                    _ => None,
                }
            })
            .collect();
        for hash in &stale {
            inner.transactions.remove(hash);
            debug!("Culled stale transaction {:?}", hash);
        }
        stale.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        genesis, parameters::TEST_DIFFICULTY, storage::TrieStorage,
        verification::VerificationConfig,
    };
    use primitives::Action;

    fn aa() -> Address { Address::from([0xaa; 20]) }

    fn test_state() -> State {
        let storage = TrieStorage::new_shared();
        let genesis =
            genesis::genesis_block(&storage, U256::from(TEST_DIFFICULTY))
                .expect("Failed to initialize genesis");
        State::open(storage, genesis.block_header, Address::zero())
            .with_verification(VerificationConfig::new(true))
    }

    fn transfer_from(sender: Address, nonce: u64, value: u64) -> Transaction {
        Transaction {
            nonce: U256::from(nonce),
            gas_price: U256::one(),
            gas: U256::zero(),
            action: Action::Call(Address::from_low_u64_be(0xbb)),
            value: U256::from(value),
            data: Vec::new(),
            sender,
        }
    }

    #[test]
    fn insert_enforces_capacity_and_uniqueness() {
        let pool = TransactionPool::with_capacity(2);
        assert!(pool.is_empty());
        assert!(pool.insert(transfer_from(aa(), 0, 1)));
        assert!(!pool.insert(transfer_from(aa(), 0, 1)));
        assert!(pool.insert(transfer_from(aa(), 1, 1)));
        assert!(!pool.insert(transfer_from(aa(), 2, 1)));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn admission_rejects_mispriced_and_oversized_transactions() {
        let pool = TransactionPool::with_capacity(8);

        let mut cheap = transfer_from(aa(), 0, 1);
        cheap.gas_price = U256::zero();
        assert!(!pool.insert(cheap));

        let mut huge = transfer_from(aa(), 0, 1);
        huge.gas = U256::from(DEFAULT_MAX_TRANSACTION_GAS_LIMIT + 1);
        assert!(!pool.insert(huge));

        assert!(pool.is_empty());
    }

    #[test]
    fn ready_transactions_chain_nonces_per_sender() {
        let state = test_state();
        let pool = TransactionPool::with_capacity(8);
        // Inserted out of order on purpose.
        pool.insert(transfer_from(aa(), 2, 1));
        pool.insert(transfer_from(aa(), 0, 1));
        pool.insert(transfer_from(aa(), 1, 1));

        let ready = pool.ready_transactions(&state);
        let nonces: Vec<u64> =
            ready.iter().map(|tx| tx.nonce.as_u64()).collect();
        assert_eq!(nonces, vec![0, 1, 2]);
        // Nothing was stale, nothing was dropped.
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn gapped_nonces_stay_in_the_future() {
        let state = test_state();
        let pool = TransactionPool::with_capacity(8);
        pool.insert(transfer_from(aa(), 3, 1));

        assert!(pool.ready_transactions(&state).is_empty());
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn stale_transactions_are_culled_against_the_state() {
        let mut state = test_state();
        let pool = TransactionPool::with_capacity(8);
        let stale = transfer_from(aa(), 0, 1);
        pool.insert(stale.clone());
        pool.insert(transfer_from(aa(), 1, 1));

        state.note_sending(&aa()).expect("Failed to bump the nonce");
        assert_eq!(pool.cull(&state), 1);
        assert!(!pool.contains(&stale.hash()));
        assert_eq!(pool.len(), 1);

        // The drain path drops stale entries too.
        pool.insert(stale.clone());
        let ready = pool.ready_transactions(&state);
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].nonce, U256::one());
        assert!(!pool.contains(&stale.hash()));
    }

    #[test]
    fn pending_snapshot_is_deterministic() {
        let pool = TransactionPool::with_capacity(8);
        let other = Address::from([0x11; 20]);
        pool.insert(transfer_from(aa(), 1, 1));
        pool.insert(transfer_from(other, 0, 5));
        pool.insert(transfer_from(aa(), 0, 1));

        let snapshot = pool.pending_transactions();
        assert_eq!(snapshot.len(), 3);
        // Sender 0x11.. sorts ahead of 0xaa.., nonces ascend within one.
        assert_eq!(snapshot[0].sender, other);
        assert_eq!(snapshot[1].sender, aa());
        assert_eq!(snapshot[1].nonce, U256::zero());
        assert_eq!(snapshot[2].nonce, U256::one());
    }
}
