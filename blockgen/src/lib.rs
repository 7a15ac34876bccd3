#[macro_use]
extern crate log;

extern crate ethereum_types;
extern crate galenacore;
extern crate parking_lot;
extern crate primitives;
extern crate rlp;

use ethereum_types::H256;
use galenacore::{Result, SharedLedger, SharedTransactionPool, State};
use parking_lot::RwLock;
use primitives::Block;
use std::sync::Arc;
use std::{thread, time};

enum MiningState {
    Start,
    Stop,
}

/// Drives mining rounds over one world state: aligns it with the ledger,
/// freezes a candidate over the pooled transactions, seals it and feeds the
/// block back into the ledger.
pub struct BlockGenerator {
    ledger: SharedLedger,
    txpool: SharedTransactionPool,
    state: RwLock<State>,
    control: RwLock<MiningState>,
}

pub type BlockGeneratorRef = Arc<BlockGenerator>;

impl BlockGenerator {
    pub fn new(
        ledger: SharedLedger, txpool: SharedTransactionPool, state: State,
    ) -> Self
    {
        BlockGenerator {
            ledger,
            txpool,
            state: RwLock::new(state),
            control: RwLock::new(MiningState::Start),
        }
    }

    /// Make the mining loop exit after the round it is in.
    pub fn stop(&self) { *self.control.write() = MiningState::Stop; }

    /// One mining round: sync the state onto the best block, freeze a
    /// candidate and search for a seal until `timeout_ms` runs out. A round
    /// that times out leaves the candidate frozen, so the next round
    /// resumes the same search.
    pub fn mine_one_round(&self, timeout_ms: u64) -> Result<Option<H256>> {
        let mut state = self.state.write();
        state.sync(&self.ledger, &self.txpool)?;
        state.commit_to_mine(&self.ledger)?;

        let info = state.mine(timeout_ms);
        if !info.completed {
            debug!("round timed out after {} attempts", info.attempts);
            return Ok(None);
        }

        let block: Block = rlp::decode(state.block_data())?;
        let mut td_increase = *block.block_header.difficulty();
        for uncle in &block.uncles {
            td_increase = td_increase + *uncle.difficulty();
        }
        let hash = block.hash();
        if self.ledger.insert_block(block.block_header, td_increase) {
            self.txpool.cull(&*state);
        } else {
            debug!("sealed block {:?} did not take over the best chain", hash);
        }
        Ok(Some(hash))
    }

    pub fn start_mining(bg: Arc<BlockGenerator>, round_timeout_ms: u64) {
        loop {
            match *bg.control.read() {
                MiningState::Stop => return,
                _ => {}
            }
            match bg.mine_one_round(round_timeout_ms) {
                Ok(Some(hash)) => info!("mined block {:?}", hash),
                Ok(None) => {}
                Err(e) => {
                    warn!("mining round failed: {}", e);
                    thread::sleep(time::Duration::from_millis(
                        round_timeout_ms,
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethereum_types::{Address, U256};
    use galenacore::{
        genesis,
        parameters::{BLOCK_REWARD, CALL_GAS, TEST_DIFFICULTY},
        Ledger, SharedTrieStorage, TransactionPool, TrieStorage,
        VerificationConfig,
    };
    use primitives::{Action, BlockHeader, Transaction};

    // At difficulty 10 a seal lands within a few dozen nonces, so this is
    // slack, not expected runtime.
    const ROUND_MS: u64 = 30_000;

    fn sender() -> Address { Address::from_slice(&[0xaa; 20]) }

    fn receiver() -> Address { Address::from_slice(&[0xbb; 20]) }

    fn transfer(nonce: u64, value: u64) -> Transaction {
        Transaction {
            nonce: U256::from(nonce),
            gas_price: U256::from(1),
            gas: U256::zero(),
            action: Action::Call(receiver()),
            value: U256::from(value),
            data: Vec::new(),
            sender: sender(),
        }
    }

    struct Harness {
        bg: BlockGenerator,
        storage: SharedTrieStorage,
        genesis: BlockHeader,
    }

    fn harness(coinbase: Address) -> Harness {
        let storage = TrieStorage::new_shared();
        let genesis =
            genesis::genesis_block(&storage, U256::from(TEST_DIFFICULTY))
                .expect("Failed to build the genesis block")
                .block_header;
        let ledger = Arc::new(Ledger::with_genesis(genesis.clone()));
        let txpool = Arc::new(TransactionPool::with_capacity(32));
        let state = State::open(storage.clone(), genesis.clone(), coinbase)
            .with_verification(VerificationConfig::new(true));
        Harness {
            bg: BlockGenerator::new(ledger, txpool, state),
            storage,
            genesis,
        }
    }

    #[test]
    fn a_round_seals_pooled_transactions_into_a_block() {
        let miner = Address::from_slice(&[0xcc; 20]);
        let h = harness(miner);
        assert!(h.bg.txpool.insert(transfer(0, 40)));
        assert!(h.bg.txpool.insert(transfer(1, 2)));

        let hash = h
            .bg
            .mine_one_round(ROUND_MS)
            .expect("Failed to mine")
            .expect("the round should seal a block");

        assert_eq!(h.bg.ledger.best_block_hash(), hash);
        assert_eq!(h.bg.ledger.ledger_info().best_block_number, 1);
        assert!(h.bg.txpool.is_empty());

        let state = h.bg.state.read();
        let block: Block =
            rlp::decode(state.block_data()).expect("Failed to decode");
        assert_eq!(block.hash(), hash);
        assert_eq!(*block.block_header.parent_hash(), h.genesis.hash());
        assert_eq!(block.transactions.len(), 2);

        assert_eq!(state.balance(&receiver()).unwrap(), U256::from(42));
        assert_eq!(
            state.balance(&miner).unwrap(),
            U256::from(BLOCK_REWARD) + U256::from(2 * CALL_GAS)
        );
    }

    #[test]
    fn rounds_chain_one_block_after_another() {
        let miner = Address::from_slice(&[0xcd; 20]);
        let h = harness(miner);

        for _ in 0..3 {
            let sealed = h.bg.mine_one_round(ROUND_MS).expect("Failed to mine");
            assert!(sealed.is_some());
        }

        let info = h.bg.ledger.ledger_info();
        assert_eq!(info.best_block_number, 3);
        assert_eq!(info.genesis_hash, h.genesis.hash());

        let state = h.bg.state.read();
        assert_eq!(
            state.balance(&miner).unwrap(),
            U256::from(BLOCK_REWARD) * U256::from(3)
        );
    }

    #[test]
    fn a_sibling_joins_as_an_uncle_and_earns_its_share() {
        let alice = Address::from_slice(&[0x0a; 20]);
        let bob = Address::from_slice(&[0x0b; 20]);
        let h = harness(alice);

        h.bg.mine_one_round(ROUND_MS)
            .expect("Failed to mine")
            .expect("the first round should seal a block");

        // Bob seals a rival child of the genesis block over the same
        // store. The tie leaves Alice's block best, but the rival is
        // linked under the genesis block.
        let mut rival = State::open(h.storage.clone(), h.genesis.clone(), bob)
            .with_verification(VerificationConfig::new(true));
        rival.commit_to_mine(&h.bg.ledger).expect("Failed to commit");
        assert!(rival.mine(ROUND_MS).completed);
        let sibling: Block =
            rlp::decode(rival.block_data()).expect("Failed to decode");
        assert!(!h.bg.ledger.insert_block(
            sibling.block_header.clone(),
            *sibling.block_header.difficulty(),
        ));
        assert!(h.bg.ledger.contains(&sibling.block_header.hash()));

        // Alice's next block picks the rival up as an uncle and pays its
        // author three quarters of the reward, plus an eighth to herself.
        let second = h
            .bg
            .mine_one_round(ROUND_MS)
            .expect("Failed to mine")
            .expect("the second round should seal a block");
        assert_eq!(h.bg.ledger.best_block_hash(), second);
        assert_eq!(h.bg.ledger.ledger_info().best_block_number, 2);

        let state = h.bg.state.read();
        let sealed: Block =
            rlp::decode(state.block_data()).expect("Failed to decode");
        assert_eq!(sealed.uncles.len(), 1);
        assert_eq!(sealed.uncles[0].hash(), sibling.block_header.hash());

        let reward = U256::from(BLOCK_REWARD);
        assert_eq!(
            state.balance(&bob).unwrap(),
            reward * U256::from(3) / U256::from(4)
        );
        assert_eq!(
            state.balance(&alice).unwrap(),
            reward * U256::from(2) + reward / U256::from(8)
        );
    }

    #[test]
    fn a_stopped_generator_exits_its_loop() {
        let h = harness(Address::from_slice(&[0x0c; 20]));
        let bg = Arc::new(h.bg);
        bg.stop();
        BlockGenerator::start_mining(bg.clone(), 10);
        assert_eq!(bg.ledger.ledger_info().best_block_number, 0);
    }
}
