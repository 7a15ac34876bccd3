use crate::{
    error::Result,
    storage::{ChangeSet, MerkleHash, TrieStorage},
};
use ethereum_types::{Address, U256};
use hash::{KECCAK_EMPTY_LIST_RLP, KECCAK_NULL_RLP};
use primitives::{Account, Block, BlockHeaderBuilder};
use std::collections::HashMap;

lazy_static! {
    /// The premine: every balance the chain starts with.
    pub static ref GENESIS_ACCOUNTS: HashMap<Address, U256> = {
        let mut accounts = HashMap::new();
        accounts.insert(Address::from([0xaa; 20]), U256::from(1000));
        accounts
    };
}

/// Fold the genesis allocation into `storage` and return its state root.
/// Idempotent: the same allocation always lands on the same root.
pub fn initialize(storage: &TrieStorage) -> Result<MerkleHash> {
    let mut changes = ChangeSet::new();
    for (address, balance) in GENESIS_ACCOUNTS.iter() {
        let account = Account::new_basic(*balance, U256::zero());
        changes.insert(
            address.as_bytes().to_vec(),
            Some(::rlp::encode(&account).to_vec()),
        );
    }
    Ok(storage.apply(&KECCAK_NULL_RLP, &changes)?)
}

/// Block zero over `storage`, materializing the allocation if the store
/// has never seen it.
pub fn genesis_block(
    storage: &TrieStorage, difficulty: U256,
) -> Result<Block> {
    let state_root = initialize(storage)?;
    let block_header = BlockHeaderBuilder::new()
        .with_number(0)
        .with_timestamp(0)
        .with_author(Address::zero())
        .with_transactions_root(KECCAK_EMPTY_LIST_RLP)
        .with_uncles_root(KECCAK_EMPTY_LIST_RLP)
        .with_state_root(state_root)
        .with_difficulty(difficulty)
        .build();
    Ok(Block {
        block_header,
        transactions: Vec::new(),
        uncles: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statedb::StateDb;

    #[test]
    fn the_allocation_folds_to_one_root() {
        let storage_a = TrieStorage::new();
        let storage_b = TrieStorage::new();
        let root_a = initialize(&storage_a).expect("Failed to initialize");
        let root_b = initialize(&storage_b).expect("Failed to initialize");
        assert_eq!(root_a, root_b);
        assert_ne!(root_a, KECCAK_NULL_RLP);

        // Running it again changes nothing.
        let again = initialize(&storage_a).expect("Failed to initialize");
        assert_eq!(again, root_a);
    }

    #[test]
    fn the_genesis_block_exposes_the_allocation() {
        let storage = TrieStorage::new_shared();
        let block = genesis_block(&storage, U256::from(10))
            .expect("Failed to build the genesis block");
        assert_eq!(block.block_header.number(), 0);
        assert_eq!(*block.block_header.difficulty(), U256::from(10));
        assert_eq!(
            *block.block_header.transactions_root(),
            block.transactions_root()
        );

        let db = StateDb::new(&*storage, *block.block_header.state_root());
        let account = db
            .get_account(&Address::from([0xaa; 20]))
            .expect("Failed to read the genesis account")
            .expect("the premined account must exist");
        assert_eq!(account.balance, U256::from(1000));
        assert_eq!(account.nonce, U256::zero());
    }
}
