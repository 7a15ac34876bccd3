use ethereum_types::{H256, U256};
use hash::{KECCAK_EMPTY, KECCAK_NULL_RLP};
use rlp::*;

/// Account state as stored under the address key in the state trie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub balance: U256,
    pub nonce: U256,
    /// Root of the account's storage trie, `KECCAK_NULL_RLP` when empty.
    pub storage_root: H256,
    /// Hash of the account's code blob, `KECCAK_EMPTY` when there is none.
    pub code_hash: H256,
}

impl Default for Account {
    fn default() -> Self {
        Account {
            balance: U256::zero(),
            nonce: U256::zero(),
            storage_root: KECCAK_NULL_RLP,
            code_hash: KECCAK_EMPTY,
        }
    }
}

impl Account {
    pub fn new_basic(balance: U256, nonce: U256) -> Self {
        Account {
            balance,
            nonce,
            storage_root: KECCAK_NULL_RLP,
            code_hash: KECCAK_EMPTY,
        }
    }

    /// An account carries contract state when either sentinel differs from
    /// the empty value.
    pub fn is_contract(&self) -> bool {
        self.code_hash != KECCAK_EMPTY || self.storage_root != KECCAK_NULL_RLP
    }
}

impl Decodable for Account {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        Ok(Account {
            balance: rlp.val_at(0)?,
            nonce: rlp.val_at(1)?,
            storage_root: rlp.val_at(2)?,
            code_hash: rlp.val_at(3)?,
        })
    }
}

impl Encodable for Account {
    fn rlp_append(&self, stream: &mut RlpStream) {
        stream
            .begin_list(4)
            .append(&self.balance)
            .append(&self.nonce)
            .append(&self.storage_root)
            .append(&self.code_hash);
    }
}
