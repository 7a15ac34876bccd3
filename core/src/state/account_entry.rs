use bytes::Bytes;
use ethereum_types::{H256, U256};
use hash::{KECCAK_EMPTY, KECCAK_NULL_RLP};
use primitives::Account;
use std::collections::HashMap;

/// One account's slice of the world state: the committed values overlaid
/// with everything the pending block has done to it.
#[derive(Debug, Clone)]
pub struct AccountEntry {
    pub balance: U256,
    pub nonce: U256,
    /// Storage root the account had at the last commit.
    pub storage_root: H256,
    pub code_hash: H256,
    /// Code blob, once loaded or freshly deployed.
    pub code: Option<Bytes>,
    /// True when `code` was deployed this block and is not yet stored.
    pub code_fresh: bool,
    /// Dirty storage words. Zero marks a pending deletion.
    pub storage: HashMap<H256, U256>,
    /// Dead entries drop out of the trie at commit.
    pub alive: bool,
}

impl AccountEntry {
    /// The placeholder written by a forced cache fill: zeroed, and dead
    /// until something touches it.
    pub fn new_dead() -> Self {
        AccountEntry {
            balance: U256::zero(),
            nonce: U256::zero(),
            storage_root: KECCAK_NULL_RLP,
            code_hash: KECCAK_EMPTY,
            code: None,
            code_fresh: false,
            storage: HashMap::new(),
            alive: false,
        }
    }

    pub fn from_account(account: Account) -> Self {
        let code = if account.code_hash == KECCAK_EMPTY {
            Some(Bytes::new())
        } else {
            None
        };
        AccountEntry {
            balance: account.balance,
            nonce: account.nonce,
            storage_root: account.storage_root,
            code_hash: account.code_hash,
            code,
            code_fresh: false,
            storage: HashMap::new(),
            alive: true,
        }
    }

    pub fn is_contract(&self) -> bool {
        self.code_fresh
            || self.code_hash != KECCAK_EMPTY
            || self.storage_root != KECCAK_NULL_RLP
            || !self.storage.is_empty()
    }

    pub fn code_is_loaded(&self) -> bool { self.code.is_some() }

    pub fn set_code(&mut self, code: Bytes) {
        self.code = Some(code);
        self.code_fresh = true;
        self.alive = true;
    }

    /// Zero the account and mark it for removal at commit.
    pub fn kill(&mut self) { *self = AccountEntry::new_dead(); }
}
