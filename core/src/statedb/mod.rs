use crate::storage::{
    Error as StorageError, ErrorKind as StorageErrorKind, MerkleHash,
    TrieStorage,
};
use bytes::Bytes;
use ethereum_types::{Address, H256};
use hash::KECCAK_EMPTY;
use primitives::Account;

mod error;

pub use self::error::{Error, ErrorKind, Result};

/// Typed, read-only view over one version of the store. Writes flow through
/// the owning state's commit change-sets instead.
pub struct StateDb<'a> {
    storage: &'a TrieStorage,
    root: MerkleHash,
}

impl<'a> StateDb<'a> {
    pub fn new(storage: &'a TrieStorage, root: MerkleHash) -> Self {
        StateDb { storage, root }
    }

    pub fn get<T>(&self, key: &[u8]) -> Result<Option<T>>
    where T: ::rlp::Decodable {
        let raw = match self.storage.get(&self.root, key) {
            Ok(raw) => raw,
            Err(StorageError(StorageErrorKind::KeyNotFound, _)) => {
                return Ok(None);
            }
            Err(e) => {
                return Err(e.into());
            }
        };
        Ok(Some(::rlp::decode::<T>(raw.as_ref())?))
    }

    pub fn get_raw(&self, key: &[u8]) -> Result<Option<Box<[u8]>>> {
        let raw = match self.storage.get(&self.root, key) {
            Ok(raw) => raw,
            Err(StorageError(StorageErrorKind::KeyNotFound, _)) => {
                return Ok(None);
            }
            Err(e) => {
                return Err(e.into());
            }
        };
        Ok(Some(raw))
    }

    pub fn get_account(&self, address: &Address) -> Result<Option<Account>> {
        self.get::<Account>(address.as_bytes())
    }

    /// Load the code blob an account's `code_hash` points at. A dangling
    /// reference means the database is corrupt.
    pub fn get_code(
        &self, address: &Address, code_hash: &H256,
    ) -> Result<Bytes> {
        if *code_hash == KECCAK_EMPTY {
            return Ok(Bytes::new());
        }
        match self.storage.code_at(code_hash) {
            Some(code) => Ok(code),
            None => Err(ErrorKind::IncompleteDatabase(*address).into()),
        }
    }
}
