//! In-memory, content-addressed store of flat state versions. Every `apply`
//! produces a new immutable version keyed by its Merkle root; old versions
//! stay readable, which is what lets block playback dry-run against a parent
//! root without disturbing anything already persisted.

pub mod errors;


pub use self::errors::{Error, ErrorKind, Result};

use bytes::Bytes;
use ethereum_types::H256;
use hash::{keccak, KECCAK_NULL_RLP};
use parking_lot::RwLock;
use rlp::RlpStream;
use std::{collections::HashMap, sync::Arc};

pub type MerkleHash = H256;
pub type SharedTrieStorage = Arc<TrieStorage>;

/// One immutable version of the key/value state.
type Version = Arc<HashMap<Vec<u8>, Vec<u8>>>;

/// A change set to fold on top of a version. `None` removes the key.
pub type ChangeSet = HashMap<Vec<u8>, Option<Vec<u8>>>;

pub struct TrieStorage {
    versions: RwLock<HashMap<MerkleHash, Version>>,
    codes: RwLock<HashMap<H256, Bytes>>,
}

impl Default for TrieStorage {
    fn default() -> Self { Self::new() }
}

impl TrieStorage {
    pub fn new() -> Self {
        let mut versions = HashMap::new();
        versions.insert(KECCAK_NULL_RLP, Arc::new(HashMap::new()));
        TrieStorage {
            versions: RwLock::new(versions),
            codes: RwLock::new(HashMap::new()),
        }
    }

    pub fn new_shared() -> SharedTrieStorage { Arc::new(Self::new()) }

    pub fn contains_version(&self, root: &MerkleHash) -> bool {
        self.versions.read().contains_key(root)
    }

    /// Read the value stored under `key` in the version at `root`.
    pub fn get(&self, root: &MerkleHash, key: &[u8]) -> Result<Box<[u8]>> {
        let versions = self.versions.read();
        let version = versions
            .get(root)
            .ok_or_else(|| Error::from(ErrorKind::UnknownRoot(*root)))?;
        match version.get(key) {
            Some(value) => Ok(value.clone().into_boxed_slice()),
            None => Err(ErrorKind::KeyNotFound.into()),
        }
    }

    /// All entries of the version at `root`, in key order.
    pub fn entries_at(
        &self, root: &MerkleHash,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let versions = self.versions.read();
        let version = versions
            .get(root)
            .ok_or_else(|| Error::from(ErrorKind::UnknownRoot(*root)))?;
        let mut entries: Vec<_> = version
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        entries.sort();
        Ok(entries)
    }

    /// Compute the root that `changes` folded on top of `base` would
    /// produce, without persisting anything.
    pub fn derive(
        &self, base: &MerkleHash, changes: &ChangeSet,
    ) -> Result<MerkleHash> {
        Ok(Self::merkle_of(&self.updated(base, changes)?))
    }

    /// Persist `changes` folded on top of `base` as a new version and return
    /// its root. The base version is left untouched.
    pub fn apply(
        &self, base: &MerkleHash, changes: &ChangeSet,
    ) -> Result<MerkleHash> {
        let updated = self.updated(base, changes)?;
        let root = Self::merkle_of(&updated);
        let mut versions = self.versions.write();
        versions.entry(root).or_insert_with(|| Arc::new(updated));
        trace!("apply: base={:?} root={:?}", base, root);
        Ok(root)
    }

    pub fn code_at(&self, code_hash: &H256) -> Option<Bytes> {
        self.codes.read().get(code_hash).cloned()
    }

    /// Store a code blob under its keccak hash and return the hash.
    pub fn insert_code(&self, code: Bytes) -> H256 {
        let code_hash = keccak(&code);
        self.codes.write().entry(code_hash).or_insert(code);
        code_hash
    }

    fn updated(
        &self, base: &MerkleHash, changes: &ChangeSet,
    ) -> Result<HashMap<Vec<u8>, Vec<u8>>> {
        let versions = self.versions.read();
        let base_version = versions
            .get(base)
            .ok_or_else(|| Error::from(ErrorKind::UnknownRoot(*base)))?;
        let mut updated = (**base_version).clone();
        for (key, value) in changes {
            match value {
                Some(value) => {
                    updated.insert(key.clone(), value.clone());
                }
                None => {
                    updated.remove(key);
                }
            }
        }
        Ok(updated)
    }

    /// Deterministic digest of a version: keccak of the RLP list of
    /// `[key, value]` pairs in key order. The empty version folds to
    /// `KECCAK_NULL_RLP`, so an emptied trie and a fresh store agree.
    fn merkle_of(entries: &HashMap<Vec<u8>, Vec<u8>>) -> MerkleHash {
        if entries.is_empty() {
            return KECCAK_NULL_RLP;
        }
        let mut sorted: Vec<_> = entries.iter().collect();
        sorted.sort();
        let mut stream = RlpStream::new_list(sorted.len());
        for (key, value) in sorted {
            stream.begin_list(2).append(key).append(value);
        }
        keccak(stream.out())
    }
}
