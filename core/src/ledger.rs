use ethereum_types::{H256, U256};
use parking_lot::RwLock;
use primitives::{BlockHeader, BlockNumber};
use std::collections::HashMap;
use std::sync::Arc;

/// Familial details concerning a block
#[derive(Debug, Clone)]
pub struct BlockDetails {
    /// Block number
    pub number: BlockNumber,
    /// Total difficulty of the block and all its parents
    pub total_difficulty: U256,
    /// Parent block hash
    pub parent: H256,
    /// List of children block hashes
    pub children: Vec<H256>,
}

/// The block the fork-choice rule currently favors: highest combined
/// difficulty, with ties going to the incumbent.
pub struct BestBlock {
    /// Best block decoded header.
    pub header: BlockHeader,
    /// Best block total difficulty.
    pub total_difficulty: U256,
}

/// General ledger information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerInfo {
    pub genesis_hash: H256,
    pub total_difficulty: U256,
    pub best_block_hash: H256,
    pub best_block_number: BlockNumber,
}

/// Every header this node has accepted, linked into a tree rooted at the
/// genesis block, plus the best-block choice over them.
pub struct Ledger {
    // All locks must be captured in the order declared here.
    best_block: RwLock<BestBlock>,

    block_headers: RwLock<HashMap<H256, BlockHeader>>,
    block_details: RwLock<HashMap<H256, BlockDetails>>,

    genesis_hash: H256,
}

pub type SharedLedger = Arc<Ledger>;

impl Ledger {
    pub fn with_genesis(genesis: BlockHeader) -> Self {
        let genesis_hash = genesis.hash();
        let total_difficulty = *genesis.difficulty();

        let mut block_headers = HashMap::new();
        block_headers.insert(genesis_hash, genesis.clone());
        let mut block_details = HashMap::new();
        block_details.insert(
            genesis_hash,
            BlockDetails {
                number: genesis.number(),
                total_difficulty,
                parent: *genesis.parent_hash(),
                children: Vec::new(),
            },
        );

        Ledger {
            best_block: RwLock::new(BestBlock {
                header: genesis,
                total_difficulty,
            }),
            block_headers: RwLock::new(block_headers),
            block_details: RwLock::new(block_details),
            genesis_hash,
        }
    }

    pub fn new_shared(genesis: BlockHeader) -> SharedLedger {
        Arc::new(Self::with_genesis(genesis))
    }

    pub fn genesis_hash(&self) -> H256 { self.genesis_hash }

    /// Get best block hash.
    pub fn best_block_hash(&self) -> H256 {
        self.best_block.read().header.hash()
    }

    pub fn best_header(&self) -> BlockHeader {
        self.best_block.read().header.clone()
    }

    pub fn best_total_difficulty(&self) -> U256 {
        self.best_block.read().total_difficulty
    }

    /// Returns general ledger information
    pub fn ledger_info(&self) -> LedgerInfo {
        let best_block = self.best_block.read();
        LedgerInfo {
            genesis_hash: self.genesis_hash,
            total_difficulty: best_block.total_difficulty,
            best_block_hash: best_block.header.hash(),
            best_block_number: best_block.header.number(),
        }
    }

    pub fn contains(&self, hash: &H256) -> bool {
        self.block_headers.read().contains_key(hash)
    }

    pub fn block_header(&self, hash: &H256) -> Option<BlockHeader> {
        self.block_headers.read().get(hash).cloned()
    }

    pub fn block_details_of(&self, hash: &H256) -> Option<BlockDetails> {
        self.block_details.read().get(hash).cloned()
    }

    /// Hashes of every known child of `hash`.
    pub fn children_of(&self, hash: &H256) -> Vec<H256> {
        self.block_details
            .read()
            .get(hash)
            .map(|details| details.children.clone())
            .unwrap_or_default()
    }

    /// Link a new block under its parent. `td_increase` is the difficulty
    /// the block contributes on top of its parent's total, uncles included.
    /// Returns whether the block became the best block.
    pub fn insert_block(
        &self, header: BlockHeader, td_increase: U256,
    ) -> bool {
        let hash = header.hash();
        let parent_hash = *header.parent_hash();

        let mut best_block = self.best_block.write();
        let mut block_headers = self.block_headers.write();
        let mut block_details = self.block_details.write();

        if block_headers.contains_key(&hash) {
            debug!("insert_block: {:?} is already known", hash);
            return false;
        }
        let parent_td = match block_details.get(&parent_hash) {
            Some(details) => details.total_difficulty,
            None => {
                warn!(
                    "insert_block: {:?} has unknown parent {:?}",
                    hash, parent_hash
                );
                return false;
            }
        };
        let total_difficulty = parent_td + td_increase;

        block_headers.insert(hash, header.clone());
        block_details.insert(
            hash,
            BlockDetails {
                number: header.number(),
                total_difficulty,
                parent: parent_hash,
                children: Vec::new(),
            },
        );
        if let Some(parent) = block_details.get_mut(&parent_hash) {
            parent.children.push(hash);
        }

        if total_difficulty > best_block.total_difficulty {
            debug!(
                "insert_block: new best block {:?} at number {}, total \
                 difficulty {}",
                hash,
                header.number(),
                total_difficulty
            );
            best_block.header = header;
            best_block.total_difficulty = total_difficulty;
            return true;
        }
        false
    }
}
