use crate::BlockNumber;
use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use hash::{keccak, KECCAK_NULL_RLP};
use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};

/// A block header.
#[derive(Clone, Debug, Eq)]
pub struct BlockHeader {
    /// Parent hash.
    parent_hash: H256,
    /// Block timestamp.
    timestamp: u64,
    /// Block number.
    number: BlockNumber,
    /// Block author.
    author: Address,
    /// Transactions root.
    transactions_root: H256,
    /// Uncles root.
    uncles_root: H256,
    /// State root.
    state_root: H256,
    /// Block difficulty.
    difficulty: U256,
    /// Hash of the block
    hash: Option<H256>,
    /// Nonce of the block
    nonce: u64,
}

impl PartialEq for BlockHeader {
    fn eq(&self, o: &BlockHeader) -> bool {
        self.parent_hash == o.parent_hash
            && self.timestamp == o.timestamp
            && self.number == o.number
            && self.author == o.author
            && self.transactions_root == o.transactions_root
            && self.uncles_root == o.uncles_root
            && self.state_root == o.state_root
            && self.difficulty == o.difficulty
            && self.nonce == o.nonce
    }
}

impl Default for BlockHeader {
    fn default() -> Self {
        BlockHeader {
            parent_hash: H256::default(),
            timestamp: 0,
            number: 0,
            author: Address::default(),
            transactions_root: KECCAK_NULL_RLP,
            uncles_root: KECCAK_NULL_RLP,
            state_root: KECCAK_NULL_RLP,
            difficulty: U256::default(),
            hash: None,
            nonce: 0,
        }
    }
}

impl BlockHeader {
    /// Create a new, default-valued, header.
    pub fn new() -> Self { Self::default() }

    /// Get the parent_hash field of the header.
    pub fn parent_hash(&self) -> &H256 { &self.parent_hash }

    /// Get the timestamp field of the header.
    pub fn timestamp(&self) -> u64 { self.timestamp }

    /// Get the number field of the header.
    pub fn number(&self) -> BlockNumber { self.number }

    /// Get the author field of the header.
    pub fn author(&self) -> &Address { &self.author }

    /// Get the transactions root field of the header.
    pub fn transactions_root(&self) -> &H256 { &self.transactions_root }

    /// Get the uncles root field of the header.
    pub fn uncles_root(&self) -> &H256 { &self.uncles_root }

    /// Get the state root field of the header.
    pub fn state_root(&self) -> &H256 { &self.state_root }

    /// Get the difficulty field of the header.
    pub fn difficulty(&self) -> &U256 { &self.difficulty }

    /// Get the nonce field of the header.
    pub fn nonce(&self) -> u64 { self.nonce }

    /// Set the nonce field of the header.
    pub fn set_nonce(&mut self, nonce: u64) {
        self.nonce = nonce;
        self.hash = None;
    }

    /// Set the timestamp field of the header.
    pub fn set_timestamp(&mut self, timestamp: u64) {
        self.timestamp = timestamp;
        self.hash = None;
    }

    /// Set the transactions root field of the header.
    pub fn set_transactions_root(&mut self, transactions_root: H256) {
        self.transactions_root = transactions_root;
        self.hash = None;
    }

    /// Set the uncles root field of the header.
    pub fn set_uncles_root(&mut self, uncles_root: H256) {
        self.uncles_root = uncles_root;
        self.hash = None;
    }

    /// Set the state root field of the header.
    pub fn set_state_root(&mut self, state_root: H256) {
        self.state_root = state_root;
        self.hash = None;
    }

    /// Compute the hash of the block and memoize it.
    pub fn compute_hash(&mut self) -> H256 {
        let hash = self.hash();
        self.hash = Some(hash);
        hash
    }

    /// Get the hash of the block.
    pub fn hash(&self) -> H256 {
        self.hash.unwrap_or_else(|| keccak(self.rlp()))
    }

    /// Get the hash of the PoW problem: the header with the nonce left out.
    pub fn problem_hash(&self) -> H256 { keccak(self.rlp_without_nonce()) }

    /// Get the RLP representation of this header(except nonce).
    pub fn rlp_without_nonce(&self) -> Bytes {
        let mut stream = RlpStream::new();
        self.stream_rlp_without_nonce(&mut stream);
        stream.out().to_vec()
    }

    /// Get the RLP representation of this header.
    pub fn rlp(&self) -> Bytes {
        let mut stream = RlpStream::new();
        self.stream_rlp(&mut stream);
        stream.out().to_vec()
    }

    /// Place this header(except nonce) into an RLP stream `stream`.
    fn stream_rlp_without_nonce(&self, stream: &mut RlpStream) {
        stream
            .begin_list(8)
            .append(&self.parent_hash)
            .append(&self.timestamp)
            .append(&self.number)
            .append(&self.author)
            .append(&self.transactions_root)
            .append(&self.uncles_root)
            .append(&self.state_root)
            .append(&self.difficulty);
    }

    /// Place this header into an RLP stream `stream`.
    fn stream_rlp(&self, stream: &mut RlpStream) {
        stream
            .begin_list(9)
            .append(&self.parent_hash)
            .append(&self.timestamp)
            .append(&self.number)
            .append(&self.author)
            .append(&self.transactions_root)
            .append(&self.uncles_root)
            .append(&self.state_root)
            .append(&self.difficulty)
            .append(&self.nonce);
    }
}

pub struct BlockHeaderBuilder {
    parent_hash: H256,
    timestamp: u64,
    number: BlockNumber,
    author: Address,
    transactions_root: H256,
    uncles_root: H256,
    state_root: H256,
    difficulty: U256,
    nonce: u64,
}

impl BlockHeaderBuilder {
    pub fn new() -> Self {
        Self {
            parent_hash: H256::default(),
            timestamp: 0,
            number: 0,
            author: Address::default(),
            transactions_root: KECCAK_NULL_RLP,
            uncles_root: KECCAK_NULL_RLP,
            state_root: KECCAK_NULL_RLP,
            difficulty: U256::default(),
            nonce: 0,
        }
    }

    pub fn with_parent_hash(&mut self, parent_hash: H256) -> &mut Self {
        self.parent_hash = parent_hash;
        self
    }

    pub fn with_timestamp(&mut self, timestamp: u64) -> &mut Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_number(&mut self, number: BlockNumber) -> &mut Self {
        self.number = number;
        self
    }

    pub fn with_author(&mut self, author: Address) -> &mut Self {
        self.author = author;
        self
    }

    pub fn with_transactions_root(
        &mut self, transactions_root: H256,
    ) -> &mut Self {
        self.transactions_root = transactions_root;
        self
    }

    pub fn with_uncles_root(&mut self, uncles_root: H256) -> &mut Self {
        self.uncles_root = uncles_root;
        self
    }

    pub fn with_state_root(&mut self, state_root: H256) -> &mut Self {
        self.state_root = state_root;
        self
    }

    pub fn with_difficulty(&mut self, difficulty: U256) -> &mut Self {
        self.difficulty = difficulty;
        self
    }

    pub fn with_nonce(&mut self, nonce: u64) -> &mut Self {
        self.nonce = nonce;
        self
    }

    pub fn build(&self) -> BlockHeader {
        BlockHeader {
            parent_hash: self.parent_hash,
            timestamp: self.timestamp,
            number: self.number,
            author: self.author,
            transactions_root: self.transactions_root,
            uncles_root: self.uncles_root,
            state_root: self.state_root,
            difficulty: self.difficulty,
            hash: None,
            nonce: self.nonce,
        }
    }
}

impl Encodable for BlockHeader {
    fn rlp_append(&self, stream: &mut RlpStream) { self.stream_rlp(stream); }
}

impl Decodable for BlockHeader {
    fn decode(r: &Rlp) -> Result<Self, DecoderError> {
        Ok(BlockHeader {
            parent_hash: r.val_at(0)?,
            timestamp: r.val_at(1)?,
            number: r.val_at(2)?,
            author: r.val_at(3)?,
            transactions_root: r.val_at(4)?,
            uncles_root: r.val_at(5)?,
            state_root: r.val_at(6)?,
            difficulty: r.val_at(7)?,
            nonce: r.val_at(8)?,
            hash: keccak(r.as_raw()).into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{BlockHeader, BlockHeaderBuilder};
    use ethereum_types::{Address, H256, U256};

    #[test]
    fn header_hash_round_trip() {
        let mut header = BlockHeaderBuilder::new()
            .with_parent_hash(H256::from_low_u64_be(1))
            .with_timestamp(100)
            .with_number(7)
            .with_author(Address::from_low_u64_be(0xcc))
            .with_difficulty(U256::from(10))
            .with_nonce(42)
            .build();
        let hash = header.compute_hash();

        let decoded: BlockHeader = rlp::decode(&header.rlp()).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(decoded.hash(), hash);
    }

    #[test]
    fn sealing_invalidates_memoized_hash() {
        let mut header = BlockHeaderBuilder::new()
            .with_timestamp(5)
            .with_number(1)
            .build();
        let unsealed = header.compute_hash();
        header.set_nonce(99);
        assert_ne!(header.hash(), unsealed);
    }

    #[test]
    fn problem_hash_ignores_nonce() {
        let mut header = BlockHeaderBuilder::new().with_number(3).build();
        let problem = header.problem_hash();
        header.set_nonce(1234);
        assert_eq!(header.problem_hash(), problem);
        assert_ne!(header.hash(), problem);
    }
}
