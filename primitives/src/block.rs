use crate::{BlockHeader, Transaction};
use ethereum_types::{H256, U256};
use hash::keccak;
use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};

/// A block, encoded as it is on the block chain: a sealed header plus the
/// transaction and uncle bodies it commits to.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct Block {
    /// The header of this block.
    pub block_header: BlockHeader,
    /// The transactions in this block.
    pub transactions: Vec<Transaction>,
    /// The uncle headers referenced by this block.
    pub uncles: Vec<BlockHeader>,
}

impl Block {
    pub fn hash(&self) -> H256 { self.block_header.hash() }

    pub fn total_gas(&self) -> U256 {
        let mut sum = U256::from(0);
        for t in &self.transactions {
            sum += t.gas;
        }
        sum
    }

    pub fn transaction_hashes(&self) -> Vec<H256> {
        self.transactions
            .iter()
            .map(|tx| tx.hash())
            .collect::<Vec<_>>()
    }

    /// Hash of the RLP list of transactions, as committed to by the header.
    pub fn transactions_root(&self) -> H256 {
        let mut stream = RlpStream::new_list(self.transactions.len());
        for tx in &self.transactions {
            stream.append(tx);
        }
        keccak(stream.out())
    }

    /// Hash of the RLP list of uncle headers, as committed to by the header.
    pub fn uncles_root(&self) -> H256 {
        let mut stream = RlpStream::new_list(self.uncles.len());
        for uncle in &self.uncles {
            stream.append(uncle);
        }
        keccak(stream.out())
    }
}

impl Encodable for Block {
    fn rlp_append(&self, stream: &mut RlpStream) {
        stream.begin_list(3).append(&self.block_header);
        stream.begin_list(self.transactions.len());
        for tx in &self.transactions {
            stream.append(tx);
        }
        stream.begin_list(self.uncles.len());
        for uncle in &self.uncles {
            stream.append(uncle);
        }
    }
}

impl Decodable for Block {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        if rlp.as_raw().len() != rlp.payload_info()?.total() {
            return Err(DecoderError::RlpIsTooBig);
        }
        if rlp.item_count()? != 3 {
            return Err(DecoderError::RlpIncorrectListLen);
        }

        Ok(Block {
            block_header: rlp.val_at(0)?,
            transactions: rlp.list_at(1)?,
            uncles: rlp.list_at(2)?,
        })
    }
}
