use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use hash::keccak;
use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};

/// Receiver of a transaction: a message call to an existing address, or the
/// creation of a new contract account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Create a contract whose init code is the transaction payload.
    Create,
    /// Call the given address with the transaction payload as input.
    Call(Address),
}

impl Default for Action {
    fn default() -> Action { Action::Create }
}

impl Encodable for Action {
    fn rlp_append(&self, s: &mut RlpStream) {
        // One item in the enclosing list; the outer append does the noting.
        match *self {
            Action::Create => s.append_internal(&""),
            Action::Call(ref address) => s.append_internal(address),
        };
    }
}

impl Decodable for Action {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        if rlp.is_empty() {
            if rlp.is_data() {
                Ok(Action::Create)
            } else {
                Err(DecoderError::RlpExpectedToBeData)
            }
        } else {
            Ok(Action::Call(rlp.as_val()?))
        }
    }
}

#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Nonce: count of transactions already sent by the sender.
    pub nonce: U256,
    /// Gas price.
    pub gas_price: U256,
    /// Gas paid up front for transaction execution.
    pub gas: U256,
    /// Call an existing contract or create a new one.
    pub action: Action,
    /// Transferred value.
    pub value: U256,
    /// Input data for calls, init code for creations.
    pub data: Bytes,
    /// Sender's address.
    pub sender: Address,
}

impl Transaction {
    pub fn hash(&self) -> H256 {
        let mut s = RlpStream::new();
        s.append(self);
        keccak(s.as_raw())
    }

    pub fn receiver(&self) -> Option<Address> {
        match self.action {
            Action::Create => None,
            Action::Call(address) => Some(address),
        }
    }
}

impl Decodable for Transaction {
    fn decode(r: &Rlp) -> Result<Self, DecoderError> {
        if r.item_count()? != 7 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        Ok(Transaction {
            nonce: r.val_at(0)?,
            gas_price: r.val_at(1)?,
            gas: r.val_at(2)?,
            action: r.val_at(3)?,
            value: r.val_at(4)?,
            data: r.val_at(5)?,
            sender: r.val_at(6)?,
        })
    }
}

impl Encodable for Transaction {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(7);
        s.append(&self.nonce);
        s.append(&self.gas_price);
        s.append(&self.gas);
        s.append(&self.action);
        s.append(&self.value);
        s.append(&self.data);
        s.append(&self.sender);
    }
}

#[cfg(test)]
mod tests {
    use super::{Action, Transaction};
    use ethereum_types::{Address, U256};
    use rlp::Rlp;

    #[test]
    fn action_round_trip() {
        let create = rlp::encode(&Action::Create);
        assert_eq!(rlp::decode::<Action>(&create).unwrap(), Action::Create);

        let target = Address::from_low_u64_be(0x1234);
        let call = rlp::encode(&Action::Call(target));
        assert_eq!(rlp::decode::<Action>(&call).unwrap(), Action::Call(target));
    }

    #[test]
    fn transaction_round_trip() {
        let tx = Transaction {
            nonce: U256::from(3),
            gas_price: U256::from(1),
            gas: U256::from(50_000),
            action: Action::Call(Address::from_low_u64_be(0xbb)),
            value: U256::from(100),
            data: vec![0xde, 0xad],
            sender: Address::from_low_u64_be(0xaa),
        };
        let encoded = rlp::encode(&tx);
        let decoded: Transaction = rlp::decode(&encoded).unwrap();
        assert_eq!(decoded, tx);
        assert_eq!(decoded.hash(), tx.hash());
    }

    #[test]
    fn transaction_encoding_stays_inside_one_seven_item_list() {
        let mut tx = Transaction {
            nonce: U256::from(3),
            gas_price: U256::from(1),
            gas: U256::from(50_000),
            action: Action::Create,
            value: U256::from(100),
            data: vec![0xde, 0xad],
            sender: Address::from_low_u64_be(0xaa),
        };
        for action in
            vec![Action::Create, Action::Call(Address::from_low_u64_be(0xbb))]
        {
            tx.action = action;
            let encoded = rlp::encode(&tx);
            let rlp = Rlp::new(&encoded);
            assert_eq!(rlp.item_count().unwrap(), 7);
            // No byte may trail the declared payload.
            assert_eq!(rlp.payload_info().unwrap().total(), encoded.len());
        }
    }

    #[test]
    fn transaction_rejects_short_list() {
        let mut s = rlp::RlpStream::new_list(2);
        s.append(&U256::from(1)).append(&U256::from(2));
        let bytes = s.out();
        assert!(Rlp::new(&bytes).as_val::<Transaction>().is_err());
    }
}
