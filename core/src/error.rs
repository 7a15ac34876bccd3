use crate::{statedb, storage};
use ethereum_types::{Address, H256, U256, U512};
use rlp::DecoderError;

error_chain! {
    links {
        StateDb(statedb::Error, statedb::ErrorKind);
        Storage(storage::Error, storage::ErrorKind);
    }

    foreign_links {
        Decoder(DecoderError);
    }

    errors {
        InsufficientBalance(address: Address, required: U512, got: U256) {
            description("insufficient balance")
            display(
                "address {:?} has balance {} but needs {}",
                address, got, required
            )
        }

        ArithmeticOverflow {
            description("arithmetic overflow")
            display("balance arithmetic overflowed")
        }

        InvalidNonce(expected: U256, got: U256) {
            description("invalid transaction nonce")
            display("transaction nonce {} does not match expected {}", got, expected)
        }

        DuplicateTransaction(hash: H256) {
            description("duplicate transaction")
            display("transaction {:?} is already pending", hash)
        }

        HeaderInconsistency(reason: String) {
            description("inconsistent block header")
            display("inconsistent block header: {}", reason)
        }

        BadUncle(hash: H256, reason: String) {
            description("invalid uncle header")
            display("uncle {:?} rejected: {}", hash, reason)
        }

        RootMismatch(expected: H256, got: H256) {
            description("state root mismatch")
            display(
                "block commits to state root {:?} but replay produced {:?}",
                expected, got
            )
        }

        InvalidTransactionsRoot(expected: H256, got: H256) {
            description("invalid transactions root")
            display(
                "header commits to transactions root {:?} but body hashes to {:?}",
                expected, got
            )
        }
    }
}
