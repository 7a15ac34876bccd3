extern crate ethereum_types;
extern crate keccak_hash as hash;
extern crate parity_bytes as bytes;
extern crate rlp;

pub type BlockNumber = u64;

pub mod account;
pub mod block;
pub mod block_header;
pub mod transaction;

pub use account::Account;
pub use block::Block;
pub use block_header::{BlockHeader, BlockHeaderBuilder};
pub use transaction::{Action, Transaction};
