#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;

extern crate ethereum_types;
extern crate keccak_hash as hash;
extern crate parity_bytes as bytes;
extern crate parking_lot;
extern crate primitives;
extern crate rand;
extern crate rlp;

pub mod error;
pub mod executive;
pub mod genesis;
pub mod ledger;
pub mod parameters;
pub mod pow;
pub mod state;
pub mod statedb;
pub mod storage;
pub mod transaction_pool;
pub mod verification;
pub mod vm;
pub mod vm_factory;

pub use crate::{
    error::{Error, ErrorKind, Result},
    executive::{contract_address, Executed, Executive},
    ledger::{BestBlock, BlockDetails, Ledger, LedgerInfo, SharedLedger},
    pow::{MineInfo, ProofOfWorkProblem, ProofOfWorkSolution},
    state::{PlaybackPhase, State},
    storage::{SharedTrieStorage, TrieStorage},
    transaction_pool::{SharedTransactionPool, TransactionPool},
    verification::VerificationConfig,
    vm_factory::VmFactory,
};
