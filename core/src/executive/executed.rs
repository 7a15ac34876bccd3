use bytes::Bytes;
use ethereum_types::{Address, U256};

/// The accounted outcome of one executed transaction.
///
/// Running out of gas is an outcome, not an error: the transaction still
/// charged its fee and advanced the sender's nonce, the action's effects
/// were reverted, and `out_of_gas` is set.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Executed {
    /// Gas left over from the action's allowance.
    pub gas_left: U256,
    /// Return data of a call, empty for creations.
    pub output: Bytes,
    /// Address of the deployed contract for creations.
    pub contract_address: Option<Address>,
    /// True when the action itself failed with an out-of-gas.
    pub out_of_gas: bool,
}

pub type ExecutionResult = crate::error::Result<Executed>;
