//! The seam between state transition and contract execution. Everything a
//! running machine may do to the world goes through the `Ext` capability
//! trait; machines themselves sit behind `Exec` so the engine never depends
//! on a concrete interpreter.

use crate::error::Result as EngineResult;
use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use primitives::BlockNumber;

/// Block-level facts execution runs under.
#[derive(Debug, Default, Clone)]
pub struct EnvInfo {
    pub number: BlockNumber,
    pub author: Address,
    pub timestamp: u64,
    pub difficulty: U256,
}

/// Everything needed to launch one code run.
#[derive(Debug, Default, Clone)]
pub struct ActionParams {
    /// The account the code runs as: the callee for calls, the new account
    /// for creations.
    pub address: Address,
    pub sender: Address,
    /// Account that started the outermost transaction.
    pub origin: Address,
    pub gas: U256,
    pub gas_price: U256,
    pub value: U256,
    pub code: Bytes,
    pub data: Bytes,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    /// The budget in `ActionParams::gas` ran out. Not fatal to the engine:
    /// the enclosing action reverts and reports failure.
    OutOfGas,
    /// An engine-side failure surfaced inside the machine.
    Internal(String),
}

impl From<crate::error::Error> for Error {
    fn from(e: crate::error::Error) -> Self { Error::Internal(e.to_string()) }
}

pub type Result<T> = ::std::result::Result<T, Error>;

/// What a finished run hands back.
#[derive(Debug, Default, PartialEq)]
pub struct GasLeft {
    pub gas_left: U256,
    pub data: Bytes,
}

/// One executable machine instance, consumed by running it.
pub trait Exec {
    fn exec(self: Box<Self>, ext: &mut dyn Ext) -> Result<GasLeft>;
}

/// The narrow world surface a running machine is granted.
pub trait Ext {
    fn balance(&self, address: &Address) -> EngineResult<U256>;

    fn add_balance(&mut self, address: &Address, by: &U256)
        -> EngineResult<()>;

    fn sub_balance(&mut self, address: &Address, by: &U256)
        -> EngineResult<()>;

    /// Read a word of the executing account's storage.
    fn storage_at(&self, key: &H256) -> EngineResult<U256>;

    /// Write a word of the executing account's storage. Zero marks the slot
    /// for deletion at commit.
    fn set_storage(&mut self, key: H256, value: U256) -> EngineResult<()>;

    fn code(&self, address: &Address) -> EngineResult<Bytes>;

    /// Create a nested contract, acting as the executing account.
    fn create(
        &mut self, gas: &mut U256, value: &U256, code: &[u8],
    ) -> EngineResult<Address>;

    /// Call out of the executing account. Returns false when the callee ran
    /// out of gas.
    fn call(
        &mut self, gas: &mut U256, target: &Address, value: &U256,
        data: &[u8], output: &mut Bytes,
    ) -> EngineResult<bool>;
}

/// Placeholder machine: accepts any code, runs no instructions, burns no
/// gas.
pub struct NoopVm {
    params: ActionParams,
}

impl NoopVm {
    pub fn new(params: ActionParams) -> Self { NoopVm { params } }
}

impl Exec for NoopVm {
    fn exec(self: Box<Self>, _ext: &mut dyn Ext) -> Result<GasLeft> {
        Ok(GasLeft {
            gas_left: self.params.gas,
            data: Bytes::new(),
        })
    }
}
