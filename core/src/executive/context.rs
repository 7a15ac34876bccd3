use super::executive::Executive;
use crate::{
    error::Result,
    state::State,
    vm::{EnvInfo, Ext},
    vm_factory::VmFactory,
};
use bytes::Bytes;
use ethereum_types::{Address, H256, U256};

/// The window one running action sees onto the world. Nested actions go
/// back through a child `Executive` at one greater depth, acting as the
/// executing account.
pub struct Context<'a> {
    state: &'a mut State,
    env: &'a EnvInfo,
    machine: &'a VmFactory,
    /// The account the current code runs as.
    address: Address,
    origin: Address,
    gas_price: U256,
    depth: usize,
}

impl<'a> Context<'a> {
    pub fn new(
        state: &'a mut State, env: &'a EnvInfo, machine: &'a VmFactory,
        address: Address, origin: Address, gas_price: U256, depth: usize,
    ) -> Self
    {
        Context {
            state,
            env,
            machine,
            address,
            origin,
            gas_price,
            depth,
        }
    }
}

impl<'a> Ext for Context<'a> {
    fn balance(&self, address: &Address) -> Result<U256> {
        self.state.balance(address)
    }

    fn add_balance(
        &mut self, address: &Address, by: &U256,
    ) -> Result<()> {
        self.state.add_balance(address, by)
    }

    fn sub_balance(
        &mut self, address: &Address, by: &U256,
    ) -> Result<()> {
        self.state.sub_balance(address, by)
    }

    fn storage_at(&self, key: &H256) -> Result<U256> {
        self.state.storage_at(&self.address, key)
    }

    fn set_storage(&mut self, key: H256, value: U256) -> Result<()> {
        self.state.set_storage(&self.address, key, value)
    }

    fn code(&self, address: &Address) -> Result<Bytes> {
        self.state.code(address)
    }

    fn create(
        &mut self, gas: &mut U256, value: &U256, code: &[u8],
    ) -> Result<Address> {
        let sender = self.address;
        let origin = self.origin;
        let gas_price = self.gas_price;
        Executive::from_parent(self.state, self.env, self.machine, self.depth)
            .create(&sender, value, &gas_price, gas, code, &origin)
    }

    fn call(
        &mut self, gas: &mut U256, target: &Address, value: &U256,
        data: &[u8], output: &mut Bytes,
    ) -> Result<bool>
    {
        let sender = self.address;
        let origin = self.origin;
        let gas_price = self.gas_price;
        Executive::from_parent(self.state, self.env, self.machine, self.depth)
            .call(target, &sender, value, &gas_price, data, gas, output, &origin)
    }
}
