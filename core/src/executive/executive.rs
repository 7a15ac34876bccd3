use super::{context::Context, executed::Executed, ExecutionResult};
use crate::{
    error::{ErrorKind, Result},
    parameters::{CALL_GAS, CREATE_GAS, TX_DATA_GAS},
    state::State,
    vm::{self, ActionParams, EnvInfo},
    vm_factory::VmFactory,
};
use bytes::Bytes;
use ethereum_types::{Address, U256, U512};
use hash::keccak;
use primitives::{Action, Transaction};
use rlp::RlpStream;

/// The address a contract deploys to, derived from the creator and the
/// account nonce the creating action ran under.
pub fn contract_address(sender: &Address, nonce: &U256) -> Address {
    let mut stream = RlpStream::new_list(2);
    stream.append(sender);
    stream.append(nonce);
    Address::from_slice(&keccak(stream.as_raw()).as_bytes()[12..])
}

/// Drives one transaction, and recursively its nested actions, against a
/// `State`.
pub struct Executive<'a> {
    state: &'a mut State,
    env: &'a EnvInfo,
    machine: &'a VmFactory,
    depth: usize,
}

impl<'a> Executive<'a> {
    pub fn new(
        state: &'a mut State, env: &'a EnvInfo, machine: &'a VmFactory,
    ) -> Self {
        Executive {
            state,
            env,
            machine,
            depth: 0,
        }
    }

    pub(crate) fn from_parent(
        state: &'a mut State, env: &'a EnvInfo, machine: &'a VmFactory,
        parent_depth: usize,
    ) -> Self
    {
        Executive {
            state,
            env,
            machine,
            depth: parent_depth + 1,
        }
    }

    /// Validate, charge and run one top-level transaction.
    ///
    /// Rejections leave the state untouched. Once a transaction is charged
    /// it is part of the pending block even when its action runs out of
    /// gas; that failure comes back in `Executed`, not as an error.
    pub fn transact(&mut self, t: &Transaction) -> ExecutionResult {
        let hash = t.hash();
        if self.state.transaction_is_pending(&hash) {
            bail!(ErrorKind::DuplicateTransaction(hash));
        }
        let expected = self.state.transactions_from(&t.sender)?;
        if t.nonce != expected {
            bail!(ErrorKind::InvalidNonce(expected, t.nonce));
        }

        let base_gas = match t.action {
            Action::Create => CREATE_GAS,
            Action::Call(_) => CALL_GAS,
        };
        let gas_total = U256::from(base_gas)
            + U256::from(TX_DATA_GAS) * U256::from(t.data.len())
            + t.gas;
        let required = gas_total.full_mul(t.gas_price) + U512::from(t.value);
        let balance = self.state.balance(&t.sender)?;
        if U512::from(balance) < required {
            bail!(ErrorKind::InsufficientBalance(t.sender, required, balance));
        }
        // Affordability was proven against the full-width product, so the
        // narrow multiply cannot overflow.
        let fee = gas_total * t.gas_price;

        self.state.note_sending(&t.sender)?;
        self.state.append_pending(t.clone());

        self.state.sub_balance(&t.sender, &fee)?;
        let author = self.env.author;
        self.state.add_balance(&author, &fee)?;

        let mut gas = t.gas;
        match t.action {
            Action::Create => {
                let (address, completed) = self.create_impl(
                    &t.sender,
                    &t.value,
                    &t.gas_price,
                    &mut gas,
                    &t.data,
                    &t.sender,
                )?;
                Ok(Executed {
                    gas_left: gas,
                    output: Bytes::new(),
                    contract_address: Some(address),
                    out_of_gas: !completed,
                })
            }
            Action::Call(ref target) => {
                let mut output = Bytes::new();
                let completed = self.call(
                    target,
                    &t.sender,
                    &t.value,
                    &t.gas_price,
                    &t.data,
                    &mut gas,
                    &mut output,
                    &t.sender,
                )?;
                Ok(Executed {
                    gas_left: gas,
                    output,
                    contract_address: None,
                    out_of_gas: !completed,
                })
            }
        }
    }

    fn transfer(
        &mut self, from: &Address, to: &Address, value: &U256,
    ) -> Result<()> {
        self.state.sub_balance(from, value)?;
        self.state.add_balance(to, value)
    }

    /// Deploy under the derived address, endowed with `endowment`, and run
    /// the initialization code. Returns the address and whether
    /// initialization completed; an incomplete one left no trace.
    fn create_impl(
        &mut self, sender: &Address, endowment: &U256, gas_price: &U256,
        gas: &mut U256, code: &[u8], origin: &Address,
    ) -> Result<(Address, bool)>
    {
        // The creating action already advanced the sender's nonce.
        let nonce = self
            .state
            .transactions_from(sender)?
            .saturating_sub(U256::one());
        let address = contract_address(sender, &nonce);

        self.state.checkpoint();
        if let Err(e) = self.transfer(sender, &address, endowment) {
            self.state.revert_to_checkpoint();
            return Err(e);
        }

        let params = ActionParams {
            address,
            sender: *sender,
            origin: *origin,
            gas: *gas,
            gas_price: *gas_price,
            value: *endowment,
            code: code.to_vec(),
            data: Bytes::new(),
        };
        let machine = self.machine.create(params, self.depth);
        let outcome = {
            let mut context = Context::new(
                self.state, self.env, self.machine, address, *origin,
                *gas_price, self.depth,
            );
            machine.exec(&mut context)
        };
        match outcome {
            Ok(result) => {
                *gas = result.gas_left;
                self.state.set_code(&address, result.data)?;
                self.state.discard_checkpoint();
                Ok((address, true))
            }
            Err(vm::Error::OutOfGas) => {
                *gas = U256::zero();
                self.state.revert_to_checkpoint();
                Ok((address, false))
            }
            Err(vm::Error::Internal(message)) => {
                self.state.revert_to_checkpoint();
                Err(message.into())
            }
        }
    }

    /// `create_impl` for callers that only need the address.
    pub fn create(
        &mut self, sender: &Address, endowment: &U256, gas_price: &U256,
        gas: &mut U256, code: &[u8], origin: &Address,
    ) -> Result<Address>
    {
        self.create_impl(sender, endowment, gas_price, gas, code, origin)
            .map(|(address, _)| address)
    }

    /// Transfer `value` and run the target's code if it has any. Returns
    /// whether the action completed within its gas.
    pub fn call(
        &mut self, target: &Address, sender: &Address, value: &U256,
        gas_price: &U256, data: &[u8], gas: &mut U256, output: &mut Bytes,
        origin: &Address,
    ) -> Result<bool>
    {
        self.state.checkpoint();
        if let Err(e) = self.transfer(sender, target, value) {
            self.state.revert_to_checkpoint();
            return Err(e);
        }

        let code = match self.state.code(target) {
            Ok(code) => code,
            Err(e) => {
                self.state.revert_to_checkpoint();
                return Err(e);
            }
        };
        if code.is_empty() {
            self.state.discard_checkpoint();
            return Ok(true);
        }

        let params = ActionParams {
            address: *target,
            sender: *sender,
            origin: *origin,
            gas: *gas,
            gas_price: *gas_price,
            value: *value,
            code,
            data: data.to_vec(),
        };
        let machine = self.machine.create(params, self.depth);
        let outcome = {
            let mut context = Context::new(
                self.state, self.env, self.machine, *target, *origin,
                *gas_price, self.depth,
            );
            machine.exec(&mut context)
        };
        match outcome {
            Ok(result) => {
                *gas = result.gas_left;
                *output = result.data;
                self.state.discard_checkpoint();
                Ok(true)
            }
            Err(vm::Error::OutOfGas) => {
                *gas = U256::zero();
                self.state.revert_to_checkpoint();
                Ok(false)
            }
            Err(vm::Error::Internal(message)) => {
                self.state.revert_to_checkpoint();
                Err(message.into())
            }
        }
    }
}
