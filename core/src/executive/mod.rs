mod context;
mod executed;
mod executive;

pub use self::{
    executed::{Executed, ExecutionResult},
    executive::{contract_address, Executive},
};
