//! Protocol constants: the gas fee schedule, mining rewards and difficulty
//! bootstrap values.

/// Gas charged per byte of transaction payload.
pub const TX_DATA_GAS: u64 = 5;
/// Base gas charged for a contract-creating transaction.
pub const CREATE_GAS: u64 = 100;
/// Base gas charged for a message-call transaction.
pub const CALL_GAS: u64 = 20;

/// Reward credited to a block author, in the smallest currency unit.
pub const BLOCK_REWARD: u64 = 1_500_000_000_000_000_000;

/// Difficulty of the genesis block.
pub const GENESIS_DIFFICULTY: u64 = 1 << 22;
/// Genesis difficulty when the test-mode PoW config is selected.
pub const TEST_DIFFICULTY: u64 = 10;
