use crate::primitives::{BlockNumber, Difficulty, Gas, U256};

pub const GENESIS_BLOCK_NUMBER: BlockNumber = 0;
pub const GENESIS_DIFFICULTY: Difficulty = U256([131_072, 0, 0, 0]);
pub const GENESIS_GAS_LIMIT: Gas = 3_141_592;

pub const DIFFICULTY_ADJUSTMENT_DENOMINATOR: u64 = 2048;
pub const DIFFICULTY_MINIMUM: Difficulty = U256([131_072, 0, 0, 0]);
pub const BOMB_EXPONENTIAL_PERIOD: BlockNumber = 100_000;
pub const BOMB_EXPONENTIAL_FREE_PERIODS: u64 = 2;

pub const GAS_LIMIT_ADJUSTMENT_FACTOR: Gas = 1024;
pub const GAS_LIMIT_MINIMUM: Gas = 5000;
pub const GAS_LIMIT_MAXIMUM: Gas = 0x7fff_ffff_ffff_ffff;

pub const MAX_EXTRA_DATA_LENGTH: usize = 32;
pub const MAX_UNCLES: usize = 2;
pub const MAX_UNCLE_DEPTH: usize = 6;

pub const TX_GAS: Gas = 21_000;
pub const TX_DATA_ZERO_GAS: Gas = 4;
