use std::sync::Arc;

use derive_more::Constructor;
use hashing::EMPTY_LIST_HASH;
use types::{
    containers::{BlockHeader, ReceiptOutcome},
    nonstandard::Fork,
    primitives::{BlockNumber, Difficulty, Gas, UnixSeconds, Wei, U256},
};

use crate::{
    difficulty, frontier::TX_DATA_NON_ZERO_GAS_FRONTIER, seal::SealEngine, state::AccountState,
    vm::VirtualMachine,
};

pub const BYZANTIUM_BLOCK_REWARD: Wei = U256([3_000_000_000_000_000_000, 0, 0, 0]);
pub const CONSTANTINOPLE_BLOCK_REWARD: Wei = U256([2_000_000_000_000_000_000, 0, 0, 0]);
pub const TX_DATA_NON_ZERO_GAS_ISTANBUL: Gas = 16;

const DIFFICULTY_ADJUSTMENT_CUTOFF: UnixSeconds = 9;
const MAX_DIFFICULTY_DECREASE_FACTOR: i64 = 99;

/// Rules of Byzantium and the forks that followed it up to Muir Glacier.
///
/// Receipts carry a status instead of an intermediate state root.
/// Later forks delay the difficulty bomb further, lower the block reward
/// and (from Istanbul on) make non-zero calldata cheaper.
#[derive(Constructor)]
pub struct ByzantiumVm {
    fork: Fork,
    seal_engine: Arc<dyn SealEngine>,
}

impl ByzantiumVm {
    #[must_use]
    pub const fn bomb_delay(&self) -> BlockNumber {
        match self.fork {
            Fork::Frontier | Fork::Homestead | Fork::TangerineWhistle | Fork::SpuriousDragon => 0,
            Fork::Byzantium => 3_000_000,
            Fork::Constantinople | Fork::Petersburg | Fork::Istanbul => 5_000_000,
            Fork::MuirGlacier => 9_000_000,
        }
    }
}

impl VirtualMachine for ByzantiumVm {
    fn fork(&self) -> Fork {
        self.fork
    }

    fn seal_engine(&self) -> &dyn SealEngine {
        self.seal_engine.as_ref()
    }

    fn compute_difficulty(&self, parent: &BlockHeader, timestamp: UnixSeconds) -> Difficulty {
        let base: i64 = if parent.uncles_hash == EMPTY_LIST_HASH {
            1
        } else {
            2
        };

        let periods = difficulty::elapsed_periods(parent, timestamp, DIFFICULTY_ADJUSTMENT_CUTOFF);
        let factor = base
            .saturating_sub(periods)
            .max(-MAX_DIFFICULTY_DECREASE_FACTOR);

        let difficulty = difficulty::adjust(parent, factor);

        difficulty::add_bomb(difficulty, parent.number.saturating_add(1), self.bomb_delay())
    }

    fn block_reward(&self) -> Wei {
        if self.fork == Fork::Byzantium {
            BYZANTIUM_BLOCK_REWARD
        } else {
            CONSTANTINOPLE_BLOCK_REWARD
        }
    }

    fn non_zero_data_byte_gas(&self) -> Gas {
        if self.fork >= Fork::Istanbul {
            TX_DATA_NON_ZERO_GAS_ISTANBUL
        } else {
            TX_DATA_NON_ZERO_GAS_FRONTIER
        }
    }

    fn clears_empty_accounts(&self) -> bool {
        true
    }

    fn receipt_outcome(&self, _state: &AccountState) -> ReceiptOutcome {
        ReceiptOutcome::Status(true)
    }
}
