use std::sync::Arc;

use derive_more::Constructor;
use types::{
    containers::{BlockHeader, ReceiptOutcome},
    nonstandard::Fork,
    primitives::{Difficulty, Gas, UnixSeconds, Wei},
};

use crate::{
    difficulty,
    frontier::{FRONTIER_BLOCK_REWARD, TX_DATA_NON_ZERO_GAS_FRONTIER},
    seal::SealEngine,
    state::AccountState,
    vm::VirtualMachine,
};

const DIFFICULTY_ADJUSTMENT_CUTOFF: UnixSeconds = 10;
const MAX_DIFFICULTY_DECREASE_FACTOR: i64 = 99;

/// Rules of Homestead, Tangerine Whistle and Spurious Dragon.
///
/// The forks differ only in gas costs of opcodes, which are not modeled,
/// and in the removal of empty accounts introduced by Spurious Dragon.
#[derive(Constructor)]
pub struct HomesteadVm {
    fork: Fork,
    seal_engine: Arc<dyn SealEngine>,
}

impl VirtualMachine for HomesteadVm {
    fn fork(&self) -> Fork {
        self.fork
    }

    fn seal_engine(&self) -> &dyn SealEngine {
        self.seal_engine.as_ref()
    }

    fn compute_difficulty(&self, parent: &BlockHeader, timestamp: UnixSeconds) -> Difficulty {
        let periods = difficulty::elapsed_periods(parent, timestamp, DIFFICULTY_ADJUSTMENT_CUTOFF);
        let factor = 1_i64
            .saturating_sub(periods)
            .max(-MAX_DIFFICULTY_DECREASE_FACTOR);

        let difficulty = difficulty::adjust(parent, factor);

        difficulty::add_bomb(difficulty, parent.number.saturating_add(1), 0)
    }

    fn block_reward(&self) -> Wei {
        FRONTIER_BLOCK_REWARD
    }

    fn non_zero_data_byte_gas(&self) -> Gas {
        TX_DATA_NON_ZERO_GAS_FRONTIER
    }

    fn clears_empty_accounts(&self) -> bool {
        self.fork >= Fork::SpuriousDragon
    }

    fn receipt_outcome(&self, state: &AccountState) -> ReceiptOutcome {
        ReceiptOutcome::StateRoot(state.state_root())
    }
}
