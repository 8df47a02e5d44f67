use std::sync::Arc;

use derive_more::Constructor;
use types::{
    containers::{BlockHeader, ReceiptOutcome},
    nonstandard::Fork,
    primitives::{Difficulty, Gas, UnixSeconds, Wei, U256},
};

use crate::{difficulty, seal::SealEngine, state::AccountState, vm::VirtualMachine};

pub const FRONTIER_BLOCK_REWARD: Wei = U256([5_000_000_000_000_000_000, 0, 0, 0]);
pub const TX_DATA_NON_ZERO_GAS_FRONTIER: Gas = 68;

const DIFFICULTY_ADJUSTMENT_CUTOFF: UnixSeconds = 13;

#[derive(Constructor)]
pub struct FrontierVm {
    seal_engine: Arc<dyn SealEngine>,
}

impl VirtualMachine for FrontierVm {
    fn fork(&self) -> Fork {
        Fork::Frontier
    }

    fn seal_engine(&self) -> &dyn SealEngine {
        self.seal_engine.as_ref()
    }

    fn compute_difficulty(&self, parent: &BlockHeader, timestamp: UnixSeconds) -> Difficulty {
        let cutoff = parent.timestamp.saturating_add(DIFFICULTY_ADJUSTMENT_CUTOFF);
        let factor = if timestamp < cutoff { 1 } else { -1 };

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
        false
    }

    fn receipt_outcome(&self, state: &AccountState) -> ReceiptOutcome {
        ReceiptOutcome::StateRoot(state.state_root())
    }
}
