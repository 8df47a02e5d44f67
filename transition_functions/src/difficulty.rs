use core::cmp::Ordering;

use types::{
    consts::{
        BOMB_EXPONENTIAL_FREE_PERIODS, BOMB_EXPONENTIAL_PERIOD, DIFFICULTY_ADJUSTMENT_DENOMINATOR,
        DIFFICULTY_MINIMUM,
    },
    containers::BlockHeader,
    primitives::{BlockNumber, Difficulty, U256},
};

/// Moves the parent difficulty by `factor` steps of `parent.difficulty / 2048`.
///
/// The result never drops below the smaller of the parent difficulty and the protocol minimum.
pub fn adjust(parent: &BlockHeader, factor: i64) -> Difficulty {
    let step = parent.difficulty / DIFFICULTY_ADJUSTMENT_DENOMINATOR;
    let delta = step.saturating_mul(U256::from(factor.unsigned_abs()));

    let candidate = match factor.cmp(&0) {
        Ordering::Less => parent.difficulty.saturating_sub(delta),
        Ordering::Equal => parent.difficulty,
        Ordering::Greater => parent.difficulty.saturating_add(delta),
    };

    candidate.max(parent.difficulty.min(DIFFICULTY_MINIMUM))
}

/// Adds the exponential component for a block at `block_number`.
///
/// `bomb_delay` pushes the start of the exponential growth back by that many blocks.
pub fn add_bomb(
    difficulty: Difficulty,
    block_number: BlockNumber,
    bomb_delay: BlockNumber,
) -> Difficulty {
    let period = block_number.saturating_sub(bomb_delay) / BOMB_EXPONENTIAL_PERIOD;

    let Some(exponent) = period.checked_sub(BOMB_EXPONENTIAL_FREE_PERIODS) else {
        return difficulty;
    };

    let bomb = U256::from(2)
        .checked_pow(U256::from(exponent))
        .unwrap_or(U256::MAX);

    difficulty.saturating_add(bomb).max(DIFFICULTY_MINIMUM)
}

/// Number of whole `cutoff` periods between the parent timestamp and `timestamp`, capped for use
/// as an adjustment factor.
pub fn elapsed_periods(parent: &BlockHeader, timestamp: u64, cutoff: u64) -> i64 {
    let periods = timestamp.saturating_sub(parent.timestamp) / cutoff;
    i64::try_from(periods).unwrap_or(i64::MAX)
}
