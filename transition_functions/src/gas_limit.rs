use types::{
    consts::{GAS_LIMIT_ADJUSTMENT_FACTOR, GAS_LIMIT_MINIMUM},
    containers::BlockHeader,
    primitives::Gas,
};

/// Gas limit for a child of `parent`, moving towards `desired_gas_limit` as fast as the bounds
/// allow.
#[must_use]
pub fn compute_gas_limit(parent: &BlockHeader, desired_gas_limit: Gas) -> Gas {
    let desired_gas_limit = desired_gas_limit.max(GAS_LIMIT_MINIMUM);
    let delta = (parent.gas_limit / GAS_LIMIT_ADJUSTMENT_FACTOR).saturating_sub(1);

    if parent.gas_limit < desired_gas_limit {
        return parent
            .gas_limit
            .saturating_add(delta)
            .min(desired_gas_limit);
    }

    if parent.gas_limit > desired_gas_limit {
        return parent
            .gas_limit
            .saturating_sub(delta)
            .max(desired_gas_limit);
    }

    parent.gas_limit
}

/// Exclusive bounds for the gas limit of a child of `parent`.
#[must_use]
pub const fn gas_limit_bounds(parent: &BlockHeader) -> (Gas, Gas) {
    let delta = parent.gas_limit / GAS_LIMIT_ADJUSTMENT_FACTOR;

    (
        parent.gas_limit.saturating_sub(delta),
        parent.gas_limit.saturating_add(delta),
    )
}

#[cfg(test)]
mod tests {
    use hashing::EMPTY_LIST_HASH;
    use test_case::test_case;
    use types::{
        consts::GENESIS_GAS_LIMIT,
        primitives::{Address, H256, H64, U256},
    };

    use super::*;

    fn parent_with_gas_limit(gas_limit: Gas) -> BlockHeader {
        BlockHeader {
            parent_hash: H256::zero(),
            uncles_hash: EMPTY_LIST_HASH,
            coinbase: Address::zero(),
            state_root: EMPTY_LIST_HASH,
            transaction_root: EMPTY_LIST_HASH,
            receipt_root: EMPTY_LIST_HASH,
            difficulty: U256::from(131_072),
            number: 10,
            gas_limit,
            gas_used: 0,
            timestamp: 100,
            extra_data: vec![],
            mix_hash: H256::zero(),
            nonce: H64::zero(),
        }
    }

    #[test_case(GENESIS_GAS_LIMIT, GENESIS_GAS_LIMIT => GENESIS_GAS_LIMIT)]
    #[test_case(1_024_000, 2_000_000 => 1_024_999)]
    #[test_case(1_024_000, 1_024_500 => 1_024_500)]
    #[test_case(1_024_000, 100_000 => 1_023_001)]
    #[test_case(1_024_000, 1_023_500 => 1_023_500)]
    #[test_case(5000, 0 => 5000)]
    fn gas_limit_moves_towards_desired(parent_gas_limit: Gas, desired: Gas) -> Gas {
        compute_gas_limit(&parent_with_gas_limit(parent_gas_limit), desired)
    }

    #[test_case(GENESIS_GAS_LIMIT, 0)]
    #[test_case(GENESIS_GAS_LIMIT, u64::MAX)]
    #[test_case(1_024_000, 2_000_000)]
    #[test_case(1_024_000, 5000)]
    fn computed_gas_limit_is_within_bounds(parent_gas_limit: Gas, desired: Gas) {
        let parent = parent_with_gas_limit(parent_gas_limit);
        let (low, high) = gas_limit_bounds(&parent);
        let gas_limit = compute_gas_limit(&parent, desired);

        assert!(low < gas_limit);
        assert!(gas_limit < high);
    }
}
