use anyhow::{ensure, Context as _, Result};
use types::{
    consts::{TX_DATA_ZERO_GAS, TX_GAS},
    containers::{Block, BlockHeader, Receipt, ReceiptOutcome, SignedTransaction},
    nonstandard::Fork,
    primitives::{Difficulty, Gas, UnixSeconds, Wei, H256, U256},
};

use crate::{seal::SealEngine, state::AccountState, Error};

const NEPHEW_REWARD_DIVISOR: u64 = 32;
const UNCLE_DEPTH_PENALTY_FACTOR: u64 = 8;

pub struct BlockOutcome {
    pub receipts: Vec<Receipt>,
    pub state: AccountState,
    pub state_root: H256,
}

/// Rules of a single fork.
///
/// Implementors supply the parameters that differ between forks.
/// Transaction execution and block finalization are shared.
pub trait VirtualMachine: Send + Sync {
    fn fork(&self) -> Fork;

    fn seal_engine(&self) -> &dyn SealEngine;

    fn compute_difficulty(&self, parent: &BlockHeader, timestamp: UnixSeconds) -> Difficulty;

    fn block_reward(&self) -> Wei;

    fn non_zero_data_byte_gas(&self) -> Gas;

    /// Whether empty accounts touched by a transaction are removed from the state.
    fn clears_empty_accounts(&self) -> bool;

    fn receipt_outcome(&self, state: &AccountState) -> ReceiptOutcome;

    fn validate_seal(&self, header: &BlockHeader) -> Result<()> {
        self.seal_engine().validate_seal(header)
    }

    fn seal(&self, header: BlockHeader) -> Result<BlockHeader> {
        self.seal_engine().seal(header)
    }

    fn intrinsic_gas(&self, data: &[u8]) -> Gas {
        data.iter()
            .map(|byte| {
                if *byte == 0 {
                    TX_DATA_ZERO_GAS
                } else {
                    self.non_zero_data_byte_gas()
                }
            })
            .fold(TX_GAS, Gas::saturating_add)
    }

    /// Executes a value transfer in a block with the given `header`.
    ///
    /// `state` is modified only if the transaction is valid.
    fn apply_transaction(
        &self,
        state: &mut AccountState,
        header: &BlockHeader,
        cumulative_gas_used: Gas,
        signed_transaction: &SignedTransaction,
    ) -> Result<Receipt> {
        let SignedTransaction {
            transaction,
            sender,
        } = signed_transaction;

        let sender = *sender;
        let in_state = state.nonce(sender);

        ensure!(
            in_state == transaction.nonce,
            Error::NonceMismatch {
                sender,
                in_state,
                in_transaction: transaction.nonce,
            },
        );

        let intrinsic_gas = self.intrinsic_gas(&transaction.data);

        ensure!(
            transaction.gas >= intrinsic_gas,
            Error::IntrinsicGasTooLow {
                gas: transaction.gas,
                intrinsic_gas,
            },
        );

        let available = header.gas_limit.saturating_sub(cumulative_gas_used);

        ensure!(
            transaction.gas <= available,
            Error::BlockGasLimitExceeded {
                available,
                required: transaction.gas,
            },
        );

        let cost_overflow = || Error::TransactionCostOverflow {
            gas: transaction.gas,
            gas_price: transaction.gas_price,
            value: transaction.value,
        };

        let maximum_cost = U256::from(transaction.gas)
            .checked_mul(transaction.gas_price)
            .and_then(|fee| fee.checked_add(transaction.value))
            .ok_or_else(cost_overflow)?;

        let balance = state.balance(sender);

        ensure!(
            balance >= maximum_cost,
            Error::InsufficientBalance {
                sender,
                balance,
                required: maximum_cost,
            },
        );

        // Value transfers consume exactly their intrinsic gas. The rest is never charged.
        let gas_used = intrinsic_gas;
        let fee = U256::from(gas_used) * transaction.gas_price;

        let mut new_state = state.clone();

        new_state.sub_balance(sender, fee + transaction.value)?;
        new_state.increment_nonce(sender)?;
        new_state.add_balance(transaction.to, transaction.value)?;
        new_state.add_balance(header.coinbase, fee)?;

        if self.clears_empty_accounts() {
            for address in [sender, transaction.to, header.coinbase] {
                new_state.clear_if_empty(address);
            }
        }

        let receipt = Receipt {
            outcome: self.receipt_outcome(&new_state),
            cumulative_gas_used: cumulative_gas_used + gas_used,
        };

        *state = new_state;

        Ok(receipt)
    }

    /// Pays block and uncle rewards.
    fn finalize_block(
        &self,
        state: &mut AccountState,
        header: &BlockHeader,
        uncles: &[BlockHeader],
    ) -> Result<()> {
        let block_reward = self.block_reward();
        let nephew_reward = block_reward / NEPHEW_REWARD_DIVISOR;
        let uncle_count = U256::from(uncles.len());

        state.add_balance(header.coinbase, block_reward + nephew_reward * uncle_count)?;

        for uncle in uncles {
            let generations_remaining = uncle
                .number
                .saturating_add(UNCLE_DEPTH_PENALTY_FACTOR)
                .saturating_sub(header.number);

            let uncle_reward =
                block_reward * U256::from(generations_remaining) / UNCLE_DEPTH_PENALTY_FACTOR;

            state.add_balance(uncle.coinbase, uncle_reward)?;
        }

        Ok(())
    }

    /// Applies all transactions in `block` and pays rewards, starting from `parent_state`.
    ///
    /// Fails if the result does not match the roots and gas used declared in the header.
    fn apply_block(&self, parent_state: &AccountState, block: &Block) -> Result<BlockOutcome> {
        let Block {
            header,
            transactions,
            uncles,
        } = block;

        let mut state = parent_state.clone();
        let mut receipts = Vec::with_capacity(transactions.len());
        let mut cumulative_gas_used = 0;

        for (index, transaction) in transactions.iter().enumerate() {
            let receipt = self
                .apply_transaction(&mut state, header, cumulative_gas_used, transaction)
                .with_context(|| Error::TransactionInvalid {
                    index,
                    hash: transaction.hash(),
                })?;

            cumulative_gas_used = receipt.cumulative_gas_used;
            receipts.push(receipt);
        }

        self.finalize_block(&mut state, header, uncles)?;

        ensure!(
            cumulative_gas_used == header.gas_used,
            Error::GasUsedMismatch {
                computed: cumulative_gas_used,
                in_block: header.gas_used,
            },
        );

        let computed = hashing::hash_list(transactions);

        ensure!(
            computed == header.transaction_root,
            Error::TransactionRootMismatch {
                computed,
                in_block: header.transaction_root,
            },
        );

        let computed = hashing::hash_list(&receipts);

        ensure!(
            computed == header.receipt_root,
            Error::ReceiptRootMismatch {
                computed,
                in_block: header.receipt_root,
            },
        );

        let state_root = state.state_root();

        ensure!(
            state_root == header.state_root,
            Error::StateRootMismatch {
                computed: state_root,
                in_block: header.state_root,
            },
        );

        Ok(BlockOutcome {
            receipts,
            state,
            state_root,
        })
    }
}
