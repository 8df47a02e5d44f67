use thiserror::Error;
use types::primitives::{Address, BlockNumber, Gas, Wei, H256};

#[derive(Debug, Error)]
pub enum Error {
    #[error("balance of {address:?} would overflow")]
    BalanceOverflow { address: Address },
    #[error("transaction does not fit in block (available: {available}, required: {required})")]
    BlockGasLimitExceeded { available: Gas, required: Gas },
    #[error("fork activations are not strictly increasing ({previous} followed by {next})")]
    ForkActivationsNotIncreasing {
        previous: BlockNumber,
        next: BlockNumber,
    },
    #[error("gas used does not match (computed: {computed}, in_block: {in_block})")]
    GasUsedMismatch { computed: Gas, in_block: Gas },
    #[error(
        "sender {sender:?} cannot pay for transaction (balance: {balance}, required: {required})"
    )]
    InsufficientBalance {
        sender: Address,
        balance: Wei,
        required: Wei,
    },
    #[error("transaction gas is below intrinsic gas ({gas} < {intrinsic_gas})")]
    IntrinsicGasTooLow { gas: Gas, intrinsic_gas: Gas },
    #[error("no fork is active at block {block_number}")]
    NoForkActive { block_number: BlockNumber },
    #[error(
        "nonce of {sender:?} does not match \
         (in_state: {in_state}, in_transaction: {in_transaction})"
    )]
    NonceMismatch {
        sender: Address,
        in_state: u64,
        in_transaction: u64,
    },
    #[error("nonce of {address:?} would overflow")]
    NonceOverflow { address: Address },
    #[error("receipt root does not match (computed: {computed:?}, in_block: {in_block:?})")]
    ReceiptRootMismatch { computed: H256, in_block: H256 },
    #[error("state root does not match (computed: {computed:?}, in_block: {in_block:?})")]
    StateRootMismatch { computed: H256, in_block: H256 },
    #[error("transaction {index} ({hash:?}) is invalid")]
    TransactionInvalid { index: usize, hash: H256 },
    #[error("transaction cost overflows (gas: {gas}, gas_price: {gas_price}, value: {value})")]
    TransactionCostOverflow { gas: Gas, gas_price: Wei, value: Wei },
    #[error("transaction root does not match (computed: {computed:?}, in_block: {in_block:?})")]
    TransactionRootMismatch { computed: H256, in_block: H256 },
    #[error("VM configuration is empty")]
    VmConfigurationEmpty,
}
