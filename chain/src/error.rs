use thiserror::Error;
use types::primitives::{BlockNumber, Difficulty, Gas, UnixSeconds, H256};

#[derive(Debug, Error)]
pub enum Error {
    #[error("parent of block {block_hash:?} not found: {parent_hash:?}")]
    ParentNotFound { block_hash: H256, parent_hash: H256 },
    #[error("header not found: {hash:?}")]
    HeaderNotFound { hash: H256 },
    #[error("block not found: {hash:?}")]
    BlockNotFound { hash: H256 },
    #[error("no canonical block at number {number}")]
    NotCanonical { number: BlockNumber },
    #[error("database contains no canonical head")]
    HeadNotFound,
    #[error("no fork is configured for block number {block_number}")]
    UnsupportedFork { block_number: BlockNumber },
    #[error("block {hash:?} has an invalid seal")]
    InvalidSeal { hash: H256 },
    #[error("block {hash:?} has an invalid header: {reason}")]
    InvalidHeader { hash: H256, reason: HeaderError },
    #[error("block {hash:?} has an invalid uncle: {reason}")]
    InvalidUncle { hash: H256, reason: UncleError },
    #[error("state transition failed for block {hash:?} at number {number}")]
    StateTransitionError { hash: H256, number: BlockNumber },
    #[error("state not found: {state_root:?}")]
    StateNotFound { state_root: H256 },
    #[error(
        "canonical chain is inconsistent while reorganizing \
         (head: {head:?}, candidate: {candidate:?})"
    )]
    ReorgInconsistency { head: H256, candidate: H256 },
    #[error("score of block {hash:?} overflows")]
    ScoreOverflow { hash: H256 },
    #[error("VM configuration is invalid")]
    InvalidVmConfiguration,
    #[error("configuration is invalid")]
    InvalidConfiguration,
    #[error("database belongs to genesis {stored:?}, not the configured {configured:?}")]
    GenesisMismatch { stored: H256, configured: H256 },
    #[error("storage key has incorrect prefix: {bytes:?}")]
    IncorrectPrefix { bytes: Vec<u8> },
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum HeaderError {
    #[error("number {number} does not follow parent number {parent_number}")]
    NumberNotSequential {
        parent_number: BlockNumber,
        number: BlockNumber,
    },
    #[error("timestamp {timestamp} is not after parent timestamp {parent_timestamp}")]
    TimestampNotIncreasing {
        parent_timestamp: UnixSeconds,
        timestamp: UnixSeconds,
    },
    #[error("gas limit {gas_limit} is outside of bounds ({low}, {high})")]
    GasLimitOutOfBounds { gas_limit: Gas, low: Gas, high: Gas },
    #[error("gas limit {gas_limit} is below minimum {minimum}")]
    GasLimitTooLow { gas_limit: Gas, minimum: Gas },
    #[error("gas limit {gas_limit} is above maximum {maximum}")]
    GasLimitTooHigh { gas_limit: Gas, maximum: Gas },
    #[error("gas used {gas_used} exceeds gas limit {gas_limit}")]
    GasUsedExceedsLimit { gas_used: Gas, gas_limit: Gas },
    #[error("extra data is {length} bytes long (maximum: {maximum})")]
    ExtraDataTooLong { length: usize, maximum: usize },
    #[error("difficulty mismatch (computed: {computed}, in block: {in_block})")]
    DifficultyMismatch {
        computed: Difficulty,
        in_block: Difficulty,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum UncleError {
    #[error("uncles hash mismatch (computed: {computed:?}, in block: {in_block:?})")]
    UnclesHashMismatch { computed: H256, in_block: H256 },
    #[error("block has {count} uncles (maximum: {maximum})")]
    TooManyUncles { count: usize, maximum: usize },
    #[error("uncle {uncle:?} is included more than once")]
    Duplicate { uncle: H256 },
    #[error("uncle {uncle:?} is the block itself")]
    SameAsBlock { uncle: H256 },
    #[error("uncle {uncle:?} is an ancestor of the block")]
    Ancestor { uncle: H256 },
    #[error("uncle {uncle:?} is already included by a recent ancestor")]
    AlreadyIncluded { uncle: H256 },
    #[error("parent of uncle {uncle:?} is not a recent ancestor: {parent_hash:?}")]
    ParentNotRecentAncestor { uncle: H256, parent_hash: H256 },
    #[error("uncle {uncle:?} has number {number} but its parent has number {parent_number}")]
    NumberNotSequential {
        uncle: H256,
        parent_number: BlockNumber,
        number: BlockNumber,
    },
    #[error("uncle {uncle:?} is not older than the block")]
    NotOlderThanBlock { uncle: H256 },
    #[error("uncle {uncle:?} has a timestamp before its parent")]
    TimestampBeforeParent { uncle: H256 },
    #[error("uncle {uncle:?} uses more gas than its limit")]
    GasUsedExceedsLimit { uncle: H256 },
    #[error("uncle {uncle:?} has an invalid seal")]
    InvalidSeal { uncle: H256 },
}
