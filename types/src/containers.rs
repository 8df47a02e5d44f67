use serde::{Deserialize, Serialize};

use crate::primitives::{
    Address, BlockNumber, Difficulty, Gas, Nonce, UnixSeconds, Wei, H256, H64,
};

#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct BlockHeader {
    pub parent_hash: H256,
    pub uncles_hash: H256,
    pub coinbase: Address,
    pub state_root: H256,
    pub transaction_root: H256,
    pub receipt_root: H256,
    pub difficulty: Difficulty,
    pub number: BlockNumber,
    pub gas_limit: Gas,
    pub gas_used: Gas,
    pub timestamp: UnixSeconds,
    pub extra_data: Vec<u8>,
    pub mix_hash: H256,
    pub nonce: H64,
}

#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<SignedTransaction>,
    pub uncles: Vec<BlockHeader>,
}

/// Block contents stored separately from the header.
#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
pub struct BlockBody {
    pub transactions: Vec<SignedTransaction>,
    pub uncles: Vec<BlockHeader>,
}

#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct UnsignedTransaction {
    pub nonce: Nonce,
    pub gas_price: Wei,
    pub gas: Gas,
    pub to: Address,
    pub value: Wei,
    pub data: Vec<u8>,
}

/// A transaction whose sender has already been recovered.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct SignedTransaction {
    pub transaction: UnsignedTransaction,
    pub sender: Address,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub enum ReceiptOutcome {
    /// Intermediate state root after the transaction. Used before Byzantium.
    StateRoot(H256),
    Status(bool),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct Receipt {
    pub outcome: ReceiptOutcome,
    pub cumulative_gas_used: Gas,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Account {
    #[serde(default)]
    pub nonce: Nonce,
    pub balance: Wei,
}
