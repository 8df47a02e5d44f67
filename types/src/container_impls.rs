use alloy_rlp::{BufMut, Encodable};
use hashing::{RlpBytes, RlpUint};

use crate::{
    consts::GENESIS_BLOCK_NUMBER,
    containers::{
        Account, Block, BlockBody, BlockHeader, Receipt, ReceiptOutcome, SignedTransaction,
        UnsignedTransaction,
    },
    primitives::{Address, BlockNumber, H256},
};

impl BlockHeader {
    #[must_use]
    pub fn hash(&self) -> H256 {
        hashing::hash_rlp(self)
    }

    #[must_use]
    pub const fn is_genesis(&self) -> bool {
        self.number == GENESIS_BLOCK_NUMBER
    }

    /// Returns a copy of `self` with different extra data and therefore a different hash.
    #[must_use]
    pub fn with_extra_data(&self, extra_data: impl Into<Vec<u8>>) -> Self {
        Self {
            extra_data: extra_data.into(),
            ..self.clone()
        }
    }

    fn with_rlp_fields<R>(&self, consume: impl FnOnce(&[&dyn Encodable]) -> R) -> R {
        let fields: [&dyn Encodable; 14] = [
            &RlpBytes(self.parent_hash.as_bytes()),
            &RlpBytes(self.uncles_hash.as_bytes()),
            &RlpBytes(self.coinbase.as_bytes()),
            &RlpBytes(self.state_root.as_bytes()),
            &RlpBytes(self.transaction_root.as_bytes()),
            &RlpBytes(self.receipt_root.as_bytes()),
            &RlpUint(self.difficulty),
            &self.number,
            &self.gas_limit,
            &self.gas_used,
            &self.timestamp,
            &RlpBytes(&self.extra_data),
            &RlpBytes(self.mix_hash.as_bytes()),
            &RlpBytes(self.nonce.as_bytes()),
        ];

        consume(&fields)
    }
}

impl Encodable for BlockHeader {
    fn encode(&self, out: &mut dyn BufMut) {
        self.with_rlp_fields(|fields| hashing::encode_fields(fields, out))
    }

    fn length(&self) -> usize {
        self.with_rlp_fields(|fields| hashing::fields_length(fields))
    }
}

impl Block {
    #[must_use]
    pub fn hash(&self) -> H256 {
        self.header.hash()
    }

    #[must_use]
    pub const fn number(&self) -> BlockNumber {
        self.header.number
    }

    #[must_use]
    pub const fn parent_hash(&self) -> H256 {
        self.header.parent_hash
    }

    #[must_use]
    pub fn from_parts(header: BlockHeader, body: BlockBody) -> Self {
        let BlockBody {
            transactions,
            uncles,
        } = body;

        Self {
            header,
            transactions,
            uncles,
        }
    }

    #[must_use]
    pub fn into_parts(self) -> (BlockHeader, BlockBody) {
        let Self {
            header,
            transactions,
            uncles,
        } = self;

        (
            header,
            BlockBody {
                transactions,
                uncles,
            },
        )
    }
}

impl UnsignedTransaction {
    #[must_use]
    pub const fn as_signed_transaction(self, sender: Address) -> SignedTransaction {
        SignedTransaction {
            transaction: self,
            sender,
        }
    }
}

impl SignedTransaction {
    #[must_use]
    pub fn hash(&self) -> H256 {
        hashing::hash_rlp(self)
    }

    fn with_rlp_fields<R>(&self, consume: impl FnOnce(&[&dyn Encodable]) -> R) -> R {
        let UnsignedTransaction {
            nonce,
            gas_price,
            gas,
            to,
            value,
            data,
        } = &self.transaction;

        let fields: [&dyn Encodable; 7] = [
            nonce,
            &RlpUint(*gas_price),
            gas,
            &RlpBytes(to.as_bytes()),
            &RlpUint(*value),
            &RlpBytes(data),
            &RlpBytes(self.sender.as_bytes()),
        ];

        consume(&fields)
    }
}

impl Encodable for SignedTransaction {
    fn encode(&self, out: &mut dyn BufMut) {
        self.with_rlp_fields(|fields| hashing::encode_fields(fields, out))
    }

    fn length(&self) -> usize {
        self.with_rlp_fields(|fields| hashing::fields_length(fields))
    }
}

impl Receipt {
    fn with_rlp_fields<R>(&self, consume: impl FnOnce(&[&dyn Encodable]) -> R) -> R {
        let status;
        let state_root;

        let outcome: &dyn Encodable = match &self.outcome {
            ReceiptOutcome::StateRoot(root) => {
                state_root = RlpBytes(root.as_bytes());
                &state_root
            }
            ReceiptOutcome::Status(success) => {
                status = u64::from(*success);
                &status
            }
        };

        consume(&[outcome, &self.cumulative_gas_used])
    }
}

impl Encodable for Receipt {
    fn encode(&self, out: &mut dyn BufMut) {
        self.with_rlp_fields(|fields| hashing::encode_fields(fields, out))
    }

    fn length(&self) -> usize {
        self.with_rlp_fields(|fields| hashing::fields_length(fields))
    }
}

impl Account {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nonce == 0 && self.balance.is_zero()
    }
}
