use core::ops::Deref;
use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::{ensure, Context as _, Result};
use database::Database;
use hashing::EMPTY_LIST_HASH;
use log::debug;
use transition_functions::{compute_gas_limit, AccountState, SealEngine};
use types::{
    config::Config,
    consts::GENESIS_GAS_LIMIT,
    containers::{Block, BlockHeader, Receipt, SignedTransaction, UnsignedTransaction},
    primitives::{Address, Gas, Nonce, UnixSeconds, Wei, H256, H64},
};

use crate::{chain::ImportResult, Chain, Error};

/// Source of timestamps for pending blocks.
#[derive(Clone, Copy, Debug)]
pub enum Clock {
    System,
    Fixed(UnixSeconds),
}

impl Clock {
    pub fn now(self) -> Result<UnixSeconds> {
        match self {
            Self::System => Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs()),
            Self::Fixed(timestamp) => Ok(timestamp),
        }
    }
}

#[derive(Clone)]
struct PendingBlock {
    header: BlockHeader,
    transactions: Vec<SignedTransaction>,
    receipts: Vec<Receipt>,
    state: AccountState,
}

impl PendingBlock {
    fn on_parent(chain: &Chain, parent: &BlockHeader, clock: Clock) -> Result<Self> {
        let number = parent.number.saturating_add(1);
        let timestamp = clock.now()?.max(parent.timestamp.saturating_add(1));
        let vm = chain.get_vm(number)?;

        let header = BlockHeader {
            parent_hash: parent.hash(),
            uncles_hash: EMPTY_LIST_HASH,
            coinbase: parent.coinbase,
            state_root: parent.state_root,
            transaction_root: EMPTY_LIST_HASH,
            receipt_root: EMPTY_LIST_HASH,
            difficulty: vm.compute_difficulty(parent, timestamp),
            number,
            gas_limit: compute_gas_limit(parent, GENESIS_GAS_LIMIT),
            gas_used: 0,
            timestamp,
            extra_data: vec![],
            mix_hash: H256::zero(),
            nonce: H64::zero(),
        };

        Self::with_header(chain, header)
    }

    fn with_header(chain: &Chain, header: BlockHeader) -> Result<Self> {
        let state = chain.store().get_state(header.state_root)?;

        Ok(Self {
            header,
            transactions: vec![],
            receipts: vec![],
            state,
        })
    }
}

/// A [`Chain`] that builds blocks on top of its head.
///
/// Transactions are applied to a pending block, which [`MiningChain::mine_block`] seals and
/// imports. The pending header can be replaced to make two instances produce different blocks.
pub struct MiningChain {
    chain: Chain,
    clock: Clock,
    pending: PendingBlock,
}

impl Deref for MiningChain {
    type Target = Chain;

    fn deref(&self) -> &Self::Target {
        &self.chain
    }
}

impl MiningChain {
    pub fn new(chain: Chain, clock: Clock) -> Result<Self> {
        let pending = PendingBlock::on_parent(&chain, chain.get_canonical_head(), clock)?;

        Ok(Self {
            chain,
            clock,
            pending,
        })
    }

    pub fn from_genesis(
        config: Arc<Config>,
        database: Database,
        seal_engine: Arc<dyn SealEngine>,
        clock: Clock,
    ) -> Result<Self> {
        Self::new(Chain::from_genesis(config, database, seal_engine)?, clock)
    }

    #[must_use]
    pub fn into_chain(self) -> Chain {
        self.chain
    }

    #[must_use]
    pub const fn create_unsigned_transaction(
        nonce: Nonce,
        gas_price: Wei,
        gas: Gas,
        to: Address,
        value: Wei,
        data: Vec<u8>,
    ) -> UnsignedTransaction {
        UnsignedTransaction {
            nonce,
            gas_price,
            gas,
            to,
            value,
            data,
        }
    }

    #[must_use]
    pub const fn pending_header(&self) -> &BlockHeader {
        &self.pending.header
    }

    /// Replaces the pending header and discards pending transactions.
    ///
    /// The parent of `header` must be stored. Gas used and the state root are reset to match an
    /// empty block on that parent.
    pub fn set_pending_header(&mut self, header: BlockHeader) -> Result<()> {
        let hash = header.hash();

        ensure!(
            self.chain.store().contains_header(header.parent_hash)?,
            Error::ParentNotFound {
                block_hash: hash,
                parent_hash: header.parent_hash,
            },
        );

        let parent = self.chain.get_header_by_hash(header.parent_hash)?;

        let header = BlockHeader {
            state_root: parent.state_root,
            gas_used: 0,
            ..header
        };

        self.pending = PendingBlock::with_header(&self.chain, header)?;

        Ok(())
    }

    /// Applies `signed_transaction` to the pending block.
    ///
    /// The pending block is unchanged if the transaction is invalid.
    pub fn apply_transaction(&mut self, signed_transaction: SignedTransaction) -> Result<Receipt> {
        let PendingBlock {
            header,
            transactions,
            receipts,
            state,
        } = &mut self.pending;

        let vm = self.chain.get_vm(header.number)?;

        let receipt = vm
            .apply_transaction(state, header, header.gas_used, &signed_transaction)
            .with_context(|| Error::StateTransitionError {
                hash: header.hash(),
                number: header.number,
            })?;

        header.gas_used = receipt.cumulative_gas_used;
        transactions.push(signed_transaction);
        receipts.push(receipt);

        Ok(receipt)
    }

    /// Pays rewards, fills in roots, seals and imports the pending block.
    ///
    /// Afterwards the pending block is rebuilt on the canonical head,
    /// which is the mined block only if it won fork choice.
    pub fn mine_block(&mut self, uncles: Vec<BlockHeader>) -> Result<Block> {
        let PendingBlock {
            header,
            transactions,
            receipts,
            state,
        } = &self.pending;

        let vm = self.chain.get_vm(header.number)?;
        let mut state = state.clone();

        let mut header = BlockHeader {
            uncles_hash: hashing::hash_list(&uncles),
            transaction_root: hashing::hash_list(transactions),
            receipt_root: hashing::hash_list(receipts),
            ..header.clone()
        };

        vm.finalize_block(&mut state, &header, &uncles)?;

        header.state_root = state.state_root();

        let block = Block {
            header: vm.seal(header)?,
            transactions: transactions.clone(),
            uncles,
        };

        self.chain.import_block(block.clone())?;

        debug!("mined block {:?} at number {}", block.hash(), block.number());

        self.reset_pending()?;

        Ok(block)
    }

    /// Imports `block` and rebuilds the pending block if the head changed.
    pub fn import_block(&mut self, block: Block) -> Result<ImportResult> {
        let result = self.chain.import_block(block)?;

        if result.changed_head() {
            self.reset_pending()?;
        }

        Ok(result)
    }

    /// Returns an independent mining chain over a copy of the store with the same head and
    /// pending block.
    #[must_use]
    pub fn fork(&self) -> Self {
        Self {
            chain: self.chain.fork(),
            clock: self.clock,
            pending: self.pending.clone(),
        }
    }

    fn reset_pending(&mut self) -> Result<()> {
        let head = self.chain.get_canonical_head();
        self.pending = PendingBlock::on_parent(&self.chain, head, self.clock)?;
        Ok(())
    }
}
