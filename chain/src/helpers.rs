use core::ops::{Deref, DerefMut};
use std::sync::Arc;

use anyhow::{ensure, Result};
use database::Database;
use itertools::Itertools as _;
use transition_functions::{NoProof, SealEngine};
use types::{
    config::Config,
    containers::{Account, Block, BlockHeader, SignedTransaction},
    nonstandard::Fork,
    primitives::{Address, Nonce, H256, H64, U256},
};

use crate::{Chain, ChainBatch, Clock, MiningChain};

pub const FUNDED_ADDRESS: Address = Address::repeat_byte(0xfa);
pub const FUNDED_BALANCE: u64 = 1_000_000_000_000_000;

/// Nonce that [`RejectMarkedNonce`] treats as an invalid seal.
pub const INVALID_NONCE: H64 = H64::repeat_byte(0xff);

/// Accepts every header except the ones carrying [`INVALID_NONCE`].
pub struct RejectMarkedNonce;

impl SealEngine for RejectMarkedNonce {
    fn validate_seal(&self, header: &BlockHeader) -> Result<()> {
        ensure!(header.nonce != INVALID_NONCE, "header is marked as unsealed");
        Ok(())
    }

    fn seal(&self, header: BlockHeader) -> Result<BlockHeader> {
        Ok(header)
    }
}

/// A mining chain with a fixed clock, so that two contexts mining the same blocks produce
/// identical results.
pub struct Context {
    chain: MiningChain,
}

impl Deref for Context {
    type Target = MiningChain;

    fn deref(&self) -> &Self::Target {
        &self.chain
    }
}

impl DerefMut for Context {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.chain
    }
}

impl Context {
    pub fn new(fork: Fork) -> Result<Self> {
        Self::with_config(funded_config(Config::tester(fork)))
    }

    pub fn with_config(config: Config) -> Result<Self> {
        Self::with_config_and_seal_engine(config, Arc::new(NoProof))
    }

    pub fn with_config_and_seal_engine(
        config: Config,
        seal_engine: Arc<dyn SealEngine>,
    ) -> Result<Self> {
        let chain = MiningChain::from_genesis(
            Arc::new(config),
            Database::in_memory(),
            seal_engine,
            Clock::Fixed(0),
        )?;

        Ok(Self { chain })
    }

    #[must_use]
    pub fn fork(&self) -> Self {
        Self {
            chain: self.chain.fork(),
        }
    }

    pub fn mine_empty_blocks(&mut self, count: usize) -> Result<Vec<Block>> {
        (0..count).map(|_| self.mine_block(vec![])).collect()
    }

    /// Replaces the pending header with one carrying `extra_data`.
    pub fn diverge(&mut self, extra_data: &[u8]) -> Result<()> {
        let header = self.pending_header().with_extra_data(extra_data);
        self.set_pending_header(header)
    }

    #[must_use]
    pub fn into_database(self) -> Database {
        self.chain.into_chain().into_database()
    }

    #[must_use]
    pub fn head_hash(&self) -> H256 {
        self.get_canonical_head().hash()
    }

    /// Checks that the canonical index has exactly one entry per number up to the head and that
    /// the entries are linked by parent hashes.
    pub fn assert_canonical_index_complete(&self) -> Result<()> {
        assert_canonical_index_complete(self)
    }
}

pub fn funded_config(config: Config) -> Config {
    config.with_allocation(
        FUNDED_ADDRESS,
        Account {
            nonce: 0,
            balance: U256::from(FUNDED_BALANCE),
        },
    )
}

pub fn transfer(nonce: Nonce, to: Address, value: u64) -> SignedTransaction {
    MiningChain::create_unsigned_transaction(
        nonce,
        U256::one(),
        21_000,
        to,
        U256::from(value),
        vec![],
    )
    .as_signed_transaction(FUNDED_ADDRESS)
}

pub fn hashes<'blocks>(blocks: impl IntoIterator<Item = &'blocks Block>) -> Vec<H256> {
    blocks.into_iter().map(Block::hash).collect()
}

pub fn assert_canonical_index_complete(chain: &Chain) -> Result<()> {
    let head = chain.get_canonical_head();
    let index = chain.store().canonical_hashes()?;

    assert_eq!(
        index.iter().map(|(number, _)| *number).collect_vec(),
        (0..=head.number).collect_vec(),
    );

    assert_eq!(index.last().map(|(_, hash)| *hash), Some(head.hash()));

    for ((_, parent_hash), (_, child_hash)) in index.iter().tuple_windows() {
        assert_eq!(chain.get_header_by_hash(*child_hash)?.parent_hash, *parent_hash);
    }

    Ok(())
}

pub fn assert_score_follows_parent(chain: &Chain, block: &Block) -> Result<()> {
    let score = chain.get_score(block.hash())?;
    let parent_score = chain.get_score(block.parent_hash())?;

    assert_eq!(score, parent_score + block.header.difficulty);

    Ok(())
}

/// Stores `block` and its post-state from `source` in `target` without changing the canonical
/// index of `target`.
pub fn store_block(source: &Chain, target: &Chain, block: &Block) -> Result<()> {
    let post_state = source.store().get_state(block.header.state_root)?;
    let score = target.store().compute_score(&block.header)?;

    let mut batch = ChainBatch::default();
    batch.persist_block(block, &post_state, score)?;

    target.store().commit(batch)
}
