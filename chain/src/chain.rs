use std::{collections::HashSet, sync::Arc};

use anyhow::{bail, ensure, Context as _, Result};
use database::Database;
use hashing::EMPTY_LIST_HASH;
use itertools::Itertools as _;
use log::{debug, info, warn};
use transition_functions::{
    gas_limit_bounds, AccountState, SealEngine, VirtualMachine, VmRegistry,
};
use types::{
    config::{Config, GenesisParameters},
    consts::{
        GAS_LIMIT_MAXIMUM, GAS_LIMIT_MINIMUM, GENESIS_BLOCK_NUMBER, MAX_EXTRA_DATA_LENGTH,
        MAX_UNCLES, MAX_UNCLE_DEPTH,
    },
    containers::{Block, BlockBody, BlockHeader},
    primitives::{BlockNumber, Score, H256},
};

use crate::{
    chain_db::{ChainBatch, ChainDb},
    fork_choice, Error, HeaderError, UncleError,
};

/// Outcome of [`Chain::import_block`].
///
/// Both lists are ordered from oldest to newest and are empty if the head did not change.
/// `new_canonical_blocks` ends with the imported block whenever it becomes the head.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ImportResult {
    pub imported_block: Block,
    pub new_canonical_blocks: Vec<Block>,
    pub old_canonical_blocks: Vec<Block>,
}

impl ImportResult {
    fn unchanged(imported_block: Block) -> Self {
        Self {
            imported_block,
            new_canonical_blocks: vec![],
            old_canonical_blocks: vec![],
        }
    }

    #[must_use]
    pub fn changed_head(&self) -> bool {
        !self.new_canonical_blocks.is_empty()
    }
}

/// A single chain instance: a store and the head it considers canonical.
///
/// Instances do not share mutable state. [`Chain::fork`] creates an instance over a copy of the
/// store that can then diverge.
pub struct Chain {
    config: Arc<Config>,
    registry: Arc<VmRegistry>,
    store: ChainDb,
    head: BlockHeader,
}

impl Chain {
    /// Creates a chain whose only block is the genesis block described by `config`.
    ///
    /// If `database` already contains that genesis block, the stored head is used instead.
    /// A database holding a chain with a different genesis block is rejected.
    pub fn from_genesis(
        config: Arc<Config>,
        database: Database,
        seal_engine: Arc<dyn SealEngine>,
    ) -> Result<Self> {
        let registry = build_registry(&config, seal_engine)?;
        let store = ChainDb::new(database);
        let state = AccountState::from(config.genesis_allocation.clone());
        let genesis_header = genesis_header(&config.genesis, &state);
        let genesis = Block::from_parts(genesis_header, BlockBody::default());
        let genesis_hash = genesis.hash();

        if store.contains_block(genesis_hash)? {
            debug!("genesis block {genesis_hash:?} is already stored");
            return Self::from_store(config, registry, store);
        }

        if store.contains_head()? {
            bail!(Error::GenesisMismatch {
                stored: store.get_canonical_hash(GENESIS_BLOCK_NUMBER)?,
                configured: genesis_hash,
            });
        }

        let mut batch = ChainBatch::default();
        batch.persist_block(&genesis, &state, fork_choice::genesis_score(&genesis.header))?;
        batch.set_canonical(GENESIS_BLOCK_NUMBER, genesis_hash)?;
        batch.set_head(genesis_hash)?;
        store.commit(batch)?;

        info!(
            "initialized chain {} with genesis block {genesis_hash:?} and {} accounts",
            config.config_name,
            state.len(),
        );

        Ok(Self {
            config,
            registry,
            store,
            head: genesis.header,
        })
    }

    /// Reopens a chain from the head stored in `database`.
    pub fn from_database(
        config: Arc<Config>,
        database: Database,
        seal_engine: Arc<dyn SealEngine>,
    ) -> Result<Self> {
        let registry = build_registry(&config, seal_engine)?;
        Self::from_store(config, registry, ChainDb::new(database))
    }

    fn from_store(config: Arc<Config>, registry: Arc<VmRegistry>, store: ChainDb) -> Result<Self> {
        let head = store.get_canonical_head()?;

        Ok(Self {
            config,
            registry,
            store,
            head,
        })
    }

    /// Returns an independent chain over a copy of the store with the same head.
    #[must_use]
    pub fn fork(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            registry: Arc::clone(&self.registry),
            store: self.store.copy(),
            head: self.head.clone(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub const fn store(&self) -> &ChainDb {
        &self.store
    }

    #[must_use]
    pub fn into_database(self) -> Database {
        self.store.into_database()
    }

    #[must_use]
    pub const fn get_canonical_head(&self) -> &BlockHeader {
        &self.head
    }

    pub fn get_canonical_block_by_number(&self, number: BlockNumber) -> Result<Block> {
        self.store.get_block(self.store.get_canonical_hash(number)?)
    }

    pub fn get_canonical_block_hash(&self, number: BlockNumber) -> Result<H256> {
        self.store.get_canonical_hash(number)
    }

    pub fn get_header_by_hash(&self, hash: H256) -> Result<BlockHeader> {
        self.store.get_header(hash)
    }

    pub fn get_block_by_hash(&self, hash: H256) -> Result<Block> {
        self.store.get_block(hash)
    }

    pub fn get_score(&self, hash: H256) -> Result<Score> {
        self.store.get_score(hash)
    }

    /// Returns the state after the canonical head.
    pub fn head_state(&self) -> Result<AccountState> {
        self.store.get_state(self.head.state_root)
    }

    pub fn get_vm(&self, block_number: BlockNumber) -> Result<&dyn VirtualMachine> {
        self.registry
            .resolve(block_number)
            .context(Error::UnsupportedFork { block_number })
    }

    /// Validates, executes and stores `block`, then reorganizes if it is heavier than the head.
    ///
    /// A block that is already stored is not validated again, but still goes through fork choice.
    /// The block and any index changes are committed together. On failure the store, the
    /// canonical index and the head are left unchanged.
    pub fn import_block(&mut self, block: Block) -> Result<ImportResult> {
        let hash = block.hash();
        let mut batch = ChainBatch::default();

        let score = if self.store.contains_block(hash)? {
            debug!("block {hash:?} at number {} is already stored", block.number());
            self.store.get_score(hash)?
        } else {
            match self.validate(&block) {
                Ok((score, post_state)) => {
                    batch.persist_block(&block, &post_state, score)?;
                    score
                }
                Err(error) => {
                    warn!("rejected block {hash:?} at number {}: {error:#}", block.number());
                    return Err(error);
                }
            }
        };

        let head_hash = self.head.hash();
        let head_score = self.store.get_score(head_hash)?;

        if !fork_choice::should_reorganize(head_score, score) {
            self.store.commit(batch)?;

            debug!(
                "imported block {hash:?} at number {} without changing head {head_hash:?} \
                 (score: {score}, head score: {head_score})",
                block.number(),
            );

            return Ok(ImportResult::unchanged(block));
        }

        let (new_canonical_blocks, old_canonical_blocks) = self.reorganize(&block, &mut batch)?;

        self.store.commit(batch)?;

        if old_canonical_blocks.is_empty() {
            debug!("extended canonical chain to block {hash:?} at number {}", block.number());
        } else {
            info!(
                "reorganized from {head_hash:?} to {hash:?} \
                 ({} blocks displaced, {} blocks added)",
                old_canonical_blocks.len(),
                new_canonical_blocks.len(),
            );
        }

        self.head = block.header.clone();

        Ok(ImportResult {
            imported_block: block,
            new_canonical_blocks,
            old_canonical_blocks,
        })
    }

    /// Returns the score of `block` and the state after it.
    fn validate(&self, block: &Block) -> Result<(Score, AccountState)> {
        let header = &block.header;
        let hash = header.hash();
        let number = header.number;

        ensure!(
            self.store.contains_header(header.parent_hash)?,
            Error::ParentNotFound {
                block_hash: hash,
                parent_hash: header.parent_hash,
            },
        );

        let parent = self.store.get_header(header.parent_hash)?;
        let vm = self.get_vm(number)?;

        validate_header(vm, &parent, header)
            .map_err(|reason| Error::InvalidHeader { hash, reason })?;

        vm.validate_seal(header)
            .context(Error::InvalidSeal { hash })?;

        self.validate_uncles(vm, block)?;

        let parent_state = self.store.get_state(parent.state_root)?;

        let outcome = vm
            .apply_block(&parent_state, block)
            .context(Error::StateTransitionError { hash, number })?;

        let score = self.store.compute_score(header)?;

        Ok((score, outcome.state))
    }

    fn validate_uncles(&self, vm: &dyn VirtualMachine, block: &Block) -> Result<()> {
        let Block { header, uncles, .. } = block;
        let hash = header.hash();
        let invalid = |reason| Error::InvalidUncle { hash, reason };

        let computed = hashing::hash_list(uncles);

        ensure!(
            computed == header.uncles_hash,
            invalid(UncleError::UnclesHashMismatch {
                computed,
                in_block: header.uncles_hash,
            }),
        );

        ensure!(
            uncles.len() <= MAX_UNCLES,
            invalid(UncleError::TooManyUncles {
                count: uncles.len(),
                maximum: MAX_UNCLES,
            }),
        );

        if let Some(uncle) = uncles.iter().map(BlockHeader::hash).duplicates().next() {
            return Err(invalid(UncleError::Duplicate { uncle }).into());
        }

        if uncles.is_empty() {
            return Ok(());
        }

        let recent_ancestors = self.store.get_ancestors(MAX_UNCLE_DEPTH + 1, header)?;

        let recent_ancestor_hashes = recent_ancestors
            .iter()
            .map(BlockHeader::hash)
            .collect::<HashSet<_>>();

        let mut recent_uncle_hashes = HashSet::new();

        for ancestor_hash in &recent_ancestor_hashes {
            let ancestor = self.store.get_block(*ancestor_hash)?;
            recent_uncle_hashes.extend(ancestor.uncles.iter().map(BlockHeader::hash));
        }

        for uncle in uncles {
            let uncle_hash = uncle.hash();

            ensure!(
                uncle_hash != hash,
                invalid(UncleError::SameAsBlock { uncle: uncle_hash }),
            );

            ensure!(
                !recent_ancestor_hashes.contains(&uncle_hash),
                invalid(UncleError::Ancestor { uncle: uncle_hash }),
            );

            ensure!(
                !recent_uncle_hashes.contains(&uncle_hash),
                invalid(UncleError::AlreadyIncluded { uncle: uncle_hash }),
            );

            let uncle_parent = recent_ancestors
                .iter()
                .find(|ancestor| ancestor.hash() == uncle.parent_hash)
                .ok_or_else(|| {
                    invalid(UncleError::ParentNotRecentAncestor {
                        uncle: uncle_hash,
                        parent_hash: uncle.parent_hash,
                    })
                })?;

            ensure!(
                uncle.number < header.number,
                invalid(UncleError::NotOlderThanBlock { uncle: uncle_hash }),
            );

            ensure!(
                uncle.number == uncle_parent.number + 1,
                invalid(UncleError::NumberNotSequential {
                    uncle: uncle_hash,
                    parent_number: uncle_parent.number,
                    number: uncle.number,
                }),
            );

            ensure!(
                uncle.timestamp >= uncle_parent.timestamp,
                invalid(UncleError::TimestampBeforeParent { uncle: uncle_hash }),
            );

            ensure!(
                uncle.gas_used <= uncle.gas_limit,
                invalid(UncleError::GasUsedExceedsLimit { uncle: uncle_hash }),
            );

            vm.validate_seal(uncle)
                .context(invalid(UncleError::InvalidSeal { uncle: uncle_hash }))?;
        }

        Ok(())
    }

    /// Adds the index and head changes that make `candidate` the head to `batch`.
    ///
    /// Returns the blocks that become canonical and the blocks that stop being canonical.
    /// `candidate` itself does not have to be stored yet, but all of its ancestors do.
    fn reorganize(
        &self,
        candidate: &Block,
        batch: &mut ChainBatch,
    ) -> Result<(Vec<Block>, Vec<Block>)> {
        let head_hash = self.head.hash();
        let candidate_hash = candidate.hash();

        let inconsistency = || Error::ReorgInconsistency {
            head: head_hash,
            candidate: candidate_hash,
        };

        let mut new_headers = vec![];
        let mut old_headers = vec![];
        let mut new_tip = candidate.header.clone();
        let mut old_tip = self.head.clone();

        while new_tip.number > old_tip.number {
            let parent = self.store.get_header(new_tip.parent_hash)?;
            new_headers.push(core::mem::replace(&mut new_tip, parent));
        }

        while old_tip.number > new_tip.number {
            let parent = self.store.get_header(old_tip.parent_hash)?;
            old_headers.push(core::mem::replace(&mut old_tip, parent));
        }

        while new_tip.hash() != old_tip.hash() {
            ensure!(!new_tip.is_genesis(), inconsistency());

            let new_parent = self.store.get_header(new_tip.parent_hash)?;
            let old_parent = self.store.get_header(old_tip.parent_hash)?;

            new_headers.push(core::mem::replace(&mut new_tip, new_parent));
            old_headers.push(core::mem::replace(&mut old_tip, old_parent));
        }

        let fork_point = new_tip;

        for header in core::iter::once(&fork_point).chain(&old_headers) {
            let indexed = self.store.get_canonical_hash(header.number).ok();
            ensure!(indexed == Some(header.hash()), inconsistency());
        }

        new_headers.reverse();
        old_headers.reverse();

        let new_canonical_blocks = new_headers
            .iter()
            .map(|header| match header.hash() {
                hash if hash == candidate_hash => Ok(candidate.clone()),
                hash => self.store.get_block(hash),
            })
            .collect::<Result<Vec<_>>>()?;

        let old_canonical_blocks = old_headers
            .iter()
            .map(|header| self.store.get_block(header.hash()))
            .collect::<Result<Vec<_>>>()?;

        for number in fork_point.number + 1..=self.head.number {
            batch.unset_canonical(number);
        }

        for header in &new_headers {
            batch.set_canonical(header.number, header.hash())?;
        }

        batch.set_head(candidate_hash)?;

        Ok((new_canonical_blocks, old_canonical_blocks))
    }
}

fn build_registry(config: &Config, seal_engine: Arc<dyn SealEngine>) -> Result<Arc<VmRegistry>> {
    let registry = VmRegistry::new(&config.vm_configuration, seal_engine)
        .context(Error::InvalidVmConfiguration)?;

    config.validate().context(Error::InvalidConfiguration)?;

    Ok(Arc::new(registry))
}

fn genesis_header(parameters: &GenesisParameters, state: &AccountState) -> BlockHeader {
    let GenesisParameters {
        difficulty,
        gas_limit,
        timestamp,
        coinbase,
        ref extra_data,
        mix_hash,
        nonce,
    } = *parameters;

    BlockHeader {
        parent_hash: H256::zero(),
        uncles_hash: EMPTY_LIST_HASH,
        coinbase,
        state_root: state.state_root(),
        transaction_root: EMPTY_LIST_HASH,
        receipt_root: EMPTY_LIST_HASH,
        difficulty,
        number: GENESIS_BLOCK_NUMBER,
        gas_limit,
        gas_used: 0,
        timestamp,
        extra_data: extra_data.clone(),
        mix_hash,
        nonce,
    }
}

fn validate_header(
    vm: &dyn VirtualMachine,
    parent: &BlockHeader,
    header: &BlockHeader,
) -> Result<(), HeaderError> {
    if header.number != parent.number.saturating_add(1) {
        return Err(HeaderError::NumberNotSequential {
            parent_number: parent.number,
            number: header.number,
        });
    }

    if header.timestamp <= parent.timestamp {
        return Err(HeaderError::TimestampNotIncreasing {
            parent_timestamp: parent.timestamp,
            timestamp: header.timestamp,
        });
    }

    if header.gas_limit < GAS_LIMIT_MINIMUM {
        return Err(HeaderError::GasLimitTooLow {
            gas_limit: header.gas_limit,
            minimum: GAS_LIMIT_MINIMUM,
        });
    }

    if header.gas_limit > GAS_LIMIT_MAXIMUM {
        return Err(HeaderError::GasLimitTooHigh {
            gas_limit: header.gas_limit,
            maximum: GAS_LIMIT_MAXIMUM,
        });
    }

    let (low, high) = gas_limit_bounds(parent);

    if header.gas_limit <= low || header.gas_limit >= high {
        return Err(HeaderError::GasLimitOutOfBounds {
            gas_limit: header.gas_limit,
            low,
            high,
        });
    }

    if header.gas_used > header.gas_limit {
        return Err(HeaderError::GasUsedExceedsLimit {
            gas_used: header.gas_used,
            gas_limit: header.gas_limit,
        });
    }

    if header.extra_data.len() > MAX_EXTRA_DATA_LENGTH {
        return Err(HeaderError::ExtraDataTooLong {
            length: header.extra_data.len(),
            maximum: MAX_EXTRA_DATA_LENGTH,
        });
    }

    let computed = vm.compute_difficulty(parent, header.timestamp);

    if computed != header.difficulty {
        return Err(HeaderError::DifficultyMismatch {
            computed,
            in_block: header.difficulty,
        });
    }

    Ok(())
}
