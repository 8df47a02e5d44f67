use core::fmt::Display;
use std::borrow::Cow;

use anyhow::{Error as AnyhowError, Result};
use database::{BatchOperation, Database, PrefixableKey};
use derive_more::Display;
use serde::{de::DeserializeOwned, Serialize};
use transition_functions::AccountState;
use types::{
    consts::GENESIS_BLOCK_NUMBER,
    containers::{Block, BlockHeader},
    primitives::{BlockNumber, Score, H256},
};

use crate::{fork_choice, Error};

/// Headers, bodies, scores and post-states keyed by hash, plus the canonical number index.
///
/// Nothing is ever deleted except canonical index entries.
pub struct ChainDb {
    database: Database,
}

impl ChainDb {
    #[must_use]
    pub const fn new(database: Database) -> Self {
        Self { database }
    }

    #[must_use]
    pub fn into_database(self) -> Database {
        self.database
    }

    /// Returns a store over an independent copy of the underlying database.
    #[must_use]
    pub fn copy(&self) -> Self {
        Self::new(self.database.copy())
    }

    pub fn contains_header(&self, hash: H256) -> Result<bool> {
        self.database.contains_key(HeaderByHash(hash).to_string())
    }

    /// Whether the whole block is stored, as opposed to only its header.
    pub fn contains_block(&self, hash: H256) -> Result<bool> {
        self.database.contains_key(BodyByHash(hash).to_string())
    }

    pub fn contains_head(&self) -> Result<bool> {
        self.database.contains_key(CanonicalHead.to_string())
    }

    pub fn get_header(&self, hash: H256) -> Result<BlockHeader> {
        self.get(HeaderByHash(hash))?
            .ok_or(Error::HeaderNotFound { hash })
            .map_err(Into::into)
    }

    /// Stores `header` and its score unless it is already present.
    ///
    /// Returns the score of `header`.
    pub fn put_header(&self, header: &BlockHeader) -> Result<Score> {
        let hash = header.hash();

        if self.contains_header(hash)? {
            return self.get_score(hash);
        }

        let score = self.compute_score(header)?;

        self.database.put_batch([
            serialize(HeaderByHash(hash), header)?,
            serialize(ScoreByHash(hash), score)?,
        ])?;

        Ok(score)
    }

    pub fn get_block(&self, hash: H256) -> Result<Block> {
        let header = self
            .get(HeaderByHash(hash))?
            .ok_or(Error::BlockNotFound { hash })?;

        let body = self
            .get(BodyByHash(hash))?
            .ok_or(Error::BlockNotFound { hash })?;

        Ok(Block::from_parts(header, body))
    }

    pub fn get_score(&self, hash: H256) -> Result<Score> {
        self.get(ScoreByHash(hash))?
            .ok_or(Error::HeaderNotFound { hash })
            .map_err(Into::into)
    }

    pub fn get_state(&self, state_root: H256) -> Result<AccountState> {
        self.get(StateByRoot(state_root))?
            .ok_or(Error::StateNotFound { state_root })
            .map_err(Into::into)
    }

    pub fn get_canonical_hash(&self, number: BlockNumber) -> Result<H256> {
        self.get(CanonicalHashByNumber(number))?
            .ok_or(Error::NotCanonical { number })
            .map_err(Into::into)
    }

    pub fn get_canonical_header(&self, number: BlockNumber) -> Result<BlockHeader> {
        self.get_header(self.get_canonical_hash(number)?)
    }

    pub fn get_canonical_head(&self) -> Result<BlockHeader> {
        let hash = self.get(CanonicalHead)?.ok_or(Error::HeadNotFound)?;
        self.get_header(hash)
    }

    /// Returns up to `limit` ancestors of `header`, starting with its parent.
    ///
    /// Stops early at genesis.
    pub fn get_ancestors(&self, limit: usize, header: &BlockHeader) -> Result<Vec<BlockHeader>> {
        let mut ancestors = Vec::with_capacity(limit);
        let mut number = header.number;
        let mut parent_hash = header.parent_hash;

        while ancestors.len() < limit && number > GENESIS_BLOCK_NUMBER {
            let parent = self.get_header(parent_hash)?;

            number = parent.number;
            parent_hash = parent.parent_hash;

            ancestors.push(parent);
        }

        Ok(ancestors)
    }

    /// Returns the whole canonical index in ascending order of block number.
    pub fn canonical_hashes(&self) -> Result<Vec<(BlockNumber, H256)>> {
        let start = CanonicalHashByNumber(GENESIS_BLOCK_NUMBER).to_string();
        let mut hashes = vec![];

        for result in self.database.iterator_ascending(start..)? {
            let (key_bytes, value_bytes) = result?;

            if !CanonicalHashByNumber::has_prefix(&key_bytes) {
                break;
            }

            let CanonicalHashByNumber(number) = key_bytes.try_into()?;
            let hash = bincode::deserialize(&value_bytes)?;

            hashes.push((number, hash));
        }

        Ok(hashes)
    }

    /// Applies every change in `batch` atomically.
    pub fn commit(&self, batch: ChainBatch) -> Result<()> {
        self.database.apply_batch(batch.operations)
    }

    /// Returns the score `header` has once stored.
    ///
    /// Fails with [`Error::ParentNotFound`] unless `header` is a genesis header or its parent is
    /// stored.
    pub fn compute_score(&self, header: &BlockHeader) -> Result<Score> {
        if header.is_genesis() {
            return Ok(fork_choice::genesis_score(header));
        }

        let parent_score = self
            .get(ScoreByHash(header.parent_hash))?
            .ok_or_else(|| Error::ParentNotFound {
                block_hash: header.hash(),
                parent_hash: header.parent_hash,
            })?;

        fork_choice::score_of(parent_score, header)
    }

    fn get<V: DeserializeOwned>(&self, key: impl Display) -> Result<Option<V>> {
        self.database
            .get(key.to_string())?
            .map(|bytes| bincode::deserialize(&bytes))
            .transpose()
            .map_err(Into::into)
    }
}

/// Writes committed together by [`ChainDb::commit`]: new blocks along with the canonical index
/// and head changes they cause.
#[derive(Default)]
pub struct ChainBatch {
    operations: Vec<BatchOperation<String, Vec<u8>>>,
}

impl ChainBatch {
    /// Stores the header, body, score and post-state of `block`.
    ///
    /// Does not touch the canonical index.
    pub fn persist_block(
        &mut self,
        block: &Block,
        post_state: &AccountState,
        score: Score,
    ) -> Result<()> {
        let hash = block.hash();
        let state_root = block.header.state_root;
        let (header, body) = block.clone().into_parts();

        for (key, value) in [
            serialize(HeaderByHash(hash), header)?,
            serialize(BodyByHash(hash), body)?,
            serialize(ScoreByHash(hash), score)?,
            serialize(StateByRoot(state_root), post_state)?,
        ] {
            self.operations.push(BatchOperation::Put(key, value));
        }

        Ok(())
    }

    pub fn set_canonical(&mut self, number: BlockNumber, hash: H256) -> Result<()> {
        let (key, value) = serialize(CanonicalHashByNumber(number), hash)?;
        self.operations.push(BatchOperation::Put(key, value));
        Ok(())
    }

    pub fn unset_canonical(&mut self, number: BlockNumber) {
        let key = CanonicalHashByNumber(number).to_string();
        self.operations.push(BatchOperation::Delete(key));
    }

    pub fn set_head(&mut self, hash: H256) -> Result<()> {
        let (key, value) = serialize(CanonicalHead, hash)?;
        self.operations.push(BatchOperation::Put(key, value));
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

#[derive(Display)]
#[display("{}{_0:x}", Self::PREFIX)]
pub struct HeaderByHash(pub H256);

impl PrefixableKey for HeaderByHash {
    const PREFIX: &'static str = "h";
}

#[derive(Display)]
#[display("{}{_0:x}", Self::PREFIX)]
pub struct BodyByHash(pub H256);

impl PrefixableKey for BodyByHash {
    const PREFIX: &'static str = "b";
}

#[derive(Display)]
#[display("{}{_0:x}", Self::PREFIX)]
pub struct ScoreByHash(pub H256);

impl PrefixableKey for ScoreByHash {
    const PREFIX: &'static str = "d";
}

#[derive(Display)]
#[display("{}{_0:x}", Self::PREFIX)]
pub struct StateByRoot(pub H256);

impl PrefixableKey for StateByRoot {
    const PREFIX: &'static str = "s";
}

#[derive(Display)]
#[display("{}{_0:020}", Self::PREFIX)]
pub struct CanonicalHashByNumber(pub BlockNumber);

impl TryFrom<Cow<'_, [u8]>> for CanonicalHashByNumber {
    type Error = AnyhowError;

    fn try_from(bytes: Cow<[u8]>) -> Result<Self> {
        let payload =
            bytes
                .strip_prefix(Self::PREFIX.as_bytes())
                .ok_or_else(|| Error::IncorrectPrefix {
                    bytes: bytes.to_vec(),
                })?;

        let string = core::str::from_utf8(payload)?;
        let number = string.parse()?;

        Ok(Self(number))
    }
}

impl PrefixableKey for CanonicalHashByNumber {
    const PREFIX: &'static str = "n";
}

#[derive(Display)]
#[display("{}", Self::KEY)]
pub struct CanonicalHead;

impl PrefixableKey for CanonicalHead {
    const PREFIX: &'static str = Self::KEY;
}

impl CanonicalHead {
    const KEY: &'static str = "chead";
}

fn serialize(key: impl Display, value: impl Serialize) -> Result<(String, Vec<u8>)> {
    Ok((key.to_string(), bincode::serialize(&value)?))
}

#[cfg(test)]
mod tests {
    use hashing::EMPTY_LIST_HASH;
    use types::{
        containers::BlockBody,
        primitives::{Address, H64, U256},
    };

    use super::*;

    fn genesis() -> BlockHeader {
        BlockHeader {
            parent_hash: H256::zero(),
            uncles_hash: EMPTY_LIST_HASH,
            coinbase: Address::zero(),
            state_root: EMPTY_LIST_HASH,
            transaction_root: EMPTY_LIST_HASH,
            receipt_root: EMPTY_LIST_HASH,
            difficulty: U256::from(131_072),
            number: 0,
            gas_limit: 3_141_592,
            gas_used: 0,
            timestamp: 0,
            extra_data: vec![],
            mix_hash: H256::zero(),
            nonce: H64::zero(),
        }
    }

    fn child(parent: &BlockHeader, difficulty: u64) -> BlockHeader {
        BlockHeader {
            parent_hash: parent.hash(),
            difficulty: U256::from(difficulty),
            number: parent.number + 1,
            timestamp: parent.timestamp + 1,
            ..parent.clone()
        }
    }

    fn empty_block(header: BlockHeader) -> Block {
        Block::from_parts(header, BlockBody::default())
    }

    #[test]
    fn key_formats() {
        assert_eq!(
            CanonicalHashByNumber(42).to_string(),
            "n00000000000000000042",
        );
        assert_eq!(
            HeaderByHash(H256::repeat_byte(0xab)).to_string(),
            format!("h{}", "ab".repeat(32)),
        );
        assert_eq!(CanonicalHead.to_string(), "chead");
    }

    #[test]
    fn canonical_key_parsing_rejects_other_prefixes() -> Result<()> {
        let key = CanonicalHashByNumber::try_from(Cow::Borrowed(&b"n00000000000000000007"[..]))?;

        assert_eq!(key.0, 7);

        let error = CanonicalHashByNumber::try_from(Cow::Borrowed(&b"h00"[..]))
            .err()
            .expect("key with another prefix should be rejected");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::IncorrectPrefix { .. }),
        ));

        Ok(())
    }

    #[test]
    fn put_header_computes_cumulative_score() -> Result<()> {
        let store = ChainDb::new(Database::in_memory());
        let genesis = genesis();
        let block_1 = child(&genesis, 200_000);
        let block_2 = child(&block_1, 300_000);

        assert_eq!(store.put_header(&genesis)?, U256::from(131_072));
        assert_eq!(store.put_header(&block_1)?, U256::from(331_072));
        assert_eq!(store.put_header(&block_2)?, U256::from(631_072));

        // Storing a header again returns the existing score.
        assert_eq!(store.put_header(&block_1)?, U256::from(331_072));

        assert_eq!(store.get_header(block_2.hash())?, block_2);
        assert_eq!(store.get_score(block_1.hash())?, U256::from(331_072));

        Ok(())
    }

    #[test]
    fn put_header_requires_parent() {
        let store = ChainDb::new(Database::in_memory());
        let orphan = child(&child(&genesis(), 1), 1);

        let error = store
            .put_header(&orphan)
            .expect_err("header without a stored parent should be rejected");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::ParentNotFound { parent_hash, .. }) if *parent_hash == orphan.parent_hash,
        ));
    }

    #[test]
    fn lookups_of_missing_entries_fail_with_typed_errors() {
        let store = ChainDb::new(Database::in_memory());
        let hash = H256::repeat_byte(1);

        let header_error = store.get_header(hash).expect_err("store is empty");
        let block_error = store.get_block(hash).expect_err("store is empty");
        let canonical_error = store.get_canonical_header(3).expect_err("store is empty");
        let head_error = store.get_canonical_head().expect_err("store is empty");
        let state_error = store.get_state(hash).expect_err("store is empty");

        assert!(matches!(
            header_error.downcast_ref::<Error>(),
            Some(Error::HeaderNotFound { .. }),
        ));
        assert!(matches!(
            block_error.downcast_ref::<Error>(),
            Some(Error::BlockNotFound { .. }),
        ));
        assert!(matches!(
            canonical_error.downcast_ref::<Error>(),
            Some(Error::NotCanonical { number: 3 }),
        ));
        assert!(matches!(
            head_error.downcast_ref::<Error>(),
            Some(Error::HeadNotFound),
        ));
        assert!(matches!(
            state_error.downcast_ref::<Error>(),
            Some(Error::StateNotFound { .. }),
        ));
    }

    #[test]
    fn persist_block_stores_every_part() -> Result<()> {
        let store = ChainDb::new(Database::in_memory());
        let genesis = empty_block(genesis());
        let state = AccountState::default();
        let score = store.compute_score(&genesis.header)?;

        let mut batch = ChainBatch::default();
        batch.persist_block(&genesis, &state, score)?;

        assert!(!store.contains_header(genesis.hash())?);

        store.commit(batch)?;

        assert_eq!(score, genesis.header.difficulty);
        assert_eq!(store.get_score(genesis.hash())?, score);
        assert_eq!(store.get_block(genesis.hash())?, genesis);
        assert_eq!(store.get_state(genesis.header.state_root)?, state);
        assert!(store.contains_header(genesis.hash())?);
        assert!(store.contains_block(genesis.hash())?);

        Ok(())
    }

    #[test]
    fn chain_batch_is_applied_atomically_in_order() -> Result<()> {
        let store = ChainDb::new(Database::in_memory());
        let genesis = genesis();
        let block_1 = child(&genesis, 1);
        let block_2 = child(&block_1, 1);

        for header in [&genesis, &block_1, &block_2] {
            store.put_header(header)?;
        }

        let mut batch = ChainBatch::default();
        batch.set_canonical(0, genesis.hash())?;
        batch.set_canonical(1, block_1.hash())?;
        batch.set_canonical(2, block_2.hash())?;
        batch.set_head(block_2.hash())?;

        assert_eq!(batch.len(), 4);

        store.commit(batch)?;

        assert_eq!(store.get_canonical_head()?, block_2);
        assert_eq!(
            store.canonical_hashes()?,
            [(0, genesis.hash()), (1, block_1.hash()), (2, block_2.hash())],
        );

        let mut batch = ChainBatch::default();
        batch.unset_canonical(2);
        batch.set_head(block_1.hash())?;

        store.commit(batch)?;

        assert_eq!(store.get_canonical_head()?, block_1);
        assert_eq!(store.get_canonical_header(1)?, block_1);
        assert!(store.get_canonical_hash(2).is_err());

        // Headers are kept after they stop being canonical.
        assert_eq!(store.get_header(block_2.hash())?, block_2);

        Ok(())
    }

    #[test]
    fn block_and_index_changes_share_one_batch() -> Result<()> {
        let store = ChainDb::new(Database::in_memory());
        let genesis = empty_block(genesis());
        let block_1 = empty_block(child(&genesis.header, 1));
        let state = AccountState::default();

        let mut batch = ChainBatch::default();
        batch.persist_block(&genesis, &state, store.compute_score(&genesis.header)?)?;
        batch.set_canonical(0, genesis.hash())?;
        batch.set_head(genesis.hash())?;

        assert!(!store.contains_head()?);

        store.commit(batch)?;

        assert!(store.contains_head()?);

        let score = store.compute_score(&block_1.header)?;

        let mut batch = ChainBatch::default();
        batch.persist_block(&block_1, &state, score)?;
        batch.set_canonical(1, block_1.hash())?;
        batch.set_head(block_1.hash())?;

        // Nothing is visible before the commit.
        assert_eq!(store.get_canonical_head()?, genesis.header);
        assert!(!store.contains_block(block_1.hash())?);

        store.commit(batch)?;

        assert_eq!(store.get_canonical_head()?, block_1.header);
        assert_eq!(store.get_score(block_1.hash())?, score);
        assert_eq!(score, genesis.header.difficulty + U256::one());
        assert_eq!(
            store.canonical_hashes()?,
            [(0, genesis.hash()), (1, block_1.hash())],
        );

        Ok(())
    }

    #[test]
    fn get_ancestors_stops_at_limit_and_genesis() -> Result<()> {
        let store = ChainDb::new(Database::in_memory());
        let genesis = genesis();
        let block_1 = child(&genesis, 1);
        let block_2 = child(&block_1, 1);
        let block_3 = child(&block_2, 1);

        for header in [&genesis, &block_1, &block_2] {
            store.put_header(header)?;
        }

        assert_eq!(store.get_ancestors(2, &block_3)?, [block_2.clone(), block_1.clone()]);
        assert_eq!(
            store.get_ancestors(10, &block_3)?,
            [block_2, block_1, genesis.clone()],
        );
        assert!(store.get_ancestors(10, &genesis)?.is_empty());

        Ok(())
    }

    #[test]
    fn copies_are_independent() -> Result<()> {
        let original = ChainDb::new(Database::in_memory());
        let genesis = genesis();

        original.put_header(&genesis)?;

        let copy = original.copy();
        let block_1 = child(&genesis, 1);

        copy.put_header(&block_1)?;

        assert!(copy.contains_header(block_1.hash())?);
        assert!(!original.contains_header(block_1.hash())?);

        Ok(())
    }
}
