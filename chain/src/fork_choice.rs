//! Heaviest-chain rule.
//!
//! The score of a header is the total difficulty of all headers from genesis up to and
//! including it.

use anyhow::Result;
use types::{containers::BlockHeader, primitives::Score};

use crate::Error;

/// Ties favor the current head.
#[must_use]
pub fn should_reorganize(current_head_score: Score, candidate_score: Score) -> bool {
    candidate_score > current_head_score
}

pub fn score_of(parent_score: Score, header: &BlockHeader) -> Result<Score> {
    parent_score
        .checked_add(header.difficulty)
        .ok_or_else(|| Error::ScoreOverflow {
            hash: header.hash(),
        })
        .map_err(Into::into)
}

#[must_use]
pub fn genesis_score(genesis: &BlockHeader) -> Score {
    genesis.difficulty
}
