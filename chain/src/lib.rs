pub use crate::{
    chain::{Chain, ImportResult},
    chain_db::{ChainBatch, ChainDb},
    error::{Error, HeaderError, UncleError},
    mining::{Clock, MiningChain},
};

pub mod fork_choice;

mod chain;
mod chain_db;
mod error;
mod mining;

#[cfg(test)]
mod helpers;
