pub use ethereum_types::{H160, H256, H64, U256};

pub type Address = H160;
pub type BlockNumber = u64;
pub type Difficulty = U256;
pub type Gas = u64;
pub type NetworkId = u64;
pub type Nonce = u64;
pub type UnixSeconds = u64;
pub type Wei = U256;

/// Cumulative difficulty from genesis up to and including a header.
pub type Score = U256;
