use anyhow::Result;
use types::containers::BlockHeader;

/// Proof-of-work verification and production.
///
/// The chain consults the engine for every imported header and uncle.
pub trait SealEngine: Send + Sync {
    fn validate_seal(&self, header: &BlockHeader) -> Result<()>;

    /// Fills in `mix_hash` and `nonce` so that the header passes [`SealEngine::validate_seal`].
    fn seal(&self, header: BlockHeader) -> Result<BlockHeader>;
}

/// Accepts every header as is.
#[derive(Clone, Copy, Default, Debug)]
pub struct NoProof;

impl SealEngine for NoProof {
    fn validate_seal(&self, _header: &BlockHeader) -> Result<()> {
        Ok(())
    }

    fn seal(&self, header: BlockHeader) -> Result<BlockHeader> {
        Ok(header)
    }
}
