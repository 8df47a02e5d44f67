use derive_more::Constructor;
use enum_iterator::Sequence;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use strum::{AsRefStr, Display, EnumString};

use crate::primitives::BlockNumber;

/// Named rule sets of the execution layer, in activation order.
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Debug,
    Sequence,
    AsRefStr,
    Display,
    EnumString,
    DeserializeFromStr,
    SerializeDisplay,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Fork {
    Frontier,
    Homestead,
    TangerineWhistle,
    SpuriousDragon,
    Byzantium,
    Constantinople,
    Petersburg,
    Istanbul,
    MuirGlacier,
}

/// One row of the fork schedule: `fork` is active from `block_number` until the next row.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Constructor, Deserialize, Serialize)]
#[serde(deny_unknown_fields, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ForkActivation {
    pub block_number: BlockNumber,
    pub fork: Fork,
}
