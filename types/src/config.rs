use std::{borrow::Cow, collections::BTreeMap, path::Path};

use anyhow::Result;
use hex_literal::hex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    consts::{GENESIS_DIFFICULTY, GENESIS_GAS_LIMIT},
    containers::Account,
    nonstandard::{Fork, ForkActivation},
    primitives::{Address, Difficulty, Gas, NetworkId, UnixSeconds, H256, H64},
};

/// Configuration variables customizable at runtime.
#[expect(
    clippy::struct_field_names,
    reason = "config_name mirrors the key used in configuration files"
)]
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Config {
    // Meta
    pub config_name: Cow<'static, str>,
    pub network_id: NetworkId,

    // Forking
    pub vm_configuration: Vec<ForkActivation>,

    // Genesis
    pub genesis: GenesisParameters,
    pub genesis_allocation: BTreeMap<Address, Account>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_name: Cow::Borrowed("tester"),
            network_id: 1337,
            vm_configuration: vec![ForkActivation::new(0, Fork::Frontier)],
            genesis: GenesisParameters::default(),
            genesis_allocation: BTreeMap::new(),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct GenesisParameters {
    pub difficulty: Difficulty,
    pub gas_limit: Gas,
    pub timestamp: UnixSeconds,
    pub coinbase: Address,
    #[serde(with = "hex")]
    pub extra_data: Vec<u8>,
    pub mix_hash: H256,
    pub nonce: H64,
}

impl Default for GenesisParameters {
    fn default() -> Self {
        Self {
            difficulty: GENESIS_DIFFICULTY,
            gas_limit: GENESIS_GAS_LIMIT,
            timestamp: 0,
            coinbase: Address::zero(),
            extra_data: vec![],
            mix_hash: H256::zero(),
            nonce: H64::zero(),
        }
    }
}

impl Config {
    /// Mainnet fork schedule and genesis header parameters.
    ///
    /// The genesis allocation is left empty.
    /// Constantinople and Petersburg activated at the same block on mainnet,
    /// so only Petersburg is listed.
    #[must_use]
    pub fn mainnet() -> Self {
        Self {
            config_name: Cow::Borrowed("mainnet"),
            network_id: 1,
            vm_configuration: vec![
                ForkActivation::new(0, Fork::Frontier),
                ForkActivation::new(1_150_000, Fork::Homestead),
                ForkActivation::new(2_463_000, Fork::TangerineWhistle),
                ForkActivation::new(2_675_000, Fork::SpuriousDragon),
                ForkActivation::new(4_370_000, Fork::Byzantium),
                ForkActivation::new(7_280_000, Fork::Petersburg),
                ForkActivation::new(9_069_000, Fork::Istanbul),
                ForkActivation::new(9_200_000, Fork::MuirGlacier),
            ],
            genesis: GenesisParameters {
                difficulty: Difficulty::from(17_179_869_184_u64),
                gas_limit: 5000,
                timestamp: 0,
                coinbase: Address::zero(),
                extra_data: hex!("11bbe8db4e347b4e8c937c1c8370e4b5ed33adb3db69cbdb7a38e1e50b1b82fa")
                    .to_vec(),
                mix_hash: H256::zero(),
                nonce: H64(hex!("0000000000000042")),
            },
            genesis_allocation: BTreeMap::new(),
        }
    }

    /// A single fork active from genesis. Used for local development and tests.
    #[must_use]
    pub fn tester(fork: Fork) -> Self {
        Self {
            config_name: Cow::Owned(format!("tester-{}", fork.as_ref().replace('_', "-"))),
            vm_configuration: vec![ForkActivation::new(0, fork)],
            ..Self::default()
        }
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = fs_err::read(path)?;
        let config = serde_yaml::from_slice::<Self>(&bytes)?;
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn with_allocation(mut self, address: Address, account: Account) -> Self {
        self.genesis_allocation.insert(address, account);
        self
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.config_name.is_empty() {
            return Err(Error::NameEmpty);
        }

        for character in self.config_name.chars() {
            if !matches!(character, 'a'..='z' | '0'..='9' | '-') {
                return Err(Error::NameContainsIllegalCharacters);
            }
        }

        if self.vm_configuration.is_empty() {
            return Err(Error::VmConfigurationEmpty);
        }

        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration name is empty")]
    NameEmpty,
    #[error("configuration name contains illegal characters")]
    NameContainsIllegalCharacters,
    #[error("VM configuration is empty")]
    VmConfigurationEmpty,
}

#[expect(
    clippy::needless_pass_by_value,
    reason = "Refactoring worsens readability, which is more important in tests."
)]
