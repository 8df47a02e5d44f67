use std::collections::BTreeMap;

use alloy_rlp::{BufMut, Encodable};
use anyhow::{ensure, Result};
use hashing::{RlpBytes, RlpUint};
use im::OrdMap;
use serde::{Deserialize, Serialize};
use types::{
    containers::Account,
    primitives::{Address, Wei, H256},
};

use crate::Error;

/// Accounts keyed by address.
///
/// Cloning is cheap, so transitions work on a copy and replace the original only on success.
#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
#[serde(from = "BTreeMap<Address, Account>", into = "BTreeMap<Address, Account>")]
pub struct AccountState {
    accounts: OrdMap<Address, Account>,
}

impl From<BTreeMap<Address, Account>> for AccountState {
    fn from(accounts: BTreeMap<Address, Account>) -> Self {
        Self {
            accounts: accounts.into_iter().collect(),
        }
    }
}

impl From<AccountState> for BTreeMap<Address, Account> {
    fn from(state: AccountState) -> Self {
        state.accounts.into_iter().collect()
    }
}

impl AccountState {
    /// Returns the account at `address` or an empty one if it does not exist.
    #[must_use]
    pub fn account(&self, address: Address) -> Account {
        self.accounts.get(&address).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn balance(&self, address: Address) -> Wei {
        self.account(address).balance
    }

    #[must_use]
    pub fn nonce(&self, address: Address) -> u64 {
        self.account(address).nonce
    }

    #[must_use]
    pub fn contains(&self, address: Address) -> bool {
        self.accounts.contains_key(&address)
    }

    /// Adds `amount` to the balance of `address`, creating the account even if `amount` is zero.
    pub fn add_balance(&mut self, address: Address, amount: Wei) -> Result<()> {
        let account = self.accounts.entry(address).or_default();

        account.balance = account
            .balance
            .checked_add(amount)
            .ok_or(Error::BalanceOverflow { address })?;

        Ok(())
    }

    pub fn sub_balance(&mut self, address: Address, amount: Wei) -> Result<()> {
        let balance = self.balance(address);

        ensure!(
            balance >= amount,
            Error::InsufficientBalance {
                sender: address,
                balance,
                required: amount,
            },
        );

        self.accounts.entry(address).or_default().balance = balance - amount;

        Ok(())
    }

    pub fn increment_nonce(&mut self, address: Address) -> Result<()> {
        let account = self.accounts.entry(address).or_default();

        account.nonce = account
            .nonce
            .checked_add(1)
            .ok_or(Error::NonceOverflow { address })?;

        Ok(())
    }

    /// Removes the account at `address` if it has no nonce and no balance.
    pub fn clear_if_empty(&mut self, address: Address) {
        if self.accounts.get(&address).is_some_and(Account::is_empty) {
            self.accounts.remove(&address);
        }
    }

    /// Commitment to all accounts.
    ///
    /// This is the hash of the RLP list of `[address, nonce, balance]` entries in address order.
    /// The empty state has the same root as an empty list.
    #[must_use]
    pub fn state_root(&self) -> H256 {
        let entries = self
            .accounts
            .iter()
            .map(|(address, account)| AccountEntry { address, account })
            .collect::<Vec<_>>();

        hashing::hash_list(&entries)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

struct AccountEntry<'state> {
    address: &'state Address,
    account: &'state Account,
}

impl AccountEntry<'_> {
    fn with_rlp_fields<R>(&self, consume: impl FnOnce(&[&dyn Encodable]) -> R) -> R {
        let fields: [&dyn Encodable; 3] = [
            &RlpBytes(self.address.as_bytes()),
            &self.account.nonce,
            &RlpUint(self.account.balance),
        ];

        consume(&fields)
    }
}

impl Encodable for AccountEntry<'_> {
    fn encode(&self, out: &mut dyn BufMut) {
        self.with_rlp_fields(|fields| hashing::encode_fields(fields, out))
    }

    fn length(&self) -> usize {
        self.with_rlp_fields(|fields| hashing::fields_length(fields))
    }
}
