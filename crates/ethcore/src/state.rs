// Copyright 2015-2020 Parity Technologies (UK) Ltd.
// This file is part of Ferron.

// Ferron is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// Ferron is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with Ferron.  If not, see <http://www.gnu.org/licenses/>.

//! An in-memory account state with savepoints.
//!
//! The execution pipeline and the packer fork this state, run transactions
//! against it and either merge or roll back savepoints. The root is the
//! secure-trie root over the account RLPs, the same commitment the header
//! `state_root` field carries.

use std::collections::HashMap;

use ethereum_types::{Address, H256, U256};
use types::{basic_account::BasicAccount, trie_root::sec_trie_root};

use machine::ExecutionError;

/// In-memory account state.
#[derive(Debug, Clone, Default)]
pub struct StateDb {
    accounts: HashMap<Address, BasicAccount>,
    // Each checkpoint maps a touched address to its prior value
    // (`None` when the account did not exist).
    checkpoints: Vec<HashMap<Address, Option<BasicAccount>>>,
}

impl StateDb {
    /// Create an empty state.
    pub fn new() -> Self {
        StateDb::default()
    }

    /// Install an account, e.g. from a genesis allocation.
    pub fn insert_account(&mut self, address: Address, account: BasicAccount) {
        self.note(address);
        self.accounts.insert(address, account);
    }

    /// Whether the account exists.
    pub fn exists(&self, address: &Address) -> bool {
        self.accounts.contains_key(address)
    }

    /// The balance of the account, zero when absent.
    pub fn balance(&self, address: &Address) -> U256 {
        self.accounts
            .get(address)
            .map(|acc| acc.balance)
            .unwrap_or_default()
    }

    /// The nonce of the account, zero when absent.
    pub fn nonce(&self, address: &Address) -> U256 {
        self.accounts
            .get(address)
            .map(|acc| acc.nonce)
            .unwrap_or_default()
    }

    fn note(&mut self, address: Address) {
        let prior = self.accounts.get(&address).cloned();
        if let Some(checkpoint) = self.checkpoints.last_mut() {
            checkpoint.entry(address).or_insert(prior);
        }
    }

    fn account_mut(&mut self, address: Address) -> &mut BasicAccount {
        self.note(address);
        self.accounts
            .entry(address)
            .or_insert_with(BasicAccount::default)
    }

    /// Credit the account.
    pub fn add_balance(&mut self, address: Address, amount: U256) {
        if amount.is_zero() && self.exists(&address) {
            return;
        }
        let account = self.account_mut(address);
        account.balance = account.balance.saturating_add(amount);
    }

    /// Debit the account, failing when the balance does not cover it.
    pub fn sub_balance(&mut self, address: Address, amount: U256) -> Result<(), ExecutionError> {
        let balance = self.balance(&address);
        if balance < amount {
            return Err(ExecutionError::NotEnoughCash {
                required: amount,
                got: balance,
            });
        }
        let account = self.account_mut(address);
        account.balance = account.balance - amount;
        Ok(())
    }

    /// Bump the account nonce.
    pub fn inc_nonce(&mut self, address: Address) {
        let account = self.account_mut(address);
        account.nonce = account.nonce.saturating_add(U256::one());
    }

    /// Remove the account entirely (self-destruct).
    pub fn kill_account(&mut self, address: Address) {
        self.note(address);
        self.accounts.remove(&address);
    }

    /// EIP158: remove the given accounts if they ended up empty.
    pub fn kill_empty_accounts<'a, I>(&mut self, touched: I)
    where
        I: IntoIterator<Item = &'a Address>,
    {
        for address in touched {
            let is_empty = self
                .accounts
                .get(address)
                .map_or(false, |acc| acc.nonce.is_zero() && acc.balance.is_zero());
            if is_empty {
                self.kill_account(*address);
            }
        }
    }

    /// Open a savepoint.
    pub fn checkpoint(&mut self) {
        self.checkpoints.push(HashMap::new());
    }

    /// Merge the last savepoint into its parent.
    pub fn discard_checkpoint(&mut self) {
        let checkpoint = self
            .checkpoints
            .pop()
            .expect("discard called without a checkpoint; qed");
        if let Some(parent) = self.checkpoints.last_mut() {
            for (address, prior) in checkpoint {
                parent.entry(address).or_insert(prior);
            }
        }
    }

    /// Undo everything since the last savepoint.
    pub fn revert_to_checkpoint(&mut self) {
        let checkpoint = self
            .checkpoints
            .pop()
            .expect("revert called without a checkpoint; qed");
        for (address, prior) in checkpoint {
            match prior {
                Some(account) => {
                    self.accounts.insert(address, account);
                }
                None => {
                    self.accounts.remove(&address);
                }
            }
        }
    }

    /// The secure-trie root over the account RLPs.
    pub fn root(&self) -> H256 {
        sec_trie_root(
            self.accounts
                .iter()
                .map(|(address, account)| (address.as_bytes().to_vec(), ::rlp::encode(account))),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    #[test]
    fn balances_and_nonces() {
        let mut state = StateDb::new();
        state.add_balance(address(1), 100.into());
        state.inc_nonce(address(1));
        assert_eq!(state.balance(&address(1)), 100.into());
        assert_eq!(state.nonce(&address(1)), 1.into());

        assert!(state.sub_balance(address(1), 200.into()).is_err());
        state.sub_balance(address(1), 40.into()).unwrap();
        assert_eq!(state.balance(&address(1)), 60.into());
    }

    #[test]
    fn revert_restores_prior_state() {
        let mut state = StateDb::new();
        state.add_balance(address(1), 100.into());

        state.checkpoint();
        state.add_balance(address(1), 1.into());
        state.add_balance(address(2), 5.into());
        state.kill_account(address(1));
        state.revert_to_checkpoint();

        assert_eq!(state.balance(&address(1)), 100.into());
        assert!(!state.exists(&address(2)));
    }

    #[test]
    fn discard_merges_into_parent() {
        let mut state = StateDb::new();
        state.checkpoint();
        state.add_balance(address(1), 7.into());
        state.checkpoint();
        state.add_balance(address(1), 3.into());
        state.discard_checkpoint();
        // The outer checkpoint still knows the original (absent) value.
        state.revert_to_checkpoint();
        assert!(!state.exists(&address(1)));
    }

    #[test]
    fn empty_account_cleanup() {
        let mut state = StateDb::new();
        state.add_balance(address(1), 0.into());
        assert!(state.exists(&address(1)));
        state.kill_empty_accounts(&[address(1)]);
        assert!(!state.exists(&address(1)));

        state.add_balance(address(2), 1.into());
        state.kill_empty_accounts(&[address(2)]);
        assert!(state.exists(&address(2)));
    }

    #[test]
    fn root_changes_with_content() {
        let mut state = StateDb::new();
        let empty_root = state.root();
        state.add_balance(address(1), 1.into());
        assert_ne!(state.root(), empty_root);

        let mut same = StateDb::new();
        same.add_balance(address(1), 1.into());
        assert_eq!(state.root(), same.root());
    }
}
