// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Account records and the account store.
//!
//! # Example
//!
//! ```
//! use bank_ledger_rs::{AccountStore, OwnerId};
//! use rust_decimal_macros::dec;
//!
//! let store = AccountStore::new();
//! let account = store.get_or_create(&OwnerId::new("alice"));
//! assert_eq!(account.balance(), dec!(0.00));
//! ```

use crate::base::{AccountId, OwnerId};
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::sync::Arc;

#[derive(Debug)]
struct AccountData {
    balance: Decimal,
}

impl AccountData {
    fn assert_invariants(&self) {
        debug_assert!(
            self.balance >= Decimal::ZERO,
            "Invariant violated: balance went negative: {}",
            self.balance
        );
    }

    /// Applies a signed delta, refusing to take the balance below zero.
    ///
    /// The check and the write happen under the caller's lock, so two
    /// concurrent adjustments can never both read the same stale balance.
    fn adjust(&mut self, delta: Decimal) -> Result<Decimal, LedgerError> {
        let next = self.balance + delta;
        if next < Decimal::ZERO {
            return Err(LedgerError::InsufficientFunds);
        }
        self.balance = next;
        self.assert_invariants();
        Ok(self.balance)
    }
}

/// A single owner's account.
///
/// Identity and creation time are immutable; the balance is guarded by a
/// per-account mutex and mutated only through the store's
/// [`AccountStore::adjust_balance`].
#[derive(Debug)]
pub struct Account {
    id: AccountId,
    owner: OwnerId,
    created_at: DateTime<Utc>,
    inner: Mutex<AccountData>,
}

impl Account {
    const DECIMAL_PRECISION: u32 = 2;

    fn open(owner: OwnerId) -> Self {
        Self {
            id: AccountId::generate(),
            owner,
            created_at: Utc::now(),
            inner: Mutex::new(AccountData {
                balance: Decimal::ZERO,
            }),
        }
    }

    pub fn id(&self) -> AccountId {
        self.id
    }

    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn balance(&self) -> Decimal {
        self.inner.lock().balance
    }

    fn adjust(&self, delta: Decimal) -> Result<Decimal, LedgerError> {
        self.inner.lock().adjust(delta)
    }

    /// Point-in-time copy of the account state.
    pub fn snapshot(&self) -> AccountSnapshot {
        AccountSnapshot {
            account_id: self.id,
            owner: self.owner.clone(),
            balance: self.balance(),
            created_at: self.created_at,
        }
    }
}

/// Owned copy of an account's state at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSnapshot {
    pub account_id: AccountId,
    pub owner: OwnerId,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Serialize for AccountSnapshot {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("AccountSnapshot", 4)?;
        state.serialize_field("account_id", &self.account_id)?;
        state.serialize_field("owner", &self.owner)?;
        state.serialize_field("balance", &self.balance.round_dp(Account::DECIMAL_PRECISION))?;
        state.serialize_field("created_at", &self.created_at.to_rfc3339())?;
        state.end()
    }
}

/// Store of all accounts, with an owner index for one-account-per-owner.
///
/// # Invariants
///
/// - At most one account per owner: creation is a conditional insert on
///   the owner index, so a lookup race cannot produce a second account.
/// - Balance adjustments are atomic per call; no intermediate state is
///   ever observable.
/// - Accounts are never deleted.
#[derive(Debug, Default)]
pub struct AccountStore {
    /// Accounts indexed by account id.
    accounts: DashMap<AccountId, Arc<Account>>,
    /// Owner index: each owner maps to their single account.
    by_owner: DashMap<OwnerId, AccountId>,
}

impl AccountStore {
    /// Creates a new store with no accounts.
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            by_owner: DashMap::new(),
        }
    }

    /// Creates a zero-balance account for `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AccountAlreadyExists`] if the owner already
    /// holds an account, including when a concurrent creator won the race.
    pub fn create(&self, owner: &OwnerId) -> Result<Arc<Account>, LedgerError> {
        // The vacant owner-index slot is the arbitration point: whichever
        // writer holds it inserts the account, the other sees Occupied.
        match self.by_owner.entry(owner.clone()) {
            Entry::Occupied(_) => Err(LedgerError::AccountAlreadyExists),
            Entry::Vacant(slot) => {
                let account = Arc::new(Account::open(owner.clone()));
                self.accounts.insert(account.id(), Arc::clone(&account));
                slot.insert(account.id());
                Ok(account)
            }
        }
    }

    /// Looks up the account held by `owner`.
    pub fn get_by_owner(&self, owner: &OwnerId) -> Option<Arc<Account>> {
        let id = *self.by_owner.get(owner)?;
        self.get_by_id(id)
    }

    /// Looks up an account by id.
    pub fn get_by_id(&self, id: AccountId) -> Option<Arc<Account>> {
        self.accounts.get(&id).map(|entry| Arc::clone(&entry))
    }

    /// Returns the owner's account, creating it on first sight.
    pub fn get_or_create(&self, owner: &OwnerId) -> Arc<Account> {
        loop {
            if let Some(account) = self.get_by_owner(owner) {
                return account;
            }
            if let Ok(account) = self.create(owner) {
                return account;
            }
            // Lost the creation race; the winner's account is now
            // visible, so the lookup succeeds on retry.
        }
    }

    /// Atomically applies `delta` to the stored balance.
    ///
    /// Returns the post-delta balance.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::AccountNotFound`] - no account with this id.
    /// - [`LedgerError::InsufficientFunds`] - the delta would take the
    ///   balance below zero; the stored balance is left untouched.
    pub fn adjust_balance(&self, id: AccountId, delta: Decimal) -> Result<Decimal, LedgerError> {
        let account = self.get_by_id(id).ok_or(LedgerError::AccountNotFound)?;
        account.adjust(delta)
    }

    /// Returns an iterator over all accounts.
    ///
    /// Useful for generating output reports of account states.
    pub fn iter(
        &self,
    ) -> impl Iterator<Item = dashmap::mapref::multiple::RefMulti<'_, AccountId, Arc<Account>>>
    {
        self.accounts.iter()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}
