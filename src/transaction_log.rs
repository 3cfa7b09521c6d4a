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

//! Append-only transaction log.
//!
//! Records are only ever added, never modified or removed. A per-account
//! secondary index serves the both-endpoint query without scanning the
//! full record set.

use crate::base::{AccountId, TransactionId};
use crate::error::LedgerError;
use crate::transaction::{Transaction, TransactionKind};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Thread-safe append-only store of transaction records.
///
/// Combines a [`DashMap`] for O(1) lookup by id with a per-account index
/// for endpoint queries. All operations are safe for concurrent access.
#[derive(Debug, Default)]
pub struct TransactionLog {
    /// Records indexed by transaction id.
    transactions: DashMap<TransactionId, Arc<Transaction>>,

    /// Transaction ids touching each account, for endpoint queries.
    by_account: DashMap<AccountId, Vec<TransactionId>>,
}

impl TransactionLog {
    /// Creates a new empty log.
    pub fn new() -> Self {
        Self {
            transactions: DashMap::new(),
            by_account: DashMap::new(),
        }
    }

    /// Validates and appends a new record.
    ///
    /// Once validated the append always succeeds; there are no rollback
    /// semantics on an append-only store.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] - amount is zero or negative.
    /// - [`LedgerError::InvalidTransaction`] - endpoints inconsistent with
    ///   the kind.
    pub fn append(
        &self,
        from_account: Option<AccountId>,
        to_account: Option<AccountId>,
        amount: Decimal,
        kind: TransactionKind,
        description: impl Into<String>,
    ) -> Result<Arc<Transaction>, LedgerError> {
        let transaction = Arc::new(Transaction::record(
            from_account,
            to_account,
            amount,
            kind,
            description,
        )?);
        let id = transaction.id();

        for endpoint in [from_account, to_account].into_iter().flatten() {
            self.by_account.entry(endpoint).or_default().push(id);
        }
        self.transactions.insert(id, Arc::clone(&transaction));

        Ok(transaction)
    }

    /// Looks up a record by id.
    pub fn get(&self, id: TransactionId) -> Option<Arc<Transaction>> {
        self.transactions.get(&id).map(|entry| Arc::clone(&entry))
    }

    /// Returns up to `limit` records where the account is either endpoint.
    ///
    /// Result order follows the index, not creation time; callers needing
    /// chronology sort by [`Transaction::created_at`] themselves. Each call
    /// re-executes the query.
    pub fn list_for_account(&self, account: AccountId, limit: usize) -> Vec<Arc<Transaction>> {
        let Some(ids) = self.by_account.get(&account) else {
            return Vec::new();
        };
        ids.iter()
            .take(limit)
            .filter_map(|id| self.transactions.get(id).map(|entry| Arc::clone(&entry)))
            .collect()
    }

    /// Number of records appended so far.
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}
