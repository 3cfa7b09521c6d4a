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

//! Immutable transaction records.
//!
//! A transaction describes one completed money movement. The endpoint shape
//! is fixed per kind:
//!
//! | Kind | `from_account` | `to_account` |
//! |------|----------------|--------------|
//! | Deposit | `None` (external source) | `Some` |
//! | Withdraw | `Some` | `None` (external sink) |
//! | Transfer | `Some` | `Some`, distinct |

use crate::base::{AccountId, TransactionId};
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of money movement a transaction records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deposit,
    Withdraw,
    Transfer,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdraw => "withdrawal",
            TransactionKind::Transfer => "transfer",
        };
        write!(f, "{label}")
    }
}

/// A single recorded money movement.
///
/// Created exactly once per successful ledger operation and immutable
/// thereafter; all fields are read through accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    id: TransactionId,
    from_account: Option<AccountId>,
    to_account: Option<AccountId>,
    amount: Decimal,
    kind: TransactionKind,
    description: String,
    created_at: DateTime<Utc>,
}

impl Transaction {
    /// Builds a transaction, validating amount and endpoint shape.
    ///
    /// The id and timestamp are stamped here; the timestamp is
    /// clock-based and carries an explicit UTC offset, but monotonicity
    /// across records is not guaranteed.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] - amount is zero or negative.
    /// - [`LedgerError::InvalidTransaction`] - endpoints do not match the
    ///   kind, or a transfer names the same account twice.
    pub(crate) fn record(
        from_account: Option<AccountId>,
        to_account: Option<AccountId>,
        amount: Decimal,
        kind: TransactionKind,
        description: impl Into<String>,
    ) -> Result<Self, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }

        let endpoints_valid = match kind {
            TransactionKind::Deposit => from_account.is_none() && to_account.is_some(),
            TransactionKind::Withdraw => from_account.is_some() && to_account.is_none(),
            TransactionKind::Transfer => match (from_account, to_account) {
                (Some(from), Some(to)) => from != to,
                _ => false,
            },
        };
        if !endpoints_valid {
            return Err(LedgerError::InvalidTransaction);
        }

        Ok(Transaction {
            id: TransactionId::generate(),
            from_account,
            to_account,
            amount,
            kind,
            description: description.into(),
            created_at: Utc::now(),
        })
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn from_account(&self) -> Option<AccountId> {
        self.from_account
    }

    pub fn to_account(&self) -> Option<AccountId> {
        self.to_account
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// True if the given account is either endpoint.
    pub fn touches(&self, account: AccountId) -> bool {
        self.from_account == Some(account) || self.to_account == Some(account)
    }
}
