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

//! Error types for ledger operations.

use crate::base::AccountId;
use rust_decimal::Decimal;
use thiserror::Error;

/// Ledger operation errors.
///
/// Every rejection is returned as a typed outcome; apart from
/// [`LedgerError::InconsistentState`], a returned error means the ledger
/// was not mutated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Amount is zero or negative
    #[error("invalid amount (must be positive)")]
    InvalidAmount,

    /// Operation would take the balance below zero
    #[error("insufficient available funds")]
    InsufficientFunds,

    /// No account exists for the given owner
    #[error("account not found")]
    AccountNotFound,

    /// Transfer recipient could not be resolved by account id or contact
    #[error("recipient not found")]
    RecipientNotFound,

    /// Transfer source and recipient are the same account
    #[error("cannot transfer to the same account")]
    SelfTransfer,

    /// Owner already holds an account (creation race lost)
    #[error("account already exists for this owner")]
    AccountAlreadyExists,

    /// Transaction endpoints are inconsistent with its kind
    #[error("invalid transaction endpoints for kind")]
    InvalidTransaction,

    /// A multi-step mutation partially applied and could not be compensated.
    ///
    /// Fatal to the operation; the engine logs the account and amount for
    /// manual reconciliation before returning this.
    #[error("inconsistent ledger state: {amount} not restored to account {account}")]
    InconsistentState { account: AccountId, amount: Decimal },
}

impl LedgerError {
    /// True for the one error category that indicates a partially-applied
    /// mutation rather than a clean rejection.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LedgerError::InconsistentState { .. })
    }
}

/// Notification delivery errors.
///
/// Absorbed inside the notifier worker; these never reach a ledger
/// operation's caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// Delivery channel is not configured for this contact
    #[error("delivery channel not configured")]
    NotConfigured,

    /// The delivery provider rejected or failed the send
    #[error("delivery failed: {0}")]
    Delivery(String),
}
