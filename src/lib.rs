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

//! # Bank Ledger
//!
//! This library provides the ledger engine for a minimal retail bank:
//! one account per owner, money moved by deposits, withdrawals, and
//! transfers, every movement recorded as an immutable transaction.
//!
//! ## Core Components
//!
//! - [`Ledger`]: Central engine orchestrating operations against the stores
//! - [`AccountStore`]: Account records with owner-indexed lookup and atomic
//!   balance adjustment
//! - [`TransactionLog`]: Append-only audit log with per-account queries
//! - [`OwnerDirectory`]: Contact registry for recipient resolution and
//!   notification addressing
//! - [`LedgerError`]: Typed outcomes for every rejection
//!
//! ## Example
//!
//! ```
//! use bank_ledger_rs::{Ledger, OwnerId};
//! use rust_decimal_macros::dec;
//!
//! let ledger = Ledger::new();
//! let alice = OwnerId::new("alice");
//!
//! // First deposit creates the account.
//! let receipt = ledger.deposit(&alice, dec!(100.00)).unwrap();
//! assert_eq!(receipt.account.balance, dec!(100.00));
//!
//! // Overdrawing is rejected and recorded nowhere.
//! assert!(ledger.withdraw(&alice, dec!(200.00)).is_err());
//! assert_eq!(ledger.transactions().len(), 1);
//! ```
//!
//! ## Thread Safety
//!
//! Balance adjustments are atomic per account, so independent callers can
//! run operations concurrently; two withdrawals racing for the same funds
//! resolve to exactly one success.

pub mod account;
mod base;
pub mod directory;
mod engine;
pub mod error;
pub mod notifier;
pub mod report;
mod transaction;
mod transaction_log;

pub use account::{Account, AccountSnapshot, AccountStore};
pub use base::{AccountId, OwnerId, TransactionId};
pub use directory::{ContactProfile, OwnerDirectory};
pub use engine::{Ledger, Receipt};
pub use error::{LedgerError, NotifyError};
pub use notifier::{Notice, NotifierHandle, Notify, TracingNotifier};
pub use report::{
    AccountActivity, ComplianceReport, ComplianceStatus, ReportConfig, account_activity,
    compliance_review,
};
pub use transaction::{Transaction, TransactionKind};
pub use transaction_log::TransactionLog;
