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

//! Ledger engine.
//!
//! The [`Ledger`] orchestrates deposits, withdrawals, and transfers against
//! the [`AccountStore`] and [`TransactionLog`], enforcing the invariants
//! that keep the ledger consistent under concurrent callers:
//!
//! - Conservation: a transfer moves value, it never creates or destroys it.
//! - Non-negativity: no engine-approved operation leaves a balance below
//!   zero.
//! - Audit: every balance change is recorded by exactly one transaction;
//!   a rejected operation records nothing.
//!
//! # Failure semantics
//!
//! Every rejection is a typed [`LedgerError`] returned before any
//! mutation. The one exception is a transfer whose second balance
//! adjustment fails after the first applied: the engine compensates by
//! reversing the first adjustment, and only if that reversal also fails
//! does it surface [`LedgerError::InconsistentState`] after writing a
//! reconciliation record to the log output.
//!
//! # Thread Safety
//!
//! The engine performs no internal parallelism; each operation is a short
//! sequence of store calls. Atomicity lives in the store's per-account
//! balance adjustment, so concurrent operations on the same account
//! serialize there rather than behind an engine-wide lock.

use crate::account::{AccountSnapshot, AccountStore};
use crate::base::{AccountId, OwnerId};
use crate::directory::OwnerDirectory;
use crate::error::LedgerError;
use crate::notifier::Notice;
use crate::transaction::{Transaction, TransactionKind};
use crate::transaction_log::TransactionLog;
use crossbeam::channel::Sender;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, error, warn};

const DEPOSIT_DESCRIPTION: &str = "Deposit";
const WITHDRAWAL_DESCRIPTION: &str = "Withdrawal";
const TRANSFER_DESCRIPTION: &str = "Transfer";

/// Successful operation result: the updated account and its audit record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub account: AccountSnapshot,
    pub transaction: Arc<Transaction>,
}

/// The ledger engine.
///
/// Owns the account store, the transaction log, and the owner directory;
/// constructed once at process start and shared by reference. Operations
/// optionally queue a [`Notice`] per success; queueing is fire-and-forget
/// and never affects the operation outcome.
pub struct Ledger {
    accounts: AccountStore,
    log: TransactionLog,
    directory: OwnerDirectory,
    notices: Option<Sender<Notice>>,
}

impl Ledger {
    /// Creates an engine with no notification queue.
    pub fn new() -> Self {
        Ledger {
            accounts: AccountStore::new(),
            log: TransactionLog::new(),
            directory: OwnerDirectory::new(),
            notices: None,
        }
    }

    /// Creates an engine that queues a notice for each successful operation.
    pub fn with_notifier(notices: Sender<Notice>) -> Self {
        Ledger {
            notices: Some(notices),
            ..Ledger::new()
        }
    }

    pub fn accounts(&self) -> &AccountStore {
        &self.accounts
    }

    pub fn transactions(&self) -> &TransactionLog {
        &self.log
    }

    pub fn directory(&self) -> &OwnerDirectory {
        &self.directory
    }

    /// Registers contact details for an owner.
    ///
    /// Required before the owner can receive notifications or be resolved
    /// as a transfer recipient by email.
    pub fn register_owner(&self, owner: OwnerId, email: impl Into<String>, phone: Option<String>) {
        self.directory.register(owner, email, phone);
    }

    /// Credits `amount` to the owner's account, creating it on first sight.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] - amount is zero or negative.
    pub fn deposit(&self, owner: &OwnerId, amount: Decimal) -> Result<Receipt, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }

        let account = self.accounts.get_or_create(owner);
        let balance = self.accounts.adjust_balance(account.id(), amount)?;
        let transaction = self.log.append(
            None,
            Some(account.id()),
            amount,
            TransactionKind::Deposit,
            DEPOSIT_DESCRIPTION,
        )?;

        self.queue_notice(owner, TransactionKind::Deposit, amount, balance);
        Ok(Receipt {
            account: self.snapshot_with_balance(&account, balance),
            transaction,
        })
    }

    /// Debits `amount` from the owner's account.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] - amount is zero or negative.
    /// - [`LedgerError::AccountNotFound`] - the owner has no account.
    /// - [`LedgerError::InsufficientFunds`] - the balance cannot cover the
    ///   amount. The balance pre-check gives an early answer; the atomic
    ///   adjustment is what actually prevents a concurrent double-spend.
    pub fn withdraw(&self, owner: &OwnerId, amount: Decimal) -> Result<Receipt, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }

        let account = self
            .accounts
            .get_by_owner(owner)
            .ok_or(LedgerError::AccountNotFound)?;
        if account.balance() < amount {
            return Err(LedgerError::InsufficientFunds);
        }

        let balance = self.accounts.adjust_balance(account.id(), -amount)?;
        let transaction = self.log.append(
            Some(account.id()),
            None,
            amount,
            TransactionKind::Withdraw,
            WITHDRAWAL_DESCRIPTION,
        )?;

        self.queue_notice(owner, TransactionKind::Withdraw, amount, balance);
        Ok(Receipt {
            account: self.snapshot_with_balance(&account, balance),
            transaction,
        })
    }

    /// Moves `amount` from the owner's account to the recipient's.
    ///
    /// The recipient identifier is tried as an account id first, then as a
    /// registered contact email.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] - amount is zero or negative.
    /// - [`LedgerError::AccountNotFound`] - the owner has no account.
    /// - [`LedgerError::RecipientNotFound`] - the identifier resolves to
    ///   neither an account id nor a registered contact.
    /// - [`LedgerError::SelfTransfer`] - both endpoints are the same
    ///   account.
    /// - [`LedgerError::InsufficientFunds`] - the source balance cannot
    ///   cover the amount.
    /// - [`LedgerError::InconsistentState`] - the credit leg failed and the
    ///   compensating re-credit of the source also failed; logged for
    ///   manual reconciliation.
    pub fn transfer(
        &self,
        owner: &OwnerId,
        recipient: &str,
        amount: Decimal,
    ) -> Result<Receipt, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }

        let source = self
            .accounts
            .get_by_owner(owner)
            .ok_or(LedgerError::AccountNotFound)?;
        let recipient = self
            .resolve_recipient(recipient)
            .ok_or(LedgerError::RecipientNotFound)?;
        if source.id() == recipient.id() {
            return Err(LedgerError::SelfTransfer);
        }
        if source.balance() < amount {
            return Err(LedgerError::InsufficientFunds);
        }

        let balance = self.accounts.adjust_balance(source.id(), -amount)?;

        // The two adjustments are not atomic as a pair; if the credit leg
        // fails the debit must be compensated before reporting failure.
        if let Err(credit_err) = self.accounts.adjust_balance(recipient.id(), amount) {
            return Err(self.compensate_debit(source.id(), amount, credit_err));
        }

        let transaction = self.log.append(
            Some(source.id()),
            Some(recipient.id()),
            amount,
            TransactionKind::Transfer,
            TRANSFER_DESCRIPTION,
        )?;

        self.queue_notice(owner, TransactionKind::Transfer, amount, balance);
        Ok(Receipt {
            account: self.snapshot_with_balance(&source, balance),
            transaction,
        })
    }

    /// Resolves a transfer recipient identifier to an account.
    ///
    /// Account-id form wins; otherwise the identifier is treated as a
    /// contact address and resolved through the directory.
    fn resolve_recipient(&self, identifier: &str) -> Option<Arc<crate::account::Account>> {
        if let Some(id) = AccountId::parse(identifier)
            && let Some(account) = self.accounts.get_by_id(id)
        {
            return Some(account);
        }
        let owner = self.directory.owner_for_contact(identifier)?;
        self.accounts.get_by_owner(&owner)
    }

    /// Reverses a debited amount after the credit leg of a transfer failed.
    ///
    /// Returns the error the caller should see: the original credit
    /// failure when the reversal lands, or [`LedgerError::InconsistentState`]
    /// when the ledger is left half-applied.
    fn compensate_debit(
        &self,
        source: AccountId,
        amount: Decimal,
        cause: LedgerError,
    ) -> LedgerError {
        match self.accounts.adjust_balance(source, amount) {
            Ok(_) => cause,
            Err(reversal_err) => {
                error!(
                    account = %source,
                    %amount,
                    %cause,
                    %reversal_err,
                    "transfer compensation failed; manual reconciliation required"
                );
                LedgerError::InconsistentState {
                    account: source,
                    amount,
                }
            }
        }
    }

    /// Queues a notice for the owner's registered contact, if any.
    ///
    /// Failures here are absorbed: a missing contact or a disconnected
    /// queue never affects the completed operation.
    fn queue_notice(
        &self,
        owner: &OwnerId,
        kind: TransactionKind,
        amount: Decimal,
        balance: Decimal,
    ) {
        let Some(notices) = &self.notices else {
            return;
        };
        let Some(contact) = self.directory.contact_for(owner) else {
            debug!(%owner, "no contact registered; skipping notification");
            return;
        };
        let notice = Notice {
            contact,
            kind,
            amount,
            balance,
        };
        if notices.send(notice).is_err() {
            warn!(%owner, "notification queue disconnected; dropping notice");
        }
    }

    /// Snapshot reflecting this operation's post-adjustment balance, even
    /// if concurrent operations have already moved the live balance on.
    fn snapshot_with_balance(
        &self,
        account: &crate::account::Account,
        balance: Decimal,
    ) -> AccountSnapshot {
        AccountSnapshot {
            account_id: account.id(),
            owner: account.owner().clone(),
            balance,
            created_at: account.created_at(),
        }
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}
