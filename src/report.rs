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

//! Read-only reporting over the account store and transaction log.
//!
//! Everything here aggregates ledger output for dashboards and compliance
//! views; nothing mutates ledger state. The transaction log does not
//! guarantee chronological order, so this module sorts by creation time
//! where a view needs it.

use crate::account::{AccountSnapshot, AccountStore};
use crate::base::AccountId;
use crate::transaction::{Transaction, TransactionKind};
use crate::transaction_log::TransactionLog;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

/// Thresholds for the reporting views.
#[derive(Debug, Clone)]
pub struct ReportConfig {
    /// Transactions above this amount are flagged for review.
    pub large_amount_threshold: Decimal,
    /// Rolling window for the activity volume figure.
    pub activity_window: Duration,
    /// Window for the transaction-frequency compliance check.
    pub frequency_window: Duration,
    /// Transaction count above which the frequency alert fires.
    pub frequency_limit: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            large_amount_threshold: dec!(10000),
            activity_window: Duration::days(30),
            frequency_window: Duration::days(7),
            frequency_limit: 50,
        }
    }
}

/// Activity summary for one account.
#[derive(Debug, Clone)]
pub struct AccountActivity {
    pub account: AccountSnapshot,
    pub total_transactions: usize,
    pub total_deposits: Decimal,
    pub total_withdrawals: Decimal,
    pub total_transfers: Decimal,
    /// Deposit and transfer volume inside the activity window.
    pub window_volume: Decimal,
    /// Transactions inside the activity window, oldest first.
    pub recent: Vec<Arc<Transaction>>,
}

/// Builds the dashboard view for an account.
///
/// Returns `None` when the account does not exist. `limit` bounds how many
/// log records the underlying query may return.
pub fn account_activity(
    accounts: &AccountStore,
    log: &TransactionLog,
    account_id: AccountId,
    limit: usize,
    config: &ReportConfig,
) -> Option<AccountActivity> {
    let account = accounts.get_by_id(account_id)?;
    let transactions = log.list_for_account(account_id, limit);
    let window_start = Utc::now() - config.activity_window;

    let mut total_deposits = Decimal::ZERO;
    let mut total_withdrawals = Decimal::ZERO;
    let mut total_transfers = Decimal::ZERO;
    let mut window_volume = Decimal::ZERO;
    let mut recent = Vec::new();

    for tx in &transactions {
        match tx.kind() {
            TransactionKind::Deposit => total_deposits += tx.amount(),
            TransactionKind::Withdraw => total_withdrawals += tx.amount(),
            TransactionKind::Transfer => total_transfers += tx.amount(),
        }
        if tx.created_at() >= window_start {
            if matches!(tx.kind(), TransactionKind::Deposit | TransactionKind::Transfer) {
                window_volume += tx.amount();
            }
            recent.push(Arc::clone(tx));
        }
    }
    recent.sort_by_key(|tx| tx.created_at());

    Some(AccountActivity {
        account: account.snapshot(),
        total_transactions: transactions.len(),
        total_deposits,
        total_withdrawals,
        total_transfers,
        window_volume,
        recent,
    })
}

/// Overall compliance standing for an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComplianceStatus {
    Nominal,
    Critical,
}

/// Compliance view: threshold breaches and a 0-100 score.
#[derive(Debug, Clone)]
pub struct ComplianceReport {
    pub status: ComplianceStatus,
    pub score: u8,
    pub alerts: Vec<String>,
}

/// Evaluates an account against the regulatory thresholds.
///
/// Checks, in order: transactions above the large-amount threshold, high
/// transaction frequency inside the frequency window, and a negative
/// balance (which should be unreachable through the engine but is the
/// critical signal operators need if reconciliation ever leaves one).
pub fn compliance_review(
    accounts: &AccountStore,
    log: &TransactionLog,
    account_id: AccountId,
    limit: usize,
    config: &ReportConfig,
) -> Option<ComplianceReport> {
    let account = accounts.get_by_id(account_id)?;
    let transactions = log.list_for_account(account_id, limit);

    let mut status = ComplianceStatus::Nominal;
    let mut score: u8 = 100;
    let mut alerts = Vec::new();

    let large = transactions
        .iter()
        .filter(|tx| tx.amount() > config.large_amount_threshold)
        .count();
    if large > 0 {
        alerts.push(format!(
            "Large transactions detected: {} transactions over ${}",
            large, config.large_amount_threshold
        ));
        score = 85;
    }

    let frequency_start = Utc::now() - config.frequency_window;
    let recent = transactions
        .iter()
        .filter(|tx| tx.created_at() >= frequency_start)
        .count();
    if recent > config.frequency_limit {
        alerts.push("High transaction frequency detected".to_owned());
        score = score.saturating_sub(10).max(70);
    }

    if account.balance() < Decimal::ZERO {
        alerts.push("Negative balance detected".to_owned());
        score = 50;
        status = ComplianceStatus::Critical;
    }

    Some(ComplianceReport {
        status,
        score,
        alerts,
    })
}
