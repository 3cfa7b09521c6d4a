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

//! Best-effort transaction notifications.
//!
//! The engine emits a [`Notice`] on a channel after each successful
//! operation; a worker thread drains the channel and hands formatted
//! messages to a [`Notify`] implementation. Delivery runs entirely off the
//! mutation path: a slow or failing provider can delay messages, never a
//! ledger operation.

use crate::directory::ContactProfile;
use crate::error::NotifyError;
use crate::transaction::TransactionKind;
use crossbeam::channel::{Receiver, Sender, unbounded};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{info, warn};

/// External delivery capability (email, SMS, push).
pub trait Notify: Send + Sync {
    fn deliver(&self, contact: &ContactProfile, message: &str) -> Result<(), NotifyError>;
}

/// One completed operation, queued for delivery.
#[derive(Debug, Clone)]
pub struct Notice {
    pub contact: ContactProfile,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub balance: Decimal,
}

impl Notice {
    /// Human-readable alert text for this notice.
    pub fn message(&self) -> String {
        format!(
            "Your account {} of ${:.2} has been processed. Current balance: ${:.2}",
            self.kind, self.amount, self.balance
        )
    }
}

/// Handle to the background delivery worker.
///
/// Dropping the handle without calling [`NotifierHandle::close`] detaches
/// the worker; it keeps draining until every [`Sender`] is gone.
pub struct NotifierHandle {
    sender: Sender<Notice>,
    worker: JoinHandle<()>,
}

impl NotifierHandle {
    /// Spawns the delivery worker around a [`Notify`] implementation.
    pub fn spawn(delivery: Arc<dyn Notify>) -> Self {
        let (sender, receiver) = unbounded();
        let worker = thread::spawn(move || run_worker(receiver, delivery));
        Self { sender, worker }
    }

    /// Returns a sender for queueing notices, to hand to the engine.
    pub fn sender(&self) -> Sender<Notice> {
        self.sender.clone()
    }

    /// Drains outstanding notices and stops the worker.
    ///
    /// Blocks until every other sender clone has been dropped and the
    /// queue is empty.
    pub fn close(self) {
        let NotifierHandle { sender, worker } = self;
        drop(sender);
        let _ = worker.join();
    }
}

fn run_worker(receiver: Receiver<Notice>, delivery: Arc<dyn Notify>) {
    // Iteration ends once all senders are dropped and the queue drains.
    for notice in receiver {
        let message = notice.message();
        if let Err(err) = delivery.deliver(&notice.contact, &message) {
            warn!(
                contact = %notice.contact.email,
                kind = %notice.kind,
                %err,
                "notification delivery failed"
            );
        }
    }
}

/// Delivery implementation that logs each message instead of sending it.
///
/// Stands in for a real provider in the CLI and in environments where
/// outbound notifications are disabled.
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl Notify for TracingNotifier {
    fn deliver(&self, contact: &ContactProfile, message: &str) -> Result<(), NotifyError> {
        info!(contact = %contact.email, text = message, "notification");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;

    fn contact(email: &str) -> ContactProfile {
        ContactProfile {
            email: email.to_owned(),
            phone: None,
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        delivered: Mutex<Vec<(String, String)>>,
    }

    impl Notify for RecordingNotifier {
        fn deliver(&self, contact: &ContactProfile, message: &str) -> Result<(), NotifyError> {
            self.delivered
                .lock()
                .push((contact.email.clone(), message.to_owned()));
            Ok(())
        }
    }

    struct FailingNotifier;

    impl Notify for FailingNotifier {
        fn deliver(&self, _contact: &ContactProfile, _message: &str) -> Result<(), NotifyError> {
            Err(NotifyError::Delivery("provider unavailable".into()))
        }
    }

    #[test]
    fn message_format_matches_alert_text() {
        let notice = Notice {
            contact: contact("alice@example.com"),
            kind: TransactionKind::Deposit,
            amount: dec!(50.00),
            balance: dec!(150.00),
        };
        assert_eq!(
            notice.message(),
            "Your account deposit of $50.00 has been processed. Current balance: $150.00"
        );
    }

    #[test]
    fn withdrawal_message_uses_withdrawal_label() {
        let notice = Notice {
            contact: contact("alice@example.com"),
            kind: TransactionKind::Withdraw,
            amount: dec!(5),
            balance: dec!(0),
        };
        assert_eq!(
            notice.message(),
            "Your account withdrawal of $5.00 has been processed. Current balance: $0.00"
        );
    }

    #[test]
    fn worker_delivers_queued_notices() {
        let delivery = Arc::new(RecordingNotifier::default());
        let handle = NotifierHandle::spawn(delivery.clone());
        let sender = handle.sender();

        for i in 1..=3 {
            sender
                .send(Notice {
                    contact: contact("alice@example.com"),
                    kind: TransactionKind::Deposit,
                    amount: Decimal::from(i),
                    balance: Decimal::from(i),
                })
                .unwrap();
        }

        drop(sender);
        handle.close();

        let delivered = delivery.delivered.lock();
        assert_eq!(delivered.len(), 3);
        assert!(delivered.iter().all(|(email, _)| email == "alice@example.com"));
    }

    #[test]
    fn failing_delivery_is_absorbed() {
        let handle = NotifierHandle::spawn(Arc::new(FailingNotifier));
        let sender = handle.sender();

        sender
            .send(Notice {
                contact: contact("bob@example.com"),
                kind: TransactionKind::Transfer,
                amount: dec!(10.00),
                balance: dec!(90.00),
            })
            .unwrap();

        drop(sender);
        // Worker exits cleanly despite every delivery failing.
        handle.close();
    }
}
