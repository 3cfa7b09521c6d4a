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

//! Concurrency tests for the ledger engine.
//!
//! These tests drive the engine from many threads at once and verify that
//! the locking patterns do not deadlock and that the ledger invariants
//! (non-negative balances, conservation, one account per owner) survive
//! contention.
//!
//! The tests use parking_lot's `deadlock_detection` feature to
//! automatically detect cycles in the lock graph.

use bank_ledger_rs::{Ledger, LedgerError, OwnerId};
use parking_lot::deadlock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

// === Deadlock Detection Infrastructure ===

/// Starts a background thread that checks for deadlocks.
/// Returns a handle to stop the detector.
fn start_deadlock_detector() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();

    thread::spawn(move || {
        while running_clone.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(100));
            let deadlocks = deadlock::check_deadlock();
            if !deadlocks.is_empty() {
                eprintln!("\n=== DEADLOCK DETECTED ===");
                for (i, threads) in deadlocks.iter().enumerate() {
                    eprintln!("\nDeadlock #{}", i + 1);
                    for t in threads {
                        eprintln!("Thread ID: {:?}", t.thread_id());
                        eprintln!("Backtrace:\n{:#?}", t.backtrace());
                    }
                }
                panic!("Deadlock detected! See output above for details.");
            }
        }
    });

    running
}

/// Stops the deadlock detector.
fn stop_deadlock_detector(running: Arc<AtomicBool>) {
    running.store(false, Ordering::SeqCst);
    thread::sleep(Duration::from_millis(150)); // Let detector thread exit
}

// === Tests ===

/// Two concurrent withdrawals of the full balance: at most one may
/// succeed, and the final balance must never go negative.
#[test]
fn concurrent_full_withdrawals_admit_one_success() {
    let detector = start_deadlock_detector();
    let ledger = Arc::new(Ledger::new());
    let alice = OwnerId::new("alice");
    ledger.deposit(&alice, dec!(100.00)).unwrap();

    const NUM_THREADS: usize = 2;
    let handles: Vec<_> = (0..NUM_THREADS)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            thread::spawn(move || ledger.withdraw(&OwnerId::new("alice"), dec!(100.00)))
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("thread panicked"))
        .collect();

    stop_deadlock_detector(detector);

    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one withdrawal should win");
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| *e == LedgerError::InsufficientFunds)
    );

    let balance = ledger
        .accounts()
        .get_by_owner(&alice)
        .unwrap()
        .balance();
    assert_eq!(balance, Decimal::ZERO);
    // Only the initial deposit and the single winning withdrawal.
    assert_eq!(ledger.transactions().len(), 2);
}

/// High contention on a single account with many threads.
#[test]
fn no_deadlock_high_contention_single_account() {
    let detector = start_deadlock_detector();
    let ledger = Arc::new(Ledger::new());
    let alice = OwnerId::new("alice");
    ledger.deposit(&alice, dec!(10000.00)).unwrap();

    const NUM_THREADS: usize = 50;
    const OPS_PER_THREAD: usize = 100;

    let mut handles = Vec::with_capacity(NUM_THREADS);

    for _ in 0..NUM_THREADS {
        let ledger = Arc::clone(&ledger);

        let handle = thread::spawn(move || {
            let alice = OwnerId::new("alice");
            for i in 0..OPS_PER_THREAD {
                if i % 3 == 0 {
                    ledger.deposit(&alice, dec!(10.00)).unwrap();
                } else if i % 3 == 1 {
                    let _ = ledger.withdraw(&alice, dec!(1.00));
                } else {
                    // Read operations
                    if let Some(account) = ledger.accounts().get_by_owner(&alice) {
                        let _ = account.balance();
                        let _ = account.snapshot();
                    }
                }
            }
        });

        handles.push(handle);
    }

    for handle in handles {
        handle.join().expect("thread panicked");
    }

    stop_deadlock_detector(detector);

    // Final state is consistent with the log
    let account = ledger.accounts().get_by_owner(&alice).unwrap();
    assert!(account.balance() >= Decimal::ZERO);

    let replayed: Decimal = ledger
        .transactions()
        .list_for_account(account.id(), usize::MAX)
        .iter()
        .map(|tx| match tx.to_account() {
            Some(_) => tx.amount(),
            None => -tx.amount(),
        })
        .sum();
    assert_eq!(account.balance(), replayed);
}

/// Concurrent first deposits must not create two accounts for one owner.
#[test]
fn no_duplicate_account_under_creation_race() {
    let detector = start_deadlock_detector();
    let ledger = Arc::new(Ledger::new());

    const NUM_THREADS: usize = 20;
    let handles: Vec<_> = (0..NUM_THREADS)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            thread::spawn(move || {
                ledger
                    .deposit(&OwnerId::new("fresh-owner"), dec!(1.00))
                    .unwrap()
                    .account
                    .account_id
            })
        })
        .collect();

    let ids: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("thread panicked"))
        .collect();

    stop_deadlock_detector(detector);

    assert!(ids.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(ledger.accounts().len(), 1);
    let balance = ledger
        .accounts()
        .get_by_owner(&OwnerId::new("fresh-owner"))
        .unwrap()
        .balance();
    assert_eq!(balance, Decimal::from(NUM_THREADS as i64));
}

/// Transfers around a ring of accounts conserve the total supply.
#[test]
fn no_deadlock_transfer_ring_conserves_total() {
    let detector = start_deadlock_detector();
    let ledger = Arc::new(Ledger::new());

    const NUM_ACCOUNTS: usize = 10;
    const NUM_THREADS: usize = 20;
    const OPS_PER_THREAD: usize = 50;

    let owners: Vec<OwnerId> = (0..NUM_ACCOUNTS)
        .map(|i| OwnerId::new(format!("owner-{i}")))
        .collect();
    let mut account_ids = Vec::with_capacity(NUM_ACCOUNTS);
    for owner in &owners {
        let receipt = ledger.deposit(owner, dec!(1000.00)).unwrap();
        account_ids.push(receipt.account.account_id);
    }
    let total_before: Decimal = dec!(1000.00) * Decimal::from(NUM_ACCOUNTS as i64);

    let owners = Arc::new(owners);
    let account_ids = Arc::new(account_ids);

    let mut handles = Vec::with_capacity(NUM_THREADS);
    for thread_id in 0..NUM_THREADS {
        let ledger = Arc::clone(&ledger);
        let owners = Arc::clone(&owners);
        let account_ids = Arc::clone(&account_ids);

        let handle = thread::spawn(move || {
            for i in 0..OPS_PER_THREAD {
                let from = (thread_id + i) % NUM_ACCOUNTS;
                let to = (from + 1) % NUM_ACCOUNTS;
                // Transfers may bounce on insufficient funds; inconsistent
                // state would be a real failure.
                if let Err(e) =
                    ledger.transfer(&owners[from], &account_ids[to].to_string(), dec!(7.00))
                {
                    assert!(!e.is_fatal(), "transfer left ledger inconsistent: {e}");
                }
            }
        });

        handles.push(handle);
    }

    for handle in handles {
        handle.join().expect("thread panicked");
    }

    stop_deadlock_detector(detector);

    let total_after: Decimal = account_ids
        .iter()
        .map(|id| ledger.accounts().get_by_id(*id).unwrap().balance())
        .sum();
    assert_eq!(total_before, total_after, "transfers must conserve value");

    for id in account_ids.iter() {
        assert!(ledger.accounts().get_by_id(*id).unwrap().balance() >= Decimal::ZERO);
    }
}

/// Iterating accounts while other threads create and mutate them.
#[test]
fn no_deadlock_iteration_during_mutation() {
    let detector = start_deadlock_detector();
    let ledger = Arc::new(Ledger::new());
    let running = Arc::new(AtomicBool::new(true));

    let mut handles = Vec::new();

    // Writer threads creating fresh accounts
    for writer_id in 0..5 {
        let ledger = Arc::clone(&ledger);
        let running = Arc::clone(&running);

        let handle = thread::spawn(move || {
            let mut count = 0;
            while running.load(Ordering::SeqCst) && count < 100 {
                let owner = OwnerId::new(format!("w{writer_id}-{count}"));
                ledger.deposit(&owner, dec!(10.00)).unwrap();
                count += 1;
                thread::yield_now();
            }
        });

        handles.push(handle);
    }

    // Reader threads iterating all accounts
    for _ in 0..5 {
        let ledger = Arc::clone(&ledger);
        let running = Arc::clone(&running);

        let handle = thread::spawn(move || {
            let mut iterations = 0;
            while running.load(Ordering::SeqCst) && iterations < 50 {
                let mut total = Decimal::ZERO;
                for entry in ledger.accounts().iter() {
                    total += entry.value().balance();
                }
                iterations += 1;
                let _ = total; // Use the value
                thread::yield_now();
            }
        });

        handles.push(handle);
    }

    // Let them run for a bit
    thread::sleep(Duration::from_millis(500));
    running.store(false, Ordering::SeqCst);

    for handle in handles {
        handle.join().expect("thread panicked");
    }

    stop_deadlock_detector(detector);

    assert_eq!(ledger.accounts().len(), 500);
}

/// Mixed operations across owners with the notifier channel attached.
#[test]
fn no_deadlock_mixed_operations_with_notifier() {
    let detector = start_deadlock_detector();

    let (sender, receiver) = crossbeam::channel::unbounded();
    let ledger = Arc::new(Ledger::with_notifier(sender));

    const NUM_OWNERS: usize = 8;
    const NUM_THREADS: usize = 24;
    const OPS_PER_THREAD: usize = 50;

    let mut account_ids = Vec::with_capacity(NUM_OWNERS);
    for i in 0..NUM_OWNERS {
        let owner = OwnerId::new(format!("owner-{i}"));
        ledger.register_owner(owner.clone(), format!("owner-{i}@example.com"), None);
        account_ids.push(ledger.deposit(&owner, dec!(500.00)).unwrap().account.account_id);
    }
    let account_ids = Arc::new(account_ids);

    let mut handles = Vec::with_capacity(NUM_THREADS);
    for thread_id in 0..NUM_THREADS {
        let ledger = Arc::clone(&ledger);
        let account_ids = Arc::clone(&account_ids);

        let handle = thread::spawn(move || {
            for i in 0..OPS_PER_THREAD {
                let idx = (thread_id + i) % NUM_OWNERS;
                let owner = OwnerId::new(format!("owner-{idx}"));

                match i % 4 {
                    0 => {
                        ledger.deposit(&owner, dec!(2.00)).unwrap();
                    }
                    1 => {
                        let _ = ledger.withdraw(&owner, dec!(1.00));
                    }
                    2 => {
                        let to = account_ids[(idx + 1) % NUM_OWNERS];
                        let _ = ledger.transfer(&owner, &to.to_string(), dec!(3.00));
                    }
                    _ => {
                        if let Some(account) = ledger.accounts().get_by_owner(&owner) {
                            let _ = account.balance();
                        }
                    }
                }
            }
        });

        handles.push(handle);
    }

    for handle in handles {
        handle.join().expect("thread panicked");
    }

    stop_deadlock_detector(detector);

    // Every queued notice corresponds to a logged transaction.
    drop(ledger);
    let notices = receiver.into_iter().count();
    assert!(notices > 0, "successful operations should have queued notices");
}
