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

//! Deadlock detection tests using parking_lot's built-in deadlock detector.
//!
//! The controller serializes two paths on the engine lock: commands from the
//! caller's thread and session expiry from the monitor thread. These tests
//! drive both at once with a very short inactivity timeout and let
//! parking_lot's `deadlock_detection` feature look for cycles.

use atm_sim::{
    AccountId, AccountRecord, Config, Controller, LedgerStore, MemoryStore, Pin, ReserveId,
};
use parking_lot::deadlock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

const ACCOUNT: AccountId = AccountId(1);
const PIN: Pin = Pin(1234);
const START: Decimal = dec!(1000000);

/// Spawns a background thread that checks for deadlocks every 100ms.
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

fn stop_deadlock_detector(running: Arc<AtomicBool>) {
    running.store(false, Ordering::SeqCst);
    thread::sleep(Duration::from_millis(150));
}

/// Large balances so that no withdrawal in these tests is capped or
/// charged an overdraft fee: every dispensed amount hits both sides equally.
fn make_controller(timeout: Duration) -> (Arc<Controller<MemoryStore>>, MemoryStore) {
    let store = MemoryStore::new();
    store.insert_account(AccountRecord {
        account_id: ACCOUNT,
        pin: PIN,
        balance: START,
    });
    store.insert_reserve(ReserveId(1), START);
    let config = Config::default().with_inactivity_timeout(timeout);
    let controller = Controller::new(store.clone(), &config).unwrap();
    (Arc::new(controller), store)
}

fn authorize_command() -> String {
    format!("authorize {} {}", ACCOUNT, PIN.0)
}

/// Commands race the expiry callback on a 1ms timeout.
#[test]
fn no_deadlock_commands_racing_expiry() {
    let detector = start_deadlock_detector();
    let (controller, _store) = make_controller(Duration::from_millis(1));

    const NUM_THREADS: usize = 8;
    const OPS_PER_THREAD: usize = 200;

    let mut handles = Vec::with_capacity(NUM_THREADS);
    for t in 0..NUM_THREADS {
        let controller = controller.clone();
        handles.push(thread::spawn(move || {
            for i in 0..OPS_PER_THREAD {
                let command = match (t + i) % 5 {
                    0 => authorize_command(),
                    1 => "deposit 20".to_string(),
                    2 => "withdraw 20".to_string(),
                    3 => "balance".to_string(),
                    _ => "history".to_string(),
                };
                controller.handle(&command).unwrap();
                if i % 16 == 0 {
                    thread::sleep(Duration::from_millis(2));
                }
            }
        }));
    }

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);
}

/// Whatever interleaving happened, the reserve and the account moved by the
/// same amount.
#[test]
fn reserve_and_account_stay_in_step_under_contention() {
    let detector = start_deadlock_detector();
    let (controller, store) = make_controller(Duration::from_millis(1));

    const NUM_THREADS: usize = 6;
    const OPS_PER_THREAD: usize = 150;

    let mut handles = Vec::with_capacity(NUM_THREADS);
    for t in 0..NUM_THREADS {
        let controller = controller.clone();
        handles.push(thread::spawn(move || {
            for i in 0..OPS_PER_THREAD {
                let command = match (t + i) % 4 {
                    0 => authorize_command(),
                    1 => "deposit 40".to_string(),
                    2 => "withdraw 20".to_string(),
                    _ => "logout".to_string(),
                };
                controller.handle(&command).unwrap();
            }
        }));
    }

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);

    let reserve = store.atm_balance(ReserveId(1)).unwrap();
    let balance = store.account(ACCOUNT).unwrap().unwrap().balance;
    assert_eq!(reserve - START, balance - START);
    assert_eq!(controller.reserve(), reserve);

    let history = store.history(ACCOUNT).unwrap();
    let net: Decimal = history.iter().map(|entry| entry.amount).sum();
    assert_eq!(net, balance - START);
}

/// Dropping the controller joins the monitor thread even while it is armed
/// or in the middle of an expiry.
#[test]
fn no_deadlock_dropping_armed_controller() {
    let detector = start_deadlock_detector();

    for i in 0..50 {
        let (controller, _store) = make_controller(Duration::from_millis(1));
        controller.handle(&authorize_command()).unwrap();
        if i % 2 == 0 {
            thread::sleep(Duration::from_millis(1));
        }
        drop(controller);
    }

    stop_deadlock_detector(detector);
}

/// Polling accessors from other threads while commands run.
#[test]
fn no_deadlock_accessors_during_commands() {
    let detector = start_deadlock_detector();
    let (controller, _store) = make_controller(Duration::from_millis(2));
    let done = Arc::new(AtomicBool::new(false));

    let reader = {
        let controller = controller.clone();
        let done = done.clone();
        thread::spawn(move || {
            while !done.load(Ordering::SeqCst) {
                let _ = controller.session();
                let _ = controller.is_authorized();
                let _ = controller.reserve();
            }
        })
    };

    for _ in 0..300 {
        controller.handle(&authorize_command()).unwrap();
        controller.handle("deposit 20").unwrap();
    }

    done.store(true, Ordering::SeqCst);
    reader.join().expect("Reader panicked");
    stop_deadlock_detector(detector);
}
