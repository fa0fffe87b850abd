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

//! SQLite ledger persistence tests.

use atm_sim::{
    AccountId, Config, Controller, LedgerStore, Pin, ReserveId, SqliteStore, StoreError,
};
use rust_decimal_macros::dec;
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};

fn seeded_database(dir: &TempDir) -> Config {
    let config = Config::new(dir.path().join("atm.db"));
    let store = SqliteStore::open(&config.database).unwrap();

    let mut csv = NamedTempFile::new_in(dir.path()).unwrap();
    writeln!(csv, "account_id,pin,balance").unwrap();
    writeln!(csv, "2859459814,7386,10.24").unwrap();
    writeln!(csv, "1434597300,4557,90000.55").unwrap();
    csv.flush().unwrap();

    let imported = store
        .import_accounts(std::fs::File::open(csv.path()).unwrap())
        .unwrap();
    assert_eq!(imported, 2);
    store.seed_reserve(ReserveId(1), dec!(10000)).unwrap();
    config
}

#[test]
fn open_requires_reserve_row() {
    let dir = TempDir::new().unwrap();
    let config = Config::new(dir.path().join("empty.db"));

    let result = Controller::open(&config);

    assert!(matches!(
        result,
        Err(atm_sim::AtmError::Store(StoreError::MissingReserve(ReserveId(1))))
    ));
}

#[test]
fn balances_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let config = seeded_database(&dir);

    {
        let controller = Controller::open(&config).unwrap();
        controller.handle("authorize 2859459814 7386").unwrap();
        controller.handle("deposit 100").unwrap();
        controller.handle("withdraw 40").unwrap();
        controller.handle("end").unwrap();
    }

    let store = SqliteStore::open(&config.database).unwrap();
    assert_eq!(store.atm_balance(ReserveId(1)).unwrap(), dec!(10060));
    let account = store.account(AccountId(2859459814)).unwrap().unwrap();
    assert_eq!(account.pin, Pin(7386));
    assert_eq!(account.balance, dec!(70.24));

    let history = store.history(AccountId(2859459814)).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].amount, dec!(-40));
    assert_eq!(history[1].amount, dec!(100));
}

#[test]
fn reopened_controller_sees_persisted_state() {
    let dir = TempDir::new().unwrap();
    let config = seeded_database(&dir);

    {
        let controller = Controller::open(&config).unwrap();
        controller.handle("authorize 1434597300 4557").unwrap();
        controller.handle("withdraw 200").unwrap();
    }

    let controller = Controller::open(&config).unwrap();
    assert_eq!(controller.reserve(), dec!(9800));
    controller.handle("authorize 1434597300 4557").unwrap();
    assert_eq!(
        controller.handle("balance").unwrap().message(),
        "Current balance: 89800.55"
    );
}

#[test]
fn rejected_commands_are_logged_to_errors_table() {
    let dir = TempDir::new().unwrap();
    let config = seeded_database(&dir);

    {
        let controller = Controller::open(&config).unwrap();
        controller.handle("hello 'world'").unwrap();
        controller.handle("authorize 2859459814 7386").unwrap();
        controller.handle("deposit twenty").unwrap();
    }

    let store = SqliteStore::open(&config.database).unwrap();
    let errors = store.errors().unwrap();
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].account_id, None);
    assert_eq!(
        errors[0].message,
        "Too many arguments detected in command: hello 'world'"
    );
    assert_eq!(errors[1].account_id, Some(AccountId(2859459814)));
}

#[test]
fn any_account_and_clear_history() {
    let dir = TempDir::new().unwrap();
    let config = seeded_database(&dir);

    let store = SqliteStore::open(&config.database).unwrap();
    let account = store.any_account().unwrap().unwrap();
    assert_eq!(account.account_id, AccountId(1434597300));

    let controller = Controller::new(store, &config).unwrap();
    controller.handle("authorize 1434597300 4557").unwrap();
    controller.handle("deposit 20").unwrap();

    let other = SqliteStore::open(&config.database).unwrap();
    other.clear_history(AccountId(1434597300)).unwrap();
    assert_eq!(
        controller.handle("history").unwrap().message(),
        "No history found"
    );
}

#[test]
fn failed_error_logging_is_not_user_visible() {
    let dir = TempDir::new().unwrap();
    let config = seeded_database(&dir);
    let controller = Controller::open(&config).unwrap();

    rusqlite::Connection::open(&config.database)
        .unwrap()
        .execute_batch("DROP TABLE errors")
        .unwrap();

    let response = controller.handle("2438g346").unwrap();
    assert_eq!(response.message(), "Invalid command detected.");
    assert!(response.is_error());
    assert!(!response.is_terminate());

    controller.handle("authorize 2859459814 7386").unwrap();
    let response = controller.handle("withdraw twenty").unwrap();
    assert_eq!(response.message(), "Invalid command detected.");
    assert!(controller.is_authorized());
}
