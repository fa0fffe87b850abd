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

//! Command controller.
//!
//! The [`Controller`] is the entry point for raw input lines. Per call it:
//!
//! 1. disarms the inactivity monitor,
//! 2. parses the line into a [`Command`],
//! 3. gates account commands on an authorized session,
//! 4. runs the operation on the [`Engine`],
//! 5. turns malformed input into the generic invalid-command response and
//!    records it in the error log,
//! 6. re-arms the monitor while a session is open, unless the program ends.
//!
//! # Thread Safety
//!
//! Commands and the inactivity logout both go through one
//! [`parking_lot::Mutex`] around the engine, so a timeout can never
//! interleave with a command. The monitor is armed and disarmed only while
//! that lock is held.

use crate::command::Command;
use crate::config::Config;
use crate::engine::Engine;
use crate::error::{AtmError, StoreError};
use crate::monitor::InactivityMonitor;
use crate::response::{AUTHORIZATION_REQUIRED, Response};
use crate::session::Session;
use crate::store::{LedgerStore, SqliteStore};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::debug;

/// Dispatches input lines to the engine and manages the session lifecycle.
///
/// # Example
///
/// ```
/// use atm_sim::{AccountId, AccountRecord, Config, Controller, MemoryStore, Pin, ReserveId};
/// use rust_decimal_macros::dec;
///
/// let store = MemoryStore::new();
/// store.insert_account(AccountRecord {
///     account_id: AccountId(2859459814),
///     pin: Pin(7386),
///     balance: dec!(10.24),
/// });
/// store.insert_reserve(ReserveId(1), dec!(10000));
///
/// let controller = Controller::new(store, &Config::default()).unwrap();
/// let response = controller.handle("authorize 2859459814 7386").unwrap();
/// assert_eq!(response.message(), "2859459814 successfully authorized.");
///
/// let response = controller.handle("balance").unwrap();
/// assert_eq!(response.message(), "Current balance: 10.24");
/// ```
pub struct Controller<S: LedgerStore + 'static> {
    engine: Arc<Mutex<Engine<S>>>,
    monitor: InactivityMonitor,
}

impl Controller<SqliteStore> {
    /// Opens the SQLite ledger at `config.database` and builds a controller on it.
    pub fn open(config: &Config) -> Result<Self, AtmError> {
        let store = SqliteStore::open(&config.database)?;
        Self::new(store, config)
    }
}

impl<S: LedgerStore + 'static> Controller<S> {
    /// Builds a controller with an empty session.
    ///
    /// # Errors
    ///
    /// - [`AtmError::Config`] - the configuration is invalid.
    /// - [`AtmError::Store`] - the cash reserve cannot be loaded.
    /// - [`AtmError::Monitor`] - the monitor thread failed to start.
    pub fn new(store: S, config: &Config) -> Result<Self, AtmError> {
        config.validate()?;
        let engine = Arc::new(Mutex::new(Engine::new(store, config.reserve_id)?));

        let monitor = InactivityMonitor::spawn(config.inactivity_timeout, {
            let engine = Arc::clone(&engine);
            move |expiry| {
                let mut engine = engine.lock();
                // A command that got the lock first has already disarmed us.
                if expiry.is_current() {
                    engine.expire_session();
                }
            }
        })
        .map_err(AtmError::Monitor)?;

        Ok(Self { engine, monitor })
    }

    /// Processes one input line.
    ///
    /// Malformed input never fails: it yields [`Response::invalid_command`].
    ///
    /// # Errors
    ///
    /// Returns the [`StoreError`] of an operation whose ledger access failed.
    pub fn handle(&self, input: &str) -> Result<Response, StoreError> {
        let mut engine = self.engine.lock();
        self.monitor.disarm();

        let result = match input.parse::<Command>() {
            Ok(command) => {
                debug!(verb = command.verb(), "dispatching command");
                Self::dispatch(&mut engine, command)
            }
            Err(error) => {
                debug!(%error, "rejected command");
                engine.log_error(&error);
                Ok(Response::invalid_command())
            }
        };

        let terminating = matches!(&result, Ok(response) if response.is_terminate());
        if !terminating && engine.session().is_authorized() {
            self.monitor.arm();
        }
        result
    }

    fn dispatch(engine: &mut Engine<S>, command: Command) -> Result<Response, StoreError> {
        if command.requires_authorization() && !engine.session().is_authorized() {
            return Ok(Response::new(AUTHORIZATION_REQUIRED));
        }

        match command {
            Command::Authorize { account_id, pin } => engine.authorize(account_id, pin),
            Command::Withdraw { amount } => engine.withdraw(amount),
            Command::Deposit { amount } => engine.deposit(amount),
            Command::Balance => Ok(engine.balance()),
            Command::History => engine.history(),
            Command::Logout => Ok(engine.logout()),
            Command::End => Ok(engine.end_program()),
        }
    }

    /// Snapshot of the current session.
    pub fn session(&self) -> Session {
        *self.engine.lock().session()
    }

    pub fn is_authorized(&self) -> bool {
        self.engine.lock().session().is_authorized()
    }

    /// Cached cash reserve balance.
    pub fn reserve(&self) -> Decimal {
        self.engine.lock().reserve()
    }

    /// Overwrites the cash reserve, in the store and in memory.
    pub fn set_reserve(&self, balance: Decimal) -> Result<(), StoreError> {
        self.engine.lock().set_reserve(balance)
    }

    pub fn inactivity_timeout(&self) -> std::time::Duration {
        self.monitor.timeout()
    }
}
