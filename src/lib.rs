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

//! # ATM Simulator
//!
//! This library simulates an automated teller machine: it authorizes an
//! account by ID and PIN, then serves withdrawals, deposits, balance
//! inquiries, and history lookups against a persisted ledger, logging the
//! account out after a period of inactivity.
//!
//! ## Core Components
//!
//! - [`Controller`]: Parses input lines, gates commands, and drives the inactivity logout
//! - [`Engine`]: ATM operations over the current [`Session`] and cash reserve
//! - [`Command`]: Parsed user commands
//! - [`Response`]: Message plus error and terminate flags returned for every command
//! - [`InactivityMonitor`]: Single-shot timer with cancel-and-rearm semantics
//! - [`LedgerStore`]: Storage contract, implemented by [`SqliteStore`] and [`MemoryStore`]
//!
//! ## Example
//!
//! ```
//! use atm_sim::{AccountId, AccountRecord, Config, Controller, MemoryStore, Pin, ReserveId};
//! use rust_decimal_macros::dec;
//!
//! let store = MemoryStore::new();
//! store.insert_account(AccountRecord {
//!     account_id: AccountId(1434597300),
//!     pin: Pin(4557),
//!     balance: dec!(100),
//! });
//! store.insert_reserve(ReserveId(1), dec!(1000));
//!
//! let controller = Controller::new(store, &Config::default()).unwrap();
//! controller.handle("authorize 1434597300 4557").unwrap();
//!
//! let response = controller.handle("withdraw 40").unwrap();
//! assert_eq!(response.message(), "Amount dispensed: $40\nCurrent balance: 60");
//! assert_eq!(controller.reserve(), dec!(960));
//! ```
//!
//! ## Thread Safety
//!
//! One controller serves one session. Commands are processed one at a time;
//! the inactivity logout runs on its own thread and is serialized with
//! commands through the controller's lock.

mod base;
pub mod command;
pub mod config;
mod controller;
mod engine;
pub mod error;
mod monitor;
mod response;
mod session;
pub mod store;

pub use base::{AccountId, Pin, ReserveId};
pub use command::{Command, ParsedCommand};
pub use config::{Config, ConfigError};
pub use controller::Controller;
pub use engine::{Engine, OVERDRAFT_FEE, WITHDRAWAL_INCREMENT};
pub use error::{AtmError, CommandError, StoreError};
pub use monitor::{Expiry, InactivityMonitor};
pub use response::Response;
pub use session::{AuthorizedAccount, Session};
pub use store::{AccountRecord, ErrorLogEntry, HistoryEntry, LedgerStore, MemoryStore, SqliteStore};
