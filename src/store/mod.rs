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

//! Ledger store contract.
//!
//! The engine talks to durable storage only through [`LedgerStore`]. Two
//! implementations ship with the crate:
//!
//! - [`SqliteStore`]: the persistent ledger used by the binary.
//! - [`MemoryStore`]: an in-process ledger for tests, benches, and dry runs.
//!
//! All operations are synchronous and are never retried by the caller.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::base::{AccountId, Pin, ReserveId};
use crate::error::StoreError;
use crate::response::format_amount;
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fmt;

/// A stored customer account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct AccountRecord {
    pub account_id: AccountId,
    pub pin: Pin,
    pub balance: Decimal,
}

/// One balance change on an account. Never mutated once written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub account_id: AccountId,
    pub date: NaiveDate,
    pub time: NaiveTime,
    /// Signed change applied to the account.
    pub amount: Decimal,
    /// Account balance after the change.
    pub new_balance: Decimal,
}

impl HistoryEntry {
    /// Stamps a balance change with the current local date and time.
    pub fn now(account_id: AccountId, amount: Decimal, new_balance: Decimal) -> Self {
        let now = Local::now().naive_local();
        Self {
            account_id,
            date: now.date(),
            time: now.time(),
            amount,
            new_balance,
        }
    }
}

impl fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.date.format("%Y-%m-%d"),
            self.time.format("%H:%M:%S"),
            format_amount(self.amount),
            format_amount(self.new_balance)
        )
    }
}

/// A rejected command, kept for later inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorLogEntry {
    /// Account authorized when the error occurred.
    pub account_id: Option<AccountId>,
    pub timestamp: NaiveDateTime,
    pub message: String,
}

impl ErrorLogEntry {
    pub fn now(account_id: Option<AccountId>, message: impl Into<String>) -> Self {
        Self {
            account_id,
            timestamp: Local::now().naive_local(),
            message: message.into(),
        }
    }
}

/// Durable storage for accounts, the cash reserve, history, and the error log.
pub trait LedgerStore: Send {
    /// Looks up an account. `Ok(None)` when no such account exists.
    fn account(&self, account_id: AccountId) -> Result<Option<AccountRecord>, StoreError>;

    fn set_account_balance(&self, account_id: AccountId, balance: Decimal)
    -> Result<(), StoreError>;

    fn append_history(&self, entry: &HistoryEntry) -> Result<(), StoreError>;

    /// History of an account, newest first.
    fn history(&self, account_id: AccountId) -> Result<Vec<HistoryEntry>, StoreError>;

    /// Reads the cash reserve.
    ///
    /// # Errors
    ///
    /// [`StoreError::MissingReserve`] if the reserve row does not exist.
    fn atm_balance(&self, reserve_id: ReserveId) -> Result<Decimal, StoreError>;

    fn set_atm_balance(&self, reserve_id: ReserveId, balance: Decimal) -> Result<(), StoreError>;

    fn append_error(&self, entry: &ErrorLogEntry) -> Result<(), StoreError>;

    /// Returns some account, used by test fixtures to find credentials.
    fn any_account(&self) -> Result<Option<AccountRecord>, StoreError>;

    /// Deletes every history row of an account. Test fixtures only.
    fn clear_history(&self, account_id: AccountId) -> Result<(), StoreError>;

    /// Applies one transaction: the new reserve balance, the new account
    /// balance (`entry.new_balance`), and the history row describing it.
    ///
    /// Implementations that can do so apply all three atomically.
    fn record_transaction(
        &self,
        reserve_id: ReserveId,
        reserve_balance: Decimal,
        entry: &HistoryEntry,
    ) -> Result<(), StoreError> {
        self.set_atm_balance(reserve_id, reserve_balance)?;
        self.set_account_balance(entry.account_id, entry.new_balance)?;
        self.append_history(entry)
    }
}
