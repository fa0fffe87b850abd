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

//! In-process ledger store.

use super::{AccountRecord, ErrorLogEntry, HistoryEntry, LedgerStore};
use crate::base::{AccountId, ReserveId};
use crate::error::StoreError;
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::Arc;

#[derive(Debug, Default)]
struct Tables {
    accounts: DashMap<AccountId, AccountRecord>,
    reserves: DashMap<ReserveId, Decimal>,
    /// Append-only, in insertion order.
    history: Mutex<Vec<HistoryEntry>>,
    errors: Mutex<Vec<ErrorLogEntry>>,
}

/// Ledger kept in memory.
///
/// Clones share the same tables, so a test can hand one clone to a
/// controller and inspect the ledger through another.
///
/// ```
/// use atm_sim::{AccountId, AccountRecord, LedgerStore, MemoryStore, Pin, ReserveId};
/// use rust_decimal_macros::dec;
///
/// let store = MemoryStore::new();
/// store.insert_account(AccountRecord {
///     account_id: AccountId(1),
///     pin: Pin(1234),
///     balance: dec!(50),
/// });
/// store.insert_reserve(ReserveId(1), dec!(100));
///
/// assert_eq!(store.atm_balance(ReserveId(1)).unwrap(), dec!(100));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an account.
    pub fn insert_account(&self, record: AccountRecord) {
        self.tables.accounts.insert(record.account_id, record);
    }

    /// Inserts or replaces a cash reserve row.
    pub fn insert_reserve(&self, reserve_id: ReserveId, balance: Decimal) {
        self.tables.reserves.insert(reserve_id, balance);
    }

    /// Removes a cash reserve row.
    pub fn remove_reserve(&self, reserve_id: ReserveId) {
        self.tables.reserves.remove(&reserve_id);
    }

    /// Error log, oldest first.
    pub fn errors(&self) -> Vec<ErrorLogEntry> {
        self.tables.errors.lock().clone()
    }
}

impl LedgerStore for MemoryStore {
    fn account(&self, account_id: AccountId) -> Result<Option<AccountRecord>, StoreError> {
        Ok(self.tables.accounts.get(&account_id).map(|record| *record))
    }

    fn set_account_balance(
        &self,
        account_id: AccountId,
        balance: Decimal,
    ) -> Result<(), StoreError> {
        let mut record = self
            .tables
            .accounts
            .get_mut(&account_id)
            .ok_or(StoreError::MissingAccount(account_id))?;
        record.balance = balance;
        Ok(())
    }

    fn append_history(&self, entry: &HistoryEntry) -> Result<(), StoreError> {
        self.tables.history.lock().push(entry.clone());
        Ok(())
    }

    fn history(&self, account_id: AccountId) -> Result<Vec<HistoryEntry>, StoreError> {
        let mut rows: Vec<HistoryEntry> = self
            .tables
            .history
            .lock()
            .iter()
            .rev()
            .filter(|entry| entry.account_id == account_id)
            .cloned()
            .collect();
        // Stable sort: rows with equal timestamps stay latest-inserted first.
        rows.sort_by(|a, b| (b.date, b.time).cmp(&(a.date, a.time)));
        Ok(rows)
    }

    fn atm_balance(&self, reserve_id: ReserveId) -> Result<Decimal, StoreError> {
        self.tables
            .reserves
            .get(&reserve_id)
            .map(|balance| *balance)
            .ok_or(StoreError::MissingReserve(reserve_id))
    }

    fn set_atm_balance(&self, reserve_id: ReserveId, balance: Decimal) -> Result<(), StoreError> {
        let mut reserve = self
            .tables
            .reserves
            .get_mut(&reserve_id)
            .ok_or(StoreError::MissingReserve(reserve_id))?;
        *reserve = balance;
        Ok(())
    }

    fn append_error(&self, entry: &ErrorLogEntry) -> Result<(), StoreError> {
        self.tables.errors.lock().push(entry.clone());
        Ok(())
    }

    fn any_account(&self) -> Result<Option<AccountRecord>, StoreError> {
        Ok(self
            .tables
            .accounts
            .iter()
            .map(|record| *record)
            .min_by_key(|record| record.account_id))
    }

    fn clear_history(&self, account_id: AccountId) -> Result<(), StoreError> {
        self.tables
            .history
            .lock()
            .retain(|entry| entry.account_id != account_id);
        Ok(())
    }

    fn record_transaction(
        &self,
        reserve_id: ReserveId,
        reserve_balance: Decimal,
        entry: &HistoryEntry,
    ) -> Result<(), StoreError> {
        // Check both rows up front so a failure leaves nothing applied.
        if !self.tables.reserves.contains_key(&reserve_id) {
            return Err(StoreError::MissingReserve(reserve_id));
        }
        if !self.tables.accounts.contains_key(&entry.account_id) {
            return Err(StoreError::MissingAccount(entry.account_id));
        }
        self.set_atm_balance(reserve_id, reserve_balance)?;
        self.set_account_balance(entry.account_id, entry.new_balance)?;
        self.append_history(entry)
    }
}
