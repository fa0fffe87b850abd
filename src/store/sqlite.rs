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

//! SQLite-backed ledger store.
//!
//! Every statement is parameterized. Amounts are written as decimal text and
//! read back from integer, real, or text columns, so ledgers created by other
//! tools with numeric columns stay readable.

use super::{AccountRecord, ErrorLogEntry, HistoryEntry, LedgerStore};
use crate::base::{AccountId, Pin, ReserveId};
use crate::error::StoreError;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row, params};
use rust_decimal::Decimal;
use std::io::Read;
use std::path::Path;
use tracing::info;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS accounts (
        account_id INTEGER PRIMARY KEY,
        pin INTEGER NOT NULL,
        balance TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS atm_balance (
        id INTEGER PRIMARY KEY,
        balance TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        account_id INTEGER NOT NULL,
        date TEXT NOT NULL,
        time TEXT NOT NULL,
        amount TEXT NOT NULL,
        new_balance TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_history_account ON history(account_id, date, time);
    CREATE TABLE IF NOT EXISTS errors (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        account_id INTEGER,
        timestamp TEXT NOT NULL,
        error TEXT NOT NULL
    );
";

/// Decimal column codec.
struct SqlDecimal(Decimal);

impl FromSql for SqlDecimal {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let decimal = match value {
            ValueRef::Integer(i) => Decimal::from(i),
            ValueRef::Real(f) => {
                Decimal::try_from(f).map_err(|e| FromSqlError::Other(Box::new(e)))?
            }
            ValueRef::Text(text) => std::str::from_utf8(text)
                .map_err(|e| FromSqlError::Other(Box::new(e)))?
                .trim()
                .parse::<Decimal>()
                .map_err(|e| FromSqlError::Other(Box::new(e)))?,
            _ => return Err(FromSqlError::InvalidType),
        };
        Ok(SqlDecimal(decimal))
    }
}

impl ToSql for SqlDecimal {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0.to_string()))
    }
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<AccountRecord> {
    Ok(AccountRecord {
        account_id: AccountId(row.get(0)?),
        pin: Pin(row.get(1)?),
        balance: row.get::<_, SqlDecimal>(2)?.0,
    })
}

fn update_reserve(
    conn: &Connection,
    reserve_id: ReserveId,
    balance: Decimal,
) -> Result<(), StoreError> {
    let updated = conn.execute(
        "UPDATE atm_balance SET balance = ?1 WHERE id = ?2",
        params![SqlDecimal(balance), reserve_id.0],
    )?;
    if updated == 0 {
        return Err(StoreError::MissingReserve(reserve_id));
    }
    Ok(())
}

fn update_account(
    conn: &Connection,
    account_id: AccountId,
    balance: Decimal,
) -> Result<(), StoreError> {
    let updated = conn.execute(
        "UPDATE accounts SET balance = ?1 WHERE account_id = ?2",
        params![SqlDecimal(balance), account_id.0],
    )?;
    if updated == 0 {
        return Err(StoreError::MissingAccount(account_id));
    }
    Ok(())
}

fn insert_history(conn: &Connection, entry: &HistoryEntry) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO history (account_id, date, time, amount, new_balance)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            entry.account_id.0,
            entry.date,
            entry.time,
            SqlDecimal(entry.amount),
            SqlDecimal(entry.new_balance),
        ],
    )?;
    Ok(())
}

/// Ledger persisted in a SQLite database.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (creating if needed) the ledger database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
        Self::with_connection(conn)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Inserts or replaces an account.
    pub fn upsert_account(&self, record: &AccountRecord) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO accounts (account_id, pin, balance) VALUES (?1, ?2, ?3)
             ON CONFLICT(account_id) DO UPDATE SET pin = excluded.pin, balance = excluded.balance",
            params![record.account_id.0, record.pin.0, SqlDecimal(record.balance)],
        )?;
        Ok(())
    }

    /// Inserts or replaces the cash reserve row.
    pub fn seed_reserve(&self, reserve_id: ReserveId, balance: Decimal) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO atm_balance (id, balance) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET balance = excluded.balance",
            params![reserve_id.0, SqlDecimal(balance)],
        )?;
        info!(reserve = %reserve_id, %balance, "cash reserve seeded");
        Ok(())
    }

    /// Loads accounts from CSV with the header `account_id,pin,balance`.
    ///
    /// Rows are upserted in a single transaction; a malformed row aborts the
    /// whole import.
    ///
    /// # Example
    ///
    /// ```csv
    /// account_id,pin,balance
    /// 2859459814,7386,10.24
    /// 1434597300,4557,90000.55
    /// ```
    pub fn import_accounts<R: Read>(&self, reader: R) -> Result<usize, StoreError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .has_headers(true)
            .from_reader(reader);

        let tx = self.conn.unchecked_transaction()?;
        let mut imported = 0;
        for result in rdr.deserialize::<AccountRecord>() {
            let record = result?;
            tx.execute(
                "INSERT INTO accounts (account_id, pin, balance) VALUES (?1, ?2, ?3)
                 ON CONFLICT(account_id) DO UPDATE SET pin = excluded.pin, balance = excluded.balance",
                params![record.account_id.0, record.pin.0, SqlDecimal(record.balance)],
            )?;
            imported += 1;
        }
        tx.commit()?;

        info!(imported, "accounts imported");
        Ok(imported)
    }

    /// Error log, oldest first.
    pub fn errors(&self) -> Result<Vec<ErrorLogEntry>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT account_id, timestamp, error FROM errors ORDER BY id")?;
        let entries = stmt
            .query_map([], |row| {
                Ok(ErrorLogEntry {
                    account_id: row.get::<_, Option<i64>>(0)?.map(AccountId),
                    timestamp: row.get(1)?,
                    message: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

impl LedgerStore for SqliteStore {
    fn account(&self, account_id: AccountId) -> Result<Option<AccountRecord>, StoreError> {
        let record = self
            .conn
            .query_row(
                "SELECT account_id, pin, balance FROM accounts WHERE account_id = ?1",
                [account_id.0],
                account_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn set_account_balance(
        &self,
        account_id: AccountId,
        balance: Decimal,
    ) -> Result<(), StoreError> {
        update_account(&self.conn, account_id, balance)
    }

    fn append_history(&self, entry: &HistoryEntry) -> Result<(), StoreError> {
        insert_history(&self.conn, entry)
    }

    fn history(&self, account_id: AccountId) -> Result<Vec<HistoryEntry>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT account_id, date, time, amount, new_balance
             FROM history
             WHERE account_id = ?1
             ORDER BY date DESC, time DESC, id DESC",
        )?;
        let rows = stmt
            .query_map([account_id.0], |row| {
                Ok(HistoryEntry {
                    account_id: AccountId(row.get(0)?),
                    date: row.get(1)?,
                    time: row.get(2)?,
                    amount: row.get::<_, SqlDecimal>(3)?.0,
                    new_balance: row.get::<_, SqlDecimal>(4)?.0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn atm_balance(&self, reserve_id: ReserveId) -> Result<Decimal, StoreError> {
        self.conn
            .query_row(
                "SELECT balance FROM atm_balance WHERE id = ?1",
                [reserve_id.0],
                |row| row.get::<_, SqlDecimal>(0),
            )
            .optional()?
            .map(|balance| balance.0)
            .ok_or(StoreError::MissingReserve(reserve_id))
    }

    fn set_atm_balance(&self, reserve_id: ReserveId, balance: Decimal) -> Result<(), StoreError> {
        update_reserve(&self.conn, reserve_id, balance)
    }

    fn append_error(&self, entry: &ErrorLogEntry) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO errors (account_id, timestamp, error) VALUES (?1, ?2, ?3)",
            params![
                entry.account_id.map(|id| id.0),
                entry.timestamp,
                entry.message
            ],
        )?;
        Ok(())
    }

    fn any_account(&self) -> Result<Option<AccountRecord>, StoreError> {
        let record = self
            .conn
            .query_row(
                "SELECT account_id, pin, balance FROM accounts ORDER BY account_id LIMIT 1",
                [],
                account_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn clear_history(&self, account_id: AccountId) -> Result<(), StoreError> {
        self.conn
            .execute("DELETE FROM history WHERE account_id = ?1", [account_id.0])?;
        Ok(())
    }

    fn record_transaction(
        &self,
        reserve_id: ReserveId,
        reserve_balance: Decimal,
        entry: &HistoryEntry,
    ) -> Result<(), StoreError> {
        // Dropping the transaction on an early return rolls it back.
        let tx = self.conn.unchecked_transaction()?;
        update_reserve(&tx, reserve_id, reserve_balance)?;
        update_account(&tx, entry.account_id, entry.new_balance)?;
        insert_history(&tx, entry)?;
        tx.commit()?;
        Ok(())
    }
}
