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

//! Transaction engine.
//!
//! The [`Engine`] owns the ledger store handle, the cached cash reserve, and
//! the current [`Session`]. It implements every ATM operation:
//!
//! - **Authorize**: checks the PIN and opens a session.
//! - **Withdraw**: dispenses cash in multiples of 20, capped by the reserve,
//!   with a flat overdraft fee when the account only partly covers it.
//! - **Deposit**: credits account and reserve.
//! - **Balance** / **History**: read-only views of the session's account.
//! - **Logout** / **End**: session and program lifecycle.
//!
//! Business-rule rejections are returned as a [`Response`], never as an
//! error. Only store failures surface as [`StoreError`].
//!
//! # Invariants
//!
//! - The reserve and the account move together: both are written in one
//!   [`LedgerStore::record_transaction`] call, and the in-memory copies are
//!   only updated after it succeeds.
//! - Every balance change appends exactly one history row.

use crate::base::{AccountId, Pin, ReserveId};
use crate::error::{CommandError, StoreError};
use crate::response::{AUTHORIZATION_REQUIRED, Response, format_amount};
use crate::session::{AuthorizedAccount, Session};
use crate::store::{ErrorLogEntry, HistoryEntry, LedgerStore};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{info, warn};

/// Charged when a withdrawal is only partly covered by the account.
pub const OVERDRAFT_FEE: Decimal = dec!(5);

/// Withdrawals are dispensed in multiples of this amount.
pub const WITHDRAWAL_INCREMENT: i64 = 20;

/// ATM operations over a single session.
pub struct Engine<S> {
    store: S,
    reserve_id: ReserveId,
    /// Cached copy of the persisted reserve balance.
    reserve: Decimal,
    session: Session,
}

impl<S: LedgerStore> Engine<S> {
    /// Creates an engine with an empty session, loading the cash reserve.
    ///
    /// # Errors
    ///
    /// [`StoreError::MissingReserve`] if the store has no row for `reserve_id`.
    pub fn new(store: S, reserve_id: ReserveId) -> Result<Self, StoreError> {
        let reserve = store.atm_balance(reserve_id)?;
        Ok(Engine {
            store,
            reserve_id,
            reserve,
            session: Session::Empty,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn reserve(&self) -> Decimal {
        self.reserve
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Overwrites the cash reserve, in the store and in memory.
    pub fn set_reserve(&mut self, balance: Decimal) -> Result<(), StoreError> {
        self.store.set_atm_balance(self.reserve_id, balance)?;
        self.reserve = balance;
        Ok(())
    }

    /// Opens a session when the PIN matches the stored one.
    pub fn authorize(&mut self, account_id: AccountId, pin: Pin) -> Result<Response, StoreError> {
        if self.session.is_authorized() {
            return Ok(Response::new(
                "An account is already authorized. Logout before authorizing another account.",
            ));
        }

        let record = match self.store.account(account_id)? {
            Some(record) if record.pin == pin => record,
            _ => {
                warn!(account = %account_id, "authorization failed");
                return Ok(Response::new("Authorization failed."));
            }
        };

        self.session = Session::authorized(account_id, record.balance);
        info!(account = %account_id, "account authorized");
        Ok(Response::new(format!("{account_id} successfully authorized.")))
    }

    /// Dispenses cash from the reserve and debits the account.
    ///
    /// Checks run in this order, the first match wins:
    ///
    /// | Condition | Outcome |
    /// |-----------|---------|
    /// | amount ≤ 0 or not a multiple of 20 | rejected |
    /// | account balance < 0 | rejected, account overdrawn |
    /// | reserve empty | rejected |
    /// | amount > reserve | amount capped to the reserve, then below |
    /// | amount ≤ balance | dispensed |
    /// | 0 < balance < amount | dispensed plus [`OVERDRAFT_FEE`] |
    /// | balance = 0 | rejected, insufficient funds |
    pub fn withdraw(&mut self, amount: i64) -> Result<Response, StoreError> {
        let Some(account) = self.session.account().copied() else {
            return Ok(Response::new(AUTHORIZATION_REQUIRED));
        };

        if amount <= 0 || amount % WITHDRAWAL_INCREMENT != 0 {
            return Ok(Response::new(
                "Withdrawal amount must be greater than 0 and in increments of 20.",
            ));
        }
        if account.balance < Decimal::ZERO {
            return Ok(Response::new(
                "Your account is overdrawn! You may not make withdrawals at this time.",
            ));
        }
        if self.reserve <= Decimal::ZERO {
            return Ok(Response::new("Unable to process your withdrawal at this time."));
        }

        let mut message = String::new();
        let mut dispensed = Decimal::from(amount);
        if dispensed > self.reserve {
            message.push_str("Unable to dispense full amount requested at this time. ");
            dispensed = self.reserve;
        }

        if dispensed <= account.balance {
            let balance = self.apply(account, -dispensed, -dispensed)?;
            message.push_str(&format!(
                "Amount dispensed: ${}\nCurrent balance: {}",
                format_amount(dispensed),
                format_amount(balance)
            ));
        } else if account.balance > Decimal::ZERO {
            let balance = self.apply(account, -dispensed, -(dispensed + OVERDRAFT_FEE))?;
            message.push_str(&format!(
                "Amount dispensed: ${}\nYou have been charged an overdraft fee of $5. Current balance: {}",
                format_amount(dispensed),
                format_amount(balance)
            ));
        } else {
            return Ok(Response::new("Insufficient funds to process your withdrawal."));
        }

        Ok(Response::new(message))
    }

    /// Credits the account and the reserve.
    pub fn deposit(&mut self, amount: i64) -> Result<Response, StoreError> {
        let Some(account) = self.session.account().copied() else {
            return Ok(Response::new(AUTHORIZATION_REQUIRED));
        };
        if amount <= 0 {
            return Ok(Response::new("Deposit amount must be greater than 0."));
        }

        let amount = Decimal::from(amount);
        let balance = self.apply(account, amount, amount)?;
        Ok(Response::new(format!("Current balance: {}", format_amount(balance))))
    }

    pub fn balance(&self) -> Response {
        match self.session.balance() {
            Some(balance) => Response::new(format!("Current balance: {}", format_amount(balance))),
            None => Response::new(AUTHORIZATION_REQUIRED),
        }
    }

    /// Lists the session account's history, newest first, one row per line.
    pub fn history(&self) -> Result<Response, StoreError> {
        let Some(account_id) = self.session.account_id() else {
            return Ok(Response::new(AUTHORIZATION_REQUIRED));
        };

        let rows = self.store.history(account_id)?;
        if rows.is_empty() {
            return Ok(Response::new("No history found"));
        }

        let lines: Vec<String> = rows.iter().map(ToString::to_string).collect();
        Ok(Response::new(lines.join("\n")))
    }

    pub fn logout(&mut self) -> Response {
        match self.session.account_id() {
            Some(account_id) => {
                self.session = Session::Empty;
                info!(account = %account_id, "account logged out");
                Response::new(format!("Account {account_id} logged out."))
            }
            None => Response::new("No account is currently authorized."),
        }
    }

    pub fn end_program(&self) -> Response {
        Response::terminate("Goodbye!")
    }

    /// Drops the session after inactivity. Returns the account that was
    /// logged out, if any.
    pub fn expire_session(&mut self) -> Option<AccountId> {
        let account_id = self.session.account_id()?;
        self.session = Session::Empty;
        info!(account = %account_id, "inactive account logged out");
        Some(account_id)
    }

    /// Appends a rejected command to the error log. Failures are logged and
    /// otherwise ignored.
    pub fn log_error(&self, error: &CommandError) {
        let entry = ErrorLogEntry::now(self.session.account_id(), error.to_string());
        if let Err(store_error) = self.store.append_error(&entry) {
            warn!(error = %store_error, "failed to write error log");
        }
    }

    /// Moves the reserve and the account by their deltas and records the
    /// account-side change. Returns the new account balance.
    fn apply(
        &mut self,
        account: AuthorizedAccount,
        reserve_delta: Decimal,
        account_delta: Decimal,
    ) -> Result<Decimal, StoreError> {
        let reserve = self.reserve + reserve_delta;
        let balance = account.balance + account_delta;
        let entry = HistoryEntry::now(account.account_id, account_delta, balance);

        self.store.record_transaction(self.reserve_id, reserve, &entry)?;

        self.reserve = reserve;
        self.session = self.session.with_balance(balance);
        self.assert_invariants();
        Ok(balance)
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.reserve >= Decimal::ZERO,
            "Invariant violated: cash reserve went negative: {}",
            self.reserve
        );
    }
}
