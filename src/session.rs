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

//! Session state.
//!
//! ```text
//!  Empty ──authorize──► Authorized ──logout / inactivity──► Empty
//! ```
//!
//! A session is replaced as a whole on every transition rather than patched
//! field by field, so an empty session can never carry a stale account ID or
//! balance.

use crate::base::AccountId;
use rust_decimal::Decimal;

/// The account behind an authorized session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorizedAccount {
    pub account_id: AccountId,
    pub balance: Decimal,
}

/// The currently authorized account, if any.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Session {
    #[default]
    Empty,
    Authorized(AuthorizedAccount),
}

impl Session {
    pub fn authorized(account_id: AccountId, balance: Decimal) -> Self {
        Self::Authorized(AuthorizedAccount {
            account_id,
            balance,
        })
    }

    pub fn is_authorized(&self) -> bool {
        matches!(self, Self::Authorized(_))
    }

    pub fn account(&self) -> Option<&AuthorizedAccount> {
        match self {
            Self::Authorized(account) => Some(account),
            Self::Empty => None,
        }
    }

    pub fn account_id(&self) -> Option<AccountId> {
        self.account().map(|account| account.account_id)
    }

    pub fn balance(&self) -> Option<Decimal> {
        self.account().map(|account| account.balance)
    }

    /// Returns the same session carrying a new balance. Empty stays empty.
    pub fn with_balance(self, balance: Decimal) -> Self {
        match self {
            Self::Authorized(account) => Self::authorized(account.account_id, balance),
            Self::Empty => Self::Empty,
        }
    }
}
