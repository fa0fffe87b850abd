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

//! Error types for command parsing and ledger access.
//!
//! Business-rule rejections (bad amounts, overdrawn accounts, failed PIN
//! checks) are not errors: they are reported through a
//! [`Response`](crate::Response). The types here cover malformed input and
//! storage failures only.

use crate::base::{AccountId, ReserveId};
use crate::config::ConfigError;
use thiserror::Error;

/// Malformed command input.
///
/// Every variant is handled by the controller the same way: the display text
/// is written to the error log and the user sees a generic message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Input was empty or whitespace only
    #[error("No input detected.")]
    Empty,

    /// Token count does not fit the verb's shape
    #[error("Too many arguments detected in command: {input}")]
    TooManyArguments { input: String },

    /// A known verb was given the wrong number of arguments
    #[error("'{verb}' expects {expected} argument(s), found {found}")]
    WrongArity {
        verb: String,
        expected: usize,
        found: usize,
    },

    /// An argument did not parse as an integer
    #[error("Invalid numeric argument '{token}' in command: {input}")]
    InvalidNumber { token: String, input: String },

    /// Well-formed input with a verb outside the dispatch table
    #[error("Invalid command detected: {verb}")]
    UnknownCommand { verb: String },
}

/// Ledger store failures.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The cash reserve row is missing.
    #[error("no data exists for atm with id {0}")]
    MissingReserve(ReserveId),

    /// A balance update targeted an account that does not exist.
    #[error("no data exists for account {0}")]
    MissingAccount(AccountId),

    #[error("seed import failed: {0}")]
    Csv(#[from] csv::Error),
}

/// Errors raised while constructing or driving the ATM.
#[derive(Error, Debug)]
pub enum AtmError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The inactivity timer thread could not be started.
    #[error("failed to start inactivity monitor: {0}")]
    Monitor(#[source] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_error_display_messages() {
        assert_eq!(CommandError::Empty.to_string(), "No input detected.");
        assert_eq!(
            CommandError::TooManyArguments {
                input: "deposit 1 2 3 4".into()
            }
            .to_string(),
            "Too many arguments detected in command: deposit 1 2 3 4"
        );
        assert_eq!(
            CommandError::WrongArity {
                verb: "withdraw".into(),
                expected: 1,
                found: 0
            }
            .to_string(),
            "'withdraw' expects 1 argument(s), found 0"
        );
        assert_eq!(
            CommandError::InvalidNumber {
                token: "2o".into(),
                input: "deposit 2o".into()
            }
            .to_string(),
            "Invalid numeric argument '2o' in command: deposit 2o"
        );
        assert_eq!(
            CommandError::UnknownCommand {
                verb: "2438g346".into()
            }
            .to_string(),
            "Invalid command detected: 2438g346"
        );
    }

    #[test]
    fn missing_reserve_names_the_reserve() {
        assert_eq!(
            StoreError::MissingReserve(ReserveId(7)).to_string(),
            "no data exists for atm with id 7"
        );
    }

    #[test]
    fn store_errors_convert_into_atm_errors() {
        let error: AtmError = StoreError::MissingReserve(ReserveId(1)).into();
        assert!(matches!(
            error,
            AtmError::Store(StoreError::MissingReserve(ReserveId(1)))
        ));
    }

    #[test]
    fn command_errors_are_cloneable() {
        let error = CommandError::Empty;
        let cloned = error.clone();
        assert_eq!(error, cloned);
    }
}
