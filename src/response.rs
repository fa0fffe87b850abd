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

//! Controller responses.

use rust_decimal::Decimal;
use std::fmt;

pub(crate) const INVALID_COMMAND: &str = "Invalid command detected.";
pub(crate) const AUTHORIZATION_REQUIRED: &str = "Authorization required.";

/// Outcome of a single controller invocation.
///
/// The error flag is only raised for malformed input. Business-rule
/// rejections such as an overdrawn account carry a message with the flag
/// cleared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    message: String,
    error: bool,
    terminate: bool,
}

impl Response {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error: false,
            terminate: false,
        }
    }

    /// The generic response for malformed input.
    pub fn invalid_command() -> Self {
        Self {
            error: true,
            ..Self::new(INVALID_COMMAND)
        }
    }

    /// A response that ends the read loop.
    pub fn terminate(message: impl Into<String>) -> Self {
        Self {
            terminate: true,
            ..Self::new(message)
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_error(&self) -> bool {
        self.error
    }

    pub fn is_terminate(&self) -> bool {
        self.terminate
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Rounds to cents and drops trailing zeros, so `-15.00` prints as `-15`.
pub(crate) fn format_amount(amount: Decimal) -> String {
    amount.round_dp(2).normalize().to_string()
}
