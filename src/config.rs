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

//! Runtime configuration.

use crate::base::ReserveId;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default ledger database file.
pub const DEFAULT_DATABASE: &str = "atm.db";

/// Default inactivity window before an authorized session is logged out.
pub const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(120);

/// Settings injected into a [`Controller`](crate::Controller).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Ledger database path. Only used by [`Controller::open`](crate::Controller::open).
    pub database: PathBuf,
    pub inactivity_timeout: Duration,
    pub reserve_id: ReserveId,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE),
            inactivity_timeout: DEFAULT_INACTIVITY_TIMEOUT,
            reserve_id: ReserveId::default(),
        }
    }
}

impl Config {
    pub fn new(database: impl AsRef<Path>) -> Self {
        Self {
            database: database.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    pub fn with_inactivity_timeout(mut self, timeout: Duration) -> Self {
        self.inactivity_timeout = timeout;
        self
    }

    pub fn with_reserve_id(mut self, reserve_id: ReserveId) -> Self {
        self.reserve_id = reserve_id;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.inactivity_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("inactivity timeout must be greater than zero")]
    ZeroTimeout,
}
