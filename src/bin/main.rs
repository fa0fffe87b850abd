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

use atm_sim::{Config, Controller, ReserveId, SqliteStore, StoreError};
use clap::Parser;
use rust_decimal::Decimal;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// ATM Simulator - Interactive automated teller machine
///
/// Reads one command per line from stdin and prints the result to stdout.
/// Commands: authorize <id> <pin>, withdraw <amount>, deposit <amount>,
/// balance, history, logout, end.
#[derive(Parser, Debug)]
#[command(name = "atm-sim")]
#[command(about = "An ATM simulator backed by a SQLite ledger", long_about = None)]
struct Args {
    /// Path to the SQLite ledger database
    #[arg(long, env = "ATM_DATABASE", default_value = "atm.db", value_name = "FILE")]
    database: PathBuf,

    /// Seconds without input before an authorized account is logged out
    #[arg(long, env = "ATM_INACTIVITY_SECS", default_value_t = 120, value_name = "SECS")]
    timeout: u64,

    /// Row ID of the cash reserve in the ledger
    #[arg(long, env = "ATM_RESERVE_ID", default_value_t = 1)]
    reserve_id: i64,

    /// CSV file of accounts to load before starting
    ///
    /// Expected format: account_id,pin,balance
    #[arg(long, value_name = "CSV")]
    seed_accounts: Option<PathBuf>,

    /// Set the cash reserve before starting
    #[arg(long, value_name = "AMOUNT")]
    seed_reserve: Option<Decimal>,

    /// Use a throwaway in-memory ledger instead of the database file
    #[arg(long)]
    in_memory: bool,
}

#[derive(Debug, Error)]
enum RunError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

fn main() {
    init_tracing();
    let args = Args::parse();

    let config = Config::new(&args.database)
        .with_inactivity_timeout(Duration::from_secs(args.timeout))
        .with_reserve_id(ReserveId(args.reserve_id));

    let store = match open_store(&args, &config) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error opening ledger '{}': {}", args.database.display(), e);
            process::exit(1);
        }
    };

    let controller = match Controller::new(store, &config) {
        Ok(controller) => controller,
        Err(e) => {
            eprintln!("Error starting ATM: {}", e);
            process::exit(1);
        }
    };

    info!(
        database = %config.database.display(),
        reserve = %controller.reserve(),
        timeout_secs = controller.inactivity_timeout().as_secs(),
        "ATM started"
    );

    if let Err(e) = run(
        &controller,
        io::stdin().lock(),
        io::stdout().lock(),
        io::stderr().lock(),
    ) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Logs go to stderr so stdout carries only the command transcript.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "atm_sim=warn".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

/// Opens the ledger and applies any seed data.
fn open_store(args: &Args, config: &Config) -> Result<SqliteStore, RunError> {
    let store = if args.in_memory {
        SqliteStore::open_in_memory()?
    } else {
        SqliteStore::open(&config.database)?
    };

    if let Some(path) = &args.seed_accounts {
        store.import_accounts(BufReader::new(File::open(path)?))?;
    }
    if let Some(balance) = args.seed_reserve {
        store.seed_reserve(config.reserve_id, balance)?;
    }

    Ok(store)
}

/// Feeds input lines to the controller until `end` or end of input.
///
/// Each non-empty response message is written on its own line. A ledger
/// failure aborts only the command that hit it: the failure goes to
/// `errors` and the next line is read.
///
/// # Errors
///
/// Returns an error if reading or writing fails.
fn run<R: BufRead, W: Write, E: Write>(
    controller: &Controller<SqliteStore>,
    input: R,
    mut output: W,
    mut errors: E,
) -> Result<(), RunError> {
    for line in input.lines() {
        let line = line?;
        let response = match controller.handle(&line) {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "ledger access failed");
                writeln!(errors, "Error: {}", e)?;
                continue;
            }
        };

        if !response.message().is_empty() {
            writeln!(output, "{}", response.message())?;
            output.flush()?;
        }

        if response.is_terminate() {
            break;
        }
    }
    Ok(())
}
