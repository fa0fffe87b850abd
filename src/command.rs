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

//! Command parsing.
//!
//! Input goes through two stages:
//! - [`parse`] checks the token shape and converts arguments to integers,
//!   producing a [`ParsedCommand`].
//! - [`Command::try_from`] looks the verb up in the dispatch table and checks
//!   its arity.
//!
//! [`Command`] implements [`FromStr`] which runs both stages.
//!
//! ```
//! use atm_sim::{AccountId, Command, Pin};
//!
//! let command: Command = "authorize 2859459814 7386".parse().unwrap();
//! assert_eq!(
//!     command,
//!     Command::Authorize { account_id: AccountId(2859459814), pin: Pin(7386) }
//! );
//! ```

use crate::base::{AccountId, Pin};
use crate::error::CommandError;
use std::str::FromStr;

/// Verbs that take exactly one amount argument.
const AMOUNT_VERBS: [&str; 2] = ["withdraw", "deposit"];

/// Verbs that take no arguments.
const BARE_VERBS: [&str; 4] = ["balance", "history", "logout", "end"];

const MAX_TOKENS: usize = 3;

/// Lowercased verb plus its integer arguments, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub verb: String,
    pub args: Vec<i64>,
}

/// Validates and tokenizes a raw input line.
///
/// # Errors
///
/// - [`CommandError::Empty`] - the line holds no tokens.
/// - [`CommandError::TooManyArguments`] - more than three tokens, three tokens
///   for anything but `authorize`, two tokens for anything but
///   `withdraw`/`deposit`, or arguments given to a bare verb.
/// - [`CommandError::InvalidNumber`] - an argument is not an integer.
pub fn parse(input: &str) -> Result<ParsedCommand, CommandError> {
    let input = input.trim();
    let tokens: Vec<&str> = input.split_whitespace().collect();

    let Some(first) = tokens.first() else {
        return Err(CommandError::Empty);
    };
    let verb = first.to_lowercase();

    let shape_ok = match tokens.len() {
        n if n > MAX_TOKENS => false,
        3 => verb == "authorize",
        2 => AMOUNT_VERBS.contains(&verb.as_str()),
        _ => true,
    };
    if !shape_ok || (BARE_VERBS.contains(&verb.as_str()) && tokens.len() != 1) {
        return Err(CommandError::TooManyArguments {
            input: input.to_string(),
        });
    }

    let args = tokens[1..]
        .iter()
        .map(|token| {
            token.parse::<i64>().map_err(|_| CommandError::InvalidNumber {
                token: (*token).to_string(),
                input: input.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ParsedCommand { verb, args })
}

/// A command accepted by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Authorize { account_id: AccountId, pin: Pin },
    Withdraw { amount: i64 },
    Deposit { amount: i64 },
    Balance,
    History,
    Logout,
    End,
}

impl Command {
    /// Returns `true` for commands that only run against an authorized session.
    pub fn requires_authorization(&self) -> bool {
        matches!(
            self,
            Self::Withdraw { .. } | Self::Deposit { .. } | Self::Balance | Self::History
        )
    }

    pub fn verb(&self) -> &'static str {
        match self {
            Self::Authorize { .. } => "authorize",
            Self::Withdraw { .. } => "withdraw",
            Self::Deposit { .. } => "deposit",
            Self::Balance => "balance",
            Self::History => "history",
            Self::Logout => "logout",
            Self::End => "end",
        }
    }
}

impl TryFrom<ParsedCommand> for Command {
    type Error = CommandError;

    fn try_from(parsed: ParsedCommand) -> Result<Self, Self::Error> {
        let command = match (parsed.verb.as_str(), parsed.args.as_slice()) {
            ("authorize", &[account_id, pin]) => Self::Authorize {
                account_id: AccountId(account_id),
                pin: Pin(pin),
            },
            ("withdraw", &[amount]) => Self::Withdraw { amount },
            ("deposit", &[amount]) => Self::Deposit { amount },
            ("balance", []) => Self::Balance,
            ("history", []) => Self::History,
            ("logout", []) => Self::Logout,
            ("end", []) => Self::End,
            ("authorize", args) => return Err(wrong_arity(&parsed.verb, 2, args.len())),
            ("withdraw" | "deposit", args) => {
                return Err(wrong_arity(&parsed.verb, 1, args.len()));
            }
            _ => {
                return Err(CommandError::UnknownCommand {
                    verb: parsed.verb.clone(),
                });
            }
        };
        Ok(command)
    }
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        parse(input)?.try_into()
    }
}

fn wrong_arity(verb: &str, expected: usize, found: usize) -> CommandError {
    CommandError::WrongArity {
        verb: verb.to_string(),
        expected,
        found,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_splits_verb_and_arguments() {
        let parsed = parse("  authorize 1434597300 4557 ").unwrap();
        assert_eq!(parsed.verb, "authorize");
        assert_eq!(parsed.args, vec![1434597300, 4557]);
    }

    #[test]
    fn parse_lowercases_verb() {
        assert_eq!(parse("WithDraw 40").unwrap().verb, "withdraw");
        assert_eq!("BALANCE".parse::<Command>().unwrap(), Command::Balance);
    }

    #[test]
    fn parse_accepts_signed_amounts() {
        assert_eq!(
            "deposit -5".parse::<Command>().unwrap(),
            Command::Deposit { amount: -5 }
        );
    }

    #[test]
    fn empty_input_is_rejected() {
        assert_eq!(parse(""), Err(CommandError::Empty));
        assert_eq!(parse(" \t  "), Err(CommandError::Empty));
    }

    #[test]
    fn more_than_three_tokens_is_rejected() {
        assert!(matches!(
            parse("deposit 1 2 3 4"),
            Err(CommandError::TooManyArguments { .. })
        ));
    }

    #[test]
    fn three_tokens_only_for_authorize() {
        assert!(matches!(
            parse("withdraw 5634 095376"),
            Err(CommandError::TooManyArguments { .. })
        ));
        assert!(parse("authorize 5634 095376").is_ok());
    }

    #[test]
    fn two_tokens_only_for_amount_verbs() {
        assert!(matches!(
            parse("authorize 1"),
            Err(CommandError::TooManyArguments { .. })
        ));
        assert!(matches!(
            parse("balance 20"),
            Err(CommandError::TooManyArguments { .. })
        ));
        assert!(parse("deposit 20").is_ok());
    }

    #[test]
    fn non_numeric_argument_is_rejected() {
        assert_eq!(
            parse("deposit 2o"),
            Err(CommandError::InvalidNumber {
                token: "2o".into(),
                input: "deposit 2o".into()
            })
        );
        assert!(matches!(
            parse("authorize 12 x"),
            Err(CommandError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn bare_verbs_parse() {
        assert_eq!("balance".parse::<Command>().unwrap(), Command::Balance);
        assert_eq!("history".parse::<Command>().unwrap(), Command::History);
        assert_eq!("logout".parse::<Command>().unwrap(), Command::Logout);
        assert_eq!("end".parse::<Command>().unwrap(), Command::End);
    }

    #[test]
    fn unknown_single_token_fails_dispatch() {
        // Shape is fine, the dispatch table rejects it.
        assert!(parse("26235742").is_ok());
        assert_eq!(
            "26235742".parse::<Command>(),
            Err(CommandError::UnknownCommand {
                verb: "26235742".into()
            })
        );
        assert!(matches!(
            "2438g346".parse::<Command>(),
            Err(CommandError::UnknownCommand { .. })
        ));
    }

    #[test]
    fn amount_verb_without_amount_fails_dispatch() {
        assert_eq!(
            "withdraw".parse::<Command>(),
            Err(CommandError::WrongArity {
                verb: "withdraw".into(),
                expected: 1,
                found: 0
            })
        );
        assert!(matches!(
            "authorize".parse::<Command>(),
            Err(CommandError::WrongArity { expected: 2, .. })
        ));
    }

    #[test]
    fn authorization_gating_table() {
        assert!(Command::Withdraw { amount: 20 }.requires_authorization());
        assert!(Command::Deposit { amount: 20 }.requires_authorization());
        assert!(Command::Balance.requires_authorization());
        assert!(Command::History.requires_authorization());
        assert!(!Command::Logout.requires_authorization());
        assert!(!Command::End.requires_authorization());
        assert!(
            !Command::Authorize {
                account_id: AccountId(1),
                pin: Pin(1)
            }
            .requires_authorization()
        );
    }
}
