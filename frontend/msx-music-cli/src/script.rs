//! Plain-text write scripts
//!
//! One command per line, `#` starts a comment. Port numbers, register addresses and values are
//! hex, sample counts are decimal:
//!
//! ```text
//! port 7C 30      # select register $30
//! port 7D 12      # instrument 1, volume 2
//! reg 20 17       # direct register write
//! wait 4000       # render 4000 samples
//! reset
//! ```

use std::num::ParseIntError;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Port { port: u8, value: u8 },
    Register { address: u8, value: u8 },
    Wait { samples: u64 },
    Reset,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScriptError {
    #[error("line {line}: unknown command '{command}'")]
    UnknownCommand { line: usize, command: String },
    #[error("line {line}: '{command}' expects {expected} argument(s), got {actual}")]
    ArgumentCount { line: usize, command: &'static str, expected: usize, actual: usize },
    #[error("line {line}: invalid number '{value}': {source}")]
    InvalidNumber {
        line: usize,
        value: String,
        #[source]
        source: ParseIntError,
    },
}

fn parse_hex(line: usize, value: &str) -> Result<u8, ScriptError> {
    let digits =
        value.trim_start_matches("0x").trim_start_matches('$').trim_end_matches(['h', 'H']);
    u8::from_str_radix(digits, 16).map_err(|source| ScriptError::InvalidNumber {
        line,
        value: value.into(),
        source,
    })
}

fn expect_args(
    line: usize,
    command: &'static str,
    args: &[&str],
    expected: usize,
) -> Result<(), ScriptError> {
    if args.len() != expected {
        return Err(ScriptError::ArgumentCount { line, command, expected, actual: args.len() });
    }
    Ok(())
}

fn parse_line(line: usize, text: &str) -> Result<Option<Command>, ScriptError> {
    let text = text.split('#').next().unwrap_or_default();
    let mut tokens = text.split_whitespace();
    let Some(command) = tokens.next() else { return Ok(None) };
    let args: Vec<&str> = tokens.collect();

    let command = match command.to_ascii_lowercase().as_str() {
        "port" => {
            expect_args(line, "port", &args, 2)?;
            Command::Port { port: parse_hex(line, args[0])?, value: parse_hex(line, args[1])? }
        }
        "reg" => {
            expect_args(line, "reg", &args, 2)?;
            Command::Register {
                address: parse_hex(line, args[0])?,
                value: parse_hex(line, args[1])?,
            }
        }
        "wait" => {
            expect_args(line, "wait", &args, 1)?;
            let samples = args[0].parse().map_err(|source| ScriptError::InvalidNumber {
                line,
                value: args[0].into(),
                source,
            })?;
            Command::Wait { samples }
        }
        "reset" => {
            expect_args(line, "reset", &args, 0)?;
            Command::Reset
        }
        _ => return Err(ScriptError::UnknownCommand { line, command: command.into() }),
    };

    Ok(Some(command))
}

/// Parses a whole script, reporting the first bad line.
///
/// # Errors
///
/// Returns an error naming the 1-based line number of the first line that fails to parse.
pub fn parse(script: &str) -> Result<Vec<Command>, ScriptError> {
    script
        .lines()
        .enumerate()
        .filter_map(|(i, text)| parse_line(i + 1, text).transpose())
        .collect()
}
