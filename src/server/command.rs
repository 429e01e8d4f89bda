//! Wire command parsing
//!
//! The only command is `BACKSPACE_<n>`. The count is read like C `stoi`:
//! leading whitespace, an optional sign, then the longest digit run.
//! Anything after the digits (typically a newline) is ignored.

use thiserror::Error;

use crate::constants::BACKSPACE_PREFIX;

/// A parsed client request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Press backspace `n` times (not yet clamped, may be <= 0)
    Backspace(i64),
}

/// Why a payload was not a command
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("empty payload")]
    Empty,
    #[error("unknown command: {0:?}")]
    UnknownCommand(String),
    #[error("invalid count: {0:?}")]
    InvalidCount(String),
}

/// Parse one received payload
///
/// The payload ends at the first NUL byte, as with a C string.
pub fn parse_command(payload: &[u8]) -> Result<Command, CommandError> {
    let end = payload.iter().position(|&b| b == 0).unwrap_or(payload.len());
    let payload = &payload[..end];
    if payload.is_empty() {
        return Err(CommandError::Empty);
    }

    let Some(arg) = payload.strip_prefix(BACKSPACE_PREFIX.as_bytes()) else {
        return Err(CommandError::UnknownCommand(
            String::from_utf8_lossy(payload).into_owned(),
        ));
    };

    parse_count(arg)
        .map(Command::Backspace)
        .ok_or_else(|| CommandError::InvalidCount(String::from_utf8_lossy(arg).into_owned()))
}

/// Leading signed decimal integer, saturating at the i64 bounds
fn parse_count(bytes: &[u8]) -> Option<i64> {
    // C isspace(): space, \t, \n, \v, \f, \r
    let mut rest = bytes;
    while let Some((&b, tail)) = rest.split_first() {
        if matches!(b, b' ' | b'\t' | b'\n' | 0x0b | 0x0c | b'\r') {
            rest = tail;
        } else {
            break;
        }
    }

    let negative = match rest.first() {
        Some(b'-') => {
            rest = &rest[1..];
            true
        }
        Some(b'+') => {
            rest = &rest[1..];
            false
        }
        _ => false,
    };

    let digits = rest.iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }

    let magnitude = rest[..digits].iter().fold(0i64, |acc, &d| {
        acc.saturating_mul(10).saturating_add((d - b'0') as i64)
    });
    Some(if negative { -magnitude } else { magnitude })
}
