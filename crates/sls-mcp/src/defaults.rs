// crates/sls-mcp/src/defaults.rs
// ============================================================================
// Module: Parameter Defaults
// Description: Time parsing and default windows for tool arguments.
// Purpose: Turn loose caller input into the unix-second ranges the client needs.
// Dependencies: serde, time, sls-config
// ============================================================================

//! ## Overview
//! Tool callers pass times as epoch numbers or calendar strings and often omit
//! them. This module reads every accepted form and fills missing bounds from
//! `[defaults]`.
//!
//! Accepted forms:
//! - 10-digit epoch seconds, as a number or a digit string;
//! - 13-digit epoch milliseconds, truncated to seconds;
//! - `YYYY-MM-DD HH:MM:SS` and `YYYY-MM-DDTHH:MM:SS`;
//! - `YYYY-MM-DD`, read as midnight.
//!
//! Calendar forms are interpreted in the configured UTC offset.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use sls_config::DefaultsConfig;
use time::Date;
use time::PrimitiveDateTime;
use time::UtcOffset;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

use crate::tools::ToolError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Seconds per day.
const SECONDS_PER_DAY: i64 = 86_400;

/// Digits in an epoch-milliseconds value.
const MILLIS_DIGITS: usize = 13;

/// Largest digit count read as epoch seconds.
const MAX_SECONDS_DIGITS: usize = 10;

/// Space-separated date and time.
const SPACED_DATE_TIME: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// `T`-separated date and time.
const ISO_DATE_TIME: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");

/// Calendar date.
const DATE_ONLY: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

// ============================================================================
// SECTION: Types
// ============================================================================

/// Time argument as supplied by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeArg {
    /// Epoch number in seconds or milliseconds.
    Epoch(i64),
    /// Digit string or calendar text.
    Text(String),
}

impl From<i64> for TimeArg {
    fn from(value: i64) -> Self {
        Self::Epoch(value)
    }
}

impl From<&str> for TimeArg {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

// ============================================================================
// SECTION: Parsing
// ============================================================================

/// Returns the configured calendar offset.
///
/// # Errors
///
/// Returns [`ToolError::Config`] for an offset outside the valid range.
pub fn calendar_offset(defaults: &DefaultsConfig) -> Result<UtcOffset, ToolError> {
    UtcOffset::from_hms(defaults.utc_offset_hours, 0, 0)
        .map_err(|_| ToolError::Config("defaults.utc_offset_hours out of range".to_string()))
}

/// Parses a time argument into unix seconds.
///
/// # Errors
///
/// Returns [`ToolError::InvalidParams`] when the input matches no accepted form.
pub fn parse_time(field: &str, value: &TimeArg, offset: UtcOffset) -> Result<i64, ToolError> {
    match value {
        TimeArg::Epoch(number) => Ok(epoch_seconds(*number)),
        TimeArg::Text(text) => parse_time_text(field, text.trim(), offset),
    }
}

/// Parses textual time input.
fn parse_time_text(field: &str, text: &str, offset: UtcOffset) -> Result<i64, ToolError> {
    if !text.is_empty() && text.bytes().all(|byte| byte.is_ascii_digit()) {
        return parse_digits(field, text);
    }
    if let Ok(stamp) = PrimitiveDateTime::parse(text, SPACED_DATE_TIME) {
        return Ok(stamp.assume_offset(offset).unix_timestamp());
    }
    if let Ok(stamp) = PrimitiveDateTime::parse(text, ISO_DATE_TIME) {
        return Ok(stamp.assume_offset(offset).unix_timestamp());
    }
    if let Ok(date) = Date::parse(text, DATE_ONLY) {
        return Ok(date.midnight().assume_offset(offset).unix_timestamp());
    }
    Err(invalid_time(field, text))
}

/// Parses an all-digit epoch string.
fn parse_digits(field: &str, text: &str) -> Result<i64, ToolError> {
    if text.len() != MILLIS_DIGITS && text.len() > MAX_SECONDS_DIGITS {
        return Err(invalid_time(field, text));
    }
    let number = text.parse::<i64>().map_err(|_| invalid_time(field, text))?;
    if text.len() == MILLIS_DIGITS { Ok(number / 1_000) } else { Ok(number) }
}

/// Reads an epoch number as seconds, dividing millisecond values.
const fn epoch_seconds(number: i64) -> i64 {
    if number >= 1_000_000_000_000 { number / 1_000 } else { number }
}

/// Builds the invalid-time error for a field.
fn invalid_time(field: &str, text: &str) -> ToolError {
    ToolError::InvalidParams(format!(
        "{field}: unrecognized time '{text}' (expected epoch seconds, epoch milliseconds, \
         YYYY-MM-DD, or YYYY-MM-DD HH:MM:SS)"
    ))
}

// ============================================================================
// SECTION: Windows
// ============================================================================

/// Resolves an optional time range against `now`.
///
/// Missing bounds are filled with `now` and a `lookback_days` window.
///
/// # Errors
///
/// Returns [`ToolError`] when either bound fails to parse.
pub fn resolve_window(
    from: Option<&TimeArg>,
    to: Option<&TimeArg>,
    now: i64,
    defaults: &DefaultsConfig,
) -> Result<(i64, i64), ToolError> {
    let lookback = i64::from(defaults.lookback_days) * SECONDS_PER_DAY;
    resolve_range(from, to, now, lookback, defaults)
}

/// Resolves an optional raw-log range, using the raw-log window.
///
/// # Errors
///
/// Returns [`ToolError`] when either bound fails to parse.
pub fn resolve_raw_window(
    from: Option<&TimeArg>,
    to: Option<&TimeArg>,
    now: i64,
    defaults: &DefaultsConfig,
) -> Result<(i64, i64), ToolError> {
    resolve_range(from, to, now, defaults.raw_logs_window_secs, defaults)
}

/// Fills missing bounds with `now` and `to - window`.
fn resolve_range(
    from: Option<&TimeArg>,
    to: Option<&TimeArg>,
    now: i64,
    window: i64,
    defaults: &DefaultsConfig,
) -> Result<(i64, i64), ToolError> {
    let offset = calendar_offset(defaults)?;
    let to = match to {
        Some(value) => parse_time("to", value, offset)?,
        None => now,
    };
    let from = match from {
        Some(value) => parse_time("from", value, offset)?,
        None => to.saturating_sub(window),
    };
    Ok((from, to))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
