// crates/sls-client/src/validation.rs
// ============================================================================
// Module: Request Validation
// Description: Pre-flight checks on caller input.
// Purpose: Reject malformed operations before any request is built.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Every check returns [`ClientError::Validation`] and runs before signing or
//! I/O. Limits come from [`ClientLimits`], which callers pass explicitly.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::error::ClientError;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Default maximum number of log lines per page.
pub const DEFAULT_MAX_LINES: u32 = 100;
/// Default maximum query length in bytes.
pub const DEFAULT_MAX_QUERY_LENGTH: usize = 4_096;
/// Default maximum context lines in either direction.
pub const DEFAULT_MAX_CONTEXT_LINES: u32 = 1_000;
/// Default maximum page size for listing operations.
pub const DEFAULT_MAX_PAGE_SIZE: u32 = 1_000;
/// Default distance from now a timestamp may lie, in seconds.
pub const DEFAULT_TIMESTAMP_WINDOW_SECS: i64 = 365 * 86_400;

/// Input bounds enforced by the operation facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientLimits {
    /// Maximum `line` value.
    pub max_lines: u32,
    /// Maximum query length in bytes.
    pub max_query_length: usize,
    /// Maximum `back_lines` or `forward_lines` value.
    pub max_context_lines: u32,
    /// Maximum listing page size.
    pub max_page_size: u32,
    /// Allowed distance between a timestamp and now.
    pub timestamp_window_secs: i64,
}

impl Default for ClientLimits {
    fn default() -> Self {
        Self {
            max_lines: DEFAULT_MAX_LINES,
            max_query_length: DEFAULT_MAX_QUERY_LENGTH,
            max_context_lines: DEFAULT_MAX_CONTEXT_LINES,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            timestamp_window_secs: DEFAULT_TIMESTAMP_WINDOW_SECS,
        }
    }
}

// ============================================================================
// SECTION: Checks
// ============================================================================

/// Requires a string to be non-empty after trimming.
///
/// # Errors
///
/// Returns [`ClientError::Validation`] when the value is blank.
pub fn require_non_empty<'a>(field: &str, value: &'a str) -> Result<&'a str, ClientError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ClientError::Validation(format!("{field} must be non-empty")));
    }
    Ok(trimmed)
}

/// Requires a resource name usable as a single path segment.
///
/// # Errors
///
/// Returns [`ClientError::Validation`] when the name is blank or contains a
/// path, query, or whitespace character.
pub fn require_resource_name<'a>(field: &str, value: &'a str) -> Result<&'a str, ClientError> {
    let name = require_non_empty(field, value)?;
    if name.chars().any(|ch| matches!(ch, '/' | '?' | '#') || ch.is_whitespace()) {
        return Err(ClientError::Validation(format!("{field} contains invalid characters")));
    }
    Ok(name)
}

/// Bounds the query length.
///
/// # Errors
///
/// Returns [`ClientError::Validation`] when the query is too long.
pub fn validate_query_length(query: &str, limits: &ClientLimits) -> Result<(), ClientError> {
    if query.len() > limits.max_query_length {
        return Err(ClientError::Validation(format!(
            "query exceeds {} bytes",
            limits.max_query_length
        )));
    }
    Ok(())
}

/// Requires a positive timestamp near the current time.
///
/// # Errors
///
/// Returns [`ClientError::Validation`] when the timestamp is not positive or
/// falls outside the window around `now`.
pub fn validate_timestamp(
    field: &str,
    value: i64,
    now: i64,
    limits: &ClientLimits,
) -> Result<(), ClientError> {
    if value <= 0 {
        return Err(ClientError::Validation(format!("{field} must be a positive unix timestamp")));
    }
    if value.abs_diff(now) > limits.timestamp_window_secs.unsigned_abs() {
        return Err(ClientError::Validation(format!(
            "{field} is more than {} seconds away from now",
            limits.timestamp_window_secs
        )));
    }
    Ok(())
}

/// Validates both ends of a time range and their order.
///
/// # Errors
///
/// Returns [`ClientError::Validation`] when either end is invalid or
/// `from >= to`.
pub fn validate_time_range(
    from: i64,
    to: i64,
    now: i64,
    limits: &ClientLimits,
) -> Result<(), ClientError> {
    validate_timestamp("from", from, now, limits)?;
    validate_timestamp("to", to, now, limits)?;
    if from >= to {
        return Err(ClientError::Validation("from must be earlier than to".to_string()));
    }
    Ok(())
}

/// Bounds the page line count.
///
/// # Errors
///
/// Returns [`ClientError::Validation`] when `line` is outside `1..=max_lines`.
pub fn validate_line(line: u32, limits: &ClientLimits) -> Result<(), ClientError> {
    if !(1..=limits.max_lines).contains(&line) {
        return Err(ClientError::Validation(format!(
            "line must be between 1 and {}",
            limits.max_lines
        )));
    }
    Ok(())
}

/// Bounds a context line count.
///
/// # Errors
///
/// Returns [`ClientError::Validation`] when the count exceeds the limit.
pub fn validate_context_lines(
    field: &str,
    count: u32,
    limits: &ClientLimits,
) -> Result<(), ClientError> {
    if count > limits.max_context_lines {
        return Err(ClientError::Validation(format!(
            "{field} must be between 0 and {}",
            limits.max_context_lines
        )));
    }
    Ok(())
}

/// Bounds a listing page size.
///
/// # Errors
///
/// Returns [`ClientError::Validation`] when `size` is outside `1..=max_page_size`.
pub fn validate_page_size(size: u32, limits: &ClientLimits) -> Result<(), ClientError> {
    if !(1..=limits.max_page_size).contains(&size) {
        return Err(ClientError::Validation(format!(
            "size must be between 1 and {}",
            limits.max_page_size
        )));
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        clippy::dbg_macro,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        reason = "Test-only validation assertions."
    )]

    use super::ClientLimits;
    use super::require_non_empty;
    use super::require_resource_name;
    use super::validate_context_lines;
    use super::validate_line;
    use super::validate_page_size;
    use super::validate_query_length;
    use super::validate_time_range;
    use super::validate_timestamp;

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn blank_strings_are_rejected() {
        assert!(require_non_empty("logstore", "  ").is_err());
        assert_eq!(require_non_empty("logstore", " app ").unwrap(), "app");
    }

    #[test]
    fn resource_names_reject_path_characters() {
        for name in ["a/b", "a?b", "a#b", "a b"] {
            assert!(require_resource_name("logstore", name).is_err(), "{name}");
        }
        assert_eq!(require_resource_name("logstore", "app-log_1").unwrap(), "app-log_1");
    }

    #[test]
    fn query_length_is_bounded() {
        let limits = ClientLimits::default();
        assert!(validate_query_length(&"a".repeat(4_096), &limits).is_ok());
        assert!(validate_query_length(&"a".repeat(4_097), &limits).is_err());
    }

    #[test]
    fn timestamps_must_be_positive_and_recent() {
        let limits = ClientLimits::default();
        assert!(validate_timestamp("from", 0, NOW, &limits).is_err());
        assert!(validate_timestamp("from", -5, NOW, &limits).is_err());
        assert!(validate_timestamp("from", NOW - 3_600, NOW, &limits).is_ok());
        assert!(validate_timestamp("from", NOW - 366 * 86_400, NOW, &limits).is_err());
        assert!(validate_timestamp("to", NOW + 366 * 86_400, NOW, &limits).is_err());
    }

    #[test]
    fn ranges_must_be_ordered() {
        let limits = ClientLimits::default();
        assert!(validate_time_range(NOW - 60, NOW, NOW, &limits).is_ok());
        assert!(validate_time_range(NOW, NOW, NOW, &limits).is_err());
        assert!(validate_time_range(NOW, NOW - 60, NOW, &limits).is_err());
    }

    #[test]
    fn numeric_bounds_hold() {
        let limits = ClientLimits::default();
        assert!(validate_line(0, &limits).is_err());
        assert!(validate_line(1, &limits).is_ok());
        assert!(validate_line(100, &limits).is_ok());
        assert!(validate_line(101, &limits).is_err());
        assert!(validate_context_lines("back_lines", 1_000, &limits).is_ok());
        assert!(validate_context_lines("back_lines", 1_001, &limits).is_err());
        assert!(validate_page_size(0, &limits).is_err());
        assert!(validate_page_size(500, &limits).is_ok());
        assert!(validate_page_size(1_001, &limits).is_err());
    }
}
