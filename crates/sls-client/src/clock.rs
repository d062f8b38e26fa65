// crates/sls-client/src/clock.rs
// ============================================================================
// Module: Clock
// Description: Wall-clock source for request dates and validation windows.
// Purpose: Keep time an explicit input so signing stays reproducible.
// Dependencies: time
// ============================================================================

//! ## Overview
//! The signature covers the request date, so time is injected rather than
//! sampled inside the builder. [`SystemClock`] is the production source and
//! [`FixedClock`] pins the instant for tests.

// ============================================================================
// SECTION: Imports
// ============================================================================

use time::OffsetDateTime;

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Source of the current instant.
pub trait Clock: Send + Sync {
    /// Returns the current instant in UTC.
    fn now(&self) -> OffsetDateTime;

    /// Returns the current instant as unix seconds.
    fn now_unix(&self) -> i64 {
        self.now().unix_timestamp()
    }
}

/// Clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Clock frozen at a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    /// Instant returned by every call.
    instant: OffsetDateTime,
}

impl FixedClock {
    /// Creates a clock frozen at `instant`.
    #[must_use]
    pub const fn new(instant: OffsetDateTime) -> Self {
        Self {
            instant,
        }
    }

    /// Creates a clock frozen at a unix timestamp, or the epoch when out of range.
    #[must_use]
    pub fn from_unix(seconds: i64) -> Self {
        let instant =
            OffsetDateTime::from_unix_timestamp(seconds).unwrap_or(OffsetDateTime::UNIX_EPOCH);
        Self::new(instant)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.instant
    }
}
