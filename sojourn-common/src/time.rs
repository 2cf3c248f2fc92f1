//! Timestamp and calendar utilities
//!
//! Streaks and journal statistics are computed on calendar dates, never on
//! 24-hour windows. A timestamp is mapped to a calendar date through a single
//! fixed UTC offset configured per deployment (`calendar.utc_offset_minutes`,
//! default 0 = UTC), so two timestamps near midnight always agree on which
//! day they belong to regardless of the host locale.

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use std::sync::Mutex;

use crate::{Error, Result};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Source of "now" for the engine
///
/// Production code uses [`SystemClock`]; tests drive dates explicitly with
/// [`ManualClock`].
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    /// Clock starting at midday UTC of the given date
    pub fn at_date(date: NaiveDate) -> Self {
        Self::new(midday_utc(date))
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }

    pub fn set_date(&self, date: NaiveDate) {
        self.set(midday_utc(date));
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn midday_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(12, 0, 0)
        .map(|naive| naive.and_utc())
        .unwrap_or_else(now)
}

/// Calendar used to turn timestamps into practice dates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calendar {
    offset: FixedOffset,
}

impl Default for Calendar {
    fn default() -> Self {
        Self::utc()
    }
}

impl Calendar {
    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    /// Calendar at a fixed offset east of UTC, in minutes
    ///
    /// Valid range: [-1439, 1439]
    pub fn with_offset_minutes(minutes: i32) -> Result<Self> {
        minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .map(|offset| Self { offset })
            .ok_or_else(|| {
                Error::Config(format!(
                    "utc_offset_minutes out of range [-1439, 1439]: {}",
                    minutes
                ))
            })
    }

    /// Calendar date of `timestamp` in this calendar
    pub fn date_of(&self, timestamp: DateTime<Utc>) -> NaiveDate {
        timestamp.with_timezone(&self.offset).date_naive()
    }

    pub fn offset_minutes(&self) -> i32 {
        self.offset.local_minus_utc() / 60
    }
}
