//! Streak Calculator
//!
//! Pure function over calendar dates. Called only when a practice day is
//! newly completed.

use chrono::NaiveDate;

/// Counters after a practice-day completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakUpdate {
    pub current: u32,
    pub longest: u32,
    pub last_practice_date: NaiveDate,
}

/// Compute the streak after practising on `today`
///
/// - same calendar day as `last_practice_date`: unchanged (a zero streak
///   becomes 1, the day still counts once)
/// - exactly one calendar day later: +1
/// - no prior date, a gap of two or more days, or a `last_practice_date`
///   after `today`: reset to 1
///
/// `longest` is `max(longest, current)` and `last_practice_date` is always
/// `today`.
pub fn compute_streak(
    current: u32,
    longest: u32,
    last_practice_date: Option<NaiveDate>,
    today: NaiveDate,
) -> StreakUpdate {
    let new_current = match last_practice_date.map(|last| today.signed_duration_since(last).num_days()) {
        Some(0) => current.max(1),
        Some(1) => current.saturating_add(1),
        _ => 1,
    };

    StreakUpdate {
        current: new_current,
        longest: longest.max(new_current),
        last_practice_date: today,
    }
}
