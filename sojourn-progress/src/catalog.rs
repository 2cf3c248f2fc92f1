//! Content catalog references
//!
//! Sections, plan days and the journal taxonomy are authored elsewhere. The
//! engine only needs the number of plan days and the ids that carry special
//! meaning for achievements.

/// Section id of the "code" reading
pub const CODE_SECTION_ID: &str = "code";

/// Number of days in the shipped practice plan
pub const DEFAULT_PLAN_DAYS: u8 = 7;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    /// Practice-plan days are numbered `1..=plan_days`
    pub plan_days: u8,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            plan_days: DEFAULT_PLAN_DAYS,
        }
    }
}

impl Catalog {
    pub fn is_plan_day(&self, day: u8) -> bool {
        (1..=self.plan_days).contains(&day)
    }

    pub fn plan_day_range(&self) -> std::ops::RangeInclusive<u8> {
        1..=self.plan_days
    }
}
