//! Achievement Rule Engine
//!
//! Badges are granted by a static table of independent rules. Each rule
//! belongs to the mutation category whose data it reads, and the store only
//! evaluates the category it just touched. A rule fires only if its badge is
//! not already held; nothing here ever removes a badge.
//!
//! Badges tied to a single designated section live in [`SECTION_BADGES`]
//! and are evaluated with the `Section` category after the rule table.

use crate::catalog::{Catalog, CODE_SECTION_ID};
use crate::record::{JournalEntryType, ProgressRecord};
use sojourn_common::time::Calendar;

pub const FIRST_READING: &str = "first_reading";
pub const CODE_KEEPER: &str = "code_keeper";
pub const SEVEN_DAYS: &str = "seven_days";
pub const SIGN_SEEKER: &str = "sign_seeker";
pub const DEVOTED_WRITER: &str = "devoted_writer";

/// Sign entries needed for `sign_seeker`
pub const SIGN_SEEKER_THRESHOLD: usize = 5;

/// Distinct journaling days needed for `devoted_writer`
pub const DEVOTED_WRITER_DAYS: usize = 7;

/// Which data a rule reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleCategory {
    Section,
    Day,
    Journal,
}

/// Everything a predicate may look at besides the record
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub catalog: &'a Catalog,
    pub calendar: &'a Calendar,
}

pub struct AchievementRule {
    pub badge: &'static str,
    pub category: RuleCategory,
    pub predicate: fn(&ProgressRecord, &RuleContext<'_>) -> bool,
}

/// Sections whose completion grants a specific badge
pub const SECTION_BADGES: &[(&str, &str)] = &[(CODE_SECTION_ID, CODE_KEEPER)];

/// Rule table, in evaluation order
pub const RULES: &[AchievementRule] = &[
    AchievementRule {
        badge: FIRST_READING,
        category: RuleCategory::Section,
        predicate: |record, _| !record.completed_sections.is_empty(),
    },
    AchievementRule {
        badge: SEVEN_DAYS,
        category: RuleCategory::Day,
        predicate: |record, ctx| {
            ctx.catalog
                .plan_day_range()
                .all(|day| record.completed_days.contains(&day))
        },
    },
    AchievementRule {
        badge: SIGN_SEEKER,
        category: RuleCategory::Journal,
        predicate: |record, _| record.journal_count(JournalEntryType::Sign) >= SIGN_SEEKER_THRESHOLD,
    },
    AchievementRule {
        badge: DEVOTED_WRITER,
        category: RuleCategory::Journal,
        predicate: |record, ctx| record.journal_days(ctx.calendar) >= DEVOTED_WRITER_DAYS,
    },
];

/// Badges of `category` whose predicate holds and which are not yet held,
/// rule table first, then section badges
pub fn evaluate(
    record: &ProgressRecord,
    category: RuleCategory,
    ctx: &RuleContext<'_>,
) -> Vec<&'static str> {
    let mut earned: Vec<&'static str> = RULES
        .iter()
        .filter(|rule| rule.category == category)
        .filter(|rule| !record.has_badge(rule.badge))
        .filter(|rule| (rule.predicate)(record, ctx))
        .map(|rule| rule.badge)
        .collect();

    if category == RuleCategory::Section {
        for (section, badge) in SECTION_BADGES {
            if !record.has_badge(badge)
                && !earned.contains(badge)
                && record.completed_sections.contains(*section)
            {
                earned.push(*badge);
            }
        }
    }
    earned
}

/// Evaluate `category` and add the newly earned badges to `record`
///
/// Returns the badges that were added.
pub fn grant(
    record: &mut ProgressRecord,
    category: RuleCategory,
    ctx: &RuleContext<'_>,
) -> Vec<&'static str> {
    let earned = evaluate(record, category, ctx);
    for badge in &earned {
        record.badges.insert((*badge).to_string());
    }
    earned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::JournalEntry;
    use chrono::{TimeZone, Utc};
    use std::collections::HashSet;

    fn record() -> ProgressRecord {
        ProgressRecord::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
    }

    fn ctx_parts() -> (Catalog, Calendar) {
        (Catalog::default(), Calendar::utc())
    }

    fn journal(record: &mut ProgressRecord, day: u32, entry_type: JournalEntryType) {
        record.journal_entries.push(JournalEntry {
            id: format!("{}-{}", day, record.journal_entries.len()),
            date: Utc.with_ymd_and_hms(2024, 1, day, 10, 0, 0).unwrap(),
            entry_type,
            content: "entry".to_string(),
        });
    }

    #[test]
    fn test_badge_ids_are_unique() {
        let ids: HashSet<_> = RULES
            .iter()
            .map(|r| r.badge)
            .chain(SECTION_BADGES.iter().map(|(_, badge)| *badge))
            .collect();
        assert_eq!(ids.len(), RULES.len() + SECTION_BADGES.len());
    }

    #[test]
    fn test_section_badge_only_for_its_section() {
        let (catalog, calendar) = ctx_parts();
        let ctx = RuleContext { catalog: &catalog, calendar: &calendar };
        let mut r = record();
        r.completed_sections.insert("intro".to_string());
        assert!(!grant(&mut r, RuleCategory::Section, &ctx).contains(&CODE_KEEPER));

        r.completed_sections.insert(CODE_SECTION_ID.to_string());
        assert_eq!(grant(&mut r, RuleCategory::Section, &ctx), vec![CODE_KEEPER]);
        assert!(grant(&mut r, RuleCategory::Section, &ctx).is_empty());
    }

    #[test]
    fn test_first_section_grants_first_reading() {
        let (catalog, calendar) = ctx_parts();
        let ctx = RuleContext { catalog: &catalog, calendar: &calendar };
        let mut r = record();
        assert!(evaluate(&r, RuleCategory::Section, &ctx).is_empty());

        r.completed_sections.insert("intro".to_string());
        assert_eq!(grant(&mut r, RuleCategory::Section, &ctx), vec![FIRST_READING]);

        r.completed_sections.insert("chapter-2".to_string());
        assert!(grant(&mut r, RuleCategory::Section, &ctx).is_empty());
    }

    #[test]
    fn test_code_section_grants_both_in_table_order() {
        let (catalog, calendar) = ctx_parts();
        let ctx = RuleContext { catalog: &catalog, calendar: &calendar };
        let mut r = record();
        r.completed_sections.insert(CODE_SECTION_ID.to_string());

        assert_eq!(
            grant(&mut r, RuleCategory::Section, &ctx),
            vec![FIRST_READING, CODE_KEEPER]
        );
        assert!(r.has_badge(FIRST_READING) && r.has_badge(CODE_KEEPER));
    }

    #[test]
    fn test_rules_only_fire_for_their_category() {
        let (catalog, calendar) = ctx_parts();
        let ctx = RuleContext { catalog: &catalog, calendar: &calendar };
        let mut r = record();
        r.completed_sections.insert("intro".to_string());

        assert!(evaluate(&r, RuleCategory::Day, &ctx).is_empty());
        assert!(evaluate(&r, RuleCategory::Journal, &ctx).is_empty());
    }

    #[test]
    fn test_seven_days_requires_every_plan_day() {
        let (catalog, calendar) = ctx_parts();
        let ctx = RuleContext { catalog: &catalog, calendar: &calendar };
        let mut r = record();
        for day in 1..=6 {
            r.completed_days.insert(day);
        }
        assert!(evaluate(&r, RuleCategory::Day, &ctx).is_empty());

        r.completed_days.insert(7);
        assert_eq!(evaluate(&r, RuleCategory::Day, &ctx), vec![SEVEN_DAYS]);
    }

    #[test]
    fn test_shorter_plan_from_catalog() {
        let catalog = Catalog { plan_days: 3 };
        let calendar = Calendar::utc();
        let ctx = RuleContext { catalog: &catalog, calendar: &calendar };
        let mut r = record();
        r.completed_days.extend([1, 2, 3]);
        assert_eq!(evaluate(&r, RuleCategory::Day, &ctx), vec![SEVEN_DAYS]);
    }

    #[test]
    fn test_sign_seeker_threshold() {
        let (catalog, calendar) = ctx_parts();
        let ctx = RuleContext { catalog: &catalog, calendar: &calendar };
        let mut r = record();
        for day in 1..=4 {
            journal(&mut r, day, JournalEntryType::Sign);
        }
        journal(&mut r, 5, JournalEntryType::Gratitude);
        assert!(evaluate(&r, RuleCategory::Journal, &ctx).is_empty());

        journal(&mut r, 5, JournalEntryType::Sign);
        assert_eq!(evaluate(&r, RuleCategory::Journal, &ctx), vec![SIGN_SEEKER]);
    }

    #[test]
    fn test_devoted_writer_counts_distinct_days() {
        let (catalog, calendar) = ctx_parts();
        let ctx = RuleContext { catalog: &catalog, calendar: &calendar };
        let mut r = record();
        // Many entries on few days do not count
        for _ in 0..10 {
            journal(&mut r, 1, JournalEntryType::Reflection);
        }
        for day in 2..=6 {
            journal(&mut r, day, JournalEntryType::Intention);
        }
        assert!(!evaluate(&r, RuleCategory::Journal, &ctx).contains(&DEVOTED_WRITER));

        journal(&mut r, 7, JournalEntryType::Intention);
        assert!(evaluate(&r, RuleCategory::Journal, &ctx).contains(&DEVOTED_WRITER));
    }

    #[test]
    fn test_held_badge_is_not_regranted_and_never_removed() {
        let (catalog, calendar) = ctx_parts();
        let ctx = RuleContext { catalog: &catalog, calendar: &calendar };
        let mut r = record();
        for day in 1..=5 {
            journal(&mut r, day, JournalEntryType::Sign);
        }
        assert_eq!(grant(&mut r, RuleCategory::Journal, &ctx), vec![SIGN_SEEKER]);

        // Predicate no longer holds, badge stays
        r.journal_entries.clear();
        assert!(grant(&mut r, RuleCategory::Journal, &ctx).is_empty());
        assert!(r.has_badge(SIGN_SEEKER));
    }
}
