//! Cross-checks against RFC 5545 expansion (the `rrule` crate).
//!
//! Wherever the engine's recurrence semantics coincide with RFC 5545 -- plain
//! intervals, day-of-month within 28, nth-weekday within the fourth week,
//! weekly day sets whose seed is in the set -- both expansions must agree
//! exactly.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rrule::RRuleSet;
use schedule_engine::expander::{expand, RecurrenceRule};

fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, 0, 0)
        .unwrap()
}

/// Expand an RRULE through the `rrule` crate, in UTC.
fn rfc_starts(rrule: &str, dtstart: NaiveDateTime, count: u16) -> Vec<NaiveDateTime> {
    let text = format!(
        "DTSTART;TZID=UTC:{}\nRRULE:{};COUNT={}",
        dtstart.format("%Y%m%dT%H%M%S"),
        rrule,
        count
    );
    let set: RRuleSet = text.parse().expect("valid RRULE");
    set.all(count).dates.into_iter().map(|dt| dt.naive_utc()).collect()
}

fn engine_starts(rule: &RecurrenceRule, seed: NaiveDateTime) -> Vec<NaiveDateTime> {
    expand(seed, rule, Duration::hours(1), 365)
        .expect("should expand")
        .starts()
}

#[test]
fn daily_every_other_day() {
    let seed = at(2026, 1, 28, 9);
    let ours = engine_starts(&RecurrenceRule::daily().every(2).count(12), seed);
    assert_eq!(ours, rfc_starts("FREQ=DAILY;INTERVAL=2", seed, 12));
}

#[test]
fn weekly_every_three_weeks() {
    let seed = at(2025, 11, 20, 14);
    let ours = engine_starts(&RecurrenceRule::weekly().every(3).count(10), seed);
    assert_eq!(ours, rfc_starts("FREQ=WEEKLY;INTERVAL=3", seed, 10));
}

#[test]
fn weekly_monday_wednesday_friday() {
    // 2025-03-10 is a Monday, so the seed is part of the day set.
    let seed = at(2025, 3, 10, 8);
    let ours = engine_starts(&RecurrenceRule::weekly().on_days(&[1, 3, 5]).count(9), seed);
    assert_eq!(ours, rfc_starts("FREQ=WEEKLY;BYDAY=MO,WE,FR", seed, 9));
}

#[test]
fn monthly_on_the_fifteenth() {
    let seed = at(2025, 10, 15, 10);
    let ours = engine_starts(&RecurrenceRule::monthly().count(14), seed);
    assert_eq!(ours, rfc_starts("FREQ=MONTHLY", seed, 14));
}

#[test]
fn quarterly_on_the_twenty_eighth() {
    let seed = at(2025, 1, 28, 10);
    let ours = engine_starts(&RecurrenceRule::monthly().every(3).count(8), seed);
    assert_eq!(ours, rfc_starts("FREQ=MONTHLY;INTERVAL=3", seed, 8));
}

#[test]
fn monthly_third_tuesday() {
    let seed = at(2026, 2, 17, 14);
    let ours = engine_starts(&RecurrenceRule::monthly().by_day().count(12), seed);
    assert_eq!(ours, rfc_starts("FREQ=MONTHLY;BYDAY=3TU", seed, 12));
}

#[test]
fn monthly_first_monday_every_other_month() {
    // 2025-01-06 is the first Monday of January 2025.
    let seed = at(2025, 1, 6, 9);
    let ours = engine_starts(&RecurrenceRule::monthly().every(2).by_day().count(6), seed);
    assert_eq!(ours, rfc_starts("FREQ=MONTHLY;INTERVAL=2;BYDAY=1MO", seed, 6));
}

#[test]
fn yearly_on_june_fifteenth() {
    let seed = at(2026, 6, 15, 12);
    let ours = engine_starts(&RecurrenceRule::yearly().count(5), seed);
    assert_eq!(ours, rfc_starts("FREQ=YEARLY", seed, 5));
}
