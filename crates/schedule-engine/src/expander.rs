//! Recurrence expansion -- converts a recurrence rule into concrete occurrences.
//!
//! Expansion works on timezone-naive local timestamps: a daily 09:00 series
//! stays at 09:00 wall-clock time across DST changes. Conversion to UTC only
//! happens at export time (see [`crate::dst`]).

use crate::error::{EngineError, Result};
use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};

/// Safety valve on the number of occurrences produced by one expansion.
pub const DEFAULT_HARD_CAP: usize = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

/// How a monthly rule picks its day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonthlyPattern {
    /// Same day of month as the seed ("the 15th").
    #[default]
    ByDate,
    /// Same weekday-of-week-of-month as the seed ("the third Tuesday").
    ByDay,
}

/// When a series stops. Exactly one condition is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecurrenceEnd {
    #[default]
    Never,
    AfterCount { count: u32 },
    OnDate { date: NaiveDate },
}

/// How a parent event repeats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    #[serde(default = "default_interval")]
    pub interval: u32,
    /// Weekday indices, 0 = Sunday .. 6 = Saturday. Weekly rules only.
    #[serde(default)]
    pub days_of_week: Vec<u8>,
    #[serde(default)]
    pub monthly_pattern: MonthlyPattern,
    #[serde(default)]
    pub end: RecurrenceEnd,
}

fn default_interval() -> u32 {
    1
}

impl RecurrenceRule {
    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            interval: 1,
            days_of_week: Vec::new(),
            monthly_pattern: MonthlyPattern::ByDate,
            end: RecurrenceEnd::Never,
        }
    }

    pub fn daily() -> Self {
        Self::new(Frequency::Daily)
    }

    pub fn weekly() -> Self {
        Self::new(Frequency::Weekly)
    }

    pub fn monthly() -> Self {
        Self::new(Frequency::Monthly)
    }

    pub fn yearly() -> Self {
        Self::new(Frequency::Yearly)
    }

    pub fn every(mut self, interval: u32) -> Self {
        self.interval = interval;
        self
    }

    pub fn on_days(mut self, days: &[u8]) -> Self {
        self.days_of_week = days.to_vec();
        self
    }

    pub fn by_day(mut self) -> Self {
        self.monthly_pattern = MonthlyPattern::ByDay;
        self
    }

    pub fn count(mut self, count: u32) -> Self {
        self.end = RecurrenceEnd::AfterCount { count };
        self
    }

    pub fn until(mut self, date: NaiveDate) -> Self {
        self.end = RecurrenceEnd::OnDate { date };
        self
    }

    /// Reject malformed rules instead of clamping them.
    pub fn validate(&self) -> Result<()> {
        if self.interval < 1 {
            return Err(EngineError::validation(format!(
                "recurrence interval must be at least 1, got {}",
                self.interval
            )));
        }
        if let Some(day) = self.days_of_week.iter().find(|d| **d > 6) {
            return Err(EngineError::validation(format!(
                "weekday index {} is out of range 0..=6",
                day
            )));
        }
        if self.end == (RecurrenceEnd::AfterCount { count: 0 }) {
            return Err(EngineError::validation(
                "recurrence count must be at least 1",
            ));
        }
        Ok(())
    }

    /// Weekly rules with an explicit day set step one week at a time,
    /// whatever the interval says.
    pub fn ignores_interval(&self) -> bool {
        self.frequency == Frequency::Weekly
            && !self.days_of_week.is_empty()
            && self.interval > 1
    }
}

/// Loose wire form of a rule, with the end condition spread over two
/// optional fields. Converting rejects input that sets both.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecurrenceSpec {
    pub frequency: Option<Frequency>,
    pub interval: Option<u32>,
    #[serde(default)]
    pub days_of_week: Vec<u8>,
    pub monthly_pattern: Option<MonthlyPattern>,
    pub count: Option<u32>,
    pub until: Option<NaiveDate>,
}

impl TryFrom<RecurrenceSpec> for RecurrenceRule {
    type Error = EngineError;

    fn try_from(spec: RecurrenceSpec) -> Result<Self> {
        let frequency = spec
            .frequency
            .ok_or_else(|| EngineError::validation("recurrence frequency is required"))?;
        let end = match (spec.count, spec.until) {
            (Some(_), Some(_)) => {
                return Err(EngineError::validation(
                    "multiple end conditions: set either count or until, not both",
                ))
            }
            (Some(count), None) => RecurrenceEnd::AfterCount { count },
            (None, Some(date)) => RecurrenceEnd::OnDate { date },
            (None, None) => RecurrenceEnd::Never,
        };
        let rule = RecurrenceRule {
            frequency,
            interval: spec.interval.unwrap_or(1),
            days_of_week: spec.days_of_week,
            monthly_pattern: spec.monthly_pattern.unwrap_or_default(),
            end,
        };
        rule.validate()?;
        Ok(rule)
    }
}

/// A single expanded instance with start and end times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpandedEvent {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// Result of [`expand`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expansion {
    /// Occurrences in ascending order; the first is always the seed.
    pub events: Vec<ExpandedEvent>,
    /// The hard cap stopped expansion before the rule's end condition.
    /// Routine for `Never` rules; the sequence is still valid.
    pub capped: bool,
    /// The rule's interval was not applied (weekly rule with a day set).
    pub interval_ignored: bool,
}

impl Expansion {
    pub fn starts(&self) -> Vec<NaiveDateTime> {
        self.events.iter().map(|e| e.start).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Lazy, restartable sequence of occurrence starts for one rule.
///
/// Unbounded for `Never` rules; callers bound it with `take` (as [`expand`]
/// does with its hard cap). Cloning yields an independent cursor.
#[derive(Debug, Clone)]
pub struct Occurrences {
    rule: RecurrenceRule,
    seed: NaiveDateTime,
    weekdays: Vec<u32>,
    next: Option<NaiveDateTime>,
    index: u32,
}

impl Occurrences {
    pub fn new(seed: NaiveDateTime, rule: &RecurrenceRule) -> Result<Self> {
        rule.validate()?;
        let mut weekdays: Vec<u32> = rule.days_of_week.iter().map(|d| *d as u32).collect();
        weekdays.sort_unstable();
        weekdays.dedup();
        Ok(Self {
            rule: rule.clone(),
            seed,
            weekdays,
            next: Some(seed),
            index: 0,
        })
    }

    fn past_end(&self, candidate: NaiveDateTime) -> bool {
        match self.rule.end {
            RecurrenceEnd::Never => false,
            RecurrenceEnd::AfterCount { count } => self.index >= count,
            RecurrenceEnd::OnDate { date } => candidate.date() > date,
        }
    }

    /// Compute occurrence number `index` (> 0) from its predecessor.
    fn advance(&self, current: NaiveDateTime, index: u32) -> Option<NaiveDateTime> {
        let interval = self.rule.interval;
        match self.rule.frequency {
            Frequency::Daily => current.checked_add_signed(Duration::days(interval as i64)),
            Frequency::Weekly if self.weekdays.is_empty() => {
                current.checked_add_signed(Duration::days(7 * interval as i64))
            }
            Frequency::Weekly => {
                let today = current.weekday().num_days_from_sunday();
                let gap = match self.weekdays.iter().find(|d| **d > today) {
                    Some(day) => day - today,
                    None => 7 - today + self.weekdays[0],
                };
                current.checked_add_signed(Duration::days(gap as i64))
            }
            Frequency::Monthly => match self.rule.monthly_pattern {
                MonthlyPattern::ByDate => {
                    let months = index.checked_mul(interval)?;
                    self.seed.checked_add_months(Months::new(months))
                }
                MonthlyPattern::ByDay => {
                    let first = current.date().with_day(1)?;
                    let target = first.checked_add_months(Months::new(interval))?;
                    let week = self.seed.day0() / 7 + 1;
                    let date = nth_weekday_of_month(target, self.seed.weekday(), week);
                    Some(date.and_time(self.seed.time()))
                }
            },
            Frequency::Yearly => {
                let months = index.checked_mul(interval)?.checked_mul(12)?;
                self.seed.checked_add_months(Months::new(months))
            }
        }
    }
}

impl Iterator for Occurrences {
    type Item = NaiveDateTime;

    fn next(&mut self) -> Option<NaiveDateTime> {
        let current = self.next?;
        // The seed is instance 0 and is always emitted.
        if self.index > 0 && self.past_end(current) {
            self.next = None;
            return None;
        }
        self.index += 1;
        self.next = self.advance(current, self.index);
        Some(current)
    }
}

/// The `week`-th `weekday` of the month starting at `first`, stepping back a
/// week when a fifth occurrence does not exist.
fn nth_weekday_of_month(first: NaiveDate, weekday: Weekday, week: u32) -> NaiveDate {
    let offset = (7 + weekday.num_days_from_sunday() - first.weekday().num_days_from_sunday()) % 7;
    let date = first + Duration::days((offset + 7 * (week - 1)) as i64);
    if date.month() == first.month() {
        date
    } else {
        date - Duration::days(7)
    }
}

/// Expand a rule from `seed_start` into at most `hard_cap` occurrences.
///
/// Every occurrence lasts `seed_duration`. The first occurrence is the seed.
///
/// # Errors
/// Returns `EngineError::Validation` for a malformed rule, a zero
/// `hard_cap` or a negative duration.
pub fn expand(
    seed_start: NaiveDateTime,
    rule: &RecurrenceRule,
    seed_duration: Duration,
    hard_cap: usize,
) -> Result<Expansion> {
    if hard_cap == 0 {
        return Err(EngineError::validation("hard cap must be at least 1"));
    }
    if seed_duration < Duration::zero() {
        return Err(EngineError::validation("occurrence duration is negative"));
    }

    let interval_ignored = rule.ignores_interval();
    if interval_ignored {
        tracing::warn!(
            interval = rule.interval,
            "weekly rule with explicit days steps one week at a time; interval not applied"
        );
    }

    let mut occurrences = Occurrences::new(seed_start, rule)?;
    let events: Vec<ExpandedEvent> = occurrences
        .by_ref()
        .take(hard_cap)
        .map(|start| ExpandedEvent {
            start,
            end: start + seed_duration,
        })
        .collect();
    let capped = occurrences.next().is_some();
    if capped {
        tracing::debug!(hard_cap, "recurrence expansion truncated at hard cap");
    }

    Ok(Expansion {
        events,
        capped,
        interval_ignored,
    })
}
