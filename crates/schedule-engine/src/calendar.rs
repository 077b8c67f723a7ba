//! Calendar grid math -- month/week/day boundaries for grid rendering.
//!
//! All functions are pure. Weeks are Sunday-first throughout, matching the
//! weekday indices used by [`crate::expander::RecurrenceRule`] (0 = Sunday).

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Number of cells in a month grid (6 weeks x 7 days).
pub const MONTH_GRID_CELLS: usize = 42;

/// Calendar view granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    #[default]
    Month,
    Week,
    Day,
}

/// Direction for [`navigate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Previous,
    Next,
}

/// Sunday on or before `date`.
pub fn start_of_week(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_sunday() as i64)
}

/// First and last day of `anchor`'s month.
pub fn month_bounds(anchor: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = anchor - Duration::days(anchor.day0() as i64);
    let last = first
        .checked_add_months(Months::new(1))
        .map(|next| next - Duration::days(1))
        .unwrap_or(NaiveDate::MAX);
    (first, last)
}

/// Sunday and Saturday of the week containing `anchor`.
pub fn week_bounds(anchor: NaiveDate) -> (NaiveDate, NaiveDate) {
    let sunday = start_of_week(anchor);
    (sunday, sunday + Duration::days(6))
}

/// First and last representable second of `date`.
pub fn day_bounds(date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
    (date.and_time(NaiveTime::MIN), date.and_time(end_of_day))
}

/// The 42 dates of a month view, starting on the Sunday on/before the 1st.
///
/// Always six rows, even when the month fits in four or five; leading and
/// trailing dates from neighbouring months are included, never omitted.
/// Callers flag them with [`in_month`].
pub fn month_grid(anchor: NaiveDate) -> [NaiveDate; MONTH_GRID_CELLS] {
    let (first, _) = month_bounds(anchor);
    let origin = start_of_week(first);
    std::array::from_fn(|i| origin + Duration::days(i as i64))
}

/// The seven days (Sunday first) of the week containing `anchor`.
pub fn week_days(anchor: NaiveDate) -> [NaiveDate; 7] {
    let origin = start_of_week(anchor);
    std::array::from_fn(|i| origin + Duration::days(i as i64))
}

/// Year/month/day comparison, ignoring time of day.
pub fn is_same_calendar_day(a: NaiveDateTime, b: NaiveDateTime) -> bool {
    a.date() == b.date()
}

pub fn is_today(date: NaiveDate, today: NaiveDate) -> bool {
    date == today
}

/// Whether `date` belongs to the same month as `anchor`.
pub fn in_month(date: NaiveDate, anchor: NaiveDate) -> bool {
    date.year() == anchor.year() && date.month() == anchor.month()
}

/// Inclusive timestamp range covered by the grid for `view` at `anchor`.
///
/// The month range spans the whole 42-cell grid so that leading and
/// trailing cells can be populated from one store query.
pub fn visible_range(view: ViewMode, anchor: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let (first, last) = match view {
        ViewMode::Month => {
            let grid = month_grid(anchor);
            (grid[0], grid[MONTH_GRID_CELLS - 1])
        }
        ViewMode::Week => week_bounds(anchor),
        ViewMode::Day => (anchor, anchor),
    };
    (day_bounds(first).0, day_bounds(last).1)
}

/// Move the anchor one view unit backwards or forwards.
///
/// Month steps keep the day-of-month where possible and clamp to the end of
/// shorter months (Jan 31 -> Feb 28).
pub fn navigate(view: ViewMode, anchor: NaiveDate, step: Step) -> NaiveDate {
    match (view, step) {
        (ViewMode::Month, Step::Next) => anchor
            .checked_add_months(Months::new(1))
            .unwrap_or(anchor),
        (ViewMode::Month, Step::Previous) => anchor
            .checked_sub_months(Months::new(1))
            .unwrap_or(anchor),
        (ViewMode::Week, Step::Next) => anchor + Duration::days(7),
        (ViewMode::Week, Step::Previous) => anchor - Duration::days(7),
        (ViewMode::Day, Step::Next) => anchor.succ_opt().unwrap_or(anchor),
        (ViewMode::Day, Step::Previous) => anchor.pred_opt().unwrap_or(anchor),
    }
}
