//! DST transition policies for converting local event times to UTC.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Policy for local times that fall in a DST gap (e.g., 2:30 AM during
/// spring forward). Ambiguous fall-back times always resolve to the earlier
/// instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DstPolicy {
    /// Drop the instant; the caller decides what to do without it.
    Skip,
    /// Move to the first valid local time after the gap.
    ShiftForward,
    /// Keep the wall-clock reading with the offset in effect before the gap
    /// (2:30 AM EST-style, which lands one gap-length later in UTC terms).
    #[default]
    WallClock,
}

/// Resolve a local timestamp in `tz` to UTC under `policy`.
///
/// Returns `None` only for gap times under [`DstPolicy::Skip`], or for
/// timestamps outside the representable range.
pub fn to_utc(local: NaiveDateTime, tz: Tz, policy: DstPolicy) -> Option<DateTime<Utc>> {
    if let Some(resolved) = tz.from_local_datetime(&local).earliest() {
        return Some(resolved.with_timezone(&Utc));
    }

    match policy {
        DstPolicy::Skip => None,
        DstPolicy::ShiftForward => {
            // Gaps are at most a few hours; scan forward minute by minute.
            (1..=180).find_map(|minutes| {
                tz.from_local_datetime(&(local + Duration::minutes(minutes)))
                    .earliest()
                    .map(|dt| dt.with_timezone(&Utc))
            })
        }
        DstPolicy::WallClock => {
            let before_gap = (1..=180).find_map(|minutes| {
                let candidate = local - Duration::minutes(minutes);
                tz.from_local_datetime(&candidate)
                    .earliest()
                    .map(|dt| (dt, minutes))
            })?;
            let (candidate, minutes) = before_gap;
            Some(candidate.with_timezone(&Utc) + Duration::minutes(minutes))
        }
    }
}

/// Parse an IANA timezone identifier.
pub fn parse_timezone(name: &str) -> crate::error::Result<Tz> {
    name.parse::<Tz>()
        .map_err(|_| crate::error::EngineError::InvalidTimezone(name.to_string()))
}
