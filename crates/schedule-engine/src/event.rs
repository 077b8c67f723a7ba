//! Calendar event records and their validated inputs.

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::expander::RecurrenceRule;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(EngineError::validation(format!("unknown priority '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EventStatus {
    #[default]
    Scheduled,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
    Cancelled,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Scheduled => "Scheduled",
            EventStatus::InProgress => "In Progress",
            EventStatus::Completed => "Completed",
            EventStatus::Cancelled => "Cancelled",
        }
    }

    /// Upper-case tag used in ICS `STATUS` lines. The space in `In Progress`
    /// is written as a hyphen (`IN-PROGRESS`), as RFC 5545 status values
    /// contain no spaces.
    pub fn ics_tag(&self) -> &'static str {
        match self {
            EventStatus::Scheduled => "SCHEDULED",
            EventStatus::InProgress => "IN-PROGRESS",
            EventStatus::Completed => "COMPLETED",
            EventStatus::Cancelled => "CANCELLED",
        }
    }

    /// Still expected to happen.
    pub fn is_open(&self) -> bool {
        matches!(self, EventStatus::Scheduled | EventStatus::InProgress)
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "scheduled" => Ok(EventStatus::Scheduled),
            "inprogress" => Ok(EventStatus::InProgress),
            "completed" => Ok(EventStatus::Completed),
            "cancelled" => Ok(EventStatus::Cancelled),
            _ => Err(EngineError::validation(format!("unknown status '{}'", s))),
        }
    }
}

/// Default display color for a priority/status pair.
pub fn derive_color(priority: Priority, status: EventStatus) -> &'static str {
    match (status, priority) {
        (EventStatus::Completed, _) => "#10b981",
        (EventStatus::Cancelled, _) => "#6b7280",
        (_, Priority::High) => "#ef4444",
        (_, Priority::Medium) => "#f59e0b",
        (_, Priority::Low) => "#3b82f6",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderChannel {
    Email,
    #[default]
    Notification,
    Sms,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    #[serde(rename = "type", default)]
    pub channel: ReminderChannel,
    pub minutes_before: u32,
    #[serde(default)]
    pub message: String,
}

/// Explicit series membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesLink {
    pub series_id: String,
    pub parent_event_id: String,
    /// False on the series head, true on every generated instance.
    pub is_instance: bool,
    pub index: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub all_day: bool,
    #[serde(rename = "type")]
    pub kind: String,
    pub category: String,
    pub priority: Priority,
    pub status: EventStatus,
    pub asset_id: Option<String>,
    pub asset_name: Option<String>,
    pub assigned_to: Option<String>,
    pub color: String,
    pub reminders: Vec<Reminder>,
    pub recurrence: Option<RecurrenceRule>,
    pub series: Option<SeriesLink>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Event {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn series_id(&self) -> Option<&str> {
        self.series.as_ref().map(|s| s.series_id.as_str())
    }

    pub fn is_instance(&self) -> bool {
        self.series.as_ref().is_some_and(|s| s.is_instance)
    }

    /// Reminder trigger times, earliest first.
    pub fn reminder_times(&self) -> Vec<NaiveDateTime> {
        let mut times: Vec<NaiveDateTime> = self
            .reminders
            .iter()
            .map(|r| self.start - Duration::minutes(r.minutes_before as i64))
            .collect();
        times.sort();
        times
    }
}

/// Caller-supplied fields for a new event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    #[serde(default)]
    pub all_day: bool,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub status: EventStatus,
    #[serde(default)]
    pub asset_id: Option<String>,
    #[serde(default)]
    pub asset_name: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub reminders: Vec<Reminder>,
    #[serde(default)]
    pub recurrence: Option<RecurrenceRule>,
}

impl EventDraft {
    pub fn new(title: impl Into<String>, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            location: String::new(),
            start,
            end,
            all_day: false,
            kind: String::new(),
            category: String::new(),
            priority: Priority::default(),
            status: EventStatus::default(),
            asset_id: None,
            asset_name: None,
            assigned_to: None,
            color: None,
            reminders: Vec::new(),
            recurrence: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(EngineError::validation("event title is required"));
        }
        validate_span(self.start, self.end, self.all_day)?;
        if let Some(rule) = &self.recurrence {
            rule.validate()?;
        }
        Ok(())
    }
}

/// `start < end`; all-day spans must also sit on midnight boundaries.
pub(crate) fn validate_span(start: NaiveDateTime, end: NaiveDateTime, all_day: bool) -> Result<()> {
    if all_day && (start.time() != NaiveTime::MIN || end.time() != NaiveTime::MIN) {
        return Err(EngineError::validation(
            "all-day events must start and end at midnight (end is exclusive)",
        ));
    }
    if end <= start {
        return Err(EngineError::validation(format!(
            "event end {} must be after start {}",
            end, start
        )));
    }
    Ok(())
}

/// Partial update for [`crate::store::EventStore::update`]. `None` fields are
/// left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub all_day: Option<bool>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub category: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<EventStatus>,
    pub asset_id: Option<String>,
    pub asset_name: Option<String>,
    pub assigned_to: Option<String>,
    pub color: Option<String>,
    pub reminders: Option<Vec<Reminder>>,
}
