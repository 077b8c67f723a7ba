//! ICS and CSV serialization of event sets.
//!
//! ICS output always lists concrete instances; recurring series are exported
//! as their expanded members, never as a compact `RRULE`.

use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;

use crate::config::EngineConfig;
use crate::dst::{self, DstPolicy};
use crate::error::{EngineError, Result};
use crate::event::{Event, EventStatus, Priority};

pub const PRODID: &str = "-//Asset Inspection//Schedule Engine 1.0//EN";

/// Column order of [`to_csv`].
pub const CSV_HEADERS: [&str; 10] = [
    "Title",
    "Description",
    "Start",
    "End",
    "Type",
    "Status",
    "Priority",
    "Asset",
    "Assigned To",
    "Location",
];

/// Timestamp format of the CSV `Start`/`End` columns.
pub const CSV_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const ICS_UTC_FORMAT: &str = "%Y%m%dT%H%M%SZ";
const ICS_LINE_LIMIT: usize = 75;

#[derive(Debug, Clone)]
pub struct IcsOptions {
    /// Zone the events' local timestamps are expressed in.
    pub timezone: Tz,
    pub dst_policy: DstPolicy,
    /// Optional `X-WR-CALNAME`.
    pub calendar_name: Option<String>,
}

impl Default for IcsOptions {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            dst_policy: DstPolicy::default(),
            calendar_name: None,
        }
    }
}

impl IcsOptions {
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        Ok(Self {
            timezone: config.tz()?,
            dst_policy: config.dst_policy,
            calendar_name: None,
        })
    }
}

/// ICS `PRIORITY` value (1 = highest).
pub fn ics_priority(priority: Priority) -> u8 {
    match priority {
        Priority::High => 1,
        Priority::Medium => 5,
        Priority::Low => 9,
    }
}

/// Escape a TEXT value (RFC 5545 section 3.3.11).
fn escape_text(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            ';' => escaped.push_str("\\;"),
            ',' => escaped.push_str("\\,"),
            '\n' => escaped.push_str("\\n"),
            '\r' => {}
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Fold a content line at 75 octets without splitting a UTF-8 sequence.
fn fold_line(line: &str, out: &mut String) {
    let mut width = 0;
    for c in line.chars() {
        let len = c.len_utf8();
        if width + len > ICS_LINE_LIMIT {
            out.push_str("\r\n ");
            width = 1;
        }
        out.push(c);
        width += len;
    }
    out.push_str("\r\n");
}

fn utc_stamp(dt: DateTime<Utc>) -> String {
    dt.format(ICS_UTC_FORMAT).to_string()
}

/// Serialize events into one `VCALENDAR`.
///
/// Local timestamps are converted to UTC in `options.timezone`. Events whose
/// start or end falls in a DST gap under [`DstPolicy::Skip`] are left out.
pub fn to_ics<'a, I>(events: I, options: &IcsOptions) -> String
where
    I: IntoIterator<Item = &'a Event>,
{
    let mut lines: Vec<String> = vec![
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        format!("PRODID:{}", PRODID),
        "CALSCALE:GREGORIAN".to_string(),
        "METHOD:PUBLISH".to_string(),
    ];
    if let Some(name) = &options.calendar_name {
        lines.push(format!("X-WR-CALNAME:{}", escape_text(name)));
    }

    for event in events {
        let to_utc = |local: NaiveDateTime| dst::to_utc(local, options.timezone, options.dst_policy);

        let (dtstart, dtend) = if event.all_day {
            (
                format!("DTSTART;VALUE=DATE:{}", event.start.format("%Y%m%d")),
                format!("DTEND;VALUE=DATE:{}", event.end.format("%Y%m%d")),
            )
        } else {
            match (to_utc(event.start), to_utc(event.end)) {
                (Some(start), Some(end)) => (
                    format!("DTSTART:{}", utc_stamp(start)),
                    format!("DTEND:{}", utc_stamp(end)),
                ),
                _ => {
                    tracing::warn!(event_id = %event.id, start = %event.start, "event falls in a DST gap; skipped");
                    continue;
                }
            }
        };
        let dtstamp = to_utc(event.updated_at).unwrap_or_else(|| event.updated_at.and_utc());

        lines.push("BEGIN:VEVENT".to_string());
        lines.push(format!("UID:{}", event.id));
        lines.push(format!("DTSTAMP:{}", utc_stamp(dtstamp)));
        lines.push(dtstart);
        lines.push(dtend);
        lines.push(format!("SUMMARY:{}", escape_text(&event.title)));
        lines.push(format!("DESCRIPTION:{}", escape_text(&event.description)));
        lines.push(format!("LOCATION:{}", escape_text(&event.location)));
        lines.push(format!("STATUS:{}", event.status.ics_tag()));
        lines.push(format!("PRIORITY:{}", ics_priority(event.priority)));
        if !event.category.is_empty() {
            lines.push(format!("CATEGORIES:{}", escape_text(&event.category)));
        }
        lines.push("END:VEVENT".to_string());
    }
    lines.push("END:VCALENDAR".to_string());

    let mut out = String::new();
    for line in &lines {
        fold_line(line, &mut out);
    }
    out
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// Serialize events as CSV: a header row then one row per event, every
/// field double-quoted.
pub fn to_csv<'a, I>(events: I) -> String
where
    I: IntoIterator<Item = &'a Event>,
{
    let mut out = CSV_HEADERS.map(quote).join(",");
    out.push('\n');

    for event in events {
        let asset = event
            .asset_name
            .as_deref()
            .or(event.asset_id.as_deref())
            .unwrap_or("");
        let fields = [
            event.title.clone(),
            event.description.clone(),
            event.start.format(CSV_TIME_FORMAT).to_string(),
            event.end.format(CSV_TIME_FORMAT).to_string(),
            event.kind.clone(),
            event.status.as_str().to_string(),
            event.priority.as_str().to_string(),
            asset.to_string(),
            event.assigned_to.clone().unwrap_or_default(),
            event.location.clone(),
        ];
        let row: Vec<String> = fields.iter().map(|f| quote(f)).collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

/// One row read back by [`parse_csv`].
#[derive(Debug, Clone, PartialEq)]
pub struct CsvRow {
    pub title: String,
    pub description: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub kind: String,
    pub status: EventStatus,
    pub priority: Priority,
    pub asset: String,
    pub assigned_to: String,
    pub location: String,
}

/// Split CSV text into records, honouring quoted fields with doubled quotes
/// and embedded newlines.
fn split_records(text: &str) -> Result<Vec<Vec<String>>> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut touched = false;
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' => {
                in_quotes = true;
                touched = true;
            }
            ',' => {
                record.push(std::mem::take(&mut field));
                touched = true;
            }
            '\r' => {}
            '\n' => {
                if touched || !field.is_empty() {
                    record.push(std::mem::take(&mut field));
                    records.push(std::mem::take(&mut record));
                }
                touched = false;
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(EngineError::validation("unterminated quoted CSV field"));
    }
    if touched || !field.is_empty() {
        record.push(field);
        records.push(record);
    }
    Ok(records)
}

fn parse_time(value: &str, line: usize) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, CSV_TIME_FORMAT).map_err(|e| {
        EngineError::validation(format!("CSV record {}: bad timestamp '{}': {}", line, value, e))
    })
}

/// Read back CSV produced by [`to_csv`]. The header row is required.
pub fn parse_csv(text: &str) -> Result<Vec<CsvRow>> {
    let mut records = split_records(text)?.into_iter();
    match records.next() {
        Some(header) if header.iter().map(String::as_str).eq(CSV_HEADERS) => {}
        _ => return Err(EngineError::validation("CSV header row is missing or unexpected")),
    }

    records
        .enumerate()
        .map(|(i, fields)| {
            let line = i + 2;
            let [title, description, start, end, kind, status, priority, asset, assigned_to, location]: [String; 10] =
                fields.try_into().map_err(|f: Vec<String>| {
                    EngineError::validation(format!(
                        "CSV record {} has {} fields, expected {}",
                        line,
                        f.len(),
                        CSV_HEADERS.len()
                    ))
                })?;
            Ok(CsvRow {
                title,
                description,
                start: parse_time(&start, line)?,
                end: parse_time(&end, line)?,
                kind,
                status: status.parse()?,
                priority: priority.parse()?,
                asset,
                assigned_to,
                location,
            })
        })
        .collect()
}
