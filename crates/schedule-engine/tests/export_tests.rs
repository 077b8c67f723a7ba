//! Tests for ICS and CSV export.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use chrono_tz::Tz;
use schedule_engine::dst::DstPolicy;
use schedule_engine::export::{ics_priority, CSV_HEADERS, PRODID};
use schedule_engine::store::FixedClock;
use schedule_engine::{
    parse_csv, to_csv, to_ics, Event, EventDraft, EventStatus, EventStore, IcsOptions, Priority,
};

fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, 0)
        .unwrap()
}

fn event(title: &str, start: NaiveDateTime, minutes: i64) -> Event {
    let mut store = EventStore::new().with_clock(FixedClock(at(2025, 3, 1, 8, 0)));
    store
        .create(EventDraft::new(title, start, start + Duration::minutes(minutes)))
        .unwrap()
        .event
}

fn new_york() -> IcsOptions {
    IcsOptions {
        timezone: Tz::America__New_York,
        ..IcsOptions::default()
    }
}

/// Unfold content lines (RFC 5545 section 3.1).
fn unfold(ics: &str) -> String {
    ics.replace("\r\n ", "")
}

// ---------------------------------------------------------------------------
// ICS
// ---------------------------------------------------------------------------

#[test]
fn ics_has_calendar_envelope() {
    let ics = to_ics(&[event("Boiler check", at(2025, 3, 10, 9, 0), 60)], &IcsOptions::default());

    assert!(ics.starts_with("BEGIN:VCALENDAR\r\nVERSION:2.0\r\n"));
    assert!(ics.contains(&format!("PRODID:{}\r\n", PRODID)));
    assert!(ics.contains("METHOD:PUBLISH\r\n"));
    assert!(ics.ends_with("END:VCALENDAR\r\n"));
    assert_eq!(ics.matches("BEGIN:VEVENT").count(), 1);
    assert!(!ics.replace("\r\n", "").contains('\n'), "every line ends in CRLF");
}

#[test]
fn ics_event_fields() {
    let mut boiler = event("Boiler check", at(2025, 3, 10, 9, 0), 90);
    boiler.priority = Priority::High;
    boiler.status = EventStatus::InProgress;
    boiler.category = "Safety".to_string();
    let ics = to_ics([&boiler], &IcsOptions::default());

    assert!(ics.contains(&format!("UID:{}\r\n", boiler.id)));
    assert!(ics.contains("DTSTAMP:20250301T080000Z\r\n"));
    assert!(ics.contains("DTSTART:20250310T090000Z\r\n"));
    assert!(ics.contains("DTEND:20250310T103000Z\r\n"));
    assert!(ics.contains("SUMMARY:Boiler check\r\n"));
    assert!(ics.contains("STATUS:IN-PROGRESS\r\n"));
    assert!(ics.contains("PRIORITY:1\r\n"));
    assert!(ics.contains("CATEGORIES:Safety\r\n"));
}

#[test]
fn ics_converts_local_time_to_utc() {
    // 09:00 EDT on 2025-03-10 is 13:00 UTC.
    let ics = to_ics(&[event("Boiler check", at(2025, 3, 10, 9, 0), 60)], &new_york());
    assert!(ics.contains("DTSTART:20250310T130000Z\r\n"));
    assert!(ics.contains("DTEND:20250310T140000Z\r\n"));
}

#[test]
fn ics_escapes_text_values() {
    let mut e = event("Pumps; valves, and gauges", at(2025, 3, 10, 9, 0), 60);
    e.description = "Line one\nLine two with a \\ backslash".to_string();
    let ics = unfold(&to_ics([&e], &IcsOptions::default()));

    assert!(ics.contains("SUMMARY:Pumps\\; valves\\, and gauges\r\n"));
    assert!(ics.contains("DESCRIPTION:Line one\\nLine two with a \\\\ backslash\r\n"));
}

#[test]
fn ics_folds_long_lines() {
    let mut e = event("Boiler check", at(2025, 3, 10, 9, 0), 60);
    e.description = "Inspect every valve ".repeat(12);
    let ics = to_ics([&e], &IcsOptions::default());

    for line in ics.split("\r\n") {
        assert!(line.len() <= 75, "line too long: {:?}", line);
    }
    assert!(ics.contains("\r\n "), "long DESCRIPTION is folded");
    assert!(unfold(&ics).contains(&format!("DESCRIPTION:{}\r\n", e.description)));
}

#[test]
fn ics_folding_keeps_multibyte_characters_whole() {
    let mut e = event("Boiler check", at(2025, 3, 10, 9, 0), 60);
    e.location = "Gebäude Süd ".repeat(10);
    let ics = to_ics([&e], &IcsOptions::default());

    for line in ics.split("\r\n") {
        assert!(line.len() <= 75);
    }
    assert!(unfold(&ics).contains(&format!("LOCATION:{}\r\n", e.location)));
}

#[test]
fn ics_all_day_uses_date_values() {
    let mut store = EventStore::new().with_clock(FixedClock(at(2025, 3, 1, 8, 0)));
    let mut draft = EventDraft::new("Audit day", at(2025, 3, 10, 0, 0), at(2025, 3, 11, 0, 0));
    draft.all_day = true;
    let audit = store.create(draft).unwrap().event;

    let ics = to_ics([&audit], &new_york());
    assert!(ics.contains("DTSTART;VALUE=DATE:20250310\r\n"));
    assert!(ics.contains("DTEND;VALUE=DATE:20250311\r\n"));
}

#[test]
fn ics_skip_policy_drops_events_in_dst_gap() {
    let gap = event("Night shift", at(2026, 3, 8, 2, 30), 60);
    let fine = event("Morning shift", at(2026, 3, 8, 9, 0), 60);
    let options = IcsOptions {
        dst_policy: DstPolicy::Skip,
        ..new_york()
    };

    let ics = to_ics([&gap, &fine], &options);
    assert_eq!(ics.matches("BEGIN:VEVENT").count(), 1);
    assert!(ics.contains("SUMMARY:Morning shift"));
}

#[test]
fn ics_wall_clock_policy_keeps_gap_events() {
    let gap = event("Night shift", at(2026, 3, 8, 2, 30), 60);
    let ics = to_ics([&gap], &new_york());
    assert!(ics.contains("DTSTART:20260308T073000Z\r\n"));
}

#[test]
fn ics_calendar_name_is_optional() {
    let e = event("Boiler check", at(2025, 3, 10, 9, 0), 60);
    let named = IcsOptions {
        calendar_name: Some("Inspections, North".to_string()),
        ..IcsOptions::default()
    };
    assert!(to_ics([&e], &named).contains("X-WR-CALNAME:Inspections\\, North\r\n"));
    assert!(!to_ics([&e], &IcsOptions::default()).contains("X-WR-CALNAME"));
}

#[test]
fn priorities_map_to_ics_scale() {
    assert_eq!(ics_priority(Priority::High), 1);
    assert_eq!(ics_priority(Priority::Medium), 5);
    assert_eq!(ics_priority(Priority::Low), 9);
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

#[test]
fn csv_header_and_quoting() {
    let mut e = event("Check \"main\" valve", at(2025, 3, 10, 9, 0), 60);
    e.kind = "inspection".to_string();
    e.asset_id = Some("a-1".to_string());
    e.location = "Dock 4, north side".to_string();
    let csv = to_csv([&e]);

    let mut lines = csv.lines();
    assert_eq!(
        lines.next().unwrap(),
        "\"Title\",\"Description\",\"Start\",\"End\",\"Type\",\"Status\",\"Priority\",\"Asset\",\"Assigned To\",\"Location\""
    );
    assert_eq!(
        lines.next().unwrap(),
        "\"Check \"\"main\"\" valve\",\"\",\"2025-03-10 09:00:00\",\"2025-03-10 10:00:00\",\"inspection\",\"Scheduled\",\"Medium\",\"a-1\",\"\",\"Dock 4, north side\""
    );
    assert!(lines.next().is_none());
}

#[test]
fn csv_prefers_asset_name() {
    let mut e = event("Boiler check", at(2025, 3, 10, 9, 0), 60);
    e.asset_id = Some("a-1".to_string());
    e.asset_name = Some("North Tower".to_string());
    assert!(to_csv([&e]).contains("\"North Tower\""));
}

#[test]
fn csv_reads_back_what_it_writes() {
    let mut first = event("Check \"main\" valve", at(2025, 3, 10, 9, 0), 60);
    first.description = "Two lines,\nwith a comma".to_string();
    first.priority = Priority::High;
    first.status = EventStatus::InProgress;
    first.assigned_to = Some("J. Smith".to_string());
    let second = event("Roof survey", at(2025, 3, 11, 14, 30), 45);

    let rows = parse_csv(&to_csv([&first, &second])).unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].title, first.title);
    assert_eq!(rows[0].description, first.description);
    assert_eq!(rows[0].start, first.start);
    assert_eq!(rows[0].end, first.end);
    assert_eq!(rows[0].status, EventStatus::InProgress);
    assert_eq!(rows[0].priority, Priority::High);
    assert_eq!(rows[0].assigned_to, "J. Smith");
    assert_eq!(rows[1].start, at(2025, 3, 11, 14, 30));
}

#[test]
fn csv_without_header_is_rejected() {
    assert!(parse_csv("").is_err());
    assert!(parse_csv("\"Name\",\"When\"\n").is_err());
}

#[test]
fn csv_with_short_row_is_rejected() {
    let mut text = CSV_HEADERS.map(|h| format!("\"{}\"", h)).join(",");
    text.push_str("\n\"only\",\"three\",\"fields\"\n");
    let err = parse_csv(&text).unwrap_err();
    assert!(err.to_string().contains("3 fields"));
}

#[test]
fn csv_with_unterminated_quote_is_rejected() {
    let mut text = CSV_HEADERS.map(|h| format!("\"{}\"", h)).join(",");
    text.push_str("\n\"never closed");
    assert!(parse_csv(&text).is_err());
}
