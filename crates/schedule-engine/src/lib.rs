//! # schedule-engine
//!
//! Recurring-event and inspection-scheduling engine for asset calendars.
//!
//! The engine expands recurrence rules into concrete occurrences, generates
//! per-asset inspection schedules from a policy catalog, detects and resolves
//! (date, assignee) conflicts, keeps events in an in-memory store and exports
//! them to ICS and CSV. Everything is synchronous and performs no I/O.
//!
//! ## Modules
//!
//! - [`calendar`] - month/week/day grid math and view navigation
//! - [`expander`] - recurrence rule → ordered occurrence starts
//! - [`policy`] - inspection policy catalog and per-asset overrides
//! - [`schedule`] - inspection schedule generation and per-asset records
//! - [`conflict`] - conflict detection and spread/stack/manual resolution
//! - [`store`] - in-memory event store with series bookkeeping
//! - [`export`] - ICS and CSV serialization
//! - [`dst`] - DST gap policies for local → UTC conversion
//! - [`config`] - engine configuration
//! - [`error`] - Error types
//!
//! ## Quick start
//!
//! ```rust
//! use chrono::NaiveDate;
//! use schedule_engine::{Asset, EventStore, InspectionScheduler};
//!
//! let mut scheduler = InspectionScheduler::default();
//! let asset = Asset::new("a-1", "Elm Street Duplex", Some("Residential Property"));
//! let start = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
//! let options = scheduler.options().with_count(2);
//!
//! let record = scheduler.schedule_asset(&asset, start, &options).unwrap();
//! assert_eq!(record.occurrences.len(), 6);
//!
//! let mut store = EventStore::new();
//! scheduler.publish("a-1", &mut store).unwrap();
//! assert_eq!(store.len(), 6);
//! ```

pub mod calendar;
pub mod config;
pub mod conflict;
pub mod dst;
pub mod error;
pub mod event;
pub mod expander;
pub mod export;
pub mod policy;
pub mod schedule;
pub mod store;

pub use calendar::{month_grid, week_days, ViewMode};
pub use config::EngineConfig;
pub use conflict::{detect_conflicts, resolve, ConflictGroup, ResolutionStrategy, Resolution};
pub use error::{EngineError, EntityKind};
pub use event::{Event, EventDraft, EventPatch, EventStatus, Priority, Reminder};
pub use expander::{expand, ExpandedEvent, Expansion, RecurrenceEnd, RecurrenceRule};
pub use export::{parse_csv, to_csv, to_ics, IcsOptions};
pub use policy::{InspectionPolicy, PolicyCatalog, PolicyOverride};
pub use schedule::{
    generate, generate_for_assets, Asset, BatchSchedule, InspectionOccurrence, InspectionScheduler,
    ScheduleOptions,
};
pub use store::{Clock, EventFilter, EventStore, FixedClock, SystemClock};
