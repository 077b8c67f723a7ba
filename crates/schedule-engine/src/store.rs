//! In-memory event store with recurring-series bookkeeping.
//!
//! Each store is an independent service object: callers construct and own
//! it, and "now" comes from an injected [`Clock`]. Series membership is kept
//! in an explicit `series_id -> member ids` index next to the event table.

use std::collections::HashMap;
use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calendar::{self, ViewMode};
use crate::config::EngineConfig;
use crate::conflict::{self, ConflictGroup, Schedulable};
use crate::error::{EngineError, EntityKind, Result};
use crate::event::{derive_color, validate_span, Event, EventDraft, EventPatch, EventStatus, Priority, SeriesLink};
use crate::expander::{self, DEFAULT_HARD_CAP};
use crate::schedule::InspectionOccurrence;

/// Event type tag given to events created from inspection schedules.
pub const INSPECTION_EVENT_TYPE: &str = "inspection";

/// Source of "now" for timestamps and relative queries.
pub trait Clock: fmt::Debug {
    fn now(&self) -> NaiveDateTime;
}

/// Local wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

impl Schedulable for Event {
    fn id(&self) -> &str {
        &self.id
    }

    fn scheduled_at(&self) -> NaiveDateTime {
        self.start
    }

    fn reschedule(&mut self, start: NaiveDateTime) {
        let duration = self.duration();
        self.start = start;
        self.end = start + duration;
    }

    fn duration_minutes(&self) -> u32 {
        self.duration().num_minutes().max(0) as u32
    }

    fn assignee(&self) -> Option<&str> {
        self.assigned_to.as_deref()
    }
}

/// Result of [`EventStore::create`].
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedEvent {
    /// The stored event (the series head for recurring drafts).
    pub event: Event,
    /// Ids of generated instances, in series order. Empty for one-off events.
    pub instance_ids: Vec<String>,
    /// Series expansion stopped at the hard cap.
    pub capped: bool,
}

/// Conjunctive search filter. Unset and empty-string fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventFilter {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub category: Option<String>,
    pub asset_id: Option<String>,
    pub status: Option<EventStatus>,
    pub priority: Option<Priority>,
    pub from: Option<NaiveDateTime>,
    pub to: Option<NaiveDateTime>,
}

fn field_matches(filter: &Option<String>, value: &str) -> bool {
    match filter.as_deref() {
        None | Some("") => true,
        Some(wanted) => wanted == value,
    }
}

impl EventFilter {
    pub fn matches(&self, event: &Event) -> bool {
        field_matches(&self.kind, &event.kind)
            && field_matches(&self.category, &event.category)
            && field_matches(&self.asset_id, event.asset_id.as_deref().unwrap_or(""))
            && self.status.is_none_or(|s| s == event.status)
            && self.priority.is_none_or(|p| p == event.priority)
            && self.from.is_none_or(|from| event.start >= from)
            && self.to.is_none_or(|to| event.start <= to)
    }
}

/// Counts for dashboard-style summaries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventStats {
    pub total: usize,
    pub scheduled: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub cancelled: usize,
    /// Open events whose end has passed.
    pub overdue: usize,
    /// Open events starting within the next seven days.
    pub upcoming: usize,
}

#[derive(Debug)]
pub struct EventStore {
    events: HashMap<String, Event>,
    series: HashMap<String, Vec<String>>,
    /// Occurrence series key -> ids of the events last imported for it.
    imports: HashMap<String, Vec<String>>,
    hard_cap: usize,
    clock: Box<dyn Clock>,
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new()
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

impl EventStore {
    pub fn new() -> Self {
        Self {
            events: HashMap::new(),
            series: HashMap::new(),
            imports: HashMap::new(),
            hard_cap: DEFAULT_HARD_CAP,
            clock: Box::new(SystemClock),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new().with_hard_cap(config.hard_cap)
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_hard_cap(mut self, hard_cap: usize) -> Self {
        self.hard_cap = hard_cap;
        self
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn get(&self, id: &str) -> Result<&Event> {
        self.events
            .get(id)
            .ok_or_else(|| EngineError::not_found(EntityKind::Event, id))
    }

    /// All events, ordered by start.
    pub fn events(&self) -> Vec<&Event> {
        sorted(self.events.values().collect())
    }

    /// Members of a series, ordered by series index.
    pub fn series(&self, series_id: &str) -> Result<Vec<&Event>> {
        let ids = self
            .series
            .get(series_id)
            .ok_or_else(|| EngineError::not_found(EntityKind::Series, series_id))?;
        let mut members: Vec<&Event> = ids.iter().filter_map(|id| self.events.get(id)).collect();
        members.sort_by_key(|e| (e.series.as_ref().map(|s| s.index), e.start));
        Ok(members)
    }

    fn insert(&mut self, event: Event) {
        if let Some(link) = &event.series {
            self.series
                .entry(link.series_id.clone())
                .or_default()
                .push(event.id.clone());
        }
        self.events.insert(event.id.clone(), event);
    }

    /// Store a new event. Recurring drafts are expanded immediately and
    /// every instance is stored, linked to the head by series id.
    pub fn create(&mut self, draft: EventDraft) -> Result<CreatedEvent> {
        draft.validate()?;
        let now = self.clock.now();
        let id = new_id();
        let color = draft
            .color
            .clone()
            .unwrap_or_else(|| derive_color(draft.priority, draft.status).to_string());

        let head = Event {
            id: id.clone(),
            title: draft.title,
            description: draft.description,
            location: draft.location,
            start: draft.start,
            end: draft.end,
            all_day: draft.all_day,
            kind: draft.kind,
            category: draft.category,
            priority: draft.priority,
            status: draft.status,
            asset_id: draft.asset_id,
            asset_name: draft.asset_name,
            assigned_to: draft.assigned_to,
            color,
            reminders: draft.reminders,
            recurrence: draft.recurrence,
            series: None,
            created_at: now,
            updated_at: now,
        };

        let Some(rule) = head.recurrence.clone() else {
            self.insert(head.clone());
            return Ok(CreatedEvent {
                event: head,
                instance_ids: Vec::new(),
                capped: false,
            });
        };

        let expansion = expander::expand(head.start, &rule, head.duration(), self.hard_cap)?;
        let mut members = Vec::with_capacity(expansion.len());
        let mut instance_ids = Vec::new();
        for (index, occurrence) in expansion.events.iter().enumerate() {
            let mut member = head.clone();
            if index > 0 {
                member.id = new_id();
                instance_ids.push(member.id.clone());
            }
            member.start = occurrence.start;
            member.end = occurrence.end;
            member.series = Some(SeriesLink {
                series_id: id.clone(),
                parent_event_id: id.clone(),
                is_instance: index > 0,
                index: index as u32,
            });
            members.push(member);
        }

        let event = members[0].clone();
        for member in members {
            self.insert(member);
        }
        tracing::debug!(series_id = %id, instances = instance_ids.len(), "created recurring series");

        Ok(CreatedEvent {
            event,
            instance_ids,
            capped: expansion.capped,
        })
    }

    /// Remove one event and its series membership. Returns whether it existed.
    fn remove_event(&mut self, id: &str) -> bool {
        let Some(event) = self.events.remove(id) else {
            return false;
        };
        if let Some(series_id) = event.series_id() {
            if let Some(members) = self.series.get_mut(series_id) {
                members.retain(|m| m != id);
                if members.is_empty() {
                    self.series.remove(series_id);
                }
            }
        }
        true
    }

    /// Convert generated inspection occurrences into events. Occurrences of
    /// one series share its key as series id; the lowest-index occurrence
    /// present is the parent.
    ///
    /// Importing replaces: events from an earlier import of any series key
    /// in `occurrences` are removed first, so republishing a rescheduled
    /// asset never mixes generations. Nothing changes if any occurrence is
    /// invalid.
    pub fn import_occurrences(&mut self, occurrences: &[InspectionOccurrence]) -> Result<Vec<String>> {
        let now = self.clock.now();
        let ids: Vec<String> = occurrences.iter().map(|_| new_id()).collect();

        let mut parents: HashMap<&str, (u32, &str)> = HashMap::new();
        for (occurrence, id) in occurrences.iter().zip(&ids) {
            let entry = parents
                .entry(occurrence.series_key.as_str())
                .or_insert((occurrence.series_index, id.as_str()));
            if occurrence.series_index < entry.0 {
                *entry = (occurrence.series_index, id.as_str());
            }
        }

        let mut events = Vec::with_capacity(occurrences.len());
        for (occurrence, id) in occurrences.iter().zip(&ids) {
            let end = occurrence.end();
            validate_span(occurrence.scheduled_date, end, false)?;
            let series = occurrence.rule.as_ref().map(|_| {
                let parent_id = parents
                    .get(occurrence.series_key.as_str())
                    .map(|(_, p)| p.to_string())
                    .unwrap_or_else(|| id.clone());
                SeriesLink {
                    series_id: occurrence.series_key.clone(),
                    is_instance: parent_id != *id,
                    parent_event_id: parent_id,
                    index: occurrence.series_index,
                }
            });
            events.push(Event {
                id: id.clone(),
                title: format!("{} - {}", occurrence.inspection_type, occurrence.asset_name),
                description: occurrence.description.clone(),
                location: occurrence.location.clone().unwrap_or_default(),
                start: occurrence.scheduled_date,
                end,
                all_day: false,
                kind: INSPECTION_EVENT_TYPE.to_string(),
                category: occurrence.category.clone(),
                priority: occurrence.priority,
                status: EventStatus::Scheduled,
                asset_id: Some(occurrence.asset_id.clone()),
                asset_name: Some(occurrence.asset_name.clone()),
                assigned_to: occurrence.assigned_to.clone(),
                color: occurrence.color.clone(),
                reminders: Vec::new(),
                recurrence: occurrence.rule.clone(),
                series,
                created_at: now,
                updated_at: now,
            });
        }

        let keys: Vec<String> = parents.keys().map(|k| k.to_string()).collect();
        for key in keys {
            let stale = self.imports.remove(&key).unwrap_or_default();
            let removed = stale.iter().filter(|id| self.remove_event(id)).count();
            if removed > 0 {
                tracing::debug!(series_key = %key, removed, "replaced previously imported occurrences");
            }
        }
        for (occurrence, event) in occurrences.iter().zip(events) {
            self.imports
                .entry(occurrence.series_key.clone())
                .or_default()
                .push(event.id.clone());
            self.insert(event);
        }
        Ok(ids)
    }

    /// Merge `patch` into one event. Sibling series members are untouched.
    ///
    /// A color that was derived from priority/status is re-derived when
    /// those change; an explicitly chosen color is kept.
    pub fn update(&mut self, id: &str, patch: EventPatch) -> Result<()> {
        let now = self.clock.now();
        let event = self
            .events
            .get_mut(id)
            .ok_or_else(|| EngineError::not_found(EntityKind::Event, id))?;

        let color_was_derived = event.color == derive_color(event.priority, event.status);
        let mut updated = event.clone();
        if let Some(title) = patch.title {
            updated.title = title;
        }
        if let Some(description) = patch.description {
            updated.description = description;
        }
        if let Some(location) = patch.location {
            updated.location = location;
        }
        if let Some(start) = patch.start {
            updated.start = start;
        }
        if let Some(end) = patch.end {
            updated.end = end;
        }
        if let Some(all_day) = patch.all_day {
            updated.all_day = all_day;
        }
        if let Some(kind) = patch.kind {
            updated.kind = kind;
        }
        if let Some(category) = patch.category {
            updated.category = category;
        }
        if let Some(priority) = patch.priority {
            updated.priority = priority;
        }
        if let Some(status) = patch.status {
            updated.status = status;
        }
        if patch.asset_id.is_some() {
            updated.asset_id = patch.asset_id;
        }
        if patch.asset_name.is_some() {
            updated.asset_name = patch.asset_name;
        }
        if patch.assigned_to.is_some() {
            updated.assigned_to = patch.assigned_to;
        }
        if let Some(reminders) = patch.reminders {
            updated.reminders = reminders;
        }
        match patch.color {
            Some(color) => updated.color = color,
            None if color_was_derived => {
                updated.color = derive_color(updated.priority, updated.status).to_string()
            }
            None => {}
        }

        if updated.title.trim().is_empty() {
            return Err(EngineError::validation("event title is required"));
        }
        validate_span(updated.start, updated.end, updated.all_day)?;
        updated.updated_at = now;
        *event = updated;
        Ok(())
    }

    /// Remove one event, or with `delete_all` every member of its series.
    /// Returns how many events were removed.
    pub fn delete(&mut self, id: &str, delete_all: bool) -> Result<usize> {
        let series_id = self.get(id)?.series_id().map(str::to_string);

        match (delete_all, series_id) {
            (true, Some(series_id)) => {
                let members = self.series.remove(&series_id).unwrap_or_default();
                let removed = members
                    .iter()
                    .filter(|m| self.events.remove(m.as_str()).is_some())
                    .count();
                tracing::debug!(series_id = %series_id, removed, "deleted series");
                Ok(removed)
            }
            _ => {
                self.remove_event(id);
                Ok(1)
            }
        }
    }

    /// Events whose start lies in `[start, end]`, ordered by start.
    pub fn query_range(&self, start: NaiveDateTime, end: NaiveDateTime) -> Vec<&Event> {
        sorted(
            self.events
                .values()
                .filter(|e| e.start >= start && e.start <= end)
                .collect(),
        )
    }

    /// Events shown by a calendar view anchored at `anchor`.
    pub fn visible_events(&self, view: ViewMode, anchor: NaiveDate) -> Vec<&Event> {
        let (start, end) = calendar::visible_range(view, anchor);
        self.query_range(start, end)
    }

    /// Case-insensitive text match on title, description and asset name,
    /// combined (AND) with every set field of `filter`.
    pub fn search(&self, text: &str, filter: &EventFilter) -> Vec<&Event> {
        let needle = text.trim().to_lowercase();
        sorted(
            self.events
                .values()
                .filter(|e| needle.is_empty() || text_matches(e, &needle))
                .filter(|e| filter.matches(e))
                .collect(),
        )
    }

    /// (date, assignee) collisions among open events.
    pub fn conflicts(&self) -> Vec<ConflictGroup> {
        let open: Vec<Event> = self
            .events()
            .into_iter()
            .filter(|e| e.status.is_open())
            .cloned()
            .collect();
        conflict::detect_conflicts(&open)
    }

    pub fn stats(&self, now: NaiveDateTime) -> EventStats {
        let horizon = now + Duration::days(7);
        let mut stats = EventStats {
            total: self.events.len(),
            ..EventStats::default()
        };
        for event in self.events.values() {
            match event.status {
                EventStatus::Scheduled => stats.scheduled += 1,
                EventStatus::InProgress => stats.in_progress += 1,
                EventStatus::Completed => stats.completed += 1,
                EventStatus::Cancelled => stats.cancelled += 1,
            }
            if event.status.is_open() {
                if event.end < now {
                    stats.overdue += 1;
                } else if event.start >= now && event.start <= horizon {
                    stats.upcoming += 1;
                }
            }
        }
        stats
    }
}

fn text_matches(event: &Event, needle: &str) -> bool {
    event.title.to_lowercase().contains(needle)
        || event.description.to_lowercase().contains(needle)
        || event
            .asset_name
            .as_deref()
            .is_some_and(|name| name.to_lowercase().contains(needle))
}

fn sorted(mut events: Vec<&Event>) -> Vec<&Event> {
    events.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));
    events
}
