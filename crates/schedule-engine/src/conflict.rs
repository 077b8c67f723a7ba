//! Detect and resolve scheduling conflicts.
//!
//! A conflict is two or more items sharing a calendar date and an assignee.
//! Detection is unconditional; resolution either spreads the collisions over
//! following days, stacks them into sequential slots, or leaves them alone
//! for manual handling. Conflicts are data, never errors.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Assignee key used for items with no assignee.
pub const UNASSIGNED: &str = "unassigned";

/// Anything that occupies a calendar slot and can be moved.
pub trait Schedulable {
    fn id(&self) -> &str;
    fn scheduled_at(&self) -> NaiveDateTime;
    /// Move to a new start, preserving duration.
    fn reschedule(&mut self, start: NaiveDateTime);
    fn duration_minutes(&self) -> u32;
    fn assignee(&self) -> Option<&str>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// Keep the first member; push the i-th later member by i days.
    #[default]
    Spread,
    /// Sequential time slots within the working window.
    Stack,
    /// Report only.
    Manual,
}

impl fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResolutionStrategy::Spread => "spread",
            ResolutionStrategy::Stack => "stack",
            ResolutionStrategy::Manual => "manual",
        };
        f.write_str(name)
    }
}

impl FromStr for ResolutionStrategy {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spread" => Ok(ResolutionStrategy::Spread),
            "stack" => Ok(ResolutionStrategy::Stack),
            "manual" => Ok(ResolutionStrategy::Manual),
            other => Err(EngineError::validation(format!(
                "unknown resolution strategy '{}' (expected spread, stack or manual)",
                other
            ))),
        }
    }
}

/// Working hours used by the stack strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Default for StackWindow {
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            end: NaiveTime::from_hms_opt(17, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl StackWindow {
    pub fn validate(&self) -> Result<()> {
        if self.start >= self.end {
            return Err(EngineError::validation(format!(
                "stack window start {} must be before end {}",
                self.start, self.end
            )));
        }
        Ok(())
    }
}

/// Two or more items sharing a (date, assignee) key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictGroup {
    pub date: NaiveDate,
    pub assignee: String,
    /// Member ids in schedule order.
    pub occurrence_ids: Vec<String>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution<T> {
    pub schedule: Vec<T>,
    pub conflicts: Vec<ConflictGroup>,
}

struct Group {
    date: NaiveDate,
    assignee: String,
    members: Vec<usize>,
}

/// Group item indices by (date, assignee), groups in first-appearance order.
fn group_by_slot<T: Schedulable>(items: &[T]) -> Vec<Group> {
    let mut groups: Vec<Group> = Vec::new();
    let mut index: HashMap<(NaiveDate, String), usize> = HashMap::new();

    for (i, item) in items.iter().enumerate() {
        let date = item.scheduled_at().date();
        let assignee = item.assignee().unwrap_or(UNASSIGNED).to_string();
        match index.get(&(date, assignee.clone())) {
            Some(&g) => groups[g].members.push(i),
            None => {
                index.insert((date, assignee.clone()), groups.len());
                groups.push(Group {
                    date,
                    assignee,
                    members: vec![i],
                });
            }
        }
    }

    groups
}

fn report<T: Schedulable>(items: &[T], groups: &[Group]) -> Vec<ConflictGroup> {
    groups
        .iter()
        .filter(|g| g.members.len() > 1)
        .map(|g| ConflictGroup {
            date: g.date,
            assignee: g.assignee.clone(),
            occurrence_ids: g.members.iter().map(|&i| items[i].id().to_string()).collect(),
            count: g.members.len(),
        })
        .collect()
}

/// Report every (date, assignee) collision without changing anything.
pub fn detect_conflicts<T: Schedulable>(items: &[T]) -> Vec<ConflictGroup> {
    report(items, &group_by_slot(items))
}

/// Resolve with the default 09:00-17:00 stack window.
pub fn resolve<T: Schedulable>(items: Vec<T>, strategy: ResolutionStrategy) -> Resolution<T> {
    ConflictResolver::default().resolve(items, strategy)
}

/// Conflict resolver with a configurable stack window.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictResolver {
    window: StackWindow,
}

impl ConflictResolver {
    pub fn new(window: StackWindow) -> Result<Self> {
        window.validate()?;
        Ok(Self { window })
    }

    /// Detect conflicts and apply `strategy` in one pass.
    ///
    /// The conflict report always describes the input schedule. Adjustments
    /// are applied group by group in first-appearance order and are not
    /// re-checked: spreading or stacking can create new collisions on the
    /// following days.
    pub fn resolve<T: Schedulable>(&self, mut items: Vec<T>, strategy: ResolutionStrategy) -> Resolution<T> {
        let groups = group_by_slot(&items);
        let conflicts = report(&items, &groups);

        for group in groups.iter().filter(|g| g.members.len() > 1) {
            match strategy {
                ResolutionStrategy::Manual => {}
                ResolutionStrategy::Spread => {
                    for (offset, &i) in group.members.iter().enumerate().skip(1) {
                        let moved = items[i].scheduled_at() + Duration::days(offset as i64);
                        items[i].reschedule(moved);
                    }
                }
                ResolutionStrategy::Stack => self.stack(&mut items, group),
            }
        }

        if !conflicts.is_empty() {
            tracing::debug!(
                groups = conflicts.len(),
                strategy = %strategy,
                "scheduling conflicts detected"
            );
        }

        Resolution {
            schedule: items,
            conflicts,
        }
    }

    fn stack<T: Schedulable>(&self, items: &mut [T], group: &Group) {
        let mut day = group.date;
        let mut clock = day.and_time(self.window.start);

        for &i in &group.members {
            items[i].reschedule(clock);
            let hours = items[i].duration_minutes().div_ceil(60) + 1;
            clock += Duration::hours(hours as i64);
            if clock >= day.and_time(self.window.end) {
                day = day.succ_opt().unwrap_or(day);
                clock = day.and_time(self.window.start);
            }
        }
    }
}
