//! Inspection schedule generation.
//!
//! Combines the policy catalog and the recurrence expander into concrete,
//! date-sorted inspection occurrences per asset. Batch generation runs the
//! combined list through the conflict resolver.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::conflict::{ConflictGroup, ConflictResolver, ResolutionStrategy, Schedulable, StackWindow};
use crate::error::{EngineError, EntityKind, Result};
use crate::event::Priority;
use crate::expander::{self, RecurrenceRule};
use crate::policy::{PolicyCatalog, PolicyOverride};
use crate::store::EventStore;

/// An asset as supplied by the external asset catalog. Never mutated here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub asset_type: Option<String>,
    #[serde(default)]
    pub manager: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    /// Inspection type -> partial policy.
    #[serde(default)]
    pub custom_policy: BTreeMap<String, PolicyOverride>,
}

impl Asset {
    pub fn new(id: impl Into<String>, name: impl Into<String>, asset_type: Option<&str>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            asset_type: asset_type.map(str::to_string),
            manager: None,
            location: None,
            custom_policy: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleOptions {
    /// Occurrences per recurring inspection type.
    pub occurrence_count: u32,
    /// Time of day for every generated occurrence.
    pub start_time: NaiveTime,
    /// Inspector for every occurrence; defaults to the asset's manager.
    pub assigned_to: Option<String>,
    pub strategy: ResolutionStrategy,
    pub stack_window: StackWindow,
    pub hard_cap: usize,
}

impl Default for ScheduleOptions {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl ScheduleOptions {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            occurrence_count: config.occurrence_count,
            start_time: config.start_time,
            assigned_to: None,
            strategy: config.strategy,
            stack_window: config.stack_window,
            hard_cap: config.hard_cap,
        }
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.occurrence_count = count;
        self
    }

    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assigned_to = Some(assignee.into());
        self
    }

    pub fn with_strategy(mut self, strategy: ResolutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

/// One generated inspection, before it becomes an [`crate::event::Event`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectionOccurrence {
    /// `"{series_key}_{series_index}"`.
    pub id: String,
    /// `"{asset_id}_{inspection_type}"`, shared by the whole series.
    pub series_key: String,
    pub asset_id: String,
    pub asset_name: String,
    pub inspection_type: String,
    pub scheduled_date: NaiveDateTime,
    pub duration_minutes: u32,
    pub priority: Priority,
    pub category: String,
    pub color: String,
    pub description: String,
    pub location: Option<String>,
    pub assigned_to: Option<String>,
    /// 0 marks the series head.
    pub series_index: u32,
    pub rule: Option<RecurrenceRule>,
}

impl InspectionOccurrence {
    pub fn end(&self) -> NaiveDateTime {
        self.scheduled_date + Duration::minutes(self.duration_minutes as i64)
    }
}

impl Schedulable for InspectionOccurrence {
    fn id(&self) -> &str {
        &self.id
    }

    fn scheduled_at(&self) -> NaiveDateTime {
        self.scheduled_date
    }

    fn reschedule(&mut self, start: NaiveDateTime) {
        self.scheduled_date = start;
    }

    fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    fn assignee(&self) -> Option<&str> {
        self.assigned_to.as_deref()
    }
}

/// Schedule for a single asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedSchedule {
    pub occurrences: Vec<InspectionOccurrence>,
    /// The asset's type was missing or unknown; the `"Other"` bucket applied.
    pub used_fallback: bool,
    /// At least one series was truncated by the hard cap.
    pub capped: bool,
}

/// Combined, conflict-resolved schedule for several assets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSchedule {
    pub schedule: Vec<InspectionOccurrence>,
    pub conflicts: Vec<ConflictGroup>,
    /// Ids of assets that fell back to the `"Other"` bucket.
    pub fallback_assets: Vec<String>,
}

/// Generate the inspection schedule for one asset, sorted by date.
///
/// # Errors
/// `EngineError::Validation` for a zero occurrence count or a custom policy
/// keyed by an inspection type the catalog does not know.
pub fn generate(
    catalog: &PolicyCatalog,
    asset: &Asset,
    start_date: NaiveDate,
    options: &ScheduleOptions,
) -> Result<GeneratedSchedule> {
    if options.occurrence_count == 0 {
        return Err(EngineError::validation("occurrence count must be at least 1"));
    }

    let applicable = catalog.inspection_types_for(asset.asset_type.as_deref());
    if applicable.used_fallback {
        tracing::warn!(
            asset_id = %asset.id,
            asset_type = ?asset.asset_type,
            "unrecognized asset type; using fallback inspection bucket"
        );
    }
    let mut types = applicable.types;
    for key in asset.custom_policy.keys() {
        if !types.contains(key) {
            types.push(key.clone());
        }
    }

    let seed = start_date.and_time(options.start_time);
    let assignee = options.assigned_to.clone().or_else(|| asset.manager.clone());
    let mut occurrences = Vec::new();
    let mut capped = false;

    for inspection_type in &types {
        let policy = catalog.resolve(inspection_type, asset.custom_policy.get(inspection_type))?;
        let rule = policy.frequency.to_rule(options.occurrence_count);
        let starts = match &rule {
            Some(rule) => {
                let duration = Duration::minutes(policy.duration_minutes as i64);
                let expansion = expander::expand(seed, rule, duration, options.hard_cap)?;
                capped |= expansion.capped;
                expansion.starts()
            }
            None => vec![seed],
        };

        let series_key = format!("{}_{}", asset.id, inspection_type);
        for (index, scheduled_date) in starts.into_iter().enumerate() {
            occurrences.push(InspectionOccurrence {
                id: format!("{}_{}", series_key, index),
                series_key: series_key.clone(),
                asset_id: asset.id.clone(),
                asset_name: asset.name.clone(),
                inspection_type: inspection_type.clone(),
                scheduled_date,
                duration_minutes: policy.duration_minutes,
                priority: policy.priority,
                category: policy.category.clone(),
                color: policy.color.clone(),
                description: policy.description.clone(),
                location: asset.location.clone(),
                assigned_to: assignee.clone(),
                series_index: index as u32,
                rule: rule.clone(),
            });
        }
    }

    occurrences.sort_by_key(|o| o.scheduled_date);

    Ok(GeneratedSchedule {
        occurrences,
        used_fallback: applicable.used_fallback,
        capped,
    })
}

/// Generate schedules for several assets and resolve conflicts between them.
///
/// The result is sorted ascending by date after resolution.
pub fn generate_for_assets(
    catalog: &PolicyCatalog,
    assets: &[Asset],
    start_date: NaiveDate,
    options: &ScheduleOptions,
) -> Result<BatchSchedule> {
    let resolver = ConflictResolver::new(options.stack_window)?;
    let mut combined = Vec::new();
    let mut fallback_assets = Vec::new();

    for asset in assets {
        let generated = generate(catalog, asset, start_date, options)?;
        if generated.used_fallback {
            fallback_assets.push(asset.id.clone());
        }
        combined.extend(generated.occurrences);
    }

    combined.sort_by_key(|o| o.scheduled_date);
    let mut resolution = resolver.resolve(combined, options.strategy);
    resolution.schedule.sort_by_key(|o| o.scheduled_date);

    Ok(BatchSchedule {
        schedule: resolution.schedule,
        conflicts: resolution.conflicts,
        fallback_assets,
    })
}

/// Stored schedule for one asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRecord {
    pub asset_id: String,
    pub asset_name: String,
    pub start_date: NaiveDate,
    pub occurrences: Vec<InspectionOccurrence>,
    pub used_fallback: bool,
}

/// Owns a policy catalog and the per-asset schedule table.
#[derive(Debug, Clone)]
pub struct InspectionScheduler {
    catalog: PolicyCatalog,
    defaults: ScheduleOptions,
    records: BTreeMap<String, ScheduleRecord>,
}

impl Default for InspectionScheduler {
    fn default() -> Self {
        Self::new(PolicyCatalog::standard(), ScheduleOptions::default())
    }
}

impl InspectionScheduler {
    pub fn new(catalog: PolicyCatalog, defaults: ScheduleOptions) -> Self {
        Self {
            catalog,
            defaults,
            records: BTreeMap::new(),
        }
    }

    pub fn from_config(catalog: PolicyCatalog, config: &EngineConfig) -> Self {
        Self::new(catalog, ScheduleOptions::from_config(config))
    }

    pub fn catalog(&self) -> &PolicyCatalog {
        &self.catalog
    }

    /// A copy of the default options, for callers to adjust per call.
    pub fn options(&self) -> ScheduleOptions {
        self.defaults.clone()
    }

    /// Generate and store the schedule for one asset, replacing any previous
    /// record for it.
    pub fn schedule_asset(
        &mut self,
        asset: &Asset,
        start_date: NaiveDate,
        options: &ScheduleOptions,
    ) -> Result<&ScheduleRecord> {
        let generated = generate(&self.catalog, asset, start_date, options)?;
        let record = ScheduleRecord {
            asset_id: asset.id.clone(),
            asset_name: asset.name.clone(),
            start_date,
            occurrences: generated.occurrences,
            used_fallback: generated.used_fallback,
        };
        self.records.insert(asset.id.clone(), record);
        self.record(&asset.id)
    }

    /// Generate and resolve schedules for `assets`, storing each asset's
    /// share of the resolved schedule.
    pub fn schedule_assets(
        &mut self,
        assets: &[Asset],
        start_date: NaiveDate,
        options: &ScheduleOptions,
    ) -> Result<BatchSchedule> {
        let batch = generate_for_assets(&self.catalog, assets, start_date, options)?;
        for asset in assets {
            let occurrences: Vec<InspectionOccurrence> = batch
                .schedule
                .iter()
                .filter(|o| o.asset_id == asset.id)
                .cloned()
                .collect();
            self.records.insert(
                asset.id.clone(),
                ScheduleRecord {
                    asset_id: asset.id.clone(),
                    asset_name: asset.name.clone(),
                    start_date,
                    occurrences,
                    used_fallback: batch.fallback_assets.contains(&asset.id),
                },
            );
        }
        Ok(batch)
    }

    pub fn record(&self, asset_id: &str) -> Result<&ScheduleRecord> {
        self.records
            .get(asset_id)
            .ok_or_else(|| EngineError::not_found(EntityKind::Asset, asset_id))
    }

    pub fn records(&self) -> impl Iterator<Item = &ScheduleRecord> {
        self.records.values()
    }

    pub fn remove(&mut self, asset_id: &str) -> Result<ScheduleRecord> {
        self.records
            .remove(asset_id)
            .ok_or_else(|| EngineError::not_found(EntityKind::Asset, asset_id))
    }

    /// Turn an asset's stored schedule into events in `store`. Returns the
    /// new event ids.
    pub fn publish(&self, asset_id: &str, store: &mut EventStore) -> Result<Vec<String>> {
        let record = self.record(asset_id)?;
        store.import_occurrences(&record.occurrences)
    }
}
