//! Inspection policy catalog.
//!
//! Maps inspection types to their default policy and asset types to the
//! inspection types that apply to them. Per-asset overrides replace
//! individual policy fields; anything an override leaves out falls back to
//! the catalog default.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EntityKind, Result};
use crate::event::Priority;
use crate::expander::{Frequency, RecurrenceRule};

/// Asset-type bucket used when an asset's type is missing or unrecognized.
pub const FALLBACK_ASSET_TYPE: &str = "Other";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InspectionFrequency {
    Daily,
    Weekly,
    Biweekly,
    Monthly,
    Quarterly,
    SemiAnnual,
    Annual,
    AsNeeded,
}

impl InspectionFrequency {
    /// Recurrence rule producing `count` occurrences, or `None` for
    /// `AsNeeded` (a single occurrence, no series).
    pub fn to_rule(self, count: u32) -> Option<RecurrenceRule> {
        let rule = match self {
            InspectionFrequency::Daily => RecurrenceRule::new(Frequency::Daily),
            InspectionFrequency::Weekly => RecurrenceRule::new(Frequency::Weekly),
            InspectionFrequency::Biweekly => RecurrenceRule::new(Frequency::Weekly).every(2),
            InspectionFrequency::Monthly => RecurrenceRule::new(Frequency::Monthly),
            InspectionFrequency::Quarterly => RecurrenceRule::new(Frequency::Monthly).every(3),
            InspectionFrequency::SemiAnnual => RecurrenceRule::new(Frequency::Monthly).every(6),
            InspectionFrequency::Annual => RecurrenceRule::new(Frequency::Yearly),
            InspectionFrequency::AsNeeded => return None,
        };
        Some(rule.count(count))
    }
}

/// Fully populated policy for one inspection type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectionPolicy {
    pub frequency: InspectionFrequency,
    pub duration_minutes: u32,
    pub priority: Priority,
    pub description: String,
    pub color: String,
    pub category: String,
    pub required_fields: BTreeSet<String>,
}

/// Per-asset partial policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyOverride {
    pub frequency: Option<InspectionFrequency>,
    pub duration_minutes: Option<u32>,
    pub priority: Option<Priority>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub category: Option<String>,
    pub required_fields: Option<BTreeSet<String>>,
}

impl InspectionPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.duration_minutes == 0 {
            return Err(EngineError::validation(
                "inspection duration must be at least 1 minute",
            ));
        }
        Ok(())
    }

    /// Overlay `patch` on this policy. The merged policy is validated.
    pub fn merged(&self, patch: &PolicyOverride) -> Result<InspectionPolicy> {
        let merged = InspectionPolicy {
            frequency: patch.frequency.unwrap_or(self.frequency),
            duration_minutes: patch.duration_minutes.unwrap_or(self.duration_minutes),
            priority: patch.priority.unwrap_or(self.priority),
            description: patch
                .description
                .clone()
                .unwrap_or_else(|| self.description.clone()),
            color: patch.color.clone().unwrap_or_else(|| self.color.clone()),
            category: patch.category.clone().unwrap_or_else(|| self.category.clone()),
            required_fields: patch
                .required_fields
                .clone()
                .unwrap_or_else(|| self.required_fields.clone()),
        };
        merged.validate()?;
        Ok(merged)
    }
}

/// Prefix a validation message with the policy it concerns.
fn prefixed(context: String, err: EngineError) -> EngineError {
    match err {
        EngineError::Validation(message) => EngineError::validation(format!("{}: {}", context, message)),
        other => other,
    }
}

/// Applicable inspection types for an asset type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicableTypes {
    pub types: Vec<String>,
    /// The asset type was missing or unknown and the fallback bucket was used.
    pub used_fallback: bool,
}

/// Immutable-by-default policy tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyCatalog {
    policies: BTreeMap<String, InspectionPolicy>,
    asset_types: BTreeMap<String, Vec<String>>,
}

impl Default for PolicyCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl PolicyCatalog {
    /// Empty catalog; populate with [`PolicyCatalog::with_policy`] and
    /// [`PolicyCatalog::with_asset_type`].
    pub fn empty() -> Self {
        Self {
            policies: BTreeMap::new(),
            asset_types: BTreeMap::new(),
        }
    }

    /// The built-in inspection catalog.
    pub fn standard() -> Self {
        use InspectionFrequency::*;

        let entries: [(&str, InspectionFrequency, u32, Priority, &str, &str, &str, &[&str]); 13] = [
            ("Safety Check", Monthly, 60, Priority::High, "Routine safety walkthrough", "#ef4444", "Safety", &["inspector", "checklist", "hazards_found"]),
            ("Maintenance Inspection", Quarterly, 120, Priority::Medium, "Preventive maintenance review", "#f59e0b", "Maintenance", &["inspector", "condition_rating", "work_orders"]),
            ("Compliance Audit", Annual, 240, Priority::High, "Regulatory compliance audit", "#8b5cf6", "Compliance", &["auditor", "regulations", "findings", "corrective_actions"]),
            ("Fire Safety Inspection", SemiAnnual, 90, Priority::High, "Extinguishers, alarms and egress check", "#dc2626", "Safety", &["inspector", "extinguishers", "alarms", "exits"]),
            ("HVAC Inspection", Quarterly, 90, Priority::Medium, "Heating, ventilation and cooling service", "#06b6d4", "Maintenance", &["technician", "filters", "refrigerant_level"]),
            ("Electrical Inspection", Annual, 120, Priority::High, "Panel, wiring and grounding inspection", "#eab308", "Safety", &["electrician", "panels", "grounding"]),
            ("Plumbing Inspection", SemiAnnual, 60, Priority::Medium, "Supply, drainage and fixture check", "#3b82f6", "Maintenance", &["plumber", "leaks", "pressure"]),
            ("Structural Inspection", Annual, 180, Priority::High, "Foundation, frame and envelope survey", "#78716c", "Structural", &["engineer", "defects", "photos"]),
            ("Equipment Calibration", Monthly, 45, Priority::Medium, "Calibration against reference standards", "#14b8a6", "Equipment", &["technician", "readings", "tolerance"]),
            ("Vehicle Inspection", Monthly, 45, Priority::Medium, "Roadworthiness and fluids check", "#22c55e", "Fleet", &["inspector", "odometer", "defects"]),
            ("Pre-Use Check", Daily, 15, Priority::Low, "Operator pre-use checklist", "#84cc16", "Equipment", &["operator", "checklist"]),
            ("Environmental Assessment", Annual, 240, Priority::Medium, "Emissions, waste and spill controls review", "#10b981", "Environmental", &["assessor", "emissions", "waste_records"]),
            ("General Inspection", AsNeeded, 60, Priority::Low, "General condition inspection", "#6b7280", "General", &["inspector", "notes"]),
        ];

        let mut catalog = Self::empty();
        for (name, frequency, duration_minutes, priority, description, color, category, fields) in entries {
            catalog = catalog.with_policy(
                name,
                InspectionPolicy {
                    frequency,
                    duration_minutes,
                    priority,
                    description: description.to_string(),
                    color: color.to_string(),
                    category: category.to_string(),
                    required_fields: fields.iter().map(|f| f.to_string()).collect(),
                },
            );
        }

        catalog
            .with_asset_type(
                "Residential Property",
                &["Safety Check", "Maintenance Inspection", "Compliance Audit"],
            )
            .with_asset_type(
                "Commercial Property",
                &["Safety Check", "Fire Safety Inspection", "HVAC Inspection", "Compliance Audit"],
            )
            .with_asset_type(
                "Industrial Facility",
                &[
                    "Safety Check",
                    "Fire Safety Inspection",
                    "Electrical Inspection",
                    "Structural Inspection",
                    "Environmental Assessment",
                ],
            )
            .with_asset_type(
                "Equipment",
                &["Equipment Calibration", "Pre-Use Check", "Maintenance Inspection"],
            )
            .with_asset_type("Vehicle", &["Vehicle Inspection", "Maintenance Inspection"])
            .with_asset_type(
                "Infrastructure",
                &["Structural Inspection", "Electrical Inspection", "Safety Check"],
            )
            .with_asset_type(FALLBACK_ASSET_TYPE, &["General Inspection"])
    }

    /// Load a catalog from its JSON form.
    pub fn from_json(json: &str) -> Result<Self> {
        let catalog: PolicyCatalog = serde_json::from_str(json)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Every policy must be well formed, every asset-type mapping must
    /// reference known policies, and the fallback bucket must exist.
    pub fn validate(&self) -> Result<()> {
        for (name, policy) in &self.policies {
            policy
                .validate()
                .map_err(|e| prefixed(format!("policy '{}'", name), e))?;
        }
        for (asset_type, types) in &self.asset_types {
            if let Some(missing) = types.iter().find(|t| !self.policies.contains_key(*t)) {
                return Err(EngineError::validation(format!(
                    "asset type '{}' references unknown inspection type '{}'",
                    asset_type, missing
                )));
            }
        }
        if !self.asset_types.contains_key(FALLBACK_ASSET_TYPE) {
            return Err(EngineError::validation(format!(
                "catalog has no '{}' asset type bucket",
                FALLBACK_ASSET_TYPE
            )));
        }
        Ok(())
    }

    pub fn with_policy(mut self, name: impl Into<String>, policy: InspectionPolicy) -> Self {
        self.policies.insert(name.into(), policy);
        self
    }

    pub fn with_asset_type(mut self, asset_type: impl Into<String>, types: &[&str]) -> Self {
        self.asset_types.insert(
            asset_type.into(),
            types.iter().map(|t| t.to_string()).collect(),
        );
        self
    }

    pub fn policy(&self, inspection_type: &str) -> Option<&InspectionPolicy> {
        self.policies.get(inspection_type)
    }

    pub fn policies(&self) -> impl Iterator<Item = (&str, &InspectionPolicy)> {
        self.policies.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn asset_types(&self) -> impl Iterator<Item = &str> {
        self.asset_types.keys().map(|k| k.as_str())
    }

    /// Inspection types for `asset_type`, falling back to the `"Other"`
    /// bucket when the type is missing or not in the catalog.
    pub fn inspection_types_for(&self, asset_type: Option<&str>) -> ApplicableTypes {
        if let Some(types) = asset_type.and_then(|t| self.asset_types.get(t)) {
            return ApplicableTypes {
                types: types.clone(),
                used_fallback: false,
            };
        }
        ApplicableTypes {
            types: self
                .asset_types
                .get(FALLBACK_ASSET_TYPE)
                .cloned()
                .unwrap_or_default(),
            used_fallback: true,
        }
    }

    /// Catalog policy for `inspection_type` with an optional override applied.
    ///
    /// # Errors
    /// `EngineError::Validation` when an override names a type the catalog
    /// does not know or the resulting policy is malformed (a zero
    /// duration); `EngineError::NotFound` for a plain lookup miss.
    pub fn resolve(
        &self,
        inspection_type: &str,
        patch: Option<&PolicyOverride>,
    ) -> Result<InspectionPolicy> {
        match (self.policies.get(inspection_type), patch) {
            (Some(base), Some(patch)) => base
                .merged(patch)
                .map_err(|e| prefixed(format!("override for '{}'", inspection_type), e)),
            (Some(base), None) => base
                .validate()
                .map(|_| base.clone())
                .map_err(|e| prefixed(format!("policy '{}'", inspection_type), e)),
            (None, Some(_)) => Err(EngineError::validation(format!(
                "override for unknown inspection type '{}'",
                inspection_type
            ))),
            (None, None) => Err(EngineError::not_found(
                EntityKind::InspectionType,
                inspection_type,
            )),
        }
    }
}
