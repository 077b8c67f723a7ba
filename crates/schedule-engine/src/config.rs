//! Engine configuration.
//!
//! Every field has a default, so a config file only lists what it changes:
//!
//! ```
//! use schedule_engine::EngineConfig;
//!
//! let config = EngineConfig::from_json(r#"{"occurrence_count": 4, "timezone": "Europe/London"}"#).unwrap();
//! assert_eq!(config.occurrence_count, 4);
//! assert_eq!(config.hard_cap, 365);
//! ```

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::conflict::{ResolutionStrategy, StackWindow};
use crate::dst::{self, DstPolicy};
use crate::error::{EngineError, Result};
use crate::expander::DEFAULT_HARD_CAP;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Upper bound on occurrences per expansion.
    pub hard_cap: usize,
    /// Occurrences generated per recurring inspection type.
    pub occurrence_count: u32,
    /// Time of day for generated inspections.
    pub start_time: NaiveTime,
    pub strategy: ResolutionStrategy,
    pub stack_window: StackWindow,
    /// IANA timezone the engine's local timestamps are expressed in.
    pub timezone: String,
    pub dst_policy: DstPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hard_cap: DEFAULT_HARD_CAP,
            occurrence_count: 12,
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            strategy: ResolutionStrategy::Spread,
            stack_window: StackWindow::default(),
            timezone: "UTC".to_string(),
            dst_policy: DstPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.hard_cap == 0 {
            return Err(EngineError::validation("hard_cap must be at least 1"));
        }
        if self.occurrence_count == 0 {
            return Err(EngineError::validation("occurrence_count must be at least 1"));
        }
        self.stack_window.validate()?;
        self.tz()?;
        Ok(())
    }

    pub fn tz(&self) -> Result<Tz> {
        dst::parse_timezone(&self.timezone)
    }
}
