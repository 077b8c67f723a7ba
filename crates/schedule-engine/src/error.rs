//! Error types for schedule-engine operations.

use thiserror::Error;

/// What kind of entity a [`EngineError::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Event,
    Series,
    Asset,
    InspectionType,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntityKind::Event => "event",
            EntityKind::Series => "series",
            EntityKind::Asset => "asset",
            EntityKind::InspectionType => "inspection type",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed rule, event, override or configuration. Raised where the
    /// value is constructed or merged, never coerced.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown {kind}: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        EngineError::Validation(message.into())
    }

    pub(crate) fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            kind,
            id: id.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
