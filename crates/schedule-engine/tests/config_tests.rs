//! Tests for engine configuration loading.

use chrono::NaiveTime;
use chrono_tz::Tz;
use schedule_engine::dst::DstPolicy;
use schedule_engine::schedule::ScheduleOptions;
use schedule_engine::{EngineConfig, EngineError, IcsOptions, ResolutionStrategy};

#[test]
fn defaults() {
    let config = EngineConfig::default();
    assert_eq!(config.hard_cap, 365);
    assert_eq!(config.occurrence_count, 12);
    assert_eq!(config.start_time, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
    assert_eq!(config.strategy, ResolutionStrategy::Spread);
    assert_eq!(config.tz().unwrap(), Tz::UTC);
    assert!(config.validate().is_ok());
}

#[test]
fn empty_object_is_the_default() {
    assert_eq!(EngineConfig::from_json("{}").unwrap(), EngineConfig::default());
}

#[test]
fn partial_config_overrides_fields() {
    let json = r#"{
        "occurrence_count": 6,
        "start_time": "07:30:00",
        "strategy": "stack",
        "stack_window": {"start": "07:00:00", "end": "15:00:00"},
        "timezone": "America/Chicago",
        "dst_policy": "skip"
    }"#;
    let config = EngineConfig::from_json(json).unwrap();

    assert_eq!(config.occurrence_count, 6);
    assert_eq!(config.start_time, NaiveTime::from_hms_opt(7, 30, 0).unwrap());
    assert_eq!(config.strategy, ResolutionStrategy::Stack);
    assert_eq!(config.stack_window.end, NaiveTime::from_hms_opt(15, 0, 0).unwrap());
    assert_eq!(config.dst_policy, DstPolicy::Skip);
    assert_eq!(config.hard_cap, 365);

    let options = ScheduleOptions::from_config(&config);
    assert_eq!(options.occurrence_count, 6);
    assert_eq!(options.strategy, ResolutionStrategy::Stack);

    let ics = IcsOptions::from_config(&config).unwrap();
    assert_eq!(ics.timezone, Tz::America__Chicago);
}

#[test]
fn unknown_fields_are_rejected() {
    let err = EngineConfig::from_json(r#"{"occurence_count": 6}"#).unwrap_err();
    assert!(matches!(err, EngineError::Json(_)));
}

#[test]
fn invalid_values_are_rejected() {
    for json in [
        r#"{"hard_cap": 0}"#,
        r#"{"occurrence_count": 0}"#,
        r#"{"stack_window": {"start": "17:00:00", "end": "09:00:00"}}"#,
    ] {
        assert!(
            matches!(EngineConfig::from_json(json), Err(EngineError::Validation(_))),
            "{}",
            json
        );
    }
    assert!(matches!(
        EngineConfig::from_json(r#"{"timezone": "Nowhere/Special"}"#),
        Err(EngineError::InvalidTimezone(_))
    ));
}
