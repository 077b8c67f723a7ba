//! Integration tests for the `sched` CLI binary.
//!
//! These tests use `assert_cmd` and `predicates` to exercise the grid, expand,
//! catalog and schedule subcommands through the actual binary, including
//! stdin piping, file output, config loading and error reporting.

// `Command::cargo_bin` was deprecated in assert_cmd 2.1.2 in favor of
// `cargo::cargo_bin_cmd!`. Allow it until we migrate.
#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;

/// Helper: path to the assets.json fixture.
fn assets_path() -> &'static str {
    concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/assets.json")
}

/// Helper: path to the engine.json config fixture.
fn config_path() -> &'static str {
    concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/engine.json")
}

fn sched() -> Command {
    Command::cargo_bin("sched").unwrap()
}

fn stdout_json(cmd: &mut Command) -> serde_json::Value {
    let output = cmd.output().expect("binary runs");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

// ─────────────────────────────────────────────────────────────────────────────
// grid
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn grid_month_text() {
    sched()
        .args(["grid", "--date", "2025-03-10"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("March 2025\n"))
        .stdout(predicate::str::contains(" Su  Mo  Tu  We  Th  Fr  Sa"))
        // Leading February and trailing April cells are marked.
        .stdout(predicate::str::contains("(23)"))
        .stdout(predicate::str::contains("( 5)"));
}

#[test]
fn grid_month_json_has_42_cells() {
    let cells = stdout_json(sched().args(["grid", "--date", "2025-03-10", "--json"]));
    let cells = cells.as_array().unwrap();

    assert_eq!(cells.len(), 42);
    assert_eq!(cells[0]["date"], "2025-02-23");
    assert_eq!(cells[0]["in_month"], false);
    assert_eq!(cells[21]["in_month"], true);
}

#[test]
fn grid_week_json() {
    let cells = stdout_json(sched().args(["grid", "--date", "2025-03-12", "--view", "week", "--json"]));
    let dates: Vec<&str> = cells
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["date"].as_str().unwrap())
        .collect();
    assert_eq!(dates.first(), Some(&"2025-03-09"));
    assert_eq!(dates.last(), Some(&"2025-03-15"));
}

#[test]
fn grid_rejects_bad_date() {
    sched()
        .args(["grid", "--date", "2025-02-30"])
        .assert()
        .failure();
}

// ─────────────────────────────────────────────────────────────────────────────
// expand
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn expand_monthly_clamps_to_month_end() {
    let expansion = stdout_json(sched().args([
        "expand",
        "--start",
        "2025-01-31T09:00:00",
        "--freq",
        "monthly",
        "--count",
        "3",
    ]));

    let starts: Vec<&str> = expansion["events"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["start"].as_str().unwrap())
        .collect();
    assert_eq!(
        starts,
        vec!["2025-01-31T09:00:00", "2025-02-28T09:00:00", "2025-03-31T09:00:00"]
    );
    assert_eq!(expansion["capped"], false);
    assert_eq!(expansion["events"][0]["end"], "2025-01-31T10:00:00");
}

#[test]
fn expand_weekly_days() {
    let expansion = stdout_json(sched().args([
        "expand",
        "--start",
        "2025-03-10T08:00:00",
        "--freq",
        "weekly",
        "--days",
        "1,3,5",
        "--count",
        "4",
        "--duration",
        "30",
    ]));

    assert_eq!(expansion["events"].as_array().unwrap().len(), 4);
    assert_eq!(expansion["events"][3]["start"], "2025-03-17T08:00:00");
    assert_eq!(expansion["events"][3]["end"], "2025-03-17T08:30:00");
}

#[test]
fn expand_open_ended_rule_is_capped_by_config() {
    let dir = std::env::temp_dir().join(format!("sched-cli-cap-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let config = dir.join("engine.json");
    std::fs::write(&config, r#"{"hard_cap": 5}"#).unwrap();

    let expansion = stdout_json(sched().args([
        "--config",
        config.to_str().unwrap(),
        "expand",
        "--start",
        "2025-03-10T08:00:00",
        "--freq",
        "daily",
    ]));

    assert_eq!(expansion["events"].as_array().unwrap().len(), 5);
    assert_eq!(expansion["capped"], true);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn expand_rejects_two_end_conditions() {
    sched()
        .args([
            "expand",
            "--start",
            "2025-03-10T08:00:00",
            "--freq",
            "daily",
            "--count",
            "3",
            "--until",
            "2025-04-01",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("multiple end conditions"));
}

#[test]
fn expand_rejects_zero_interval() {
    sched()
        .args([
            "expand",
            "--start",
            "2025-03-10T08:00:00",
            "--freq",
            "daily",
            "--interval",
            "0",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid recurrence rule"));
}

// ─────────────────────────────────────────────────────────────────────────────
// catalog
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn catalog_for_asset_type() {
    let policies = stdout_json(sched().args(["catalog", "--asset-type", "Residential Property"]));
    let names: Vec<&String> = policies.as_object().unwrap().keys().collect();

    assert_eq!(names, vec!["Safety Check", "Maintenance Inspection", "Compliance Audit"]);
    assert_eq!(policies["Safety Check"]["frequency"], "monthly");
}

#[test]
fn catalog_unknown_asset_type_falls_back() {
    sched()
        .args(["catalog", "--asset-type", "Spaceship"])
        .assert()
        .success()
        .stdout(predicate::str::contains("General Inspection"))
        .stderr(predicate::str::contains("fallback"));
}

#[test]
fn catalog_full_dump() {
    let catalog = stdout_json(sched().arg("catalog"));
    assert!(catalog["policies"]["HVAC Inspection"].is_object());
    assert!(catalog["asset_types"]["Other"].is_array());
}

// ─────────────────────────────────────────────────────────────────────────────
// schedule
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn schedule_json_from_file() {
    let batch = stdout_json(sched().args(["schedule", "-i", assets_path(), "--start", "2025-03-10"]));

    // 3 types x 12 + one as-needed each for the other two assets.
    assert_eq!(batch["schedule"].as_array().unwrap().len(), 38);
    assert_eq!(batch["fallback_assets"], serde_json::json!(["a-3"]));
    assert!(!batch["conflicts"].as_array().unwrap().is_empty());
}

#[test]
fn schedule_from_stdin_with_options() {
    let assets = std::fs::read_to_string(assets_path()).unwrap();
    let batch = stdout_json(
        sched()
            .args([
                "schedule",
                "--start",
                "2025-03-10",
                "--count",
                "1",
                "--assignee",
                "R. Diaz",
                "--strategy",
                "manual",
            ])
            .write_stdin(assets),
    );

    let schedule = batch["schedule"].as_array().unwrap();
    assert_eq!(schedule.len(), 5);
    assert!(schedule.iter().all(|o| o["assigned_to"] == "R. Diaz"));
    // Manual resolution leaves everything on the start date.
    assert!(schedule
        .iter()
        .all(|o| o["scheduled_date"] == "2025-03-10T09:00:00"));
    assert_eq!(batch["conflicts"][0]["count"], 5);
}

#[test]
fn schedule_ics_uses_config_timezone() {
    sched()
        .args([
            "--config",
            config_path(),
            "schedule",
            "-i",
            assets_path(),
            "--start",
            "2025-03-10",
            "--format",
            "ics",
        ])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("BEGIN:VCALENDAR\r\n"))
        .stdout(predicate::str::contains("DTSTART:20250310T130000Z"))
        .stdout(predicate::str::contains("SUMMARY:Safety Check - Elm Street Duplex"))
        .stdout(predicate::str::contains("BEGIN:VEVENT").count(8));
}

#[test]
fn schedule_csv_to_file() {
    let dir = std::env::temp_dir().join(format!("sched-cli-csv-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let out = dir.join("inspections.csv");

    sched()
        .args([
            "schedule",
            "-i",
            assets_path(),
            "--start",
            "2025-03-10",
            "--count",
            "2",
            "--format",
            "csv",
            "-o",
            out.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let csv = std::fs::read_to_string(&out).unwrap();
    let rows = schedule_engine::parse_csv(&csv).unwrap();
    assert_eq!(rows.len(), 8);
    assert!(rows.iter().any(|r| r.asset == "Mystery Shed" && r.kind == "inspection"));
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn schedule_rejects_unknown_strategy() {
    sched()
        .args([
            "schedule",
            "-i",
            assets_path(),
            "--start",
            "2025-03-10",
            "--strategy",
            "shuffle",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid --strategy"));
}

#[test]
fn schedule_missing_input_file() {
    sched()
        .args(["schedule", "-i", "/nonexistent/assets.json", "--start", "2025-03-10"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read file"));
}

#[test]
fn schedule_rejects_malformed_assets() {
    sched()
        .args(["schedule", "--start", "2025-03-10"])
        .write_stdin("{not json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse assets JSON"));
}

#[test]
fn invalid_config_file_is_reported() {
    let dir = std::env::temp_dir().join(format!("sched-cli-config-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let config = dir.join("engine.json");
    std::fs::write(&config, r#"{"timezone": "Nowhere/Special"}"#).unwrap();

    sched()
        .args(["--config", config.to_str().unwrap(), "grid", "--date", "2025-03-10"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid config file"));
    std::fs::remove_dir_all(&dir).ok();
}
