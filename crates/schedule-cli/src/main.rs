//! `sched` CLI: calendar grids, recurrence expansion and inspection
//! schedules from the command line.
//!
//! ## Usage
//!
//! ```sh
//! # Month grid around a date
//! sched grid --date 2025-03-10
//!
//! # Expand a recurrence rule to JSON
//! sched expand --start 2025-01-31T09:00:00 --freq monthly --count 3
//!
//! # Inspection types for an asset type
//! sched catalog --asset-type "Residential Property"
//!
//! # Batch schedule, conflict-resolved, as ICS
//! sched schedule -i assets.json --start 2025-03-10 --format ics -o inspections.ics
//!
//! # Engine settings from a file, with debug logging
//! sched -vv --config engine.json schedule -i assets.json --start 2025-03-10
//! ```

use anyhow::{Context, Result};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand, ValueEnum};
use schedule_engine::calendar::{self, in_month, ViewMode};
use schedule_engine::expander::{expand, Frequency, MonthlyPattern, RecurrenceRule, RecurrenceSpec};
use schedule_engine::policy::PolicyCatalog;
use schedule_engine::{
    to_csv, to_ics, Asset, EngineConfig, EventStore, IcsOptions, InspectionScheduler, ResolutionStrategy,
};
use std::io::{self, Read};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "sched",
    version,
    about = "Recurring-event and inspection scheduling CLI"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Engine configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the calendar cells of a month, week or day view
    Grid {
        /// Anchor date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
        #[arg(long, value_enum, default_value_t = ViewArg::Month)]
        view: ViewArg,
        /// Emit JSON instead of a text grid
        #[arg(long)]
        json: bool,
    },
    /// Expand a recurrence rule into concrete occurrences (JSON)
    Expand {
        /// Seed start (YYYY-MM-DDTHH:MM:SS)
        #[arg(long)]
        start: NaiveDateTime,
        #[arg(long, value_enum)]
        freq: FreqArg,
        #[arg(long)]
        interval: Option<u32>,
        /// Comma-separated weekday indices, 0 = Sunday (weekly rules)
        #[arg(long, value_delimiter = ',')]
        days: Vec<u8>,
        /// Monthly rules repeat on the seed's nth weekday instead of its date
        #[arg(long)]
        by_day: bool,
        #[arg(long)]
        count: Option<u32>,
        /// Last date (inclusive, YYYY-MM-DD)
        #[arg(long)]
        until: Option<NaiveDate>,
        /// Length of each occurrence in minutes
        #[arg(long, default_value_t = 60)]
        duration: i64,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Show the inspection policy catalog
    Catalog {
        /// Only the inspection types that apply to this asset type
        #[arg(long)]
        asset_type: Option<String>,
        /// Custom catalog file (JSON); the standard catalog if omitted
        #[arg(long)]
        catalog: Option<String>,
    },
    /// Generate a conflict-resolved inspection schedule for a list of assets
    Schedule {
        /// Assets file, a JSON array (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// First inspection date (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,
        /// Occurrences per recurring inspection type
        #[arg(long)]
        count: Option<u32>,
        /// Conflict resolution: spread, stack or manual
        #[arg(long)]
        strategy: Option<String>,
        /// Inspector for every occurrence (defaults to each asset's manager)
        #[arg(long)]
        assignee: Option<String>,
        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,
        /// Custom catalog file (JSON); the standard catalog if omitted
        #[arg(long)]
        catalog: Option<String>,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ViewArg {
    Month,
    Week,
    Day,
}

impl From<ViewArg> for ViewMode {
    fn from(view: ViewArg) -> Self {
        match view {
            ViewArg::Month => ViewMode::Month,
            ViewArg::Week => ViewMode::Week,
            ViewArg::Day => ViewMode::Day,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum FreqArg {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl From<FreqArg> for Frequency {
    fn from(freq: FreqArg) -> Self {
        match freq {
            FreqArg::Daily => Frequency::Daily,
            FreqArg::Weekly => Frequency::Weekly,
            FreqArg::Monthly => Frequency::Monthly,
            FreqArg::Yearly => Frequency::Yearly,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Ics,
    Csv,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Grid { date, view, json } => {
            let rendered = render_grid(view.into(), date, json)?;
            print!("{}", rendered);
        }
        Commands::Expand {
            start,
            freq,
            interval,
            days,
            by_day,
            count,
            until,
            duration,
            output,
        } => {
            let spec = RecurrenceSpec {
                frequency: Some(freq.into()),
                interval,
                days_of_week: days,
                monthly_pattern: by_day.then_some(MonthlyPattern::ByDay),
                count,
                until,
            };
            let rule = RecurrenceRule::try_from(spec).context("Invalid recurrence rule")?;
            let expansion = expand(start, &rule, Duration::minutes(duration), config.hard_cap)
                .context("Failed to expand recurrence")?;
            if expansion.capped {
                tracing::warn!(cap = config.hard_cap, "expansion stopped at the hard cap");
            }
            let json = serde_json::to_string_pretty(&expansion)?;
            write_output(output.as_deref(), &format!("{}\n", json))?;
        }
        Commands::Catalog {
            asset_type,
            catalog,
        } => {
            let catalog = load_catalog(catalog.as_deref())?;
            let json = match asset_type {
                Some(asset_type) => {
                    let applicable = catalog.inspection_types_for(Some(&asset_type));
                    if applicable.used_fallback {
                        tracing::warn!(asset_type = %asset_type, "unknown asset type; showing the fallback bucket");
                    }
                    let policies: serde_json::Map<String, serde_json::Value> = applicable
                        .types
                        .iter()
                        .filter_map(|name| catalog.policy(name).map(|p| (name, p)))
                        .map(|(name, policy)| -> Result<(String, serde_json::Value)> {
                            Ok((name.clone(), serde_json::to_value(policy)?))
                        })
                        .collect::<Result<_>>()?;
                    serde_json::to_string_pretty(&policies)?
                }
                None => serde_json::to_string_pretty(&catalog)?,
            };
            println!("{}", json);
        }
        Commands::Schedule {
            input,
            start,
            count,
            strategy,
            assignee,
            format,
            catalog,
            output,
        } => {
            let raw = read_input(input.as_deref())?;
            let assets: Vec<Asset> = serde_json::from_str(&raw).context("Failed to parse assets JSON")?;
            let catalog = load_catalog(catalog.as_deref())?;

            let mut scheduler = InspectionScheduler::from_config(catalog, &config);
            let mut options = scheduler.options();
            if let Some(count) = count {
                options = options.with_count(count);
            }
            if let Some(strategy) = strategy {
                let strategy: ResolutionStrategy = strategy.parse().context("Invalid --strategy")?;
                options = options.with_strategy(strategy);
            }
            if let Some(assignee) = assignee {
                options = options.with_assignee(assignee);
            }

            let batch = scheduler
                .schedule_assets(&assets, start, &options)
                .context("Failed to generate schedule")?;
            tracing::info!(
                assets = assets.len(),
                occurrences = batch.schedule.len(),
                conflicts = batch.conflicts.len(),
                "schedule generated"
            );

            let rendered = match format {
                Format::Json => format!("{}\n", serde_json::to_string_pretty(&batch)?),
                Format::Ics | Format::Csv => {
                    let mut store = EventStore::from_config(&config);
                    for asset in &assets {
                        scheduler
                            .publish(&asset.id, &mut store)
                            .with_context(|| format!("Failed to publish schedule for asset {}", asset.id))?;
                    }
                    match format {
                        Format::Ics => {
                            let ics_options = IcsOptions::from_config(&config)?;
                            to_ics(store.events(), &ics_options)
                        }
                        _ => to_csv(store.events()),
                    }
                }
            };
            write_output(output.as_deref(), &rendered)?;
        }
    }

    Ok(())
}

/// Log to stderr. `RUST_LOG` wins over `-v`.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_config(path: Option<&str>) -> Result<EngineConfig> {
    match path {
        Some(path) => {
            let raw = read_input(Some(path))?;
            EngineConfig::from_json(&raw).with_context(|| format!("Invalid config file: {}", path))
        }
        None => Ok(EngineConfig::default()),
    }
}

fn load_catalog(path: Option<&str>) -> Result<PolicyCatalog> {
    match path {
        Some(path) => {
            let raw = read_input(Some(path))?;
            PolicyCatalog::from_json(&raw).with_context(|| format!("Invalid catalog file: {}", path))
        }
        None => Ok(PolicyCatalog::standard()),
    }
}

fn render_grid(view: ViewMode, anchor: NaiveDate, json: bool) -> Result<String> {
    let cells: Vec<NaiveDate> = match view {
        ViewMode::Month => calendar::month_grid(anchor).to_vec(),
        ViewMode::Week => calendar::week_days(anchor).to_vec(),
        ViewMode::Day => vec![anchor],
    };

    if json {
        let cells: Vec<serde_json::Value> = cells
            .iter()
            .map(|d| serde_json::json!({ "date": d, "in_month": in_month(*d, anchor) }))
            .collect();
        return Ok(format!("{}\n", serde_json::to_string_pretty(&cells)?));
    }

    let mut out = format!("{}\n", anchor.format("%B %Y"));
    if view == ViewMode::Day {
        out.push_str(&format!("{}\n", anchor.format("%A %d")));
        return Ok(out);
    }
    out.push_str(" Su  Mo  Tu  We  Th  Fr  Sa\n");
    for week in cells.chunks(7) {
        let row: Vec<String> = week
            .iter()
            .map(|d| {
                if in_month(*d, anchor) {
                    format!(" {:>2} ", d.day())
                } else {
                    format!("({:>2})", d.day())
                }
            })
            .collect();
        out.push_str(row.join("").trim_end());
        out.push('\n');
    }
    Ok(out)
}

fn read_input(path: Option<&str>) -> Result<String> {
    match path {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path))
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            Ok(buf)
        }
    }
}

fn write_output(path: Option<&str>, content: &str) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write file: {}", path))?;
        }
        None => {
            print!("{}", content);
        }
    }
    Ok(())
}
