//! `verbal`: administrative command line for the case-records store.
//!
//! Reads `verbal.toml` (or the path given with `--config`), opens the SQLite
//! store and prints query results as JSON.
//!
//! # Usage
//!
//! ```
//! verbal init
//! verbal browse --adherent 6f1c… --status control --town 0b2e…
//! verbal report table --origin agent --nature hut
//! verbal map minutes --adherent 6f1c… --closure regularized
//! verbal refresh-status 2d0a… 91be…
//! ```

mod notifier;
mod settings;

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;
use verbal_core::{
  control::ControlState,
  folder::FolderNature,
  lifecycle::refresh_status,
  minute::{ClosureStatus, MinuteStatus, Origin},
  numbering::year_key,
  plot::Risk,
  query::{
    AreaFilter, BoundingBox, BrowseFilter, CallerContext, DateRange, LocalScope, OverallFilter,
    StatsFilter,
  },
  store::CaseStore,
};
use verbal_store_sqlite::SqliteStore;

use crate::{notifier::Notifier, settings::Settings};

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "verbal", version, about = "Code-enforcement case records")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "verbal.toml", env = "VERBAL_CONFIG")]
  config: PathBuf,

  /// Override the configured store path.
  #[arg(long, value_name = "FILE")]
  store: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Create the store file and schema if missing.
  Init,

  /// List minutes as a caseworker sees them.
  Browse(BrowseArgs),

  /// Reporting extracts.
  #[command(subcommand)]
  Report(Report),

  /// Geocoded points for the map views.
  #[command(subcommand)]
  Map(Map),

  /// Control listings.
  #[command(subcommand)]
  Controls(Controls),

  /// Recompute, persist and announce the status of minutes.
  RefreshStatus {
    #[arg(required = true)]
    minutes: Vec<Uuid>,
  },

  /// Print a minute with everything attached to it.
  Show {
    /// Minute id.
    #[arg(required_unless_present = "control")]
    minute: Option<Uuid>,

    /// Look the minute up through one of its controls instead.
    #[arg(long, conflicts_with = "minute")]
    control: Option<Uuid>,
  },

  /// The case number the next minute would receive.
  NextNumber {
    /// Two-digit year; defaults to the current year.
    #[arg(long)]
    year: Option<u32>,
  },
}

#[derive(Args, Debug)]
struct BrowseArgs {
  /// Caseworker the listing is run as.
  #[arg(long)]
  adherent: Uuid,

  /// Run with administrator visibility.
  #[arg(long)]
  admin: bool,

  #[arg(long)]
  from: Option<NaiveDate>,

  #[arg(long)]
  to: Option<NaiveDate>,

  /// Case number fragment.
  #[arg(long)]
  num: Option<String>,

  #[arg(long = "status")]
  statuses: Vec<MinuteStatus>,

  /// Restrict to minutes of these caseworkers (unrestricted callers only).
  #[arg(long = "responsible")]
  adherents: Vec<Uuid>,

  /// Plot town.
  #[arg(long = "town")]
  towns: Vec<Uuid>,

  /// Plot intercommunal.
  #[arg(long = "interco")]
  intercommunals: Vec<Uuid>,

  #[arg(long = "adherent-town")]
  adherent_towns: Vec<Uuid>,

  #[arg(long = "adherent-interco")]
  adherent_intercommunals: Vec<Uuid>,

  #[arg(long = "service")]
  services: Vec<Uuid>,
}

#[derive(Args, Debug, Default)]
struct OverallArgs {
  #[arg(long)]
  from: Option<NaiveDate>,

  #[arg(long)]
  to: Option<NaiveDate>,

  #[arg(long = "responsible")]
  adherents: Vec<Uuid>,

  #[arg(long = "town")]
  plot_towns: Vec<Uuid>,

  #[arg(long = "adherent-town")]
  adherent_towns: Vec<Uuid>,

  #[arg(long = "adherent-interco")]
  adherent_intercommunals: Vec<Uuid>,

  #[arg(long = "service")]
  services: Vec<Uuid>,
}

#[derive(Subcommand, Debug)]
enum Report {
  /// One row per minute with caseworker, service and town.
  Overall(OverallArgs),

  /// Minute statistics with control counts and folder natures.
  Table {
    #[command(flatten)]
    overall: OverallArgs,

    #[arg(long = "origin")]
    origins: Vec<Origin>,

    #[arg(long = "risk")]
    risks: Vec<Risk>,

    #[arg(long = "nature")]
    natures: Vec<FolderNature>,
  },

  /// Minutes grouped by caseworker.
  Adherents {
    #[arg(long = "responsible", required = true)]
    adherents: Vec<Uuid>,
  },
}

#[derive(Args, Debug)]
struct LocalArgs {
  /// Limit to this caseworker's intercommunal, or town.
  #[arg(long)]
  adherent: Option<Uuid>,

  /// Include closed minutes with these closure statuses.
  #[arg(long = "closure")]
  closure_states: Vec<ClosureStatus>,
}

#[derive(Subcommand, Debug)]
enum Map {
  Minutes(LocalArgs),

  /// Minutes with no control, updating or decision yet.
  Spotting(LocalArgs),

  Controls {
    #[arg(long)]
    adherent: Option<Uuid>,
  },

  /// Minutes (or controls) inside a bounding box.
  Area {
    #[command(flatten)]
    local: LocalArgs,

    /// `min_lat,max_lat,min_lon,max_lon`
    #[arg(long, value_parser = parse_bbox, allow_hyphen_values = true)]
    bbox: Option<BoundingBox>,

    #[arg(long = "minute")]
    minutes: Vec<Uuid>,

    #[arg(long)]
    limit: Option<usize>,

    /// Return control points instead of minute points.
    #[arg(long)]
    controls: bool,
  },
}

#[derive(Subcommand, Debug)]
enum Controls {
  /// Controls of the given minutes (all when none) in the given states.
  Dates {
    #[arg(long = "minute")]
    minutes: Vec<Uuid>,

    #[arg(long = "state")]
    states: Vec<ControlState>,
  },

  Stats {
    #[arg(long = "state")]
    states: Vec<ControlState>,
  },

  /// Every control of one minute.
  Of { minute: Uuid },
}

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let mut settings = Settings::load(&cli.config)?;
  if let Some(store) = cli.store {
    settings.store_path = settings::expand_tilde(&store);
  }

  if let Some(parent) = settings.store_path.parent().filter(|p| !p.as_os_str().is_empty()) {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {}", parent.display()))?;
  }
  let store = SqliteStore::open(&settings.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", settings.store_path))?;

  match cli.command {
    Command::Init => {
      tracing::info!(path = ?settings.store_path, "store ready");
      Ok(())
    }
    Command::Browse(args) => browse(&store, &settings, args).await,
    Command::Report(report) => run_report(&store, report).await,
    Command::Map(map) => run_map(&store, map).await,
    Command::Controls(controls) => run_controls(&store, controls).await,
    Command::RefreshStatus { minutes } => {
      let notifier = Notifier::from_settings(&settings.notifier)?;
      let mut outcomes = Vec::with_capacity(minutes.len());
      for minute_id in minutes {
        let outcome = refresh_status(&store, &notifier, settings.history_policy, minute_id)
          .await
          .with_context(|| format!("failed to refresh minute {minute_id}"))?;
        outcomes.push(outcome);
      }
      print_json(&outcomes)
    }
    Command::Show { minute, control } => {
      let minute_id = match (minute, control) {
        (Some(id), _) => id,
        (None, Some(control_id)) => store
          .find_minute_by_control(control_id)
          .await?
          .with_context(|| format!("no single minute owns control {control_id}"))?,
        (None, None) => anyhow::bail!("a minute or a control id is required"),
      };
      let graph = store
        .get_minute(minute_id)
        .await?
        .with_context(|| format!("minute {minute_id} not found"))?;
      print_json(&graph)
    }
    Command::NextNumber { year } => {
      let year = year.unwrap_or_else(|| year_key(Utc::now()));
      print_json(&store.peek_next_number(year).await?)
    }
  }
}

// ─── Commands ────────────────────────────────────────────────────────────────

async fn browse(store: &SqliteStore, settings: &Settings, args: BrowseArgs) -> Result<()> {
  let adherent = store
    .get_adherent(args.adherent)
    .await?
    .with_context(|| format!("unknown adherent {}", args.adherent))?;
  let caller = CallerContext::from_adherent(&adherent, args.admin);
  let today = Utc::now().date_naive();

  let mut filter = BrowseFilter::defaults_for(&caller, &settings.browser, today);
  if args.from.is_some() || args.to.is_some() {
    filter.range = DateRange::days(
      args.from.unwrap_or(filter.range.start.date_naive()),
      args.to.unwrap_or(filter.range.end.date_naive()),
    );
  }
  filter.num = args.num;
  if !args.statuses.is_empty() {
    filter.statuses = args.statuses;
  }
  if !args.adherents.is_empty() {
    filter.adherents = args.adherents;
  }
  if !args.towns.is_empty() || !args.intercommunals.is_empty() {
    filter.plot_geo.towns = args.towns;
    filter.plot_geo.intercommunals = args.intercommunals;
  }
  filter.adherent_geo.towns = args.adherent_towns;
  filter.adherent_geo.intercommunals = args.adherent_intercommunals;
  filter.services = args.services;
  filter.clamp_span(&settings.browser, today);

  print_json(&store.find_minutes_browser(&caller, &filter).await?)
}

impl OverallArgs {
  fn into_filter(self) -> OverallFilter {
    let range = match (self.from, self.to) {
      (None, None) => None,
      (from, to) => Some(DateRange::days(
        from.unwrap_or_else(|| NaiveDate::from_ymd_opt(1, 1, 1).unwrap_or(NaiveDate::MIN)),
        to.unwrap_or_else(|| NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(NaiveDate::MAX)),
      )),
    };
    OverallFilter {
      range,
      adherents: self.adherents,
      plot_towns: self.plot_towns,
      adherent_towns: self.adherent_towns,
      adherent_intercommunals: self.adherent_intercommunals,
      services: self.services,
    }
  }
}

async fn run_report(store: &SqliteStore, report: Report) -> Result<()> {
  match report {
    Report::Overall(args) => print_json(&store.stat_minute_overall(&args.into_filter()).await?),
    Report::Table { overall, origins, risks, natures } => {
      let filter = StatsFilter {
        overall: overall.into_filter(),
        origins,
        risks,
        folder_natures: natures,
      };
      print_json(&store.stat_minutes(&filter).await?)
    }
    Report::Adherents { adherents } => {
      print_json(&store.stat_minutes_by_adherents(&adherents).await?)
    }
  }
}

async fn local_scope(store: &SqliteStore, adherent: Option<Uuid>) -> Result<Option<LocalScope>> {
  let Some(adherent_id) = adherent else { return Ok(None) };
  let adherent = store
    .get_adherent(adherent_id)
    .await?
    .with_context(|| format!("unknown adherent {adherent_id}"))?;
  Ok(LocalScope::of(&adherent))
}

async fn run_map(store: &SqliteStore, map: Map) -> Result<()> {
  match map {
    Map::Minutes(args) => {
      let local = local_scope(store, args.adherent).await?;
      print_json(&store.find_minutes_with_geocode(local, &args.closure_states).await?)
    }
    Map::Spotting(args) => {
      let local = local_scope(store, args.adherent).await?;
      print_json(&store.find_spotting_with_geocode(local, &args.closure_states).await?)
    }
    Map::Controls { adherent } => {
      let local = local_scope(store, adherent).await?;
      print_json(&store.find_controls_with_geocode(local).await?)
    }
    Map::Area { local, bbox, minutes, limit, controls } => {
      let filter = AreaFilter {
        bounds: bbox,
        local: local_scope(store, local.adherent).await?,
        closure_states: local.closure_states,
        minutes,
        max_results: limit,
      };
      if controls {
        print_json(&store.find_controls_in_area(&filter).await?)
      } else {
        print_json(&store.find_minutes_in_area(&filter).await?)
      }
    }
  }
}

async fn run_controls(store: &SqliteStore, controls: Controls) -> Result<()> {
  match controls {
    Controls::Dates { minutes, states } => {
      print_json(&store.find_controls_between_dates(&minutes, &states).await?)
    }
    Controls::Stats { states } => print_json(&store.stat_controls(&states).await?),
    Controls::Of { minute } => print_json(&store.find_controls_by_minute(minute).await?),
  }
}

fn parse_bbox(raw: &str) -> std::result::Result<BoundingBox, String> {
  let values = raw
    .split(',')
    .map(|v| v.trim().parse::<f64>().map_err(|e| format!("{v:?}: {e}")))
    .collect::<std::result::Result<Vec<_>, _>>()?;
  match values.as_slice() {
    &[min_lat, max_lat, min_lon, max_lon] => Ok(BoundingBox { min_lat, max_lat, min_lon, max_lon }),
    other => Err(format!("expected 4 comma-separated values, got {}", other.len())),
  }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
  let out = serde_json::to_string_pretty(value).context("failed to serialise output")?;
  println!("{out}");
  Ok(())
}
