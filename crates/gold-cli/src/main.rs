//! `silver-to-gold`: rebuild the gold star schema from the silver extracts.
//!
//! # Usage
//!
//! ```text
//! silver-to-gold                          # load into PostgreSQL (POSTGRES_* env)
//! silver-to-gold --sqlite gold.db load    # load into a local SQLite file
//! silver-to-gold create-tables
//! silver-to-gold plan
//! ```
//!
//! Settings are read from `gold.toml` (or `--config`), `GOLD_*` variables and
//! a `.env` file when present.

mod settings;

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use gold_core::{LoadReport, Loader, Plan, Table, store::WarehouseStore};
use gold_silver::SilverDir;
use gold_store_postgres::PgStore;
use gold_store_sqlite::SqliteStore;
use settings::Settings;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Load silver extracts into the gold star schema")]
struct Cli {
  /// Path to the TOML settings file.
  #[arg(short, long, default_value = "gold.toml")]
  config: PathBuf,

  /// Directory holding the silver CSV extracts.
  #[arg(long, value_name = "DIR")]
  silver_dir: Option<PathBuf>,

  /// Write to this SQLite file instead of PostgreSQL.
  #[arg(long, value_name = "PATH")]
  sqlite: Option<PathBuf>,

  /// Print results as JSON.
  #[arg(long)]
  json: bool,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Command {
  /// Clear every gold table and reload it (default).
  #[default]
  Load,
  /// Create the gold tables if they do not exist.
  CreateTables,
  /// Print the stage order and exit.
  Plan,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  dotenvy::dotenv().ok();

  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let command = cli.command.unwrap_or_default();

  if command == Command::Plan {
    return print_plan(cli.json);
  }

  let settings = Settings::load(&cli.config)?;
  let silver_dir = cli.silver_dir.clone().unwrap_or_else(|| settings.silver_dir.clone());

  match &cli.sqlite {
    Some(path) => {
      let store = SqliteStore::open(path)
        .await
        .with_context(|| format!("failed to open SQLite warehouse at {path:?}"))?;
      run(command, &store, &settings, &silver_dir, cli.json).await
    }
    None => {
      let store = PgStore::new(&settings::database()?);
      run(command, &store, &settings, &silver_dir, cli.json).await
    }
  }
}

async fn run<W: WarehouseStore>(
  command: Command,
  store: &W,
  settings: &Settings,
  silver_dir: &Path,
  json: bool,
) -> anyhow::Result<()> {
  match command {
    Command::Load => {
      let source = SilverDir::new(silver_dir);
      info!(silver_dir = %silver_dir.display(), "starting load");
      let report = Loader::new(store, &source, settings.load_options()?)
        .run()
        .await
        .context("silver-to-gold load failed")?;
      print_report(&report, json)?;
    }
    Command::CreateTables => {
      store.create_tables().await.context("failed to create gold tables")?;
      info!("gold tables ready");
    }
    Command::Plan => print_plan(json)?,
  }
  Ok(())
}

fn print_plan(json: bool) -> anyhow::Result<()> {
  let plan = Plan::standard()?;
  if json {
    println!("{}", serde_json::to_string_pretty(plan.stages())?);
    return Ok(());
  }
  for (i, stage) in plan.stages().iter().enumerate() {
    let inputs: Vec<String> = stage.inputs().iter().map(|a| format!("{a:?}")).collect();
    if inputs.is_empty() {
      println!("{:>2}. {stage}", i + 1);
    } else {
      println!("{:>2}. {stage}  (after {})", i + 1, inputs.join(", "));
    }
  }
  Ok(())
}

fn print_report(report: &LoadReport, json: bool) -> anyhow::Result<()> {
  if json {
    println!("{}", serde_json::to_string_pretty(report)?);
    return Ok(());
  }
  println!("run {}", report.run_id);
  for table in Table::CREATE_ORDER {
    match report.dropped(table) {
      0 => println!("  {:<18} {:>10}", table.name(), report.rows(table)),
      dropped => {
        println!("  {:<18} {:>10}  ({dropped} dropped)", table.name(), report.rows(table))
      }
    }
  }
  Ok(())
}
