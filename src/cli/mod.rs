mod audit;
mod snapshot;

use chrono::{Datelike, FixedOffset, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use revtrack::config::{EngineConfig, DATA_DIR_ENV};
use revtrack::store::JsonDirStore;
use revtrack::types::{Period, Result};
use revtrack::MetricsEngine;

use audit::AuditArgs;
use snapshot::{SnapshotArgs, StatusArgs};

/// Revenue and operations metrics over a JSONL export
#[derive(Parser)]
#[command(name = "revtrack")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Data directory (overrides config file and REVTRACK_DATA_DIR)
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Config file (default: ~/.revtrack/config.json)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Revenue, KPIs, series and rankings for a period (default)
    Snapshot(SnapshotArgs),

    /// Order status counts
    Status(StatusArgs),

    /// Orders whose stored total disagrees with their line items
    Audit(AuditArgs),
}

/// Calendar window shared by the subcommands
#[derive(Args, Debug, Clone, Default)]
pub struct PeriodArgs {
    /// First day, YYYY-MM-DD (default: first day of this month)
    #[arg(long, value_name = "DATE")]
    pub from: Option<NaiveDate>,

    /// Last day, inclusive (default: today)
    #[arg(long, value_name = "DATE")]
    pub to: Option<NaiveDate>,
}

impl PeriodArgs {
    pub fn resolve(&self, offset: &FixedOffset) -> Result<Period> {
        let today = Utc::now().with_timezone(offset).date_naive();
        let end = self.to.unwrap_or(today);
        let start = self
            .from
            .unwrap_or_else(|| end.with_day(1).unwrap_or(end));
        Period::new(start, end)
    }

    fn is_set(&self) -> bool {
        self.from.is_some() || self.to.is_some()
    }
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config = self.load_config()?;
        tracing::debug!(data_dir = %config.data_dir.display(), "using data directory");

        match self.command {
            None => SnapshotArgs::default().run(config).await,
            Some(Commands::Snapshot(args)) => args.run(config).await,
            Some(Commands::Status(args)) => args.run(config).await,
            Some(Commands::Audit(args)) => args.run(config).await,
        }
    }

    /// File, then environment, then flags
    fn load_config(&self) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::load_from(path)?,
            None => EngineConfig::load()?,
        };
        config.override_data_dir(std::env::var_os(DATA_DIR_ENV).map(PathBuf::from));
        config.override_data_dir(self.data_dir.clone());
        Ok(config)
    }
}

fn engine(config: &EngineConfig) -> Result<MetricsEngine<JsonDirStore>> {
    MetricsEngine::with_config(JsonDirStore::new(config.data_dir.clone()), config)
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
