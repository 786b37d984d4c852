//! Haven report generator
//!
//! Loads transactions from a JSON file, runs one analytics report and
//! prints it to stdout as JSON.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use haven_core::analytics::{
    AnalyticsService, InMemoryTransactionStore, ReportRequest, ReportSettings, TransactionRecord,
};
use haven_shared::{AppConfig, AppError, LoggingConfig};

/// Haven - period-bucketed revenue reports.
#[derive(Parser, Debug)]
#[command(name = "haven-report")]
#[command(version, about, long_about = None)]
struct Cli {
    /// JSON file holding an array of transaction records
    #[arg(short, long)]
    transactions: PathBuf,

    /// Period keyword (today, yesterday, last_7_days, last_4_weeks,
    /// last_3_months, last_6_months, last_12_months, custom)
    #[arg(short, long)]
    period: String,

    /// Start of a custom range (RFC 3339, local date-time or YYYY-MM-DD)
    #[arg(long)]
    start_date: Option<String>,

    /// End of a custom range (RFC 3339, local date-time or YYYY-MM-DD)
    #[arg(long)]
    end_date: Option<String>,

    /// Reference instant in RFC 3339; defaults to the current time
    #[arg(long)]
    now: Option<DateTime<Utc>>,

    /// Override the reporting timezone (IANA name)
    #[arg(long)]
    timezone: Option<String>,

    /// Pretty-print the report
    #[arg(long)]
    pretty: bool,

    /// Use JSON log format instead of pretty
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn request(&self) -> ReportRequest {
        ReportRequest {
            period: Some(self.period.clone()),
            start_date: self.start_date.clone(),
            end_date: self.end_date.clone(),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match AppConfig::load_with_dotenv() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(timezone) = &cli.timezone {
        config.analytics.timezone.clone_from(timezone);
    }
    if cli.json_logs {
        config.logging.json = true;
    }

    init_tracing(&config.logging);

    match run(&cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let app = err.downcast_ref::<AppError>();
            let code = app.map_or("INTERNAL_ERROR", AppError::error_code);
            error!(error = %err, code, "Report generation failed");
            if app.is_some_and(AppError::is_client_error) {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

/// Logs go to stderr so stdout carries only the report.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn run(cli: &Cli, config: &AppConfig) -> anyhow::Result<()> {
    let settings = ReportSettings::from_config(&config.analytics).map_err(AppError::from)?;

    let raw = std::fs::read_to_string(&cli.transactions)
        .with_context(|| format!("Failed to read {}", cli.transactions.display()))?;
    let records: Vec<TransactionRecord> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", cli.transactions.display()))?;
    info!(
        records = records.len(),
        timezone = %settings.timezone,
        "Loaded transactions"
    );

    let store: InMemoryTransactionStore = records.into_iter().collect();
    let service = AnalyticsService::new(Arc::new(store), settings);

    let now = cli.now.unwrap_or_else(Utc::now);
    let report = service
        .generate(&cli.request(), now)
        .map_err(AppError::from)?;

    let json = if cli.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{json}");

    Ok(())
}
