//! Market Pulse - daily market health indicators.
//!
//! Runs one analysis over a JSON market fixture and prints the report.
//!
//! Environment:
//! - `PULSE_FIXTURE`: path of the market fixture (required)
//! - `PULSE_DATE`: date to analyse, `YYYY-MM-DD` (defaults to today)

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use pulse_common::config::Config;
use pulse_common::logging::init_logging_with_exclusions;
use pulse_indicators::{AnalysisConfig, InMemorySource, MarketPulseEngine};

#[tokio::main]
async fn main() -> Result<()> {
    let startup_start = std::time::Instant::now();

    // Load configuration
    let config = Config::load_and_validate()?;

    // Initialize logging
    init_logging_with_exclusions(
        &config.observability.log_level,
        &config.observability.log_format,
        &config.observability.excluded_targets,
    );

    tracing::info!("Market Pulse v{}", env!("CARGO_PKG_VERSION"));

    let fixture = std::env::var("PULSE_FIXTURE")
        .map(PathBuf::from)
        .context("PULSE_FIXTURE must point to a market fixture file")?;
    let date = match std::env::var("PULSE_DATE") {
        Ok(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .with_context(|| format!("PULSE_DATE is not a YYYY-MM-DD date: {}", raw))?,
        Err(_) => chrono::Local::now().date_naive(),
    };

    let source = Arc::new(InMemorySource::load(&fixture)?);
    let engine = MarketPulseEngine::new(source, AnalysisConfig::from_config(&config))?;

    tracing::info!(
        duration_ms = startup_start.elapsed().as_millis() as u64,
        "Engine initialized"
    );

    let report = engine.run(date).await?;
    eprintln!("{}", report.summary());
    println!("{}", report.to_json());

    Ok(())
}
