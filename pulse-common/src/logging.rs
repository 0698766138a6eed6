//! Logging utilities.
//!
//! Structured logging on top of `tracing-subscriber`, with either JSON or
//! human-readable output.
//!
//! # Target Filtering
//!
//! Targets listed in `observability.excluded_targets` are pinned to `warn`.
//! `RUST_LOG` overrides everything.

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Build the filter directives for a base level plus warn-pinned targets.
fn build_directives(log_level: &str, excluded_targets: &[String]) -> String {
    let mut directives = String::from(log_level);

    for target in excluded_targets {
        directives.push_str(&format!(",{}=warn", target));
    }

    directives
}

fn install(filter: EnvFilter, log_format: &str) {
    let subscriber = tracing_subscriber::registry().with(filter);

    if log_format == "json" {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_current_span(true)
            .with_target(true)
            .with_file(true)
            .with_line_number(true);
        let _ = subscriber.with(fmt_layer).try_init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_ansi(true)
            .with_target(true)
            .with_file(false)
            .with_line_number(false);
        let _ = subscriber.with(fmt_layer).try_init();
    }
}

/// Initialize logging with the given configuration.
///
/// # Arguments
///
/// * `log_level` - Base log level (trace, debug, info, warn, error)
/// * `log_format` - Output format: "json" for structured JSON, "pretty" for human-readable
pub fn init_logging(log_level: &str, log_format: &str) {
    init_logging_with_exclusions(log_level, log_format, &[]);
}

/// Initialize logging with custom excluded targets.
///
/// Like `init_logging`, but additional modules are pinned to `warn`.
pub fn init_logging_with_exclusions(
    log_level: &str,
    log_format: &str,
    excluded_targets: &[String],
) {
    let directives = build_directives(log_level, excluded_targets);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directives));

    install(filter, log_format);

    tracing::info!(
        log_level = %log_level,
        log_format = %log_format,
        excluded_targets = excluded_targets.len(),
        "Logging initialized"
    );
}

/// Generate a new identifier for one analysis run.
pub fn generate_run_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
