use std::io::{self, IsTerminal};

use tracing::Level;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Targets of the workspace crates, raised together by `--verbose`.
const WORKSPACE_TARGETS: [&str; 6] = [
    "dataset_reports",
    "catalog_client",
    "dataset_tree",
    "report_tables",
    "mc_chains",
    "transfer_monitor",
];

/// RFC3339 UTC timer through `chrono`, e.g. `2025-09-12T10:20:30Z`.
#[derive(Clone, Debug, Default)]
struct ChronoRfc3339Utc;

impl FormatTime for ChronoRfc3339Utc {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = chrono::Utc::now();
        w.write_str(&now.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
    }
}

/// `RUST_LOG` or `info`; `verbose` lifts the workspace crates to `debug`.
pub fn env_filter(verbose: bool) -> EnvFilter {
    let base = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if !verbose {
        return base;
    }
    let level = Level::DEBUG.as_str().to_lowercase();
    WORKSPACE_TARGETS
        .iter()
        .filter_map(|t| format!("{t}={level}").parse::<Directive>().ok())
        .fold(base, |filter, directive| filter.add_directive(directive))
}

/// Installs the global subscriber: compact lines, UTC timestamps, span durations.
pub fn init(verbose: bool) -> anyhow::Result<()> {
    let fmt_layer = fmt::layer()
        .with_timer(ChronoRfc3339Utc)
        .with_level(true)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(io::stderr().is_terminal())
        .with_writer(io::stderr)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(fmt_layer)
        .try_init()?;
    Ok(())
}
