mod cli;
mod telemetry;

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use catalog_client::{
    ClientConfig, CmswebClient, DasClient, McmClient, RucioClient, Stats2Client, WorkflowDirectory,
};
use clap::Parser;
use dataset_tree::reports::{discover_raw_datasets, load_dataset_list, run_run3_report, run_ul_report};
use dataset_tree::{CachedCatalog, ReportOptions, YearsConfig};
use report_tables::TableLayout;
use tracing::info;
use transfer_monitor::{MonitorOptions, TransferServices};

use crate::cli::{Cli, Command, Layout, TreeInputs};

const DATA_FILE: &str = "data.json";
const DATA_SUBSET_FILE: &str = "data_subset.json";
const TIMESTAMP_FILE: &str = "update_timestamp.txt";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional, the real environment wins
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    telemetry::init(cli.global.verbose)?;

    let cfg = ClientConfig::from_env().context("invalid client configuration")?;
    let output_dir = cli.global.output_dir.as_path();
    let opts = ReportOptions {
        concurrency: cli.global.concurrency,
        debug: cli.global.debug,
    };

    match cli.command {
        Command::RerecoUl { inputs } => rereco_ul(&cfg, &inputs, &opts, output_dir).await,
        Command::Run3Data {
            inputs,
            discover_years,
        } => run3_data(&cfg, &inputs, &discover_years, &opts, output_dir).await,
        Command::FullTable { input } => {
            let rows = report_tables::write_full_table(&input, output_dir)
                .with_context(|| format!("full table from {}", input.display()))?;
            info!(rows, "full table written");
            Ok(())
        }
        Command::OriginalTable { input, layout } => {
            let layout = match layout {
                Layout::Ul => TableLayout::ul(),
                Layout::Run3 => TableLayout::run3(),
            };
            let rows = report_tables::write_original_table(&layout, &input, output_dir)
                .with_context(|| format!("original table from {}", input.display()))?;
            info!(rows, "original table written");
            Ok(())
        }
        Command::McChains { datasets } => {
            let mcm = McmClient::new(&cfg)?;
            let datasets = load_dataset_list(&datasets)?;
            let rows = mc_chains::write_chain_report(&mcm, &datasets, opts.concurrency, output_dir)
                .await
                .context("MC chain report")?;
            info!(rows, "chain report written");
            Ok(())
        }
        Command::StuckTransfers {
            page_size,
            page_pause_ms,
        } => {
            let rucio = RucioClient::from_config(&cfg)?;
            if rucio.is_none() {
                info!("RUCIO_URL or RUCIO_AUTH_TOKEN not set, rule states are skipped");
            }
            let services =
                TransferServices::new(Stats2Client::new(&cfg)?, CmswebClient::new(&cfg)?, rucio);
            let monitor = MonitorOptions {
                page_size,
                page_pause: Duration::from_millis(page_pause_ms),
            };
            let rows = transfer_monitor::write_transfer_report(&services, &monitor, output_dir)
                .await
                .context("stuck transfer report")?;
            info!(rows, "transfer report written");
            Ok(())
        }
    }
}

fn load_years(path: &Path) -> anyhow::Result<YearsConfig> {
    YearsConfig::from_file(path)
        .and_then(YearsConfig::with_run_inputs)
        .with_context(|| format!("year configuration {}", path.display()))
}

async fn rereco_ul(
    cfg: &ClientConfig,
    inputs: &TreeInputs,
    opts: &ReportOptions,
    output_dir: &Path,
) -> anyhow::Result<()> {
    let years = load_years(&inputs.years)?;
    let datasets = load_dataset_list(&inputs.datasets)?;
    let catalog = CachedCatalog::new(DasClient::new(&cfg.das_binary));
    let workflows = WorkflowDirectory::new(Stats2Client::new(cfg)?, CmswebClient::new(cfg)?);

    let records = run_ul_report(&catalog, &workflows, &years, datasets, opts).await?;
    report_tables::write_json(&output_dir.join(DATA_FILE), &records, 1)?;
    report_tables::write_timestamp(&output_dir.join(TIMESTAMP_FILE))?;
    info!(records = records.len(), "UL report written");
    Ok(())
}

async fn run3_data(
    cfg: &ClientConfig,
    inputs: &TreeInputs,
    discover_years: &[String],
    opts: &ReportOptions,
    output_dir: &Path,
) -> anyhow::Result<()> {
    let years = load_years(&inputs.years)?;
    let subset: BTreeSet<String> = load_dataset_list(&inputs.datasets)?.into_iter().collect();
    let catalog = CachedCatalog::new(DasClient::new(&cfg.das_binary));

    let datasets = discover_raw_datasets(catalog.inner(), discover_years).await?;
    let report = run_run3_report(&catalog, &years, datasets, &subset, opts).await;
    report_tables::write_json(&output_dir.join(DATA_FILE), &report.all, 1)?;
    report_tables::write_json(&output_dir.join(DATA_SUBSET_FILE), &report.subset, 1)?;
    report_tables::write_timestamp(&output_dir.join(TIMESTAMP_FILE))?;
    info!(
        records = report.all.len(),
        subset = report.subset.len(),
        "Run 3 report written"
    );
    Ok(())
}
