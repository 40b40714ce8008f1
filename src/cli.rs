use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "dataset-reports", version, about = "Dataset production tracking reports")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Directory the report files are written into.
    #[arg(long, global = true, default_value = "output")]
    pub output_dir: PathBuf,

    /// RAW datasets processed at once.
    #[arg(long, global = true, default_value_t = 4)]
    pub concurrency: usize,

    /// Debug logs for the workspace crates.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Process only a random sample of the input datasets.
    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(Debug, Args)]
pub struct TreeInputs {
    /// Per-year configuration.
    #[arg(long, default_value = "years.json")]
    pub years: PathBuf,

    /// RAW dataset list, one name per line.
    #[arg(long, default_value = "datasets.txt")]
    pub datasets: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Layout {
    Ul,
    Run3,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// UL ReReco tree from the processing workflows of each RAW dataset.
    RerecoUl {
        #[command(flatten)]
        inputs: TreeInputs,
    },
    /// Run 3 data tree from catalog naming conventions.
    Run3Data {
        #[command(flatten)]
        inputs: TreeInputs,

        /// Years whose RAW datasets are discovered in the catalog.
        #[arg(long = "year", default_value = "2022")]
        discover_years: Vec<String>,
    },
    /// Flattened tree with fractions and run counts.
    FullTable {
        #[arg(long, default_value = "output/data.json")]
        input: PathBuf,
    },
    /// One row per RAW dataset with the fixed column layout.
    OriginalTable {
        #[arg(long, default_value = "output/data.json")]
        input: PathBuf,

        #[arg(long, value_enum, default_value_t = Layout::Ul)]
        layout: Layout,
    },
    /// MiniAOD and NanoAOD chains of the UL GEN requests of each dataset.
    McChains {
        /// Dataset list, one name per line.
        #[arg(long, default_value = "datasets.txt")]
        datasets: PathBuf,
    },
    /// Transfer progress of workflows waiting in staging.
    StuckTransfers {
        /// Workflows fetched per status page.
        #[arg(long, default_value_t = 100)]
        page_size: usize,

        /// Pause between status pages, in milliseconds.
        #[arg(long, default_value_t = 250)]
        page_pause_ms: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from([
            "dataset-reports",
            "original-table",
            "--layout",
            "run3",
            "--output-dir",
            "out",
            "--concurrency",
            "8",
        ])
        .unwrap();
        assert_eq!(cli.global.output_dir, PathBuf::from("out"));
        assert_eq!(cli.global.concurrency, 8);
        assert!(matches!(
            cli.command,
            Command::OriginalTable {
                layout: Layout::Run3,
                ..
            }
        ));
    }

    #[test]
    fn run3_discovers_2022_by_default() {
        let cli = Cli::try_parse_from(["dataset-reports", "run3-data"]).unwrap();
        let Command::Run3Data {
            discover_years,
            inputs,
        } = cli.command
        else {
            panic!("wrong subcommand");
        };
        assert_eq!(discover_years, vec!["2022"]);
        assert_eq!(inputs.years, PathBuf::from("years.json"));
        assert_eq!(cli.global.output_dir, PathBuf::from("output"));
    }
}
