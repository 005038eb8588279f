use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "evalgrid",
    version,
    about = "Run every sample under every condition, judge the answers, aggregate the scores"
)]
pub struct Cli {
    /// Log output format (logs always go to stderr)
    #[arg(long, value_enum, default_value_t = LogFormat::Console, global = true)]
    pub log_format: LogFormat,

    /// Shorthand for RUST_LOG=debug
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Console,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Validate a config and its dataset, then print the trial grid
    Plan(PlanArgs),
    /// Run the full grid with scripted capabilities and write the outputs
    DryRun(DryRunArgs),
    /// Aggregate a stored run summary
    Report(ReportArgs),
}

#[derive(Args, Clone)]
pub struct PlanArgs {
    #[arg(long, default_value = "eval.yaml")]
    pub config: PathBuf,

    /// Print the plan as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Clone)]
pub struct DryRunArgs {
    #[arg(long, default_value = "eval.yaml")]
    pub config: PathBuf,

    #[arg(long, default_value = "results")]
    pub out_dir: PathBuf,

    /// Disable the progress lines on stderr
    #[arg(long)]
    pub quiet: bool,
}

#[derive(Args, Clone)]
pub struct ReportArgs {
    /// Summary JSON written by a previous run
    pub summary: PathBuf,

    /// Also write the aggregate report here
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Print one line per (sample, condition) group
    #[arg(long)]
    pub groups: bool,
}
