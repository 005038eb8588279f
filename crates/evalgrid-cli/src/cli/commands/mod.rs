use super::args::*;
use crate::exit_codes;
use evalgrid_core::dataset::{DatasetSupplier, JsonlDataset, LoadedDataset};
use evalgrid_core::{load_config, EvalConfig};
use std::path::Path;

pub mod dry_run;
pub mod plan;
pub mod report;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Plan(args) => plan::run(args),
        Command::DryRun(args) => dry_run::run(args).await,
        Command::Report(args) => report::run(args),
    }
}

/// Loads the config and reads its dataset once, printing the error and
/// returning the exit code when either is unusable.
pub(crate) fn load_inputs(path: &Path) -> Result<(EvalConfig, LoadedDataset), i32> {
    let cfg = load_config(path).map_err(|e| {
        eprintln!("config error: {e}");
        exit_codes::CONFIG_ERROR
    })?;
    let loaded = JsonlDataset::from_config(&cfg.dataset)
        .load()
        .map_err(|e| {
            eprintln!("dataset error: {e}");
            exit_codes::CONFIG_ERROR
        })?;
    Ok((cfg, loaded))
}
